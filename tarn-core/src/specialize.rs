//! Call-site resolution: the monomorphic and polymorphic call protocols.
//!
//! Invoked once per application whose callee is a statically addressed
//! defined function. A pure decision procedure with two branches
//! selected by the definition's polymorphism flag:
//!
//! - monomorphic: nest-check the argument against the declared
//!   parameter shape, then reuse the single canonical compilation;
//! - polymorphic: regenerate the body against the actual argument and
//!   accept only if the candidate is structurally identical to the
//!   canonical compilation.

use log::debug;

use crate::ast::Span;
use crate::code::Code;
use crate::codegen::{CodeGenerator, Staged};
use crate::equivalence::{equivalent, first_divergence};
use crate::error::{CompilerError, Result};
use crate::registry::{DefId, FunctionDefinition};
use crate::shape::nests_under;
use crate::value::{shape_of, Value};

/// Resolve a call to a registered definition, producing the code
/// fragment spliced into the caller's own compilation.
pub(crate) fn resolve_call(
    gen: &mut CodeGenerator<'_>,
    def_id: DefId,
    arg: Staged,
    span: Span,
) -> Result<Staged> {
    let def = gen
        .registry()
        .get(def_id)
        .unwrap_or_else(|| panic!("BUG: call to unknown definition {}", def_id));

    if gen.is_active(def_id) {
        // The definition's own compilation is still in flight: emit a
        // recursion marker instead of recursing. The monomorphic
        // nest-check still applies.
        if !def.polymorphic {
            ensure_nests(&arg, def, span)?;
        }
        debug!("recursive call to '{}' marked", def.name);
        return Ok(Staged {
            code: Code::Recur {
                def: def_id,
                arg: Box::new(arg.code),
            },
            exemplar: Value::Empty,
        });
    }

    if def.polymorphic {
        resolve_polymorphic(gen, def_id, def, arg, span)
    } else {
        resolve_monomorphic(def_id, def, arg, span)
    }
}

/// Monomorphic protocol: one nest-check, then the canonical code is
/// reused unmodified. The definition is compiled exactly once no matter
/// how many call sites exist.
fn resolve_monomorphic(
    def_id: DefId,
    def: &FunctionDefinition,
    arg: Staged,
    span: Span,
) -> Result<Staged> {
    ensure_nests(&arg, def, span)?;
    let canonical = def.canonical();
    debug!("monomorphic call to '{}' reuses canonical code", def.name);
    Ok(Staged {
        code: Code::Call {
            def: def_id,
            arg: Box::new(arg.code),
        },
        exemplar: canonical.exemplar.clone(),
    })
}

/// Polymorphic protocol: regenerate the body against the actual
/// argument and gate on structural equivalence with the canonical
/// compilation. No nest-check against the declared parameter shape is
/// performed on this path; the declared shape is advisory and acts only
/// through the canonical compilation it once seeded.
fn resolve_polymorphic(
    gen: &mut CodeGenerator<'_>,
    def_id: DefId,
    def: &FunctionDefinition,
    arg: Staged,
    span: Span,
) -> Result<Staged> {
    let candidate = gen.specialize_nested(def_id, &def.body, &arg.exemplar, &def.env, span)?;

    let canonical = def.canonical();
    if !equivalent(&canonical.code, &candidate.code) {
        let divergence = first_divergence(&canonical.code, &candidate.code)
            .unwrap_or_else(|| panic!("BUG: unequal code trees with no divergence point"));
        debug!(
            "polymorphic call to '{}' diverged at {}",
            def.name,
            divergence.location()
        );
        return Err(CompilerError::SpecializationDivergence {
            canonical: Box::new(canonical.code.clone()),
            candidate: Box::new(candidate.code),
            divergence,
            span: Some(span),
        });
    }

    debug!(
        "polymorphic call to '{}' specialized; fingerprint {:016x}",
        def.name,
        canonical.fingerprint
    );
    // Macro-style expansion: this call site carries its own freshly
    // generated fragment together with the argument.
    Ok(Staged {
        code: Code::Expand {
            arg: Box::new(arg.code),
            body: Box::new(candidate.code),
        },
        exemplar: candidate.exemplar,
    })
}

fn ensure_nests(arg: &Staged, def: &FunctionDefinition, span: Span) -> Result<()> {
    let actual = shape_of(&arg.exemplar);
    if nests_under(&actual, &def.param_shape) {
        Ok(())
    } else {
        Err(CompilerError::ArgumentShapeMismatch {
            expected: def.param_shape.clone(),
            actual,
            span: Some(span),
        })
    }
}
