//! Function definition registry.
//!
//! An explicit, passed-by-reference store of immutable definitions with
//! write-once canonical code. Elaborating a definition compiles its
//! body exactly once, against the canonical placeholder of the declared
//! parameter shape; the result is published through a once-only gate
//! and never recomputed.

use std::rc::Rc;
use std::sync::OnceLock;

use log::debug;

use crate::ast::Expression;
use crate::code::Code;
use crate::codegen::CodeGenerator;
use crate::env::Env;
use crate::error::Result;
use crate::shape::{self, Shape};
use crate::value::{shape_of, FnOrigin, FunctionValue, Value};
use crate::IdArena;

/// Stable identifier for a definition in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub u32);

impl From<u32> for DefId {
    fn from(id: u32) -> Self {
        DefId(id)
    }
}

impl std::fmt::Display for DefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A definition's one-time canonical compilation.
#[derive(Debug)]
pub struct Canonical {
    pub code: Code,
    /// The compile-time result value of the canonical pass. Determines
    /// the definition's arrow shape and stages nested monomorphic calls.
    pub exemplar: Value,
    pub fingerprint: u64,
}

/// A function definition. Immutable once elaborated; referenced, never
/// copied, from arbitrarily many call sites.
#[derive(Debug)]
pub struct FunctionDefinition {
    pub name: String,
    pub body: Expression,
    /// Declared shape of the parameter, used only to seed the canonical
    /// placeholder (and, for monomorphic definitions, the nest-check).
    pub param_shape: Shape,
    pub polymorphic: bool,
    /// The defining scope's bindings, shared with every specialization.
    pub env: Rc<Env>,
    /// Write-once, read-many: the only synchronization point in the
    /// engine.
    canonical: OnceLock<Canonical>,
}

impl FunctionDefinition {
    /// The canonical compilation. Present for every definition the
    /// registry has published.
    pub fn canonical(&self) -> &Canonical {
        self.canonical.get().unwrap_or_else(|| {
            panic!(
                "BUG: definition '{}' read before its canonical compile finished",
                self.name
            )
        })
    }

    /// The arrow shape of this definition as a value:
    /// declared parameter shape -> shape of the canonical result.
    pub fn arrow_shape(&self) -> Shape {
        shape::function(self.param_shape.clone(), shape_of(&self.canonical().exemplar))
    }
}

/// The store of definitions.
#[derive(Debug, Default)]
pub struct Registry {
    defs: IdArena<DefId, FunctionDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Elaborate a definition: store it, bind its own name for
    /// recursive bodies, and compile the canonical placeholder exactly
    /// once. Fails (and unpublishes the definition) if even the
    /// canonical placeholder cannot compile.
    pub fn define(
        &mut self,
        name: &str,
        body: Expression,
        param_shape: Shape,
        polymorphic: bool,
        env: Rc<Env>,
    ) -> Result<DefId> {
        let placeholder = shape::canonical_placeholder(&param_shape);
        let id = self.defs.alloc_id();
        debug!(
            "elaborating {} definition '{}' as {}",
            if polymorphic { "polymorphic" } else { "monomorphic" },
            name,
            id
        );

        // Extend the captured environment with the definition's own
        // name so recursive bodies resolve it. The result shape is not
        // known yet; recursive applications are staged as markers and
        // never consult it structurally.
        let mut defining_env = (*env).clone();
        defining_env.push(
            name,
            Value::Function(FunctionValue {
                shape: shape::function(param_shape.clone(), shape::any()),
                origin: FnOrigin::Def(id),
            }),
        );
        let defining_env = Rc::new(defining_env);

        self.defs.insert(
            id,
            FunctionDefinition {
                name: name.to_string(),
                body,
                param_shape,
                polymorphic,
                env: Rc::clone(&defining_env),
                canonical: OnceLock::new(),
            },
        );

        let compiled = {
            let def = self
                .defs
                .get(&id)
                .unwrap_or_else(|| panic!("BUG: freshly inserted definition {} missing", id));
            let mut gen = CodeGenerator::with_active(self, vec![id]);
            gen.compile(&def.body, &placeholder, &defining_env)
        };

        match compiled {
            Ok(staged) => {
                let fingerprint = staged.code.fingerprint();
                debug!("definition '{}' canonical fingerprint {:016x}", name, fingerprint);
                let def = self
                    .defs
                    .get(&id)
                    .unwrap_or_else(|| panic!("BUG: freshly inserted definition {} missing", id));
                let published = def.canonical.set(Canonical {
                    code: staged.code,
                    exemplar: staged.exemplar,
                    fingerprint,
                });
                if published.is_err() {
                    panic!("BUG: canonical code for '{}' written twice", name);
                }
                Ok(id)
            }
            Err(err) => {
                self.defs.remove(&id);
                Err(err)
            }
        }
    }

    pub fn get(&self, id: DefId) -> Option<&FunctionDefinition> {
        self.defs.get(&id)
    }

    /// The function value referencing a published definition, for
    /// binding into captured environments.
    pub fn function_value(&self, id: DefId) -> Value {
        let def = self
            .get(id)
            .unwrap_or_else(|| panic!("BUG: no definition {}", id));
        Value::Function(FunctionValue {
            shape: def.arrow_shape(),
            origin: FnOrigin::Def(id),
        })
    }

    /// Iterate over all published definitions in elaboration order.
    pub fn definitions(&self) -> impl Iterator<Item = (DefId, &FunctionDefinition)> {
        self.defs.iter().map(|(id, def)| (*id, def))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
