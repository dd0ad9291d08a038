use crate::ast::build::ExprBuilder;
use crate::code::{Code, PrimOp, Slot};
use crate::codegen::{CodeGenerator, Staged, MAX_SPECIALIZE_DEPTH};
use crate::env::Env;
use crate::error::{CompilerError, Result};
use crate::registry::{DefId, Registry};
use crate::shape;
use crate::value::Value;

/// Compile a one-call caller body `f(param)` against a concrete
/// argument, the way an enclosing compilation pass reaches a call site.
fn resolve_call_site(registry: &Registry, name: &str, callee: DefId, argument: Value) -> Result<Staged> {
    let mut b = ExprBuilder::new();
    let func = b.name(name);
    let param = b.param();
    let body = b.apply(func, param);

    let mut env = Env::new();
    env.push(name, registry.function_value(callee));

    let mut gen = CodeGenerator::new(registry);
    gen.compile(&body, &argument, &env.shared())
}

fn fetch_param() -> Code {
    Code::Fetch {
        root: Slot::Param,
        path: vec![],
    }
}

/// A monomorphic `add2` over numbers, used as a function argument.
fn define_add2(registry: &mut Registry) -> DefId {
    let mut b = ExprBuilder::new();
    let param = b.param();
    let two = b.int(2);
    let body = b.binop("+", param, two);
    registry
        .define("add2", body, shape::num(), false, Env::new().shared())
        .unwrap()
}

// =============================================================================
// Polymorphic protocol
// =============================================================================

#[test]
fn relocating_polymorphic_body_accepts_every_argument_shape() {
    let mut registry = Registry::new();
    let mut b = ExprBuilder::new();
    let param = b.param();
    let empty = b.lit(Value::Empty);
    let body = b.pair(param, empty);
    let f = registry
        .define("f", body, shape::any(), true, Env::new().shared())
        .unwrap();

    let with_num = resolve_call_site(&registry, "f", f, Value::Int(3)).unwrap();
    let with_text = resolve_call_site(&registry, "f", f, Value::Text("hi".into())).unwrap();

    let expected_body = Code::Cons(Box::new(fetch_param()), Box::new(Code::Inject(Value::Empty)));
    match (&with_num.code, &with_text.code) {
        (Code::Expand { body: num_body, .. }, Code::Expand { body: text_body, .. }) => {
            assert_eq!(**num_body, expected_body);
            assert_eq!(num_body, text_body);
        }
        other => panic!("expected expansion fragments, got {:?}", other),
    }
}

#[test]
fn declared_shape_is_advisory_for_polymorphic_definitions() {
    // The declared parameter shape only seeds the canonical pass; a
    // relocating body accepts arguments outside it.
    let mut registry = Registry::new();
    let mut b = ExprBuilder::new();
    let param = b.param();
    let empty = b.lit(Value::Empty);
    let body = b.pair(param, empty);
    let f = registry
        .define("f", body, shape::num(), true, Env::new().shared())
        .unwrap();

    let staged = resolve_call_site(&registry, "f", f, Value::Text("out of shape".into())).unwrap();
    assert!(matches!(staged.code, Code::Expand { .. }));
}

#[test]
fn identity_body_accepts_atoms_and_functions_with_identical_code() {
    let mut registry = Registry::new();
    let mut b = ExprBuilder::new();
    let body = b.param();
    let h = registry
        .define("h", body, shape::any(), true, Env::new().shared())
        .unwrap();

    let with_num = resolve_call_site(&registry, "h", h, Value::Int(5)).unwrap();
    let function_argument = registry.function_value(h);
    let with_fn = resolve_call_site(&registry, "h", h, function_argument).unwrap();

    match (&with_num.code, &with_fn.code) {
        (Code::Expand { body: num_body, .. }, Code::Expand { body: fn_body, .. }) => {
            assert_eq!(**num_body, fetch_param());
            assert_eq!(num_body, fn_body);
        }
        other => panic!("expected expansion fragments, got {:?}", other),
    }
}

#[test]
fn non_uniform_primitive_resolution_diverges() {
    let mut registry = Registry::new();
    let mut b = ExprBuilder::new();
    let lhs = b.param();
    let rhs = b.param();
    let body = b.binop("+", lhs, rhs);
    let double = registry
        .define("double", body, shape::num(), true, Env::new().shared())
        .unwrap();

    let with_num = resolve_call_site(&registry, "double", double, Value::Int(4)).unwrap();
    match &with_num.code {
        Code::Expand { body, .. } => assert!(matches!(
            **body,
            Code::Prim {
                op: PrimOp::NumAdd,
                ..
            }
        )),
        other => panic!("expected an expansion fragment, got {:?}", other),
    }

    let err = resolve_call_site(&registry, "double", double, Value::Text("ab".into())).unwrap_err();
    match err {
        CompilerError::SpecializationDivergence { divergence, .. } => {
            assert_eq!(divergence.location(), "the root");
            assert_eq!(divergence.canonical_op, "prim num.add");
            assert_eq!(divergence.candidate_op, "prim text.join");
        }
        other => panic!("expected specialization divergence, got {:?}", other),
    }
}

#[test]
fn calling_with_the_canonical_placeholder_always_succeeds() {
    // Regenerating against the same placeholder the canonical pass used
    // reproduces the canonical tree; the equivalence gate is reflexive.
    let mut registry = Registry::new();
    let mut b = ExprBuilder::new();
    let lhs = b.param();
    let rhs = b.param();
    let body = b.binop("+", lhs, rhs);
    let double = registry
        .define("double", body, shape::num(), true, Env::new().shared())
        .unwrap();

    let placeholder = shape::canonical_placeholder(&shape::num());
    let staged = resolve_call_site(&registry, "double", double, placeholder).unwrap();
    match &staged.code {
        Code::Expand { body, .. } => {
            assert_eq!(**body, registry.get(double).unwrap().canonical().code);
        }
        other => panic!("expected an expansion fragment, got {:?}", other),
    }
}

#[test]
fn failed_polymorphic_calls_do_not_invalidate_the_definition() {
    let mut registry = Registry::new();
    let mut b = ExprBuilder::new();
    let lhs = b.param();
    let rhs = b.param();
    let body = b.binop("+", lhs, rhs);
    let double = registry
        .define("double", body, shape::num(), true, Env::new().shared())
        .unwrap();

    resolve_call_site(&registry, "double", double, Value::Text("ab".into())).unwrap_err();
    let staged = resolve_call_site(&registry, "double", double, Value::Int(1)).unwrap();
    assert!(matches!(staged.code, Code::Expand { .. }));
}

// =============================================================================
// Monomorphic protocol
// =============================================================================

#[test]
fn monomorphic_calls_share_one_compiled_body() {
    let mut registry = Registry::new();
    let add2 = define_add2(&mut registry);
    let fingerprint = registry.get(add2).unwrap().canonical().fingerprint;

    let err = resolve_call_site(&registry, "add2", add2, Value::Text("nope".into())).unwrap_err();
    match err {
        CompilerError::ArgumentShapeMismatch { expected, actual, .. } => {
            assert_eq!(expected, shape::num());
            assert_eq!(actual, shape::text());
        }
        other => panic!("expected argument shape mismatch, got {:?}", other),
    }

    let first = resolve_call_site(&registry, "add2", add2, Value::Int(7)).unwrap();
    let second = resolve_call_site(&registry, "add2", add2, Value::Int(100)).unwrap();

    let expected = Code::Call {
        def: add2,
        arg: Box::new(fetch_param()),
    };
    assert_eq!(first.code, expected);
    assert_eq!(second.code, expected);

    // The canonical compilation was never redone.
    assert_eq!(registry.get(add2).unwrap().canonical().fingerprint, fingerprint);
}

#[test]
fn monomorphic_results_stage_as_the_canonical_exemplar() {
    let mut registry = Registry::new();
    let add2 = define_add2(&mut registry);

    let staged = resolve_call_site(&registry, "add2", add2, Value::Int(7)).unwrap();
    assert!(matches!(staged.exemplar, Value::Int(_)));
}

// =============================================================================
// Higher-order composition
// =============================================================================

#[test]
fn monomorphic_function_parameter_is_checked_once_and_invoked() {
    let mut registry = Registry::new();
    let add2 = define_add2(&mut registry);

    let mut b = ExprBuilder::new();
    let param = b.param();
    let five = b.int(5);
    let body = b.apply(param, five);
    let arrow = shape::function(shape::num(), shape::num());
    let hof = registry
        .define("hof", body, arrow, false, Env::new().shared())
        .unwrap();

    // The unchanging canonical code invokes the parameter positionally.
    let canonical = &registry.get(hof).unwrap().canonical().code;
    assert_eq!(
        *canonical,
        Code::Invoke {
            func: Box::new(fetch_param()),
            arg: Box::new(Code::Inject(Value::Int(5))),
        }
    );

    let with_fn = resolve_call_site(&registry, "hof", hof, registry.function_value(add2)).unwrap();
    assert!(matches!(with_fn.code, Code::Call { def, .. } if def == hof));

    let err = resolve_call_site(&registry, "hof", hof, Value::Int(3)).unwrap_err();
    assert!(matches!(err, CompilerError::ArgumentShapeMismatch { .. }));
}

#[test]
fn polymorphic_function_parameter_validates_substitution_via_equivalence() {
    let mut registry = Registry::new();
    let add2 = define_add2(&mut registry);

    let mut b = ExprBuilder::new();
    let param = b.param();
    let three = b.int(3);
    let body = b.apply(param, three);
    let arrow = shape::function(shape::num(), shape::num());
    let hop = registry
        .define("hop", body, arrow, true, Env::new().shared())
        .unwrap();

    // Substituting a concrete function regenerates the same invoke
    // fragment the canonical pass produced from the placeholder.
    let with_fn = resolve_call_site(&registry, "hop", hop, registry.function_value(add2)).unwrap();
    match &with_fn.code {
        Code::Expand { body, .. } => assert_eq!(
            **body,
            Code::Invoke {
                func: Box::new(fetch_param()),
                arg: Box::new(Code::Inject(Value::Int(3))),
            }
        ),
        other => panic!("expected an expansion fragment, got {:?}", other),
    }
}

#[test]
fn substituting_a_function_with_the_wrong_parameter_shape_fails() {
    let mut registry = Registry::new();

    let mut b = ExprBuilder::new();
    let body = b.param();
    let upper = registry
        .define("upper", body, shape::text(), false, Env::new().shared())
        .unwrap();

    let mut b = ExprBuilder::new();
    let param = b.param();
    let three = b.int(3);
    let body = b.apply(param, three);
    let arrow = shape::function(shape::num(), shape::num());
    let hop = registry
        .define("hop", body, arrow, true, Env::new().shared())
        .unwrap();

    // The candidate compile applies a text -> text function to 3.
    let err = resolve_call_site(&registry, "hop", hop, registry.function_value(upper)).unwrap_err();
    assert!(matches!(err, CompilerError::UnresolvedOperation(_, _)));
}

// =============================================================================
// Depth bound
// =============================================================================

#[test]
fn runaway_specialization_chains_hit_the_depth_bound() {
    let mut registry = Registry::new();
    let mut env = Env::new();

    let mut b = ExprBuilder::new();
    let body = b.param();
    let base = registry
        .define("f0", body, shape::num(), true, env.clone().shared())
        .unwrap();
    env.push("f0", registry.function_value(base));

    let mut failure = None;
    for i in 1..=MAX_SPECIALIZE_DEPTH + 2 {
        let name = format!("f{}", i);
        let prev = format!("f{}", i - 1);
        let mut b = ExprBuilder::new();
        let callee = b.name(&prev);
        let param = b.param();
        let body = b.apply(callee, param);
        match registry.define(&name, body, shape::num(), true, env.clone().shared()) {
            Ok(id) => env.push(&name, registry.function_value(id)),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    match failure {
        Some(CompilerError::SpecializationDepthExceeded(depth, _)) => {
            assert_eq!(depth, MAX_SPECIALIZE_DEPTH);
        }
        other => panic!("expected the depth bound to trip, got {:?}", other),
    }
}
