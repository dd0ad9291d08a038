//! Structural equivalence over compiled code.
//!
//! The correctness gate for the polymorphic call path: a regenerated
//! candidate is accepted only if it is structurally identical to the
//! definition's canonical compilation. Comparison is a pure recursive
//! walk over the two trees, never an identity or address comparison,
//! with a content-hash fast path in front of it.

use crate::code::Code;

/// The first point at which two compared trees differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Child labels from the root down to the differing node.
    pub path: Vec<&'static str>,
    /// The operation the canonical tree performs there.
    pub canonical_op: String,
    /// The operation the candidate tree performs there.
    pub candidate_op: String,
}

impl Divergence {
    /// Render the path for diagnostics, e.g. `branch.else.head`.
    pub fn location(&self) -> String {
        if self.path.is_empty() {
            "the root".to_string()
        } else {
            self.path.join(".")
        }
    }
}

/// Decide whether two compiled-code trees are structurally identical.
pub fn equivalent(a: &Code, b: &Code) -> bool {
    if a.fingerprint() != b.fingerprint() {
        return false;
    }
    deep_equal(a, b)
}

fn deep_equal(a: &Code, b: &Code) -> bool {
    match (a, b) {
        (
            Code::Fetch { root: ra, path: pa },
            Code::Fetch { root: rb, path: pb },
        ) => ra == rb && pa == pb,
        (Code::Inject(va), Code::Inject(vb)) => va == vb,
        (Code::Cons(ha, ta), Code::Cons(hb, tb)) => deep_equal(ha, hb) && deep_equal(ta, tb),
        (
            Code::Project { base: ba, step: sa },
            Code::Project { base: bb, step: sb },
        ) => sa == sb && deep_equal(ba, bb),
        (
            Code::Invoke { func: fa, arg: aa },
            Code::Invoke { func: fb, arg: ab },
        ) => deep_equal(fa, fb) && deep_equal(aa, ab),
        (
            Code::Call { def: da, arg: aa },
            Code::Call { def: db, arg: ab },
        ) => da == db && deep_equal(aa, ab),
        (
            Code::Expand { arg: aa, body: ba },
            Code::Expand { arg: ab, body: bb },
        ) => deep_equal(aa, ab) && deep_equal(ba, bb),
        (
            Code::Prim { op: oa, lhs: la, rhs: ra },
            Code::Prim { op: ob, lhs: lb, rhs: rb },
        ) => oa == ob && deep_equal(la, lb) && deep_equal(ra, rb),
        (
            Code::Branch { cond: ca, then_code: ta, else_code: ea },
            Code::Branch { cond: cb, then_code: tb, else_code: eb },
        ) => deep_equal(ca, cb) && deep_equal(ta, tb) && deep_equal(ea, eb),
        (
            Code::Recur { def: da, arg: aa },
            Code::Recur { def: db, arg: ab },
        ) => da == db && deep_equal(aa, ab),
        _ => false,
    }
}

/// Locate the first structural difference between two trees.
/// Returns None iff the trees are structurally identical.
pub fn first_divergence(canonical: &Code, candidate: &Code) -> Option<Divergence> {
    let mut path = Vec::new();
    walk(canonical, candidate, &mut path)
}

fn walk(a: &Code, b: &Code, path: &mut Vec<&'static str>) -> Option<Divergence> {
    let children: Vec<(&'static str, &Code, &Code)> = match (a, b) {
        (
            Code::Fetch { root: ra, path: pa },
            Code::Fetch { root: rb, path: pb },
        ) if ra == rb && pa == pb => return None,
        (Code::Inject(va), Code::Inject(vb)) if va == vb => return None,
        (Code::Cons(ha, ta), Code::Cons(hb, tb)) => {
            vec![("head", &**ha, &**hb), ("tail", &**ta, &**tb)]
        }
        (
            Code::Project { base: ba, step: sa },
            Code::Project { base: bb, step: sb },
        ) if sa == sb => vec![("base", &**ba, &**bb)],
        (
            Code::Invoke { func: fa, arg: aa },
            Code::Invoke { func: fb, arg: ab },
        ) => vec![("func", &**fa, &**fb), ("arg", &**aa, &**ab)],
        (
            Code::Call { def: da, arg: aa },
            Code::Call { def: db, arg: ab },
        ) if da == db => vec![("arg", &**aa, &**ab)],
        (
            Code::Expand { arg: aa, body: ba },
            Code::Expand { arg: ab, body: bb },
        ) => vec![("arg", &**aa, &**ab), ("body", &**ba, &**bb)],
        (
            Code::Prim { op: oa, lhs: la, rhs: ra },
            Code::Prim { op: ob, lhs: lb, rhs: rb },
        ) if oa == ob => vec![("lhs", &**la, &**lb), ("rhs", &**ra, &**rb)],
        (
            Code::Branch { cond: ca, then_code: ta, else_code: ea },
            Code::Branch { cond: cb, then_code: tb, else_code: eb },
        ) => vec![
            ("cond", &**ca, &**cb),
            ("then", &**ta, &**tb),
            ("else", &**ea, &**eb),
        ],
        (
            Code::Recur { def: da, arg: aa },
            Code::Recur { def: db, arg: ab },
        ) if da == db => vec![("arg", &**aa, &**ab)],
        _ => {
            return Some(Divergence {
                path: path.clone(),
                canonical_op: a.describe(),
                candidate_op: b.describe(),
            });
        }
    };

    for (label, child_a, child_b) in children {
        path.push(label);
        if let Some(divergence) = walk(child_a, child_b, path) {
            return Some(divergence);
        }
        path.pop();
    }
    None
}
