//! Compiled code: the structural intermediate representation.
//!
//! A tree of primitive operations produced by the code generator.
//! Trees carry no node identities and are compared only by deep
//! structural equality: addresses and literals by value, subtrees
//! recursively. Addressing is positional, so no notion of renaming is
//! needed for the comparison.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::registry::DefId;
use crate::value::Value;

/// Where a structural address starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The position reserved for the bound parameter.
    Param,
    /// A captured-environment binding, by position.
    Capture(usize),
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Slot::Param => write!(f, "param"),
            Slot::Capture(index) => write!(f, "capture[{}]", index),
        }
    }
}

/// One step of structural addressing into a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Head,
    Tail,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Step::Head => write!(f, "head"),
            Step::Tail => write!(f, "tail"),
        }
    }
}

/// A shape-specialized primitive operation.
///
/// Surface operators are resolved against their operand shapes during
/// code generation, so the compiled tree records which concrete
/// primitive runs (`num.add` vs `text.join`). This resolution is what
/// the polymorphic equivalence gate observes when a body behaves
/// differently across argument shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
    NumAdd,
    NumSub,
    NumMul,
    NumDiv,
    NumLt,
    NumLe,
    NumGt,
    NumGe,
    TextJoin,
    Eq,
    Ne,
}

impl std::fmt::Display for PrimOp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            PrimOp::NumAdd => "num.add",
            PrimOp::NumSub => "num.sub",
            PrimOp::NumMul => "num.mul",
            PrimOp::NumDiv => "num.div",
            PrimOp::NumLt => "num.lt",
            PrimOp::NumLe => "num.le",
            PrimOp::NumGt => "num.gt",
            PrimOp::NumGe => "num.ge",
            PrimOp::TextJoin => "text.join",
            PrimOp::Eq => "eq",
            PrimOp::Ne => "ne",
        };
        write!(f, "{}", name)
    }
}

/// A compiled-code tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Code {
    /// Positional structural addressing into the environment.
    Fetch { root: Slot, path: Vec<Step> },

    /// Literal value injection.
    Inject(Value),

    /// Pair construction.
    Cons(Box<Code>, Box<Code>),

    /// Structural addressing applied to a computed value.
    Project { base: Box<Code>, step: Step },

    /// Apply a first-class function value.
    Invoke { func: Box<Code>, arg: Box<Code> },

    /// Monomorphic call fragment: bind the argument and invoke the
    /// definition's shared canonical code.
    Call { def: DefId, arg: Box<Code> },

    /// Polymorphic call fragment: the candidate regenerated for this
    /// call site, spliced together with the argument.
    Expand { arg: Box<Code>, body: Box<Code> },

    /// Shape-specialized binary primitive.
    Prim {
        op: PrimOp,
        lhs: Box<Code>,
        rhs: Box<Code>,
    },

    /// Conditional marker.
    Branch {
        cond: Box<Code>,
        then_code: Box<Code>,
        else_code: Box<Code>,
    },

    /// Recursion marker: a call to a definition whose own compilation
    /// is still in progress.
    Recur { def: DefId, arg: Box<Code> },
}

impl Code {
    /// Content hash of the whole tree, used as the fast-path rejection
    /// before full structural comparison.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// One-line description of the operation at this node, for
    /// divergence diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Code::Fetch { root, path } => {
                let mut out = format!("fetch {}", root);
                for step in path {
                    out.push('.');
                    out.push_str(&step.to_string());
                }
                out
            }
            Code::Inject(value) => format!("inject {}", value),
            Code::Cons(_, _) => "cons".to_string(),
            Code::Project { step, .. } => format!("project .{}", step),
            Code::Invoke { .. } => "invoke".to_string(),
            Code::Call { def, .. } => format!("call {}", def),
            Code::Expand { .. } => "expand".to_string(),
            Code::Prim { op, .. } => format!("prim {}", op),
            Code::Branch { .. } => "branch".to_string(),
            Code::Recur { def, .. } => format!("recur {}", def),
        }
    }
}
