//! Compile-time values.
//!
//! The engine's working subset of the runtime value model: enough to
//! synthesize canonical placeholders, carry literals into compiled
//! code, and drive shape-dependent compilation decisions. The full
//! runtime heap belongs to the surrounding evaluator.

use std::hash::{Hash, Hasher};

use crate::registry::DefId;
use crate::shape::{self, format_shape, Shape};

/// A compile-time value.
///
/// Compared by deep structural equality; function values compare by
/// origin and shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// The empty (nil) leaf.
    Empty,
    /// Atomic number.
    Int(i64),
    /// Atomic text.
    Text(String),
    /// Atomic boolean.
    Truth(bool),
    /// A pair of values.
    Pair(Box<Value>, Box<Value>),
    /// An applicable value.
    Function(FunctionValue),
}

/// An applicable compile-time value: a reference to a registered
/// definition, or the opaque placeholder synthesized for an arrow shape.
#[derive(Debug, Clone)]
pub struct FunctionValue {
    /// The arrow shape (param -> result) of this function.
    pub shape: Shape,
    pub origin: FnOrigin,
}

/// Where an applicable value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FnOrigin {
    /// A definition in the registry.
    Def(DefId),
    /// The canonical placeholder for an arrow shape; applicable but
    /// without a body.
    Placeholder,
}

impl PartialEq for FunctionValue {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && self.shape == other.shape
    }
}

impl Eq for FunctionValue {}

impl Hash for FunctionValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.origin.hash(state);
        // Shapes hash via their rendered form, which is structurally
        // canonical for elaborated shapes.
        format_shape(&self.shape).hash(state);
    }
}

/// The most specific shape describing a value.
pub fn shape_of(value: &Value) -> Shape {
    match value {
        Value::Empty => shape::empty(),
        Value::Int(_) => shape::num(),
        Value::Text(_) => shape::text(),
        Value::Truth(_) => shape::truth(),
        Value::Pair(head, tail) => shape::pair(shape_of(head), shape_of(tail)),
        Value::Function(f) => f.shape.clone(),
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Empty => write!(f, "empty"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Truth(b) => write!(f, "{}", b),
            Value::Pair(head, tail) => write!(f, "({} . {})", head, tail),
            Value::Function(func) => match func.origin {
                FnOrigin::Def(id) => write!(f, "<fn {}>", id),
                FnOrigin::Placeholder => write!(f, "<fn ?>"),
            },
        }
    }
}
