//! Same-field comparison extraction and the real-line interval model.
//!
//! A comparison `op(field, literal)` with `op` in `eq/gt/gte/lt/lte` maps to
//! an interval over the value order:
//!
//! | op  | interval |
//! |-----|----------|
//! | eq  | `[v, v]` |
//! | gt  | `(v, ∞)` |
//! | gte | `[v, ∞)` |
//! | lt  | `(−∞, v)` |
//! | lte | `(−∞, v]` |
//!
//! Containment between two such intervals decides the subset relation for
//! same-field comparisons.

use alloc::vec::Vec;
use core::cmp::Ordering;
use ripple_core::Value;

use crate::ir::{BasicExpression, Func, PropRef};

/// A comparison operator the interval model understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    pub fn from_name(name: &str) -> Option<CmpOp> {
        match name {
            "eq" => Some(CmpOp::Eq),
            "gt" => Some(CmpOp::Gt),
            "gte" => Some(CmpOp::Gte),
            "lt" => Some(CmpOp::Lt),
            "lte" => Some(CmpOp::Lte),
            _ => None,
        }
    }
}

/// `op(field, value)` with a field reference on the left and a literal on
/// the right.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Comparison<'a> {
    pub field: &'a PropRef,
    pub op: CmpOp,
    pub value: &'a Value,
}

impl<'a> Comparison<'a> {
    /// Recognises a comparison node. Operand order matters: literals on the
    /// left are not treated as comparisons.
    pub fn extract(func: &'a Func) -> Option<Comparison<'a>> {
        let op = CmpOp::from_name(&func.name)?;
        match func.args.as_slice() {
            [BasicExpression::PropRef(field), BasicExpression::Value(value)] => {
                Some(Comparison { field, op, value })
            }
            _ => None,
        }
    }

    pub fn interval(&self) -> Interval<'a> {
        Interval::of(self.op, self.value)
    }
}

/// `in(field, [values])` with a literal array.
#[derive(Clone, Debug, PartialEq)]
pub struct InList<'a> {
    pub field: &'a PropRef,
    pub values: &'a [Value],
}

impl<'a> InList<'a> {
    pub fn extract(func: &'a Func) -> Option<InList<'a>> {
        if !func.is("in") {
            return None;
        }
        match func.args.as_slice() {
            [BasicExpression::PropRef(field), BasicExpression::Value(Value::Array(values))] => {
                Some(InList { field, values })
            }
            _ => None,
        }
    }

    /// Rewrites the list as `or(eq(field, v1), eq(field, v2), ...)`.
    pub fn to_or_of_eq(&self) -> BasicExpression {
        let eqs: Vec<BasicExpression> = self
            .values
            .iter()
            .map(|v| {
                BasicExpression::Func(Func::new(
                    "eq",
                    alloc::vec![
                        BasicExpression::PropRef(self.field.clone()),
                        BasicExpression::Value(v.clone()),
                    ],
                ))
            })
            .collect();
        BasicExpression::Func(Func::new("or", eqs))
    }
}

/// Returns the field a comparison or `in` constrains.
pub fn constrained_field(expr: &BasicExpression) -> Option<&PropRef> {
    let func = expr.as_func()?;
    Comparison::extract(func)
        .map(|c| c.field)
        .or_else(|| InList::extract(func).map(|i| i.field))
}

/// One end of an interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bound<'a> {
    Unbounded,
    Included(&'a Value),
    Excluded(&'a Value),
}

/// A (possibly half-open) interval over the `Value` order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval<'a> {
    pub lower: Bound<'a>,
    pub upper: Bound<'a>,
}

impl<'a> Interval<'a> {
    pub fn of(op: CmpOp, value: &'a Value) -> Self {
        match op {
            CmpOp::Eq => Interval {
                lower: Bound::Included(value),
                upper: Bound::Included(value),
            },
            CmpOp::Gt => Interval {
                lower: Bound::Excluded(value),
                upper: Bound::Unbounded,
            },
            CmpOp::Gte => Interval {
                lower: Bound::Included(value),
                upper: Bound::Unbounded,
            },
            CmpOp::Lt => Interval {
                lower: Bound::Unbounded,
                upper: Bound::Excluded(value),
            },
            CmpOp::Lte => Interval {
                lower: Bound::Unbounded,
                upper: Bound::Included(value),
            },
        }
    }

    /// Returns true if every point of `self` lies in `other`.
    ///
    /// Bounds of different value kinds are never related, so containment
    /// across kinds is false.
    pub fn is_within(&self, other: &Interval<'_>) -> bool {
        lower_within(self.lower, other.lower) && upper_within(self.upper, other.upper)
    }
}

fn comparable(a: &Value, b: &Value) -> Option<Ordering> {
    a.is_comparable_with(b).then(|| a.cmp(b))
}

// `sub` starts no earlier than `sup`
fn lower_within(sub: Bound<'_>, sup: Bound<'_>) -> bool {
    match (sub, sup) {
        (_, Bound::Unbounded) => true,
        (Bound::Unbounded, _) => false,
        (Bound::Included(a), Bound::Included(b))
        | (Bound::Excluded(a), Bound::Included(b))
        | (Bound::Excluded(a), Bound::Excluded(b)) => {
            matches!(comparable(a, b), Some(Ordering::Greater | Ordering::Equal))
        }
        (Bound::Included(a), Bound::Excluded(b)) => {
            matches!(comparable(a, b), Some(Ordering::Greater))
        }
    }
}

// `sub` ends no later than `sup`
fn upper_within(sub: Bound<'_>, sup: Bound<'_>) -> bool {
    match (sub, sup) {
        (_, Bound::Unbounded) => true,
        (Bound::Unbounded, _) => false,
        (Bound::Included(a), Bound::Included(b))
        | (Bound::Excluded(a), Bound::Included(b))
        | (Bound::Excluded(a), Bound::Excluded(b)) => {
            matches!(comparable(a, b), Some(Ordering::Less | Ordering::Equal))
        }
        (Bound::Included(a), Bound::Excluded(b)) => {
            matches!(comparable(a, b), Some(Ordering::Less))
        }
    }
}
