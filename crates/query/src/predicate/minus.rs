//! Difference of where clauses.

use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use ripple_core::Value;

use crate::ir::builders::{and, eq, gt, gte, in_array, lt, lte, not, val};
use crate::ir::{BasicExpression, PropRef};

use super::interval::{CmpOp, Comparison, InList};
use super::subset::is_where_subset;

/// Computes `from AND NOT subtract`, simplified where possible.
///
/// `None` means the difference could not be expressed more narrowly than
/// `from` itself and the caller should fall back to fetching all of `from`.
/// An absent `from` stands for all rows, an absent `subtract` for nothing.
pub fn minus_where_predicates(
    from: Option<&BasicExpression>,
    subtract: Option<&BasicExpression>,
) -> Option<BasicExpression> {
    let Some(subtract) = subtract else {
        return Some(from.cloned().unwrap_or_else(|| val(true)));
    };
    let Some(from) = from else {
        return Some(not(subtract.clone()));
    };

    if is_where_subset(Some(from), Some(subtract)) {
        return Some(val(false));
    }

    let common = common_conditions(from, subtract);
    if !common.is_empty() {
        let from_rest = remove_conditions(from, &common);
        let subtract_rest = remove_conditions(subtract, &common);
        if let Some(diff) = minus_where_predicates(from_rest.as_ref(), subtract_rest.as_ref()) {
            let mut parts = common;
            parts.push(diff);
            return Some(combine_conditions(parts));
        }
    }

    minus_same_field(from, subtract)
}

fn conjuncts(expr: &BasicExpression) -> &[BasicExpression] {
    match expr.as_func() {
        Some(f) if f.is("and") => &f.args,
        _ => core::slice::from_ref(expr),
    }
}

fn common_conditions(a: &BasicExpression, b: &BasicExpression) -> Vec<BasicExpression> {
    let right = conjuncts(b);
    conjuncts(a)
        .iter()
        .filter(|c| right.contains(c))
        .cloned()
        .collect()
}

// Only conjunctions lose conditions; any other shape is returned as is.
fn remove_conditions(
    expr: &BasicExpression,
    remove: &[BasicExpression],
) -> Option<BasicExpression> {
    match expr.as_func() {
        Some(f) if f.is("and") => {
            let mut rest: Vec<BasicExpression> = f
                .args
                .iter()
                .filter(|c| !remove.contains(c))
                .cloned()
                .collect();
            match rest.len() {
                0 => None,
                1 => rest.pop(),
                _ => Some(and(rest)),
            }
        }
        _ => Some(expr.clone()),
    }
}

fn combine_conditions(parts: Vec<BasicExpression>) -> BasicExpression {
    let mut flat: Vec<BasicExpression> = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            BasicExpression::Func(f) if f.is("and") => flat.extend(f.args),
            other => flat.push(other),
        }
    }
    match flat.len() {
        0 => val(true),
        1 => flat.remove(0),
        _ => and(flat),
    }
}

enum Shape<'a> {
    Cmp(Comparison<'a>),
    In(InList<'a>),
}

impl<'a> Shape<'a> {
    fn of(expr: &'a BasicExpression) -> Option<Shape<'a>> {
        let func = expr.as_func()?;
        Comparison::extract(func)
            .map(Shape::Cmp)
            .or_else(|| InList::extract(func).map(Shape::In))
    }

    fn field(&self) -> &'a PropRef {
        match self {
            Shape::Cmp(c) => c.field,
            Shape::In(i) => i.field,
        }
    }
}

fn field_expr(field: &PropRef) -> BasicExpression {
    BasicExpression::PropRef(field.clone())
}

fn minus_same_field(
    from: &BasicExpression,
    subtract: &BasicExpression,
) -> Option<BasicExpression> {
    let a = Shape::of(from)?;
    let b = Shape::of(subtract)?;
    if a.field() != b.field() {
        return None;
    }

    match (a, b) {
        (Shape::In(list), Shape::In(removed)) => {
            Some(filtered_in(list.field, list.values, |v| removed.values.contains(v)))
        }
        (Shape::In(list), Shape::Cmp(c)) if c.op == CmpOp::Eq => {
            Some(filtered_in(list.field, list.values, |v| v == c.value))
        }
        (Shape::Cmp(c), Shape::Cmp(s)) if c.op == CmpOp::Eq && s.op == CmpOp::Eq => {
            Some(if c.value == s.value { val(false) } else { from.clone() })
        }
        (Shape::Cmp(c), Shape::In(removed)) if c.op == CmpOp::Eq => {
            Some(if removed.values.contains(c.value) {
                val(false)
            } else {
                from.clone()
            })
        }
        (Shape::Cmp(f), Shape::Cmp(s)) => minus_ranges(from, f, s),
        _ => None,
    }
}

fn filtered_in(
    field: &PropRef,
    values: &[Value],
    removed: impl Fn(&Value) -> bool,
) -> BasicExpression {
    let mut kept: Vec<Value> = values.iter().filter(|v| !removed(v)).cloned().collect();
    match kept.len() {
        0 => val(false),
        1 => eq(field_expr(field), BasicExpression::Value(kept.remove(0))),
        _ => in_array(field_expr(field), kept),
    }
}

// Interval subtraction for two bounds on the same side. Bounds on opposite
// sides are left unsimplified.
fn minus_ranges(
    from: &BasicExpression,
    f: Comparison<'_>,
    s: Comparison<'_>,
) -> Option<BasicExpression> {
    if !f.value.is_comparable_with(s.value) {
        return None;
    }
    let order = f.value.cmp(s.value);
    let field = || field_expr(f.field);
    let bound = || BasicExpression::Value(s.value.clone());

    use CmpOp::*;
    let narrowed = match (f.op, s.op) {
        (Gt, Gt) if order == Ordering::Less => and(vec![from.clone(), lte(field(), bound())]),
        (Gte | Gt, Gte) if order == Ordering::Less => {
            and(vec![from.clone(), lt(field(), bound())])
        }
        (Gte, Gt) if order != Ordering::Greater => and(vec![from.clone(), lte(field(), bound())]),
        (Lt, Lt) if order == Ordering::Greater => and(vec![gte(field(), bound()), from.clone()]),
        (Lte | Lt, Lte) if order == Ordering::Greater => {
            and(vec![gt(field(), bound()), from.clone()])
        }
        (Lte, Lt) if order != Ordering::Less => and(vec![gte(field(), bound()), from.clone()]),
        (Gt | Gte, Gt | Gte) | (Lt | Lte, Lt | Lte) => from.clone(),
        _ => return None,
    };
    Some(narrowed)
}
