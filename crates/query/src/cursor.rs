//! Keyset cursor synthesis.

use alloc::vec::Vec;
use ripple_core::Value;

use crate::ir::builders::{and, eq, gt, lt, or};
use crate::ir::{BasicExpression, Direction, OrderByClause};

/// Builds a filter selecting the rows strictly after `values` in the
/// composite ordering `order_by`.
///
/// Column `i` contributes `and(eq(col_0, v_0), ..., cmp(col_i, v_i))` where
/// `cmp` is `gt` for ascending and `lt` for descending columns; the
/// contributions are joined with a single `or`. Extra entries on either side
/// are ignored. Returns `None` when either input is empty.
pub fn build_cursor(order_by: &[OrderByClause], values: &[Value]) -> Option<BasicExpression> {
    let n = order_by.len().min(values.len());
    if n == 0 {
        return None;
    }

    let mut clauses: Vec<BasicExpression> = Vec::with_capacity(n);
    for i in 0..n {
        let mut parts: Vec<BasicExpression> = order_by[..i]
            .iter()
            .zip(values)
            .map(|(clause, value)| eq(clause.expression.clone(), literal(value)))
            .collect();
        parts.push(after(&order_by[i], &values[i]));
        clauses.push(if parts.len() == 1 {
            parts.remove(0)
        } else {
            and(parts)
        });
    }

    Some(if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        or(clauses)
    })
}

fn literal(value: &Value) -> BasicExpression {
    BasicExpression::Value(value.clone())
}

fn after(clause: &OrderByClause, value: &Value) -> BasicExpression {
    match clause.compare_options.direction {
        Direction::Asc => gt(clause.expression.clone(), literal(value)),
        Direction::Desc => lt(clause.expression.clone(), literal(value)),
    }
}
