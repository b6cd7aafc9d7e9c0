//! Row evaluator for `BasicExpression` trees.
//!
//! Evaluation never fails: unknown functions, type mismatches and missing
//! fields produce `Value::Null`, which filters treat as "no match". Boolean
//! connectives follow SQL three-valued logic with `Null` as unknown.
//! Use [`compile_where`] to reject malformed filters before they are run.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use ripple_core::pattern_match;
use ripple_core::{Error, Result, Value};

use crate::ir::{BasicExpression, Func, PropRef};

/// Where field references are resolved.
#[derive(Clone, Copy, Debug)]
pub enum RowScope<'a> {
    /// Paths resolve directly against one record.
    Single(&'a Value),
    /// `path[0]` names a source alias, the rest is resolved inside it.
    Namespaced(&'a BTreeMap<String, Value>),
}

impl<'a> RowScope<'a> {
    /// Resolves a reference; `None` when any segment is missing.
    pub fn resolve(&self, prop: &PropRef) -> Option<&'a Value> {
        match *self {
            RowScope::Single(row) => row.get_path(&prop.path),
            RowScope::Namespaced(sources) => {
                let (alias, rest) = prop.path.split_first()?;
                sources.get(alias)?.get_path(rest)
            }
        }
    }
}

const FUNCTIONS: &[(&str, Arity)] = &[
    ("eq", Arity::Exact(2)),
    ("gt", Arity::Exact(2)),
    ("gte", Arity::Exact(2)),
    ("lt", Arity::Exact(2)),
    ("lte", Arity::Exact(2)),
    ("and", Arity::Any),
    ("or", Arity::Any),
    ("not", Arity::Exact(1)),
    ("in", Arity::Exact(2)),
    ("like", Arity::Exact(2)),
    ("ilike", Arity::Exact(2)),
    ("upper", Arity::Exact(1)),
    ("lower", Arity::Exact(1)),
    ("length", Arity::Exact(1)),
    ("concat", Arity::Any),
    ("coalesce", Arity::Any),
    ("add", Arity::Exact(2)),
    ("subtract", Arity::Exact(2)),
    ("multiply", Arity::Exact(2)),
    ("divide", Arity::Exact(2)),
    ("isNull", Arity::Exact(1)),
    ("isUndefined", Arity::Exact(1)),
];

#[derive(Clone, Copy, Debug)]
enum Arity {
    Exact(usize),
    Any,
}

/// A where clause that passed validation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompiledWhere {
    expression: BasicExpression,
}

impl CompiledWhere {
    pub fn expression(&self) -> &BasicExpression {
        &self.expression
    }

    /// Returns true if `row` satisfies the clause.
    #[inline]
    pub fn matches(&self, row: &Value) -> bool {
        matches(&self.expression, row)
    }
}

/// Validates a where expression: every reference must have a non-empty path
/// and every function must be known and called with the right arity.
pub fn compile_where(expression: BasicExpression) -> Result<CompiledWhere> {
    validate(&expression)?;
    Ok(CompiledWhere { expression })
}

fn validate(expr: &BasicExpression) -> Result<()> {
    match expr {
        BasicExpression::Value(_) => Ok(()),
        BasicExpression::PropRef(prop) if prop.path.is_empty() => {
            Err(Error::invalid_expression("field reference with an empty path"))
        }
        BasicExpression::PropRef(_) => Ok(()),
        BasicExpression::Func(func) => {
            let arity = FUNCTIONS
                .iter()
                .find(|(name, _)| *name == func.name)
                .map(|(_, arity)| *arity)
                .ok_or_else(|| {
                    Error::invalid_expression(format!("unknown function `{}`", func.name))
                })?;
            if let Arity::Exact(n) = arity {
                if func.args.len() != n {
                    return Err(Error::invalid_expression(format!(
                        "`{}` takes {} argument(s), got {}",
                        func.name,
                        n,
                        func.args.len()
                    )));
                }
            }
            func.args.iter().try_for_each(validate)
        }
    }
}

/// Returns true if `expr` evaluates to `Boolean(true)` against a single
/// record.
pub fn matches(expr: &BasicExpression, row: &Value) -> bool {
    evaluate(expr, RowScope::Single(row)).is_true()
}

/// Evaluates `expr` in `scope`.
pub fn evaluate(expr: &BasicExpression, scope: RowScope<'_>) -> Value {
    match expr {
        BasicExpression::Value(v) => v.clone(),
        BasicExpression::PropRef(prop) => scope.resolve(prop).cloned().unwrap_or(Value::Null),
        BasicExpression::Func(func) => eval_func(func, scope),
    }
}

fn eval_func(func: &Func, scope: RowScope<'_>) -> Value {
    // These look at how a reference resolves, not just at its value.
    match func.name.as_str() {
        "isUndefined" => {
            return Value::Boolean(match func.args.first() {
                Some(BasicExpression::PropRef(prop)) => scope.resolve(prop).is_none(),
                Some(_) => false,
                None => true,
            });
        }
        "isNull" => {
            return Value::Boolean(match func.args.first() {
                Some(BasicExpression::PropRef(prop)) => {
                    matches!(scope.resolve(prop), Some(Value::Null))
                }
                Some(other) => evaluate(other, scope).is_null(),
                None => false,
            });
        }
        "and" => return eval_and(&func.args, scope),
        "or" => return eval_or(&func.args, scope),
        _ => {}
    }

    let args: Vec<Value> = func.args.iter().map(|a| evaluate(a, scope)).collect();
    match (func.name.as_str(), args.as_slice()) {
        ("eq", [l, r]) => compare(l, r, |o| o.is_eq()),
        ("gt", [l, r]) => compare(l, r, |o| o.is_gt()),
        ("gte", [l, r]) => compare(l, r, |o| o.is_ge()),
        ("lt", [l, r]) => compare(l, r, |o| o.is_lt()),
        ("lte", [l, r]) => compare(l, r, |o| o.is_le()),
        ("not", [Value::Boolean(b)]) => Value::Boolean(!b),
        ("in", [needle, Value::Array(haystack)]) if !needle.is_null() => {
            Value::Boolean(haystack.contains(needle))
        }
        ("like", [Value::String(s), Value::String(p)]) => Value::Boolean(pattern_match::like(s, p)),
        ("ilike", [Value::String(s), Value::String(p)]) => Value::Boolean(pattern_match::ilike(s, p)),
        ("upper", [Value::String(s)]) => Value::String(s.to_uppercase()),
        ("lower", [Value::String(s)]) => Value::String(s.to_lowercase()),
        ("length", [Value::String(s)]) => Value::Int64(s.chars().count() as i64),
        ("length", [Value::Array(a)]) => Value::Int64(a.len() as i64),
        ("concat", parts) => Value::String(parts.iter().map(display_part).collect()),
        ("coalesce", parts) => parts.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null),
        ("add", [l, r]) => arithmetic(l, r, i64::checked_add, |a, b| a + b),
        ("subtract", [l, r]) => arithmetic(l, r, i64::checked_sub, |a, b| a - b),
        ("multiply", [l, r]) => arithmetic(l, r, i64::checked_mul, |a, b| a * b),
        ("divide", [l, r]) => divide(l, r),
        _ => Value::Null,
    }
}

fn eval_and(args: &[BasicExpression], scope: RowScope<'_>) -> Value {
    let mut unknown = false;
    for arg in args {
        match evaluate(arg, scope) {
            Value::Boolean(false) => return Value::Boolean(false),
            Value::Boolean(true) => {}
            _ => unknown = true,
        }
    }
    if unknown {
        Value::Null
    } else {
        Value::Boolean(true)
    }
}

fn eval_or(args: &[BasicExpression], scope: RowScope<'_>) -> Value {
    let mut unknown = false;
    for arg in args {
        match evaluate(arg, scope) {
            Value::Boolean(true) => return Value::Boolean(true),
            Value::Boolean(false) => {}
            _ => unknown = true,
        }
    }
    if unknown {
        Value::Null
    } else {
        Value::Boolean(false)
    }
}

fn compare(left: &Value, right: &Value, test: impl Fn(core::cmp::Ordering) -> bool) -> Value {
    if left.is_null() || right.is_null() || !left.is_comparable_with(right) {
        return Value::Null;
    }
    Value::Boolean(test(left.cmp(right)))
}

fn display_part(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Integer inputs stay integral unless the operation overflows.
fn arithmetic(
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    if let (Value::Int64(a), Value::Int64(b)) = (left, right) {
        if let Some(v) = int_op(*a, *b) {
            return Value::Int64(v);
        }
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Value::Float64(float_op(a, b)),
        _ => Value::Null,
    }
}

fn divide(left: &Value, right: &Value) -> Value {
    match (left.as_f64(), right.as_f64()) {
        (Some(_), Some(b)) if b == 0.0 => Value::Null,
        (Some(a), Some(b)) => Value::Float64(a / b),
        _ => Value::Null,
    }
}
