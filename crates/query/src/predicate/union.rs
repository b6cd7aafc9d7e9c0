//! Union of where clauses.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use ripple_core::Value;

use crate::ir::builders::{in_array, or, val};
use crate::ir::{BasicExpression, PropRef};

use super::interval::{constrained_field, CmpOp, Comparison, InList};

/// Combines `predicates` into one expression matching any of them.
///
/// Same-field range comparisons collapse to the loosest bound on each side
/// when their literals are comparable; bounds over incomparable literals
/// (say a number and a string) stay separate disjuncts. Same-field `eq`/`in`
/// values fold into a single `in`, and everything else is kept as a
/// disjunct. An empty list yields the literal `false`.
pub fn union_where_predicates(predicates: &[BasicExpression]) -> BasicExpression {
    match predicates {
        [] => return val(false),
        [only] => return only.clone(),
        _ => {}
    }

    let mut flat = Vec::new();
    for p in predicates {
        flatten_or(p, &mut flat);
    }

    let mut groups: Vec<FieldGroup<'_>> = Vec::new();
    let mut by_field: HashMap<String, usize> = HashMap::new();
    let mut others: Vec<&BasicExpression> = Vec::new();

    for p in flat {
        match constrained_field(p) {
            Some(field) => {
                let idx = *by_field.entry(field.field_key()).or_insert_with(|| {
                    groups.push(FieldGroup::new(field));
                    groups.len() - 1
                });
                groups[idx].add(p);
            }
            None => others.push(p),
        }
    }

    let mut pieces: Vec<BasicExpression> = Vec::new();
    for group in groups {
        group.emit(&mut pieces);
    }
    pieces.extend(others.into_iter().cloned());

    match pieces.len() {
        0 => val(false),
        1 => pieces.remove(0),
        _ => or(pieces),
    }
}

fn flatten_or<'a>(expr: &'a BasicExpression, out: &mut Vec<&'a BasicExpression>) {
    match expr.as_func() {
        Some(f) if f.is("or") => f.args.iter().for_each(|arg| flatten_or(arg, out)),
        _ => out.push(expr),
    }
}

/// Everything the union has seen for one field.
struct FieldGroup<'a> {
    field: &'a PropRef,
    lower: Vec<Bound<'a>>,
    upper: Vec<Bound<'a>>,
    eqs: Vec<&'a BasicExpression>,
    ins: Vec<&'a BasicExpression>,
}

impl<'a> FieldGroup<'a> {
    fn new(field: &'a PropRef) -> Self {
        Self {
            field,
            lower: Vec::new(),
            upper: Vec::new(),
            eqs: Vec::new(),
            ins: Vec::new(),
        }
    }

    fn add(&mut self, expr: &'a BasicExpression) {
        let Some(func) = expr.as_func() else {
            return;
        };
        if let Some(c) = Comparison::extract(func) {
            match c.op {
                CmpOp::Eq => self.eqs.push(expr),
                CmpOp::Gt | CmpOp::Gte => merge_bound(&mut self.lower, expr, c, looser_lower),
                CmpOp::Lt | CmpOp::Lte => merge_bound(&mut self.upper, expr, c, looser_upper),
            }
        } else if InList::extract(func).is_some() {
            self.ins.push(expr);
        }
    }

    fn emit(self, out: &mut Vec<BasicExpression>) {
        out.extend(self.lower.iter().map(|(expr, _)| (*expr).clone()));
        out.extend(self.upper.iter().map(|(expr, _)| (*expr).clone()));
        match (self.eqs.as_slice(), self.ins.as_slice()) {
            ([], []) => {}
            ([single], []) | ([], [single]) => out.push((*single).clone()),
            _ => {
                let mut seen: HashSet<&Value> = HashSet::new();
                let mut values: Vec<Value> = Vec::new();
                let eq_values = self
                    .eqs
                    .iter()
                    .filter_map(|e| e.as_func().and_then(Comparison::extract))
                    .map(|c| c.value);
                let in_values = self
                    .ins
                    .iter()
                    .filter_map(|e| e.as_func().and_then(InList::extract))
                    .flat_map(|list| list.values.iter());
                for v in eq_values.chain(in_values) {
                    if seen.insert(v) {
                        values.push(v.clone());
                    }
                }
                out.push(in_array(BasicExpression::PropRef(self.field.clone()), values));
            }
        }
    }
}

type Bound<'a> = (&'a BasicExpression, Comparison<'a>);

// Keeps one bound per set of mutually comparable literals.
fn merge_bound<'a>(
    bounds: &mut Vec<Bound<'a>>,
    expr: &'a BasicExpression,
    candidate: Comparison<'a>,
    looser: fn(&Comparison<'_>, &Comparison<'_>) -> bool,
) {
    match bounds
        .iter_mut()
        .find(|(_, current)| candidate.value.is_comparable_with(current.value))
    {
        Some(slot) => {
            if looser(&candidate, &slot.1) {
                *slot = (expr, candidate);
            }
        }
        None => bounds.push((expr, candidate)),
    }
}

// On equal values the inclusive bound wins.
fn looser_lower(candidate: &Comparison<'_>, current: &Comparison<'_>) -> bool {
    match candidate.value.cmp(current.value) {
        core::cmp::Ordering::Less => true,
        core::cmp::Ordering::Equal => candidate.op == CmpOp::Gte && current.op == CmpOp::Gt,
        core::cmp::Ordering::Greater => false,
    }
}

fn looser_upper(candidate: &Comparison<'_>, current: &Comparison<'_>) -> bool {
    match candidate.value.cmp(current.value) {
        core::cmp::Ordering::Greater => true,
        core::cmp::Ordering::Equal => candidate.op == CmpOp::Lte && current.op == CmpOp::Lt,
        core::cmp::Ordering::Less => false,
    }
}
