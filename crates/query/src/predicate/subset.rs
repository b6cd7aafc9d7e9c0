//! Subset checks over where clauses, orderings and limit windows.

use crate::ir::{BasicExpression, LoadSubsetOptions, OrderByClause};

use super::interval::{Comparison, InList};

/// Returns true if every row satisfying `subset` also satisfies `superset`.
///
/// An absent predicate means "all rows". The check is conservative: it
/// answers `false` whenever the relationship cannot be proven.
pub fn is_where_subset(
    subset: Option<&BasicExpression>,
    superset: Option<&BasicExpression>,
) -> bool {
    match (subset, superset) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(_), None) => true,
        (Some(sub), Some(sup)) => where_subset(sub, sup),
    }
}

fn where_subset(sub: &BasicExpression, sup: &BasicExpression) -> bool {
    if sub.is_false_literal() {
        return true;
    }
    if sub == sup {
        return true;
    }

    let sub_func = sub.as_func();
    let sup_func = sup.as_func();

    if let Some(f) = sup_func.filter(|f| f.is("and")) {
        return f.args.iter().all(|conjunct| where_subset(sub, conjunct));
    }
    if let Some(f) = sub_func.filter(|f| f.is("and")) {
        return f.args.iter().any(|conjunct| where_subset(conjunct, sup));
    }

    if let Some(list) = sub_func.and_then(InList::extract) {
        return where_subset(&list.to_or_of_eq(), sup);
    }
    if let Some(list) = sup_func.and_then(InList::extract) {
        return where_subset(sub, &list.to_or_of_eq());
    }

    if let Some(f) = sub_func.filter(|f| f.is("or")) {
        return f.args.iter().all(|disjunct| where_subset(disjunct, sup));
    }
    if let Some(f) = sup_func.filter(|f| f.is("or")) {
        return f.args.iter().any(|disjunct| where_subset(sub, disjunct));
    }

    match (
        sub_func.and_then(Comparison::extract),
        sup_func.and_then(Comparison::extract),
    ) {
        (Some(a), Some(b)) if a.field == b.field => a.interval().is_within(&b.interval()),
        _ => false,
    }
}

/// Returns true if ordering by `subset` is satisfied by data ordered by
/// `superset`: `subset` must be a prefix of `superset`.
pub fn is_order_by_subset(
    subset: Option<&[OrderByClause]>,
    superset: Option<&[OrderByClause]>,
) -> bool {
    let subset = match subset {
        Some(s) if !s.is_empty() => s,
        _ => return true,
    };
    let superset = match superset {
        Some(s) if !s.is_empty() => s,
        _ => return false,
    };
    if subset.len() > superset.len() {
        return false;
    }
    subset.iter().zip(superset).all(|(a, b)| {
        a.expression == b.expression && a.compare_options == b.compare_options
    })
}

/// Returns true if a `subset` row limit fits in a `superset` row limit.
/// `None` means unlimited.
pub fn is_limit_subset(subset: Option<usize>, superset: Option<usize>) -> bool {
    match (subset, superset) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(a), Some(b)) => a <= b,
    }
}

/// Returns true if the window `[offset, offset + limit)` of `subset` is
/// contained in that of `superset`. Missing offsets default to 0.
pub fn is_offset_limit_subset(subset: &LoadSubsetOptions, superset: &LoadSubsetOptions) -> bool {
    let sub_offset = subset.offset.unwrap_or(0);
    let sup_offset = superset.offset.unwrap_or(0);
    if sup_offset > sub_offset {
        return false;
    }
    match (subset.limit, superset.limit) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(sub_limit), Some(sup_limit)) => {
            sub_offset.saturating_add(sub_limit) <= sup_offset.saturating_add(sup_limit)
        }
    }
}

/// Returns true if every row `subset` asks for is covered by `superset`
/// (where, ordering and window together).
///
/// A limited superset only holds the top slice of its matches, so its where
/// clause must equal the subset's exactly; a narrower filter's top-N may lie
/// outside that slice.
pub fn is_predicate_subset(subset: &LoadSubsetOptions, superset: &LoadSubsetOptions) -> bool {
    let where_ok = if superset.limit.is_some() {
        subset.where_ == superset.where_
    } else {
        is_where_subset(subset.where_.as_ref(), superset.where_.as_ref())
    };
    where_ok
        && is_order_by_subset(subset.order_by.as_deref(), superset.order_by.as_deref())
        && is_offset_limit_subset(subset, superset)
}
