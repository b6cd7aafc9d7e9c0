//! Predicate algebra over load-subset requests.
//!
//! Every operation here is conservative: when a relationship cannot be
//! proven the answer is the one that leads callers to fetch more, never
//! less. Subset checks answer `false`, differences answer `None`.
//!
//! - `is_where_subset` / `is_predicate_subset`: coverage checks
//! - `union_where_predicates`: least restrictive combination of filters
//! - `minus_where_predicates`: the part of one filter not covered by another
//! - `interval`: the same-field comparison model the checks rely on

pub mod interval;
mod minus;
mod subset;
mod union;

pub use interval::{Bound, CmpOp, Comparison, InList, Interval};
pub use minus::minus_where_predicates;
pub use subset::{
    is_limit_subset, is_offset_limit_subset, is_order_by_subset, is_predicate_subset,
    is_where_subset,
};
pub use union::union_where_predicates;
