//! Expression IR: the closed set of query-expression nodes plus the query
//! shape they live in.
//!
//! - `BasicExpression`: `PropRef`, `Value` and `Func` nodes used by filters and orderings
//! - `Aggregate` / `SelectExpression`: select-only nodes
//! - `Source`: `CollectionRef` / `QueryRef` query sources
//! - `QueryIR`: a full query (`from`, `join`, `where`, `order_by`, ...)
//! - `LoadSubsetOptions`: a window of data a consumer asks a loader for
//! - `follow_ref`: alias resolution down to a base-collection field

mod expr;
mod options;
mod query;

pub use expr::{
    builders, is_expression_like, Aggregate, BasicExpression, CollectionRef, Func, IrNode,
    NodeKind, PropRef, QueryRef, SelectExpression, Source,
};
pub use options::{CursorExpressions, LoadSubsetOptions};
pub use query::{
    create_residual_where, follow_ref, get_having_expression, get_where_expression,
    is_residual_where, CompareOptions, Direction, FollowedRef, Having, JoinClause, JoinType,
    Nulls, OrderByClause, QueryIR, Where,
};
