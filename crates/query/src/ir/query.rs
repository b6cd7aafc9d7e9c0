//! Query shape and clause types.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashSet;

use super::expr::{BasicExpression, PropRef, SelectExpression, Source};

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Placement of nulls in an ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Nulls {
    #[default]
    First,
    Last,
}

/// How an order-by column compares values.
#[derive(Clone, Copy, Debug, Eq, Default)]
pub struct CompareOptions {
    pub direction: Direction,
    pub nulls: Nulls,
}

impl CompareOptions {
    pub fn asc() -> Self {
        Self::default()
    }

    pub fn desc() -> Self {
        Self {
            direction: Direction::Desc,
            nulls: Nulls::First,
        }
    }
}

// Two orderings are interchangeable for coverage checks when they walk the
// rows in the same direction; null placement is not part of the identity.
impl PartialEq for CompareOptions {
    fn eq(&self, other: &Self) -> bool {
        self.direction == other.direction
    }
}

impl core::hash::Hash for CompareOptions {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.direction.hash(state);
    }
}

/// One order-by column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderByClause {
    pub expression: BasicExpression,
    pub compare_options: CompareOptions,
}

impl OrderByClause {
    pub fn new(expression: BasicExpression, compare_options: CompareOptions) -> Self {
        Self {
            expression,
            compare_options,
        }
    }
}

/// A where/having entry: a plain boolean expression or one carrying the
/// residual flag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Where {
    Expr(BasicExpression),
    Residual {
        expression: BasicExpression,
        residual: bool,
    },
}

/// Having entries share the where representation.
pub type Having = Where;

impl Where {
    /// Returns the boolean expression regardless of form.
    pub fn expression(&self) -> &BasicExpression {
        match self {
            Where::Expr(e) => e,
            Where::Residual { expression, .. } => expression,
        }
    }
}

impl From<BasicExpression> for Where {
    fn from(expr: BasicExpression) -> Self {
        Where::Expr(expr)
    }
}

/// Unwraps a where entry.
pub fn get_where_expression(entry: &Where) -> &BasicExpression {
    entry.expression()
}

/// Unwraps a having entry.
pub fn get_having_expression(entry: &Having) -> &BasicExpression {
    entry.expression()
}

/// Returns true if the entry is tagged as a residual (kept for local
/// re-evaluation because it was not pushed down to its source).
pub fn is_residual_where(entry: &Where) -> bool {
    matches!(entry, Where::Residual { residual: true, .. })
}

/// Tags an expression as a residual condition.
pub fn create_residual_where(expression: BasicExpression) -> Where {
    Where::Residual {
        expression,
        residual: true,
    }
}

/// Join flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// A join clause: `join <from> on <left> = <right>`.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinClause {
    pub from: Source,
    pub join_type: JoinType,
    pub left: BasicExpression,
    pub right: BasicExpression,
}

/// The full shape of a query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryIR {
    pub from: Source,
    /// Output alias → expression, in declaration order.
    pub select: Option<Vec<(String, SelectExpression)>>,
    pub join: Vec<JoinClause>,
    pub where_: Vec<Where>,
    pub group_by: Vec<BasicExpression>,
    pub having: Vec<Having>,
    pub order_by: Vec<OrderByClause>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub distinct: bool,
    pub single_result: bool,
}

impl QueryIR {
    /// Creates a query reading everything from `from`.
    pub fn new(from: Source) -> Self {
        Self {
            from,
            select: None,
            join: Vec::new(),
            where_: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            single_result: false,
        }
    }

    /// Looks up a select alias.
    fn selected_entry(&self, alias: &str) -> Option<(&str, &SelectExpression)> {
        self.select
            .as_ref()?
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(name, expr)| (name.as_str(), expr))
    }

    /// Finds the `from` or join source with the given alias.
    pub fn source_by_alias(&self, alias: &str) -> Option<&Source> {
        core::iter::once(&self.from)
            .chain(self.join.iter().map(|j| &j.from))
            .find(|s| s.alias() == alias)
    }
}

/// A reference resolved down to a base collection field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FollowedRef {
    pub collection: String,
    pub path: Vec<String>,
}

/// Resolves `prop_ref` to the base-collection field it ultimately reads.
///
/// `collection` is the collection a single-segment path belongs to.
/// Returns `None` for an empty path, an alias that the query does not
/// define, or select aliases that refer to each other in a cycle.
pub fn follow_ref(query: &QueryIR, prop_ref: &PropRef, collection: &str) -> Option<FollowedRef> {
    follow(query, prop_ref, collection, &mut HashSet::new())
}

fn follow<'q>(
    query: &'q QueryIR,
    prop_ref: &PropRef,
    collection: &str,
    visited: &mut HashSet<&'q str>,
) -> Option<FollowedRef> {
    match prop_ref.path.as_slice() {
        [] => None,
        [field] => {
            if let Some((alias, SelectExpression::Basic(BasicExpression::PropRef(selected)))) =
                query.selected_entry(field)
            {
                // `select { a: a }` names the field itself
                if selected != prop_ref {
                    if !visited.insert(alias) {
                        return None;
                    }
                    return follow(query, selected, collection, visited);
                }
            }
            Some(FollowedRef {
                collection: collection.into(),
                path: alloc::vec![field.clone()],
            })
        }
        [alias, rest @ ..] => match query.source_by_alias(alias)? {
            Source::Query(sub) => {
                let inner_collection = match &sub.query.from {
                    Source::Collection(c) => c.collection.as_str(),
                    Source::Query(_) => collection,
                };
                follow_ref(&sub.query, &PropRef { path: rest.to_vec() }, inner_collection)
            }
            Source::Collection(c) => Some(FollowedRef {
                collection: c.collection.clone(),
                path: rest.to_vec(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builders::*;
    use alloc::vec;

    fn users_query() -> QueryIR {
        QueryIR::new(Source::collection("users", "u"))
    }

    #[test]
    fn test_follow_ref_empty_path() {
        let q = users_query();
        assert_eq!(follow_ref(&q, &PropRef::new(Vec::<String>::new()), "users"), None);
    }

    #[test]
    fn test_follow_ref_single_field() {
        let q = users_query();
        let r = follow_ref(&q, &PropRef::new(["name"]), "users").unwrap();
        assert_eq!(r.collection, "users");
        assert_eq!(r.path, vec!["name"]);
    }

    #[test]
    fn test_follow_ref_select_alias() {
        let mut q = users_query();
        q.select = Some(vec![("userName".into(), prop(&["u", "name"]).into())]);
        let r = follow_ref(&q, &PropRef::new(["userName"]), "users").unwrap();
        assert_eq!(r.collection, "users");
        assert_eq!(r.path, vec!["name"]);
    }

    #[test]
    fn test_follow_ref_self_alias_terminates() {
        let mut q = users_query();
        q.select = Some(vec![("name".into(), prop(&["name"]).into())]);
        let r = follow_ref(&q, &PropRef::new(["name"]), "users").unwrap();
        assert_eq!(r.path, vec!["name"]);
    }

    #[test]
    fn test_follow_ref_alias_cycle() {
        let mut q = users_query();
        q.select = Some(vec![
            ("a".into(), prop(&["b"]).into()),
            ("b".into(), prop(&["a"]).into()),
        ]);
        assert_eq!(follow_ref(&q, &PropRef::new(["a"]), "users"), None);
        assert_eq!(follow_ref(&q, &PropRef::new(["b"]), "users"), None);
    }

    #[test]
    fn test_follow_ref_alias_chain() {
        let mut q = users_query();
        q.select = Some(vec![
            ("a".into(), prop(&["b"]).into()),
            ("b".into(), prop(&["u", "name"]).into()),
        ]);
        let r = follow_ref(&q, &PropRef::new(["a"]), "users").unwrap();
        assert_eq!(r.collection, "users");
        assert_eq!(r.path, vec!["name"]);
    }

    #[test]
    fn test_follow_ref_join_alias() {
        let mut q = users_query();
        q.join.push(JoinClause {
            from: Source::collection("orders", "o"),
            join_type: JoinType::Left,
            left: prop(&["u", "id"]),
            right: prop(&["o", "user_id"]),
        });
        let r = follow_ref(&q, &PropRef::new(["o", "total"]), "users").unwrap();
        assert_eq!(r.collection, "orders");
        assert_eq!(r.path, vec!["total"]);
    }

    #[test]
    fn test_follow_ref_through_subquery() {
        let mut inner = QueryIR::new(Source::collection("issues", "i"));
        inner.select = Some(vec![("title".into(), prop(&["i", "name"]).into())]);
        let outer = QueryIR::new(Source::query(inner, "sub"));

        let r = follow_ref(&outer, &PropRef::new(["sub", "title"]), "unused").unwrap();
        assert_eq!(r.collection, "issues");
        assert_eq!(r.path, vec!["name"]);
    }

    #[test]
    fn test_follow_ref_unknown_alias() {
        let q = users_query();
        assert_eq!(follow_ref(&q, &PropRef::new(["x", "name"]), "users"), None);
    }

    #[test]
    fn test_residual_where() {
        let plain: Where = eq(prop(&["a"]), val(1)).into();
        assert!(!is_residual_where(&plain));
        let residual = create_residual_where(eq(prop(&["a"]), val(1)));
        assert!(is_residual_where(&residual));
        assert_eq!(get_where_expression(&residual), get_where_expression(&plain));
        assert_eq!(get_having_expression(&residual), &eq(prop(&["a"]), val(1)));
    }

    #[test]
    fn test_compare_options_equality_ignores_nulls() {
        let a = CompareOptions { direction: Direction::Asc, nulls: Nulls::First };
        let b = CompareOptions { direction: Direction::Asc, nulls: Nulls::Last };
        assert_eq!(a, b);
        assert_ne!(CompareOptions::asc(), CompareOptions::desc());
    }
}
