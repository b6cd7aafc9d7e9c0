//! Expression node definitions.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use ripple_core::Value;

use super::query::QueryIR;

/// Reference to a (possibly nested) field.
///
/// In a namespaced query `path[0]` is a source alias; in a single-row
/// filter the path is resolved against the record itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropRef {
    pub path: Vec<String>,
}

impl PropRef {
    /// Creates a reference from path segments.
    pub fn new<S: Into<String>, I: IntoIterator<Item = S>>(path: I) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the dotted field key (`a.b.c`) used to group predicates.
    pub fn field_key(&self) -> String {
        self.path.join(".")
    }
}

/// A function application such as `eq(a, b)` or `and(x, y, z)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Func {
    pub name: String,
    pub args: Vec<BasicExpression>,
}

impl Func {
    /// Creates a function node.
    pub fn new(name: impl Into<String>, args: Vec<BasicExpression>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Returns true if this function has the given name.
    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Row-level expression: the node kinds allowed in where/having/order-by.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BasicExpression {
    /// Field reference.
    PropRef(PropRef),
    /// Literal value.
    Value(Value),
    /// Function call.
    Func(Func),
}

impl BasicExpression {
    /// Returns the function node if this is a `Func`.
    pub fn as_func(&self) -> Option<&Func> {
        match self {
            BasicExpression::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the reference if this is a `PropRef`.
    pub fn as_prop_ref(&self) -> Option<&PropRef> {
        match self {
            BasicExpression::PropRef(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the literal if this is a `Value`.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            BasicExpression::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true if this is a function with the given name.
    #[inline]
    pub fn is_func(&self, name: &str) -> bool {
        matches!(self, BasicExpression::Func(f) if f.is(name))
    }

    /// Returns true if this is the literal `false`.
    #[inline]
    pub fn is_false_literal(&self) -> bool {
        matches!(self, BasicExpression::Value(Value::Boolean(false)))
    }

    /// Returns true if this is the literal `true`.
    #[inline]
    pub fn is_true_literal(&self) -> bool {
        matches!(self, BasicExpression::Value(Value::Boolean(true)))
    }
}

/// Aggregate call, only valid inside `select`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Aggregate {
    pub name: String,
    pub args: Vec<BasicExpression>,
}

impl Aggregate {
    pub fn new(name: impl Into<String>, args: Vec<BasicExpression>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Expression allowed in a `select` clause.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SelectExpression {
    Basic(BasicExpression),
    Aggregate(Aggregate),
}

impl From<BasicExpression> for SelectExpression {
    fn from(expr: BasicExpression) -> Self {
        SelectExpression::Basic(expr)
    }
}

impl From<Aggregate> for SelectExpression {
    fn from(agg: Aggregate) -> Self {
        SelectExpression::Aggregate(agg)
    }
}

/// Reference to a base collection as a query source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    /// Collection id.
    pub collection: String,
    pub alias: String,
}

/// Reference to a subquery as a query source.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRef {
    pub query: Box<QueryIR>,
    pub alias: String,
}

/// A query source (`from` or a join target).
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    Collection(CollectionRef),
    Query(QueryRef),
}

impl Source {
    /// Creates a base-collection source.
    pub fn collection(collection: impl Into<String>, alias: impl Into<String>) -> Self {
        Source::Collection(CollectionRef {
            collection: collection.into(),
            alias: alias.into(),
        })
    }

    /// Creates a subquery source.
    pub fn query(query: QueryIR, alias: impl Into<String>) -> Self {
        Source::Query(QueryRef {
            query: Box::new(query),
            alias: alias.into(),
        })
    }

    /// Returns the alias this source is known by inside the query.
    pub fn alias(&self) -> &str {
        match self {
            Source::Collection(c) => &c.alias,
            Source::Query(q) => &q.alias,
        }
    }
}

/// The kind tag shared by every IR node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    CollectionRef,
    QueryRef,
    PropRef,
    Value,
    Func,
    Aggregate,
}

/// Implemented by every IR node type.
pub trait IrNode {
    fn kind(&self) -> NodeKind;
}

impl IrNode for BasicExpression {
    fn kind(&self) -> NodeKind {
        match self {
            BasicExpression::PropRef(_) => NodeKind::PropRef,
            BasicExpression::Value(_) => NodeKind::Value,
            BasicExpression::Func(_) => NodeKind::Func,
        }
    }
}

impl IrNode for Aggregate {
    fn kind(&self) -> NodeKind {
        NodeKind::Aggregate
    }
}

impl IrNode for SelectExpression {
    fn kind(&self) -> NodeKind {
        match self {
            SelectExpression::Basic(e) => e.kind(),
            SelectExpression::Aggregate(a) => a.kind(),
        }
    }
}

impl IrNode for Source {
    fn kind(&self) -> NodeKind {
        match self {
            Source::Collection(_) => NodeKind::CollectionRef,
            Source::Query(_) => NodeKind::QueryRef,
        }
    }
}

/// Returns true if the node is an expression (Aggregate, Func, PropRef or
/// Value) rather than a query source.
pub fn is_expression_like<N: IrNode + ?Sized>(node: &N) -> bool {
    matches!(
        node.kind(),
        NodeKind::Aggregate | NodeKind::Func | NodeKind::PropRef | NodeKind::Value
    )
}

/// Expression builders, mirroring the function names understood by the
/// evaluator and the predicate algebra.
pub mod builders {
    use super::*;

    /// Field reference from path segments.
    pub fn prop(path: &[&str]) -> BasicExpression {
        BasicExpression::PropRef(PropRef::new(path.iter().map(|s| s.to_string())))
    }

    /// Literal value.
    pub fn val(value: impl Into<Value>) -> BasicExpression {
        BasicExpression::Value(value.into())
    }

    /// Arbitrary function call.
    pub fn func(name: &str, args: Vec<BasicExpression>) -> BasicExpression {
        BasicExpression::Func(Func::new(name, args))
    }

    pub fn eq(left: BasicExpression, right: BasicExpression) -> BasicExpression {
        func("eq", alloc::vec![left, right])
    }

    pub fn gt(left: BasicExpression, right: BasicExpression) -> BasicExpression {
        func("gt", alloc::vec![left, right])
    }

    pub fn gte(left: BasicExpression, right: BasicExpression) -> BasicExpression {
        func("gte", alloc::vec![left, right])
    }

    pub fn lt(left: BasicExpression, right: BasicExpression) -> BasicExpression {
        func("lt", alloc::vec![left, right])
    }

    pub fn lte(left: BasicExpression, right: BasicExpression) -> BasicExpression {
        func("lte", alloc::vec![left, right])
    }

    pub fn and(args: Vec<BasicExpression>) -> BasicExpression {
        func("and", args)
    }

    pub fn or(args: Vec<BasicExpression>) -> BasicExpression {
        func("or", args)
    }

    pub fn not(arg: BasicExpression) -> BasicExpression {
        func("not", alloc::vec![arg])
    }

    /// `field IN (values...)`, encoded as `in(field, [values])`.
    pub fn in_array(field: BasicExpression, values: Vec<Value>) -> BasicExpression {
        func("in", alloc::vec![field, BasicExpression::Value(Value::Array(values))])
    }

    pub fn like(left: BasicExpression, pattern: &str) -> BasicExpression {
        func("like", alloc::vec![left, val(pattern)])
    }

    pub fn ilike(left: BasicExpression, pattern: &str) -> BasicExpression {
        func("ilike", alloc::vec![left, val(pattern)])
    }

    pub fn is_null(arg: BasicExpression) -> BasicExpression {
        func("isNull", alloc::vec![arg])
    }

    pub fn is_undefined(arg: BasicExpression) -> BasicExpression {
        func("isUndefined", alloc::vec![arg])
    }
}

#[cfg(test)]
mod tests {
    use super::builders::*;
    use super::*;
    use alloc::vec;

    #[test]
    fn test_builders_shape() {
        let e = gt(prop(&["t", "age"]), val(10));
        let f = e.as_func().unwrap();
        assert_eq!(f.name, "gt");
        assert_eq!(f.args[0].as_prop_ref().unwrap().path, vec!["t", "age"]);
        assert_eq!(f.args[1].as_value(), Some(&Value::Int64(10)));
    }

    #[test]
    fn test_in_array_encoding() {
        let e = in_array(prop(&["status"]), vec!["a".into(), "b".into()]);
        let f = e.as_func().unwrap();
        assert!(f.is("in"));
        assert_eq!(f.args[1].as_value().and_then(Value::as_array).map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_is_expression_like() {
        assert!(is_expression_like(&val(1)));
        assert!(is_expression_like(&prop(&["a"])));
        assert!(is_expression_like(&eq(prop(&["a"]), val(1))));
        assert!(is_expression_like(&Aggregate::new("count", vec![])));
        assert!(!is_expression_like(&Source::collection("todos", "t")));
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(eq(prop(&["a"]), val(1)), eq(prop(&["a"]), val(1)));
        assert_ne!(eq(prop(&["a"]), val(1)), eq(prop(&["b"]), val(1)));
        assert!(val(false).is_false_literal());
        assert!(val(true).is_true_literal());
    }

    #[test]
    fn test_field_key() {
        assert_eq!(PropRef::new(["t", "profile", "age"]).field_key(), "t.profile.age");
    }
}
