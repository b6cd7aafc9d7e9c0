//! Property-based tests for the predicate algebra.
//!
//! Single-field predicates are checked against brute-force evaluation over
//! a grid of half-step points, which is fine enough to separate any two
//! distinct bounds on integer literals.

use proptest::prelude::*;
use ripple_core::Value;
use ripple_query::ir::builders::*;
use ripple_query::ir::BasicExpression;
use ripple_query::matches;
use ripple_query::predicate::{is_where_subset, minus_where_predicates, union_where_predicates};

const OPS: [&str; 5] = ["eq", "gt", "gte", "lt", "lte"];

fn age() -> BasicExpression {
    prop(&["age"])
}

fn grid() -> impl Iterator<Item = Value> {
    (-50..=50).map(|i| Value::Float64(i as f64 / 2.0))
}

fn row(age: Value) -> Value {
    Value::object([("age", age)])
}

fn comparison_strategy() -> impl Strategy<Value = BasicExpression> {
    (0..OPS.len(), -20i64..20).prop_map(|(op, v)| func(OPS[op], vec![age(), val(v)]))
}

fn in_strategy() -> impl Strategy<Value = BasicExpression> {
    prop::collection::vec(-20i64..20, 0..5)
        .prop_map(|vs| in_array(age(), vs.into_iter().map(Value::Int64).collect()))
}

fn mixed_literal_strategy() -> impl Strategy<Value = BasicExpression> {
    let literal = prop_oneof![
        (-20i64..20).prop_map(Value::Int64),
        "[a-e]".prop_map(Value::String),
    ];
    (0..OPS.len(), literal).prop_map(|(op, v)| func(OPS[op], vec![age(), val(v)]))
}

fn mixed_grid() -> impl Iterator<Item = Value> {
    grid().chain(["a", "b", "c", "d", "e", "f", ""].into_iter().map(Value::from))
}

fn single_field_strategy() -> impl Strategy<Value = BasicExpression> {
    prop_oneof![3 => comparison_strategy(), 1 => in_strategy()]
}

fn nested_strategy() -> impl Strategy<Value = BasicExpression> {
    let leaf = prop_oneof![
        single_field_strategy(),
        (-5i64..5).prop_map(|v| eq(prop(&["status"]), val(v))),
        "[a-c]%".prop_map(|p| like(prop(&["name"]), &p)),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(and),
            prop::collection::vec(inner.clone(), 1..4).prop_map(or),
            inner.prop_map(not),
        ]
    })
}

proptest! {
    /// Same-field comparisons: the interval check agrees exactly with
    /// brute-force implication for every operator pair.
    #[test]
    fn interval_law_matches_brute_force(a in comparison_strategy(), b in comparison_strategy()) {
        let implied = grid().map(row).all(|r| !matches(&a, &r) || matches(&b, &r));
        prop_assert_eq!(is_where_subset(Some(&a), Some(&b)), implied);
    }

    /// `in` lists and comparisons: a positive subset answer is always sound.
    #[test]
    fn subset_is_sound(a in single_field_strategy(), b in single_field_strategy()) {
        if is_where_subset(Some(&a), Some(&b)) {
            for r in grid().map(row) {
                prop_assert!(!matches(&a, &r) || matches(&b, &r));
            }
        }
    }

    #[test]
    fn subset_is_reflexive(x in nested_strategy()) {
        prop_assert!(is_where_subset(Some(&x), Some(&x)));
        prop_assert!(is_where_subset(Some(&val(false)), Some(&x)));
        prop_assert!(is_where_subset(Some(&x), None));
        prop_assert!(!is_where_subset(None, Some(&x)));
    }

    /// The union matches exactly the rows matched by some input.
    #[test]
    fn union_is_exact(preds in prop::collection::vec(single_field_strategy(), 0..5)) {
        let union = union_where_predicates(&preds);
        for r in grid().map(row) {
            let any = preds.iter().any(|p| matches(p, &r));
            prop_assert_eq!(matches(&union, &r), any);
        }
    }

    /// Bounds over numbers and strings on one field never lose a disjunct.
    #[test]
    fn union_covers_mixed_kinds(preds in prop::collection::vec(mixed_literal_strategy(), 0..5)) {
        let union = union_where_predicates(&preds);
        for r in mixed_grid().map(row) {
            let any = preds.iter().any(|p| matches(p, &r));
            prop_assert_eq!(matches(&union, &r), any);
        }
    }

    /// A simplified difference matches exactly `from AND NOT subtract`.
    #[test]
    fn minus_is_exact(from in single_field_strategy(), subtract in single_field_strategy()) {
        if let Some(diff) = minus_where_predicates(Some(&from), Some(&subtract)) {
            for r in grid().map(row) {
                let expected = matches(&from, &r) && !matches(&subtract, &r);
                prop_assert_eq!(matches(&diff, &r), expected);
            }
        }
    }

    /// Factoring out shared conjuncts keeps the difference sound.
    #[test]
    fn minus_with_common_conjunct_is_sound(
        from in comparison_strategy(),
        subtract in comparison_strategy(),
        status in -3i64..3,
    ) {
        let shared = eq(prop(&["status"]), val(status));
        let from = and(vec![shared.clone(), from]);
        let subtract = and(vec![shared, subtract]);
        if let Some(diff) = minus_where_predicates(Some(&from), Some(&subtract)) {
            for age in grid() {
                for s in -3i64..3 {
                    let r = Value::object([("age", age.clone()), ("status", Value::Int64(s))]);
                    let expected = matches(&from, &r) && !matches(&subtract, &r);
                    prop_assert_eq!(matches(&diff, &r), expected);
                }
            }
        }
    }
}
