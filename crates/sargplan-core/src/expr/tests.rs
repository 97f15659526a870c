use super::*;
use crate::expr::eval::{Row, eval, is_true};
use std::collections::BTreeMap;

struct MapRow(BTreeMap<String, Value>);

impl Row for MapRow {
    fn field(&self, name: &str) -> Value {
        self.0.get(name).cloned().unwrap_or(Value::Missing)
    }
}

fn row(fields: &[(&str, Value)]) -> MapRow {
    MapRow(
        fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect(),
    )
}

fn a() -> Expr {
    Expr::field("a")
}

#[test]
fn canonical_form_is_structural() {
    let pred = Expr::and(vec![
        Expr::eq(a(), Expr::constant(1_i64)),
        Expr::like(Expr::field("b"), "ab%"),
    ]);

    assert_eq!(pred.canonical(), r#"((a = 1) AND (b LIKE "ab%"))"#);
    assert_eq!(pred.canonical(), pred.clone().canonical());
}

#[test]
fn swapped_comparison_is_equivalent() {
    let left = Expr::lt(a(), Expr::constant(3_i64));
    let right = Expr::gt(Expr::constant(3_i64), a());

    assert!(left.equivalent_to(&right));
    assert!(!left.equivalent_to(&Expr::le(a(), Expr::constant(3_i64))));
}

#[test]
fn field_path_depends_on_parent() {
    let nested = Expr::field("a.b");

    assert!(nested.depends_on(&a()));
    assert!(!Expr::field("ab").depends_on(&a()));
    assert!(Expr::gt(nested, Expr::constant(1_i64)).depends_on(&a()));
}

#[test]
fn propagation_classifies_operators() {
    let cmp = Expr::gt(a(), Expr::constant(1_i64));
    assert!(cmp.propagates_null_from(&a()));
    assert!(cmp.propagates_missing_from(&a()));

    let is_null = Expr::is(IsTest::Null, a());
    assert!(is_null.propagates_missing_from(&a()));
    assert!(!is_null.propagates_null_from(&a()));

    let valued = Expr::is(IsTest::Valued, a());
    assert!(!valued.propagates_missing_from(&a()));

    let disjunction = Expr::or(vec![cmp, Expr::TRUE]);
    assert!(!disjunction.propagates_missing_from(&a()));
}

#[test]
fn rename_respects_shadowing() {
    let inner = Expr::any("v", Expr::var("v"), Expr::gt(Expr::var("v"), Expr::constant(1_i64)));
    let outer = Expr::and(vec![Expr::eq(Expr::var("v"), Expr::constant(2_i64)), inner]);

    let renamed = outer.rename_variable("v", "w");
    let expected_inner = Expr::any(
        "v",
        Expr::var("w"),
        Expr::gt(Expr::var("v"), Expr::constant(1_i64)),
    );
    let expected = Expr::and(vec![
        Expr::eq(Expr::var("w"), Expr::constant(2_i64)),
        expected_inner,
    ]);

    assert_eq!(renamed, expected);
}

#[test]
fn static_values_and_params() {
    let array = Expr::ArrayConstruct(vec![Expr::constant(1_i64), Expr::constant(2_i64)]);
    assert_eq!(
        array.static_value(),
        Some(Value::Array(vec![Value::Int(1), Value::Int(2)]))
    );
    assert!(Expr::param("p").is_static());
    assert!(Expr::param("p").static_value().is_none());
    assert!(!Expr::arith(ArithOp::Add, a(), Expr::constant(1_i64)).is_static());
}

#[test]
fn comparisons_are_three_valued() {
    let pred = Expr::gt(a(), Expr::constant(1_i64));

    assert_eq!(eval(&row(&[]), &pred), Value::Missing);
    assert_eq!(eval(&row(&[("a", Value::Null)]), &pred), Value::Null);
    assert!(is_true(&row(&[("a", Value::Int(2))]), &pred));
    // strings collate above numbers
    assert!(is_true(&row(&[("a", Value::text("x"))]), &pred));
}

#[test]
fn is_tests_follow_value_classes() {
    let missing = row(&[]);
    let null = row(&[("a", Value::Null)]);
    let valued = row(&[("a", Value::Int(0))]);

    assert_eq!(eval(&missing, &Expr::is(IsTest::Null, a())), Value::Missing);
    assert!(is_true(&null, &Expr::is(IsTest::Null, a())));
    assert!(is_true(&missing, &Expr::is(IsTest::NotValued, a())));
    assert!(is_true(&null, &Expr::is(IsTest::NotMissing, a())));
    assert!(is_true(&valued, &Expr::is(IsTest::Valued, a())));
}

#[test]
fn like_and_regex_match_whole_string() {
    let r = row(&[("a", Value::text("abcd"))]);

    assert!(is_true(&r, &Expr::like(a(), "abc%")));
    assert!(is_true(&r, &Expr::like(a(), "a_cd")));
    assert!(!is_true(&r, &Expr::like(a(), "bc%")));
    assert!(is_true(&r, &Expr::regex_like(a(), "ab.*")));
    assert!(!is_true(&r, &Expr::regex_like(a(), "b.*")));
}

#[test]
fn collection_quantifiers() {
    let r = row(&[(
        "arr",
        Value::Array(vec![Value::Int(1), Value::Int(5), Value::Int(9)]),
    )]);
    let over = Expr::field("arr");
    let gt = |n: i64| Expr::gt(Expr::var("v"), Expr::constant(n));

    assert!(is_true(&r, &Expr::any("v", over.clone(), gt(8))));
    assert!(!is_true(&r, &Expr::every("v", over.clone(), gt(2))));
    assert!(is_true(&r, &Expr::any_every("v", over.clone(), gt(0))));

    let empty = row(&[("arr", Value::empty_array())]);
    assert!(is_true(&empty, &Expr::every("v", over.clone(), gt(0))));
    assert!(!is_true(&empty, &Expr::any_every("v", over, gt(0))));
}

#[test]
fn distinct_array_mapping_drops_duplicates() {
    let r = row(&[(
        "arr",
        Value::Array(vec![Value::Int(2), Value::Int(2), Value::Int(3)]),
    )]);
    let mapped = Expr::array_map(true, Expr::var("v"), "v", Expr::field("arr"));

    assert_eq!(
        eval(&r, &mapped),
        Value::Array(vec![Value::Int(2), Value::Int(3)])
    );
}
