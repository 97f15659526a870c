use super::*;

#[test]
fn collation_rank_orders_type_classes() {
    let ordered = [
        Value::Missing,
        Value::Null,
        Value::Bool(false),
        Value::Bool(true),
        Value::Int(-3),
        Value::Int(7),
        Value::text(""),
        Value::text("abc"),
        Value::empty_array(),
        Value::Array(vec![Value::Int(1)]),
        Value::empty_object(),
    ];

    for pair in ordered.windows(2) {
        assert!(pair[0] < pair[1], "{} should sort before {}", pair[0], pair[1]);
    }
}

#[test]
fn int_and_float_compare_numerically() {
    let one_and_half = Value::float(1.5).expect("finite");
    assert!(Value::Int(1) < one_and_half);
    assert!(one_and_half < Value::Int(2));
    assert_eq!(Value::Int(2), Value::float(2.0).expect("finite"));
}

#[test]
fn int_and_float_compare_exactly_beyond_f64_precision() {
    let two_53 = 1_i64 << 53;
    let at = Value::Int(two_53);
    let above = Value::Int(two_53 + 1);
    #[expect(clippy::cast_precision_loss)]
    let float = Value::float(two_53 as f64).expect("finite");

    assert_eq!(at, float);
    assert!(float < above);
    assert!(above > float);
    assert!(at < above);

    let max = Value::float(9_223_372_036_854_775_808.0).expect("finite");
    assert!(Value::Int(i64::MAX) < max);
    let min = Value::float(-9_223_372_036_854_775_808.0).expect("finite");
    assert_eq!(Value::Int(i64::MIN), min);
    assert!(Value::Int(-3) < Value::float(-2.5).expect("finite"));
    assert!(Value::Int(-2) > Value::float(-2.5).expect("finite"));
}

#[test]
fn float_rejects_non_finite_and_normalizes_negative_zero() {
    assert!(Value::float(f64::NAN).is_none());
    assert!(Value::float(f64::INFINITY).is_none());

    let neg = Float64::try_new(-0.0).expect("finite");
    assert_eq!(neg.get().to_bits(), 0.0f64.to_bits());
}

#[test]
fn display_is_structural() {
    let mut entries = BTreeMap::new();
    entries.insert("b".to_string(), Value::Int(2));
    entries.insert("a".to_string(), Value::text("x"));
    let value = Value::Array(vec![Value::Null, Value::Object(entries), Value::Bool(true)]);

    assert_eq!(value.to_string(), r#"[NULL, {"a": "x", "b": 2}, true]"#);
}

#[test]
fn shorter_array_prefix_sorts_first() {
    let short = Value::Array(vec![Value::Int(1)]);
    let long = Value::Array(vec![Value::Int(1), Value::Int(0)]);
    assert!(short < long);
}
