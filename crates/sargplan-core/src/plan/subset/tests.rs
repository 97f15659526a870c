use super::*;

fn x() -> Expr {
    Expr::field("x")
}

fn y() -> Expr {
    Expr::field("y")
}

fn int(v: i64) -> Expr {
    Expr::constant(v)
}

#[test]
fn implication_is_reflexive() {
    let preds = [
        Expr::eq(x(), int(1)),
        Expr::and(vec![Expr::gt(x(), int(1)), Expr::lt(y(), int(2))]),
        Expr::or(vec![Expr::eq(x(), int(1)), Expr::is(IsTest::Null, y())]),
        Expr::any("v", x(), Expr::gt(Expr::var("v"), int(3))),
    ];

    for p in &preds {
        assert!(implies(p, p), "{p}");
    }
}

#[test]
fn equality_implies_weaker_bounds() {
    assert!(implies(&Expr::eq(x(), int(3)), &Expr::le(x(), int(3))));
    assert!(implies(&Expr::eq(x(), int(3)), &Expr::ge(x(), int(3))));
    assert!(implies(&Expr::eq(x(), int(3)), &Expr::ne(x(), int(4))));
    assert!(!implies(&Expr::eq(x(), int(3)), &Expr::lt(x(), int(3))));
    assert!(!implies(&Expr::eq(x(), int(3)), &Expr::eq(y(), int(3))));
}

#[test]
fn bounds_imply_looser_bounds() {
    assert!(implies(&Expr::le(x(), int(2)), &Expr::le(x(), int(5))));
    assert!(implies(&Expr::lt(x(), int(5)), &Expr::le(x(), int(5))));
    assert!(implies(&Expr::le(x(), int(4)), &Expr::lt(x(), int(5))));
    assert!(!implies(&Expr::le(x(), int(5)), &Expr::lt(x(), int(5))));
    assert!(implies(&Expr::gt(x(), int(5)), &Expr::ge(x(), int(2))));
    assert!(implies(&Expr::gt(x(), int(5)), &Expr::ne(x(), int(5))));
    assert!(!implies(&Expr::ge(x(), int(5)), &Expr::ne(x(), int(5))));
}

#[test]
fn large_integer_bounds_do_not_round_through_float() {
    let two_53 = 1_i64 << 53;
    #[expect(clippy::cast_precision_loss)]
    let float = Expr::Constant(crate::value::Value::float(two_53 as f64).expect("finite"));

    assert!(!implies(&Expr::eq(x(), int(two_53 + 1)), &Expr::le(x(), float.clone())));
    assert!(implies(&Expr::eq(x(), int(two_53)), &Expr::le(x(), float.clone())));
    assert!(implies(&Expr::eq(x(), int(two_53 + 1)), &Expr::gt(x(), float)));
}

#[test]
fn swapped_operands_are_recognized() {
    assert!(implies(&Expr::lt(int(3), x()), &Expr::gt(x(), int(1))));
}

#[test]
fn conjunction_and_disjunction_dispatch() {
    let a = Expr::and(vec![Expr::eq(x(), int(1)), Expr::gt(y(), int(0))]);

    assert!(implies(&a, &Expr::gt(y(), int(0))));
    assert!(implies(
        &a,
        &Expr::and(vec![Expr::ge(x(), int(1)), Expr::ge(y(), int(0))])
    ));
    assert!(!implies(&Expr::gt(y(), int(0)), &a));

    let branches = Expr::or(vec![Expr::eq(x(), int(1)), Expr::eq(x(), int(2))]);
    assert!(implies(&branches, &Expr::le(x(), int(2))));
    assert!(!implies(&branches, &Expr::le(x(), int(1))));
    assert!(implies(
        &Expr::eq(x(), int(2)),
        &Expr::or(vec![Expr::eq(y(), int(9)), Expr::ge(x(), int(2))])
    ));
}

#[test]
fn propagation_proves_known_operands() {
    let cmp = Expr::gt(x(), int(1));

    assert!(implies(&cmp, &Expr::is(IsTest::NotMissing, x())));
    assert!(implies(&cmp, &Expr::is(IsTest::NotNull, x())));
    assert!(implies(&cmp, &Expr::is(IsTest::Valued, x())));
    assert!(!implies(&cmp, &Expr::is(IsTest::NotNull, y())));
    assert!(!implies(
        &Expr::is(IsTest::Missing, x()),
        &Expr::is(IsTest::NotMissing, x())
    ));
}

#[test]
fn is_family_pairs() {
    assert!(implies(
        &Expr::is(IsTest::Null, x()),
        &Expr::is(IsTest::NotMissing, x())
    ));
    assert!(implies(
        &Expr::is(IsTest::Valued, x()),
        &Expr::is(IsTest::NotNull, x())
    ));
    assert!(!implies(
        &Expr::is(IsTest::NotMissing, x()),
        &Expr::is(IsTest::Valued, x())
    ));
}

#[test]
fn in_lists() {
    let list = Expr::constant(Value::Array(vec![Value::Int(1), Value::Int(3)]));

    assert!(implies(&Expr::eq(x(), int(3)), &Expr::in_list(x(), list.clone())));
    assert!(implies(&Expr::in_list(x(), list.clone()), &Expr::le(x(), int(3))));
    assert!(!implies(&Expr::in_list(x(), list), &Expr::lt(x(), int(3))));
}

#[test]
fn constants() {
    assert!(implies(&Expr::FALSE, &Expr::eq(x(), int(1))));
    assert!(implies(&Expr::eq(x(), int(1)), &Expr::TRUE));
    assert!(!implies(&Expr::TRUE, &Expr::eq(x(), int(1))));
}

#[test]
fn collections_with_same_bindings() {
    let any = |p: Expr| Expr::any("v", x(), p);
    let v = || Expr::var("v");

    assert!(implies(&any(Expr::gt(v(), int(5))), &any(Expr::gt(v(), int(3)))));
    assert!(!implies(&any(Expr::gt(v(), int(3))), &any(Expr::gt(v(), int(5)))));
    assert!(implies(
        &Expr::any_every("v", x(), Expr::gt(v(), int(5))),
        &any(Expr::gt(v(), int(3)))
    ));
    assert!(!implies(
        &Expr::any("w", x(), Expr::gt(Expr::var("w"), int(5))),
        &any(Expr::gt(v(), int(3)))
    ));
}
