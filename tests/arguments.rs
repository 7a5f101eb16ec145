use genloop::{Arguments, Key, Value};
use std::collections::BTreeMap;

#[test]
fn test_no_arguments_capture_none() {
    assert_eq!(Arguments::none().capture(), Value::None);
    assert!(Arguments::none().capture().is_none());
}

#[test]
fn test_single_positional_is_unwrapped() {
    assert_eq!(Arguments::one(42).capture(), Value::Int(42));
    assert_eq!(Arguments::one("v").capture(), Value::from("v"));
    assert_eq!(Arguments::one(()).capture(), Value::None);
}

#[test]
fn test_multiple_positional_stay_composite() {
    let value = Arguments::positional([42, 43]).capture();

    assert_eq!(
        value,
        (vec![Value::Int(42), Value::Int(43)], BTreeMap::<String, Value>::new())
    );
    assert_eq!(value.as_arguments().map(|a| a.args.len()), Some(2));
}

#[test]
fn test_keyword_only_stays_composite() {
    let value = Arguments::none().with_kwarg("a", 44).capture();
    let kwargs = BTreeMap::from([("a".to_owned(), Value::Int(44))]);

    assert_eq!(value, (Vec::<Value>::new(), kwargs));
}

#[test]
fn test_single_positional_with_keyword_stays_composite() {
    let arguments = Arguments::one(46).with_kwarg("a", 47);
    let kwargs = BTreeMap::from([("a".to_owned(), Value::Int(47))]);

    assert_eq!(arguments, (vec![Value::Int(46)], kwargs.clone()));
    assert_eq!(arguments.capture(), (vec![Value::Int(46)], kwargs));
}

#[test]
fn test_plain_value_is_not_a_composite() {
    assert_ne!(Value::Int(1), (vec![Value::Int(1)], BTreeMap::<String, Value>::new()));
}

#[test]
fn test_display() {
    let value = Arguments::positional([1, 2]).with_kwarg("k", "v").capture();
    assert_eq!(value.to_string(), r#"Arguments(1, 2, k="v")"#);
    assert_eq!(Value::from((1, "a")).to_string(), r#"(1, "a")"#);
    assert_eq!(Key::from((1, 2)).to_string(), "(1, 2)");
}

#[test]
fn test_keys_of_equal_values_are_equal() {
    assert_eq!(Key::from("k1"), Key::from(String::from("k1")));
    assert_eq!(Key::from((1, 2)), Key::from(Value::from((1, 2))));
    assert_ne!(Key::from(1), Key::from("1"));
    assert_eq!(Key::from(7).value(), Some(&Value::Int(7)));
}

#[test]
fn test_unsigned_values_keep_their_magnitude() {
    assert_eq!(Value::from(u32::MAX), Value::Int(4_294_967_295));
    assert_eq!(Key::from(u32::MAX), Key::from(Value::Int(4_294_967_295)));
}
