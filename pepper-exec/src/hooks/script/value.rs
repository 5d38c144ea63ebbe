use std::cmp::Ordering;

use serde_json::{Number, Value as JsonValue};

pub(crate) fn truthy(v: &JsonValue) -> bool {
    match v {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

/// Deep equality; numbers compare by value so `1 == 1.0`.
pub(crate) fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::Bool(a), JsonValue::Bool(b)) => a == b,
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64() == b.as_f64(),
        (JsonValue::String(a), JsonValue::String(b)) => a == b,
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| json_eq(x, y))
        }
        (JsonValue::Object(a), JsonValue::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| json_eq(v, bv)))
        }
        _ => false,
    }
}

/// Orders two numbers or two strings; anything else is incomparable.
pub(crate) fn json_cmp(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Strings render bare, `null` renders empty, everything else as JSON.
pub(crate) fn to_display(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn type_name(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Arith {
    Add,
    Sub,
}

/// Integer arithmetic when both sides are integers and it doesn't overflow, float otherwise.
pub(crate) fn arith(op: Arith, a: &Number, b: &Number) -> Option<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let r = match op {
            Arith::Add => x.checked_add(y),
            Arith::Sub => x.checked_sub(y),
        };
        if let Some(r) = r {
            return Some(Number::from(r));
        }
    }
    let (x, y) = (a.as_f64()?, b.as_f64()?);
    let r = match op {
        Arith::Add => x + y,
        Arith::Sub => x - y,
    };
    Number::from_f64(r)
}

pub(crate) fn negate(n: &Number) -> Option<Number> {
    match n.as_i64().and_then(i64::checked_neg) {
        Some(i) => Some(Number::from(i)),
        None => Number::from_f64(-n.as_f64()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        for v in [json!(false), json!(null), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!truthy(&v), "{v} should be falsy");
        }
        for v in [json!(true), json!(1), json!(-0.5), json!("x"), json!([0]), json!({"a": null})] {
            assert!(truthy(&v), "{v} should be truthy");
        }
    }

    #[test]
    fn numeric_equality_ignores_representation() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(json_eq(&json!({"a": [1, "x"]}), &json!({"a": [1.0, "x"]})));
        assert!(!json_eq(&json!("1"), &json!(1)));
        assert!(!json_eq(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn ordering() {
        assert_eq!(json_cmp(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(json_cmp(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(json_cmp(&json!("2"), &json!(1)), None);
        assert_eq!(json_cmp(&json!(null), &json!(null)), None);
    }

    #[test]
    fn arithmetic() {
        let n = |v: JsonValue| v.as_number().cloned().unwrap();
        assert_eq!(arith(Arith::Add, &n(json!(2)), &n(json!(3))), Some(Number::from(5)));
        assert_eq!(arith(Arith::Sub, &n(json!(2)), &n(json!(3))), Some(Number::from(-1)));
        assert_eq!(
            arith(Arith::Add, &n(json!(0.5)), &n(json!(1))).and_then(|r| r.as_f64()),
            Some(1.5)
        );
        assert!(arith(Arith::Add, &n(json!(i64::MAX)), &n(json!(1))).is_some());
        assert_eq!(negate(&n(json!(4))), Some(Number::from(-4)));
    }

    #[test]
    fn display() {
        assert_eq!(to_display(&json!("abc")), "abc");
        assert_eq!(to_display(&json!(null)), "");
        assert_eq!(to_display(&json!(12)), "12");
        assert_eq!(to_display(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
