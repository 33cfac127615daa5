//! Math built-ins (spec.md §4.6): `round`, `floor`, `ceil`, each taking
//! a decimal-places argument `d` that defaults to `0` and must fall in
//! `[0, 10]`.

use crate::error::EvaluationError;
use crate::value::Value;

const POWERS_OF_TEN: [f64; 11] = [
    1.0,
    10.0,
    100.0,
    1_000.0,
    10_000.0,
    100_000.0,
    1_000_000.0,
    10_000_000.0,
    100_000_000.0,
    1_000_000_000.0,
    10_000_000_000.0,
];

pub fn call(name: &str, args: &[Value]) -> Option<Result<Value, EvaluationError>> {
    let result = match name {
        "round" => apply(args, f64::round),
        "floor" => apply(args, f64::floor),
        "ceil" => apply(args, f64::ceil),
        _ => return None,
    };
    Some(result)
}

fn number_arg(args: &[Value], index: usize, name: &str) -> Result<f64, EvaluationError> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| EvaluationError::TypeMismatch {
            expected: "number".to_string(),
            found: args
                .get(index)
                .map(Value::type_name)
                .unwrap_or(name)
                .to_string(),
        })
}

fn digits_arg(args: &[Value]) -> Result<usize, EvaluationError> {
    match args.get(1) {
        None => Ok(0),
        Some(v) => {
            let d = v.as_f64().ok_or_else(|| EvaluationError::TypeMismatch {
                expected: "int".to_string(),
                found: v.type_name().to_string(),
            })? as usize;
            if d > 10 {
                return Err(EvaluationError::Other(format!(
                    "decimal places {d} outside the supported range [0, 10]"
                )));
            }
            Ok(d)
        }
    }
}

fn apply(args: &[Value], op: impl Fn(f64) -> f64) -> Result<Value, EvaluationError> {
    let v = number_arg(args, 0, "nothing")?;
    let d = digits_arg(args)?;
    let scale = POWERS_OF_TEN[d];
    Ok(Value::Decimal(op(v * scale) / scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_respects_decimal_places() {
        let result = call("round", &[Value::Decimal(1.2345), Value::Int(2)]).unwrap().unwrap();
        assert_eq!(result, Value::Decimal(1.23));
    }

    #[test]
    fn floor_and_ceil_default_to_zero_places() {
        assert_eq!(call("floor", &[Value::Decimal(1.9)]).unwrap().unwrap(), Value::Decimal(1.0));
        assert_eq!(call("ceil", &[Value::Decimal(1.1)]).unwrap().unwrap(), Value::Decimal(2.0));
    }

    #[test]
    fn unknown_name_falls_through() {
        assert!(call("sqrt", &[Value::Int(4)]).is_none());
    }
}
