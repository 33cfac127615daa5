//! String built-ins (spec.md §4.6). Word-splitting for the casing
//! conversions splits on `[\s_-]` plus the `([a-z])([A-Z])` camel
//! boundary.

use crate::error::EvaluationError;
use crate::value::Value;

pub fn call(name: &str, args: &[Value]) -> Option<Result<Value, EvaluationError>> {
    let result = match name {
        "uppercase" => text_arg(args, 0).map(|s| Value::String(s.to_uppercase())),
        "lowercase" => text_arg(args, 0).map(|s| Value::String(s.to_lowercase())),
        "capitalize" => text_arg(args, 0).map(|s| Value::String(capitalize(&s))),
        "kebabCase" => text_arg(args, 0).map(|s| Value::String(words(&s).join("-").to_lowercase())),
        "snakeCase" => text_arg(args, 0).map(|s| Value::String(words(&s).join("_").to_lowercase())),
        "camelCase" => text_arg(args, 0).map(|s| Value::String(camel_case(&s))),
        "trim" => text_arg(args, 0).map(|s| Value::String(s.trim().to_string())),
        "concat" => concat(args),
        "substring" => substring(args),
        "replace" => replace(args),
        "length" => length(args),
        _ => return None,
    };
    Some(result)
}

fn text_arg(args: &[Value], index: usize) -> Result<String, EvaluationError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(EvaluationError::TypeMismatch {
            expected: "string".to_string(),
            found: "nothing".to_string(),
        }),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
    }
}

/// Splits `s` into words on whitespace, `_`, `-`, and the lowercase-to-
/// uppercase camel boundary.
fn words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut spaced = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && chars[i - 1].is_ascii_lowercase() && c.is_ascii_uppercase() {
            spaced.push(' ');
        }
        spaced.push(c);
    }
    spaced
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn camel_case(s: &str) -> String {
    let parts = words(s);
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            out.push_str(&part.to_lowercase());
        } else {
            out.push_str(&capitalize(part));
        }
    }
    out
}

fn concat(args: &[Value]) -> Result<Value, EvaluationError> {
    let mut out = String::new();
    for a in args {
        out.push_str(&a.to_string());
    }
    Ok(Value::String(out))
}

fn substring(args: &[Value]) -> Result<Value, EvaluationError> {
    let s = text_arg(args, 0)?;
    let chars: Vec<char> = s.chars().collect();
    let start = args.get(1).and_then(Value::as_f64).unwrap_or(0.0).max(0.0) as usize;
    let end = args
        .get(2)
        .and_then(Value::as_f64)
        .map(|v| v as usize)
        .unwrap_or(chars.len())
        .min(chars.len());
    let start = start.min(end);
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn replace(args: &[Value]) -> Result<Value, EvaluationError> {
    let s = text_arg(args, 0)?;
    let from = text_arg(args, 1)?;
    let to = text_arg(args, 2)?;
    Ok(Value::String(s.replace(&from, &to)))
}

fn length(args: &[Value]) -> Result<Value, EvaluationError> {
    match args.first() {
        Some(Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
        Some(Value::List(items)) => Ok(Value::Int(items.len() as i64)),
        Some(other) => Err(EvaluationError::TypeMismatch {
            expected: "string or list".to_string(),
            found: other.type_name().to_string(),
        }),
        None => Err(EvaluationError::ArityMismatch {
            name: "length".to_string(),
            expected: "1".to_string(),
            found: 0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casing_conversions_split_on_camel_boundary_and_separators() {
        assert_eq!(
            call("kebabCase", &[Value::String("orderLine_item Name".into())]).unwrap().unwrap(),
            Value::String("order-line-item-name".into())
        );
        assert_eq!(
            call("snakeCase", &[Value::String("orderLineItem".into())]).unwrap().unwrap(),
            Value::String("order_line_item".into())
        );
        assert_eq!(
            call("camelCase", &[Value::String("order_line-item".into())]).unwrap().unwrap(),
            Value::String("orderLineItem".into())
        );
    }

    #[test]
    fn substring_slices_by_char_index() {
        assert_eq!(
            call("substring", &[Value::String("hello".into()), Value::Int(1), Value::Int(3)])
                .unwrap()
                .unwrap(),
            Value::String("el".into())
        );
    }

    #[test]
    fn length_counts_chars_or_list_items() {
        assert_eq!(call("length", &[Value::String("hi".into())]).unwrap().unwrap(), Value::Int(2));
        assert_eq!(
            call("length", &[Value::List(vec![Value::Int(1), Value::Int(2)])]).unwrap().unwrap(),
            Value::Int(2)
        );
    }
}
