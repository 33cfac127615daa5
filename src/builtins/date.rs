//! Date/time built-ins (spec.md §4.6). Dates are plain ISO-8601
//! strings ([`Value::Date`]/[`Value::String`]); calendar math uses
//! Howard Hinnant's civil-calendar/epoch-day conversion rather than a
//! date-and-time crate, since the day count is all generation needs.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::context::RunState;
use crate::error::EvaluationError;
use crate::value::Value;

const SECONDS_PER_DAY: i64 = 86_400;

fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m as u32, d)
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn today_epoch_days() -> i64 {
    now_unix_seconds().div_euclid(SECONDS_PER_DAY)
}

fn ymd_string(days: i64) -> String {
    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}")
}

fn ymd_hms_string(days: i64, seconds_of_day: i64) -> String {
    let (y, m, d) = civil_from_days(days);
    let h = seconds_of_day / 3600;
    let mi = (seconds_of_day % 3600) / 60;
    let s = seconds_of_day % 60;
    format!("{y:04}-{m:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

/// Parses `"YYYY-MM-DD"` or `"YYYY-MM-DDTHH:MM:SSZ"` into
/// `(epoch_days, seconds_of_day)`.
fn parse_date(s: &str) -> Option<(i64, i64)> {
    let (date_part, time_part) = s.split_once('T').unwrap_or((s, ""));
    let mut parts = date_part.splitn(3, '-');
    let y: i64 = parts.next()?.parse().ok()?;
    let m: i64 = parts.next()?.parse().ok()?;
    let d: i64 = parts.next()?.parse().ok()?;
    let days = days_from_civil(y, m, d);
    let seconds = if time_part.is_empty() {
        0
    } else {
        let time_part = time_part.trim_end_matches('Z');
        let mut hms = time_part.splitn(3, ':');
        let h: i64 = hms.next()?.parse().ok()?;
        let mi: i64 = hms.next()?.parse().ok()?;
        let s: i64 = hms.next().unwrap_or("0").parse().ok()?;
        h * 3600 + mi * 60 + s
    };
    Some((days, seconds))
}

fn date_arg(args: &[Value], index: usize) -> Result<(i64, i64), EvaluationError> {
    match args.get(index) {
        Some(Value::Date(s)) | Some(Value::String(s)) => parse_date(s).ok_or_else(|| EvaluationError::Other(format!("malformed date '{s}'"))),
        Some(other) => Err(EvaluationError::TypeMismatch {
            expected: "date".to_string(),
            found: other.type_name().to_string(),
        }),
        None => Err(EvaluationError::ArityMismatch {
            name: "date".to_string(),
            expected: "1".to_string(),
            found: 0,
        }),
    }
}

pub fn call(name: &str, args: &[Value], run: &mut RunState) -> Option<Result<Value, EvaluationError>> {
    let result = match name {
        "now" => Ok(Value::Date(ymd_hms_string(today_epoch_days(), now_unix_seconds().rem_euclid(SECONDS_PER_DAY)))),
        "today" => Ok(Value::Date(ymd_string(today_epoch_days()))),
        "datetime" => datetime(args, run),
        "daysAgo" => days_offset(args, -1),
        "daysFromNow" => days_offset(args, 1),
        "dateBetween" => date_between(args, run),
        "formatDate" => format_date(args),
        _ => return None,
    };
    Some(result)
}

fn days_offset(args: &[Value], sign: i64) -> Result<Value, EvaluationError> {
    let n = args.first().and_then(Value::as_f64).unwrap_or(0.0) as i64;
    Ok(Value::Date(ymd_string(today_epoch_days() + sign * n)))
}

fn datetime(args: &[Value], run: &mut RunState) -> Result<Value, EvaluationError> {
    let today = today_epoch_days();
    let (min_days, _) = match args.first() {
        Some(_) => date_arg(args, 0)?,
        None => (today - 3650, 0),
    };
    let (max_days, _) = match args.get(1) {
        Some(_) => date_arg(args, 1)?,
        None => (today, 0),
    };
    let day = run.rng.range_i64(min_days, max_days);
    let seconds = run.rng.range_i64(0, SECONDS_PER_DAY - 1);
    Ok(Value::Date(ymd_hms_string(day, seconds)))
}

fn date_between(args: &[Value], run: &mut RunState) -> Result<Value, EvaluationError> {
    let (start, _) = date_arg(args, 0)?;
    let (end, _) = date_arg(args, 1)?;
    Ok(Value::Date(ymd_string(run.rng.range_i64(start, end))))
}

fn format_date(args: &[Value]) -> Result<Value, EvaluationError> {
    let (days, seconds) = date_arg(args, 0)?;
    let fmt = match args.get(1) {
        Some(Value::String(s)) => s.clone(),
        other => {
            return Err(EvaluationError::TypeMismatch {
                expected: "format string".to_string(),
                found: other.map(Value::type_name).unwrap_or("nothing").to_string(),
            })
        }
    };
    let (y, m, d) = civil_from_days(days);
    let h = seconds / 3600;
    let mi = (seconds % 3600) / 60;
    let s = seconds % 60;
    let out = fmt
        .replace("YYYY", &format!("{y:04}"))
        .replace("MM", &format!("{m:02}"))
        .replace("DD", &format!("{d:02}"))
        .replace("HH", &format!("{h:02}"))
        .replace("mm", &format!("{mi:02}"))
        .replace("ss", &format!("{s:02}"));
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CompileOptions;
    use std::collections::HashMap;

    fn run_state() -> RunState<'static> {
        RunState::new(
            CompileOptions { seed: Some(1), ..Default::default() },
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            None,
            None,
        )
    }

    #[test]
    fn civil_epoch_round_trips() {
        let days = days_from_civil(2024, 3, 15);
        assert_eq!(civil_from_days(days), (2024, 3, 15));
    }

    #[test]
    fn date_between_stays_within_bounds() {
        let mut run = run_state();
        for _ in 0..50 {
            let result = call(
                "dateBetween",
                &[Value::Date("2024-01-01".into()), Value::Date("2024-01-10".into())],
                &mut run,
            )
            .unwrap()
            .unwrap();
            let Value::Date(s) = result else { panic!("expected a date") };
            assert!(("2024-01-01".to_string()..="2024-01-10".to_string()).contains(&s));
        }
    }

    #[test]
    fn format_date_substitutes_tokens() {
        let result = call(
            "formatDate",
            &[Value::Date("2024-03-15T08:05:09Z".into()), Value::String("YYYY/MM/DD HH:mm:ss".into())],
            &mut run_state(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(result, Value::String("2024/03/15 08:05:09".into()));
    }
}
