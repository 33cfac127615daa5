//! Distribution built-ins (spec.md §4.6), thin wrappers over
//! [`crate::rng::Rng`]'s derived distributions.

use crate::context::RunState;
use crate::error::EvaluationError;
use crate::value::Value;

fn num(args: &[Value], index: usize) -> Result<f64, EvaluationError> {
    args.get(index).and_then(Value::as_f64).ok_or_else(|| EvaluationError::TypeMismatch {
        expected: "number".to_string(),
        found: args.get(index).map(Value::type_name).unwrap_or("nothing").to_string(),
    })
}

fn opt_num(args: &[Value], index: usize) -> Option<f64> {
    args.get(index).and_then(Value::as_f64)
}

pub fn call(name: &str, args: &[Value], run: &mut RunState) -> Option<Result<Value, EvaluationError>> {
    let result = match name {
        "uniform" => uniform(args, run),
        "gaussian" | "normal" => gaussian(args, run),
        "exponential" => exponential(args, run),
        "lognormal" => lognormal(args, run),
        "poisson" => poisson(args, run),
        "beta" => beta(args, run),
        _ => return None,
    };
    Some(result)
}

fn uniform(args: &[Value], run: &mut RunState) -> Result<Value, EvaluationError> {
    Ok(Value::Decimal(run.rng.range_f64(num(args, 0)?, num(args, 1)?)))
}

fn gaussian(args: &[Value], run: &mut RunState) -> Result<Value, EvaluationError> {
    let mean = num(args, 0)?;
    let std_dev = num(args, 1)?;
    Ok(Value::Decimal(run.rng.gaussian(mean, std_dev, opt_num(args, 2), opt_num(args, 3))))
}

fn exponential(args: &[Value], run: &mut RunState) -> Result<Value, EvaluationError> {
    let rate = num(args, 0)?;
    let min = opt_num(args, 1).unwrap_or(0.0);
    Ok(Value::Decimal(run.rng.exponential(rate, min, opt_num(args, 2))))
}

fn lognormal(args: &[Value], run: &mut RunState) -> Result<Value, EvaluationError> {
    let mu = num(args, 0)?;
    let sigma = num(args, 1)?;
    Ok(Value::Decimal(run.rng.lognormal(mu, sigma, opt_num(args, 2), opt_num(args, 3))))
}

fn poisson(args: &[Value], run: &mut RunState) -> Result<Value, EvaluationError> {
    Ok(Value::Int(run.rng.poisson(num(args, 0)?) as i64))
}

fn beta(args: &[Value], run: &mut RunState) -> Result<Value, EvaluationError> {
    Ok(Value::Decimal(run.rng.beta(num(args, 0)?, num(args, 1)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CompileOptions;
    use std::collections::HashMap;

    fn run_state() -> RunState<'static> {
        RunState::new(
            CompileOptions { seed: Some(7), ..Default::default() },
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            None,
            None,
        )
    }

    #[test]
    fn uniform_stays_in_bounds() {
        let mut run = run_state();
        for _ in 0..100 {
            let v = call("uniform", &[Value::Int(1), Value::Int(5)], &mut run).unwrap().unwrap();
            let Value::Decimal(d) = v else { panic!("expected decimal") };
            assert!((1.0..5.0).contains(&d));
        }
    }

    #[test]
    fn gaussian_respects_explicit_bounds() {
        let mut run = run_state();
        for _ in 0..100 {
            let v = call("gaussian", &[Value::Int(0), Value::Int(1), Value::Int(-1), Value::Int(1)], &mut run)
                .unwrap()
                .unwrap();
            let Value::Decimal(d) = v else { panic!("expected decimal") };
            assert!((-1.0..=1.0).contains(&d));
        }
    }
}
