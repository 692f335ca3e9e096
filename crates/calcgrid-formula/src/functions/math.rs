//! Math functions

use crate::error::{FormulaError, FormulaResult};
use calcgrid_core::Value;

/// Collect the numbers of `args`, flattening lists and skipping everything else
fn numbers(args: &[Value], out: &mut Vec<f64>) {
    for arg in args {
        match arg {
            Value::Number(n) => out.push(*n),
            Value::List(items) => numbers(items, out),
            _ => {} // Ignore non-numeric
        }
    }
}

fn require_number(function: &str, value: Option<&Value>) -> FormulaResult<f64> {
    match value {
        Some(Value::Number(n)) => Ok(*n),
        Some(Value::Empty) | None => Ok(0.0),
        Some(other) => Err(FormulaError::Argument(format!(
            "{}() expects a number, got {}",
            function,
            other.type_name()
        ))),
    }
}

/// sum(values...)
pub fn fn_sum(args: &[Value]) -> FormulaResult<Value> {
    let mut values = Vec::new();
    numbers(args, &mut values);
    Ok(Value::Number(values.iter().sum()))
}

/// min(values...), zero when no argument is numeric
pub fn fn_min(args: &[Value]) -> FormulaResult<Value> {
    let mut values = Vec::new();
    numbers(args, &mut values);
    Ok(Value::Number(
        values.into_iter().reduce(f64::min).unwrap_or(0.0),
    ))
}

/// max(values...), zero when no argument is numeric
pub fn fn_max(args: &[Value]) -> FormulaResult<Value> {
    let mut values = Vec::new();
    numbers(args, &mut values);
    Ok(Value::Number(
        values.into_iter().reduce(f64::max).unwrap_or(0.0),
    ))
}

/// abs(number)
pub fn fn_abs(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(require_number("abs", args.first())?.abs()))
}

/// round(number[, digits]), half away from zero
pub fn fn_round(args: &[Value]) -> FormulaResult<Value> {
    let number = require_number("round", args.first())?;
    let num_digits = require_number("round", args.get(1))?.trunc() as i32;

    // For negative digits, we round to the left of the decimal point
    let multiplier = 10_f64.powi(num_digits);

    let result = if number >= 0.0 {
        (number * multiplier + 0.5).floor() / multiplier
    } else {
        (number * multiplier - 0.5).ceil() / multiplier
    };

    Ok(Value::Number(result))
}

/// number(value): converts strings and booleans to numbers
pub fn fn_number(args: &[Value]) -> FormulaResult<Value> {
    let value = args.first().unwrap_or(&Value::Empty);
    if let Some(n) = value.as_number() {
        return Ok(Value::Number(n));
    }
    match value {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| FormulaError::Argument(format!("cannot convert '{}' to a number", s))),
        other => Err(FormulaError::Argument(format!(
            "cannot convert {} to a number",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_flattens_lists() {
        let args = vec![
            Value::Number(1.0),
            Value::List(vec![Value::Number(2.0), Value::string("x")]),
            Value::Empty,
        ];
        assert_eq!(fn_sum(&args).unwrap(), Value::Number(3.0));
        assert_eq!(fn_sum(&[]).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_min_max() {
        let args = vec![Value::Number(4.0), Value::Number(-2.0), Value::Number(9.0)];
        assert_eq!(fn_min(&args).unwrap(), Value::Number(-2.0));
        assert_eq!(fn_max(&args).unwrap(), Value::Number(9.0));
        assert_eq!(fn_max(&[Value::string("a")]).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_round() {
        assert_eq!(fn_round(&[Value::Number(2.5)]).unwrap(), Value::Number(3.0));
        assert_eq!(fn_round(&[Value::Number(-2.5)]).unwrap(), Value::Number(-3.0));
        assert_eq!(
            fn_round(&[Value::Number(1234.5678), Value::Number(2.0)]).unwrap(),
            Value::Number(1234.57)
        );
        assert_eq!(
            fn_round(&[Value::Number(1250.0), Value::Number(-2.0)]).unwrap(),
            Value::Number(1300.0)
        );
        assert!(fn_round(&[Value::string("x")]).is_err());
    }

    #[test]
    fn test_number() {
        assert_eq!(fn_number(&[Value::string(" 12.5 ")]).unwrap(), Value::Number(12.5));
        assert_eq!(fn_number(&[Value::Bool(true)]).unwrap(), Value::Number(1.0));
        assert!(fn_number(&[Value::string("twelve")]).is_err());
        assert!(fn_number(&[Value::List(vec![])]).is_err());
    }

    #[test]
    fn test_abs() {
        assert_eq!(fn_abs(&[Value::Number(-5.0)]).unwrap(), Value::Number(5.0));
    }
}
