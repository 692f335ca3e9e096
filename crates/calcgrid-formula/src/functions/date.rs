//! Date/time functions
//!
//! Dates are calendar values ([`Value::Date`]), not serial numbers.

use crate::error::{FormulaError, FormulaResult};
use calcgrid_core::Value;
use chrono::NaiveDate;

fn to_i64_trunc(function: &str, v: Option<&Value>) -> FormulaResult<i64> {
    match v {
        None => Ok(0),
        Some(Value::Number(n)) if n.is_finite() => Ok(n.trunc() as i64),
        Some(other) => Err(FormulaError::Argument(format!(
            "{}() expects numbers, got {}",
            function,
            other.type_name()
        ))),
    }
}

/// date(year, month, day[, hour, minute, second]), month and day one-based
pub fn fn_date(args: &[Value]) -> FormulaResult<Value> {
    let mut parts = [0_i64; 6];
    for (i, part) in parts.iter_mut().enumerate() {
        *part = to_i64_trunc("date", args.get(i))?;
    }
    let [year, month, day, hour, minute, second] = parts;

    let invalid = || {
        FormulaError::Argument(format!(
            "date({}, {}, {}, {}, {}, {}) is not a valid date",
            year, month, day, hour, minute, second
        ))
    };

    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).map_err(|_| invalid())?,
        u32::try_from(month).map_err(|_| invalid())?,
        u32::try_from(day).map_err(|_| invalid())?,
    )
    .ok_or_else(invalid)?;

    let datetime = date
        .and_hms_opt(
            u32::try_from(hour).map_err(|_| invalid())?,
            u32::try_from(minute).map_err(|_| invalid())?,
            u32::try_from(second).map_err(|_| invalid())?,
        )
        .ok_or_else(invalid)?;

    Ok(Value::Date(datetime))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_date() {
        let value = fn_date(&[num(2016.0), num(3.0), num(1.0)]).unwrap();
        assert_eq!(value.to_string(), "2016-03-01");

        let value = fn_date(&[num(2016.0), num(3.0), num(1.0), num(13.0), num(5.0)]).unwrap();
        assert_eq!(value.to_string(), "2016-03-01 13:05:00");
    }

    #[test]
    fn test_invalid_date() {
        assert!(fn_date(&[num(2015.0), num(2.0), num(29.0)]).is_err());
        assert!(fn_date(&[num(2015.0), num(13.0), num(1.0)]).is_err());
        assert!(fn_date(&[num(2015.0), num(1.0), num(1.0), num(25.0)]).is_err());
        assert!(fn_date(&[Value::string("2015"), num(1.0), num(1.0)]).is_err());
    }
}
