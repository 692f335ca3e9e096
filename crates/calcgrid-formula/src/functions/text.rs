//! Text functions

use crate::error::{FormulaError, FormulaResult};
use calcgrid_core::Value;

/// len(value): characters of a string, items of a list or fields of an object
pub fn fn_len(args: &[Value]) -> FormulaResult<Value> {
    let len = match args.first() {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::List(items)) => items.len(),
        Some(Value::Object(fields)) => fields.len(),
        Some(Value::Empty) | None => 0,
        Some(other) => {
            return Err(FormulaError::Argument(format!(
                "len() is undefined for {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Number(len as f64))
}

/// string(value): the display form of any value
pub fn fn_string(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::String(
        args.first().map(|v| v.to_string()).unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len() {
        assert_eq!(fn_len(&[Value::string("héllo")]).unwrap(), Value::Number(5.0));
        assert_eq!(
            fn_len(&[Value::List(vec![Value::Empty, Value::Empty])]).unwrap(),
            Value::Number(2.0)
        );
        assert!(fn_len(&[Value::Number(3.0)]).is_err());
    }

    #[test]
    fn test_string() {
        assert_eq!(fn_string(&[Value::Number(21.0)]).unwrap(), Value::string("21"));
        assert_eq!(fn_string(&[Value::Bool(false)]).unwrap(), Value::string("false"));
    }
}
