//! Expression evaluator
//!
//! Evaluates expression ASTs to produce values. Evaluation is sandboxed:
//! the only way an expression can observe anything outside itself is the
//! [`EvalContext`] it is given, and the only thing it can ask for is the
//! value of another cell.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::ast::{BinaryOperator, Expr, ReferenceExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::registry;
use crate::parser::parse_expression;
use calcgrid_core::{CellAddress, Error, RefUnit, Value};

/// Name of the cell-reading built-in
pub const VALUE_FUNCTION: &str = "value";

/// Host services available to a running expression
pub trait EvalContext {
    /// Read the current value of the cell at `address`
    ///
    /// Errors raised here reach the caller of [`Formula::evaluate`] as
    /// [`FormulaError::Host`], unchanged.
    fn cell_value(&mut self, address: &CellAddress) -> calcgrid_core::Result<Value>;
}

/// Context that refuses every cell read
///
/// Used to classify literal input, which must never depend on other cells.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCells;

impl EvalContext for NoCells {
    fn cell_value(&mut self, address: &CellAddress) -> calcgrid_core::Result<Value> {
        Err(Error::InvalidOperation(format!(
            "cell {} cannot be read outside a formula",
            address
        )))
    }
}

/// A compiled expression
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
    depth: usize,
}

impl Formula {
    /// The expression text this formula was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed expression
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Height of the expression tree, which bounds how deep evaluation recurses
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Evaluate against a host context
    pub fn evaluate(&self, ctx: &mut dyn EvalContext) -> FormulaResult<Value> {
        evaluate(&self.expr, ctx)
    }
}

/// Compile expression text (without any leading `=`)
///
/// # Example
/// ```rust
/// use calcgrid_core::Value;
/// use calcgrid_formula::{compile, NoCells};
///
/// let formula = compile("round(10 / 4) + 1").unwrap();
/// assert_eq!(formula.evaluate(&mut NoCells).unwrap(), Value::Number(4.0));
/// ```
pub fn compile(text: &str) -> FormulaResult<Formula> {
    let expr = parse_expression(text)?;
    Ok(Formula {
        source: text.to_string(),
        depth: expr.depth(),
        expr,
    })
}

/// Check if `name` is a built-in function
pub fn is_builtin(name: &str) -> bool {
    name == VALUE_FUNCTION || registry().get(name).is_some()
}

/// Evaluate an expression
pub fn evaluate(expr: &Expr, ctx: &mut dyn EvalContext) -> FormulaResult<Value> {
    match expr {
        // === Literals ===
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Empty),

        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(evaluate(item, ctx)?);
            }
            Ok(Value::List(values))
        }

        Expr::Object(fields) => {
            let mut values = BTreeMap::new();
            for (key, item) in fields {
                values.insert(key.clone(), evaluate(item, ctx)?);
            }
            Ok(Value::Object(values))
        }

        // === Names ===
        Expr::Name(name) => {
            if is_builtin(name) {
                Ok(Value::Function(name.clone()))
            } else {
                Err(FormulaError::UnknownName(name.clone()))
            }
        }

        Expr::Reference(reference) => Err(FormulaError::Evaluation(format!(
            "{}() is only valid as the argument of {}()",
            reference.form, VALUE_FUNCTION
        ))),

        // === Operators ===
        Expr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        Expr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if evaluate(condition, ctx)?.is_truthy() {
                evaluate(then, ctx)
            } else {
                evaluate(otherwise, ctx)
            }
        }

        // === Access ===
        Expr::Index { target, index } => {
            let target = evaluate(target, ctx)?;
            let index = evaluate(index, ctx)?;
            evaluate_index(&target, &index)
        }

        Expr::Member { target, name } => match evaluate(target, ctx)? {
            Value::Object(fields) => Ok(fields.get(name).cloned().unwrap_or(Value::Empty)),
            other => Err(FormulaError::Evaluation(format!(
                "Cannot read member '{}' of {}",
                name,
                other.type_name()
            ))),
        },

        // === Functions ===
        Expr::Call { name, args } => evaluate_function(name, args, ctx),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &Expr,
    ctx: &mut dyn EvalContext,
) -> FormulaResult<Value> {
    let val = evaluate(operand, ctx)?;

    match op {
        UnaryOperator::Negate => Ok(Value::Number(-to_number(&val)?)),
        UnaryOperator::Plus => Ok(Value::Number(to_number(&val)?)),
        UnaryOperator::Not => Ok(Value::Bool(!val.is_truthy())),
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    ctx: &mut dyn EvalContext,
) -> FormulaResult<Value> {
    let left_val = evaluate(left, ctx)?;

    // Short-circuit logic returns the deciding operand
    match op {
        BinaryOperator::And if !left_val.is_truthy() => return Ok(left_val),
        BinaryOperator::Or if left_val.is_truthy() => return Ok(left_val),
        _ => {}
    }

    let right_val = evaluate(right, ctx)?;

    match op {
        BinaryOperator::Add => {
            if matches!(left_val, Value::String(_)) || matches!(right_val, Value::String(_)) {
                Ok(Value::String(format!("{}{}", left_val, right_val)))
            } else {
                Ok(Value::Number(to_number(&left_val)? + to_number(&right_val)?))
            }
        }
        BinaryOperator::Subtract => Ok(Value::Number(
            to_number(&left_val)? - to_number(&right_val)?,
        )),
        BinaryOperator::Multiply => Ok(Value::Number(
            to_number(&left_val)? * to_number(&right_val)?,
        )),
        BinaryOperator::Divide => {
            let l = to_number(&left_val)?;
            let r = to_number(&right_val)?;
            if r == 0.0 {
                Err(FormulaError::Evaluation("Division by zero".into()))
            } else {
                Ok(Value::Number(l / r))
            }
        }
        BinaryOperator::Remainder => {
            let l = to_number(&left_val)?;
            let r = to_number(&right_val)?;
            if r == 0.0 {
                Err(FormulaError::Evaluation("Division by zero".into()))
            } else {
                Ok(Value::Number(l % r))
            }
        }

        // Equality is structural
        BinaryOperator::Equal => Ok(Value::Bool(left_val == right_val)),
        BinaryOperator::NotEqual => Ok(Value::Bool(left_val != right_val)),

        BinaryOperator::LessThan => compare(&left_val, &right_val, Ordering::is_lt),
        BinaryOperator::LessEqual => compare(&left_val, &right_val, Ordering::is_le),
        BinaryOperator::GreaterThan => compare(&left_val, &right_val, Ordering::is_gt),
        BinaryOperator::GreaterEqual => compare(&left_val, &right_val, Ordering::is_ge),

        // The left operand did not decide
        BinaryOperator::And | BinaryOperator::Or => Ok(right_val),
    }
}

fn to_number(value: &Value) -> FormulaResult<f64> {
    value.as_number().ok_or_else(|| {
        FormulaError::Evaluation(format!("Expected number, got {}", value.type_name()))
    })
}

/// Order two values of the same kind
fn compare(left: &Value, right: &Value, test: fn(Ordering) -> bool) -> FormulaResult<Value> {
    let ordering = match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Date(l), Value::Date(r)) => Some(l.cmp(r)),
        (l, r) => match (l.as_number(), r.as_number()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => {
                return Err(FormulaError::Evaluation(format!(
                    "Cannot compare {} with {}",
                    l.type_name(),
                    r.type_name()
                )))
            }
        },
    };
    // NaN compares false
    Ok(Value::Bool(ordering.map_or(false, test)))
}

fn evaluate_index(target: &Value, index: &Value) -> FormulaResult<Value> {
    match (target, index) {
        (Value::List(items), Value::Number(n)) => {
            if n.fract() != 0.0 || *n < 0.0 {
                return Ok(Value::Empty);
            }
            Ok(items.get(*n as usize).cloned().unwrap_or(Value::Empty))
        }
        (Value::Object(fields), Value::String(key)) => {
            Ok(fields.get(key).cloned().unwrap_or(Value::Empty))
        }
        (Value::String(s), Value::Number(n)) => {
            if n.fract() != 0.0 || *n < 0.0 {
                return Ok(Value::Empty);
            }
            Ok(s
                .chars()
                .nth(*n as usize)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Empty))
        }
        (target, index) => Err(FormulaError::Evaluation(format!(
            "Cannot index {} with {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[Expr],
    ctx: &mut dyn EvalContext,
) -> FormulaResult<Value> {
    if name == VALUE_FUNCTION {
        return match args {
            [Expr::Reference(reference)] => {
                let address = evaluate_reference(reference, ctx)?;
                Ok(ctx.cell_value(&address)?)
            }
            [_] => Err(FormulaError::Argument(format!(
                "{}() expects a reference call such as positional(row, col)",
                VALUE_FUNCTION
            ))),
            _ => Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: "1".into(),
                actual: args.len(),
            }),
        };
    }

    let func = registry()
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    // Check argument count
    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }

    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    // Evaluate arguments
    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate(arg, ctx)?);
    }

    // Call the function
    (func.implementation)(&evaluated_args)
}

/// Build the address a reference call names
fn evaluate_reference(
    reference: &ReferenceExpr,
    ctx: &mut dyn EvalContext,
) -> FormulaResult<CellAddress> {
    let unit = |value: i64| {
        if reference.form.is_by_id() {
            RefUnit::id(value)
        } else {
            RefUnit::index(value)
        }
    };

    let row = coordinate(&reference.row, ctx)?;
    let col = coordinate(&reference.col, ctx)?;
    let sheet = match &reference.sheet {
        Some(sheet) => Some(coordinate(sheet, ctx)?),
        None => None,
    };

    Ok(CellAddress::new(unit(row), unit(col), sheet.map(unit)))
}

/// A reference argument must be an integral number
fn coordinate(expr: &Expr, ctx: &mut dyn EvalContext) -> FormulaResult<i64> {
    match evaluate(expr, ctx)? {
        Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Ok(n as i64),
        other => Err(FormulaError::Host(Error::InvalidArgument(format!(
            "reference argument must be an integer, got {}",
            if other.is_empty() {
                "empty".to_string()
            } else {
                format!("'{}'", other)
            }
        )))),
    }
}
