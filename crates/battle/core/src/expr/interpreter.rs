//! Sandboxed tree-walking interpreter.
//!
//! Expressions only see what a [`Bindings`] implementation hands them:
//! attribute lookups (`_get`), stat accessors and a flat table of locals.
//! There is no way for an expression to reach anything else.

use std::cmp::Ordering;

use super::ast::{AccessorRoot, BinaryOp, Expr, UnaryOp};
use super::error::EvalError;
use super::value::Value;

/// Variable environment for one evaluation.
pub trait Bindings {
    /// `_get('<path>')` lookup on the attribute owner.
    fn attribute(&self, path: &str) -> Result<f64, EvalError>;

    /// `self.` / `target.` stat accessor.
    fn stat(&self, root: AccessorRoot, path: &str) -> Result<f64, EvalError>;

    /// Free identifier or dotted chain (`distance`, `skill.level`).
    fn local(&self, name: &str) -> Option<Value>;
}

/// Bindings with nothing bound; useful for constant expressions.
pub struct NoBindings;

impl Bindings for NoBindings {
    fn attribute(&self, path: &str) -> Result<f64, EvalError> {
        Err(EvalError::UnknownAttribute(path.to_string()))
    }

    fn stat(&self, root: AccessorRoot, _path: &str) -> Result<f64, EvalError> {
        Err(EvalError::MissingBinding(root.to_string()))
    }

    fn local(&self, _name: &str) -> Option<Value> {
        None
    }
}

pub fn interpret(expr: &Expr, bindings: &dyn Bindings) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(_) | Expr::Member { .. } => {
            let path = expr
                .dotted_path()
                .ok_or_else(|| EvalError::TypeError("property access on a value".into()))?;
            bindings
                .local(&path)
                .ok_or(EvalError::UnknownIdentifier(path))
        }
        Expr::Get(path) => bindings.attribute(path).map(Value::Number),
        Expr::StatAccess { root, path } => bindings.stat(*root, path).map(Value::Number),
        Expr::Unary { op, operand } => {
            let value = interpret(operand, bindings)?;
            Ok(match op {
                UnaryOp::Neg => Value::Number(-value.to_number()),
                UnaryOp::Plus => Value::Number(value.to_number()),
                UnaryOp::Not => Value::Bool(!value.truthy()),
            })
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, bindings),
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if interpret(test, bindings)?.truthy() {
                interpret(consequent, bindings)
            } else {
                interpret(alternate, bindings)
            }
        }
        Expr::Call { callee, args } => {
            let name = callee
                .dotted_path()
                .ok_or_else(|| EvalError::TypeError("callee is not a function name".into()))?;
            let values = args
                .iter()
                .map(|arg| interpret(arg, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            call_builtin(&name, &values, bindings)
        }
    }
}

fn binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    bindings: &dyn Bindings,
) -> Result<Value, EvalError> {
    // Logical operators short-circuit and yield an operand.
    match op {
        BinaryOp::And => {
            let lhs = interpret(left, bindings)?;
            return if lhs.truthy() {
                interpret(right, bindings)
            } else {
                Ok(lhs)
            };
        }
        BinaryOp::Or => {
            let lhs = interpret(left, bindings)?;
            return if lhs.truthy() {
                Ok(lhs)
            } else {
                interpret(right, bindings)
            };
        }
        _ => {}
    }

    let lhs = interpret(left, bindings)?;
    let rhs = interpret(right, bindings)?;

    let value = match op {
        BinaryOp::Add => match (&lhs, &rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(format!("{lhs}{rhs}")),
            _ => Value::Number(lhs.to_number() + rhs.to_number()),
        },
        BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        BinaryOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        BinaryOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
        BinaryOp::Rem => Value::Number(lhs.to_number() % rhs.to_number()),
        BinaryOp::Lt => Value::Bool(compare(&lhs, &rhs) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(&lhs, &rhs),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(&lhs, &rhs) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(&lhs, &rhs),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(lhs.loose_eq(&rhs)),
        BinaryOp::Ne => Value::Bool(!lhs.loose_eq(&rhs)),
        BinaryOp::StrictEq => Value::Bool(lhs.strict_eq(&rhs)),
        BinaryOp::StrictNe => Value::Bool(!lhs.strict_eq(&rhs)),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    };
    Ok(value)
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => lhs.to_number().partial_cmp(&rhs.to_number()),
    }
}

fn expect_args(name: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::ArgumentCount {
            function: name.to_string(),
            expected,
            actual: args.len(),
        })
    }
}

fn unary_math(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, EvalError> {
    expect_args(name, args, 1)?;
    Ok(Value::Number(f(args[0].to_number())))
}

fn call_builtin(name: &str, args: &[Value], bindings: &dyn Bindings) -> Result<Value, EvalError> {
    match name {
        "_get" => {
            expect_args(name, args, 1)?;
            match &args[0] {
                Value::Str(path) => bindings.attribute(path).map(Value::Number),
                other => Err(EvalError::TypeError(format!(
                    "_get expects a string path, got {}",
                    other.type_name()
                ))),
            }
        }
        "Math.floor" => unary_math(name, args, f64::floor),
        "Math.ceil" => unary_math(name, args, f64::ceil),
        "Math.round" => unary_math(name, args, |x| (x + 0.5).floor()),
        "Math.abs" => unary_math(name, args, f64::abs),
        "Math.sqrt" => unary_math(name, args, f64::sqrt),
        "Math.pow" => {
            expect_args(name, args, 2)?;
            Ok(Value::Number(args[0].to_number().powf(args[1].to_number())))
        }
        "Math.min" => Ok(Value::Number(extreme(args, f64::INFINITY, f64::min))),
        "Math.max" => Ok(Value::Number(extreme(args, f64::NEG_INFINITY, f64::max))),
        "parseInt" => {
            expect_args(name, args, 1)?;
            Ok(Value::Number(parse_int(&args[0])))
        }
        "parseFloat" => {
            expect_args(name, args, 1)?;
            Ok(Value::Number(parse_float(&args[0])))
        }
        "Number" => {
            expect_args(name, args, 1)?;
            Ok(Value::Number(args[0].to_number()))
        }
        "isNaN" => {
            expect_args(name, args, 1)?;
            Ok(Value::Bool(args[0].to_number().is_nan()))
        }
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

/// Variadic min/max; any NaN argument poisons the result.
fn extreme(args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    args.iter().map(Value::to_number).fold(init, |acc, x| {
        if acc.is_nan() || x.is_nan() {
            f64::NAN
        } else {
            pick(acc, x)
        }
    })
}

fn leading_numeric(value: &Value) -> String {
    match value {
        Value::Str(s) => s.trim_start().to_string(),
        other => other.to_string(),
    }
}

/// Leading-integer parse: optional sign then decimal digits, else NaN.
fn parse_int(value: &Value) -> f64 {
    let text = leading_numeric(value);
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(&text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end]
        .parse::<f64>()
        .map(|n| sign * n)
        .unwrap_or(f64::NAN)
}

/// Longest numeric prefix, else NaN.
fn parse_float(value: &Value) -> f64 {
    let text = leading_numeric(value);
    (1..=text.len())
        .rev()
        .filter(|&end| text.is_char_boundary(end))
        .find_map(|end| text[..end].parse::<f64>().ok())
        .filter(|n| !n.is_nan() || text.starts_with("NaN"))
        .unwrap_or(f64::NAN)
}
