// value.rs - Runtime value domain used for identity elements and chunk evaluation

use std::fmt;
use std::sync::Arc;

use crate::error::EvalErrorKind;
use crate::ir::BinOp;

/// A runtime value flowing through loop evaluation. Arrays are shared
/// immutably across chunks, so they clone by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Arc<Vec<Value>>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Apply a binary operator to two values. Int/float operands coerce to
/// float when mixed; bitwise operators require ints and logical operators
/// require bools. Min/max preserve the representation of the chosen
/// operand, so an infinite float identity seed disappears once a concrete
/// value arrives.
pub fn apply_binop(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalErrorKind> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => arith(op, lhs, rhs),
        BinOp::Min | BinOp::Max => minmax(op, lhs, rhs),
        BinOp::BitOr | BinOp::BitAnd => bitwise(op, lhs, rhs),
        BinOp::LogicalOr | BinOp::LogicalAnd => logical(op, lhs, rhs),
    }
}

fn arith(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalErrorKind> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => match op {
            BinOp::Add => Ok(Value::Int(a.wrapping_add(*b))),
            BinOp::Sub => Ok(Value::Int(a.wrapping_sub(*b))),
            BinOp::Mul => Ok(Value::Int(a.wrapping_mul(*b))),
            BinOp::Div => {
                if *b == 0 {
                    Err(EvalErrorKind::DivisionByZero)
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            _ => unreachable!(),
        },
        _ => {
            let (a, b) = float_operands(op, lhs, rhs)?;
            match op {
                BinOp::Add => Ok(Value::Float(a + b)),
                BinOp::Sub => Ok(Value::Float(a - b)),
                BinOp::Mul => Ok(Value::Float(a * b)),
                BinOp::Div => {
                    if b == 0.0 {
                        Err(EvalErrorKind::DivisionByZero)
                    } else {
                        Ok(Value::Float(a / b))
                    }
                }
                _ => unreachable!(),
            }
        }
    }
}

fn minmax(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalErrorKind> {
    let (a, b) = float_operands(op, lhs, rhs)?;
    let take_lhs = match op {
        BinOp::Min => a <= b,
        BinOp::Max => a >= b,
        _ => unreachable!(),
    };
    Ok(if take_lhs { lhs.clone() } else { rhs.clone() })
}

fn bitwise(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalErrorKind> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
            BinOp::BitOr => a | b,
            BinOp::BitAnd => a & b,
            _ => unreachable!(),
        })),
        _ => Err(EvalErrorKind::type_mismatch(
            &op.to_string(),
            &format!(
                "bitwise operator requires ints, got {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ),
        )),
    }
}

fn logical(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalErrorKind> {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
            BinOp::LogicalOr => *a || *b,
            BinOp::LogicalAnd => *a && *b,
            _ => unreachable!(),
        })),
        _ => Err(EvalErrorKind::type_mismatch(
            &op.to_string(),
            &format!(
                "logical operator requires bools, got {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ),
        )),
    }
}

fn float_operands(op: BinOp, lhs: &Value, rhs: &Value) -> Result<(f64, f64), EvalErrorKind> {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalErrorKind::type_mismatch(
            &op.to_string(),
            &format!(
                "numeric operator requires numbers, got {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ),
        )),
    }
}
