//! Trigger script value types

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TriggerError};
use crate::script::ast::{BinaryOp, UnaryOp};

/// Variable map of one activation
pub type Variables = HashMap<String, Value>;

/// Opaque object injected by the host (the triggering player, a block, an
/// inventory...). Scripts never look inside; they only pass it along to
/// executors and placeholders.
///
/// Every `Any + Send + Sync + Debug` type is a host object, so a handle may be
/// shared freely between the mutation thread and workers.
pub trait HostObject: Any + Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> HostObject for T {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared reference to a host object
#[derive(Clone)]
pub struct HostHandle(Arc<dyn HostObject>);

impl HostHandle {
    pub fn new<T: HostObject>(object: T) -> Self {
        Self(Arc::new(object))
    }

    pub fn from_arc(object: Arc<dyn HostObject>) -> Self {
        Self(object)
    }

    /// Borrow the host object as its concrete type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object().as_any().downcast_ref::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.object().type_name()
    }

    /// Whether both handles point at the very same object
    pub fn ptr_eq(&self, other: &HostHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // Deref explicitly: the blanket impl also covers the Arc itself.
    fn object(&self) -> &dyn HostObject {
        &*self.0
    }
}

impl PartialEq for HostHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostHandle({:?})", self.object())
    }
}

/// Runtime value types for trigger scripts
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Neutral sentinel: unbound names, unresolved placeholders
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Handle(HostHandle),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Handle(_) => "object",
        }
    }

    /// Truthiness used by conditions and logical operators
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Handle(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value, floats are truncated
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&HostHandle> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Script-level equality (`==`)
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Handle(a), Value::Handle(b)) => a.ptr_eq(b),
            (a, b) if a.is_number() && b.is_number() => a.as_float() == b.as_float(),
            _ => false,
        }
    }

    /// Script-level ordering, `None` when the kinds cannot be ordered
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) if a.is_number() && b.is_number() => {
                a.as_float()?.partial_cmp(&b.as_float()?)
            }
            _ => None,
        }
    }

    /// Apply an arithmetic, comparison or bitwise operator.
    ///
    /// `&&` and `||` short-circuit and are handled by the interpreter.
    pub fn binary(&self, op: BinaryOp, rhs: &Value) -> Result<Value> {
        match op {
            BinaryOp::Add => {
                if matches!(self, Value::String(_)) || matches!(rhs, Value::String(_)) {
                    return Ok(Value::String(format!("{}{}", self, rhs)));
                }
                self.numeric(op, rhs, i64::checked_add, |a, b| a + b)
            }
            BinaryOp::Sub => self.numeric(op, rhs, i64::checked_sub, |a, b| a - b),
            BinaryOp::Mul => self.numeric(op, rhs, i64::checked_mul, |a, b| a * b),
            BinaryOp::Div => {
                if matches!(rhs, Value::Int(0)) && matches!(self, Value::Int(_)) {
                    return Err(TriggerError::runtime("division by zero"));
                }
                self.numeric(op, rhs, i64::checked_div, |a, b| a / b)
            }
            BinaryOp::Mod => {
                if matches!(rhs, Value::Int(0)) && matches!(self, Value::Int(_)) {
                    return Err(TriggerError::runtime("division by zero"));
                }
                self.numeric(op, rhs, i64::checked_rem, |a, b| a % b)
            }
            BinaryOp::Eq => Ok(Value::Bool(self.equals(rhs))),
            BinaryOp::Ne => Ok(Value::Bool(!self.equals(rhs))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = self.compare(rhs).ok_or_else(|| self.mismatch(op, rhs))?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            BinaryOp::And => Ok(Value::Bool(self.is_truthy() && rhs.is_truthy())),
            BinaryOp::Or => Ok(Value::Bool(self.is_truthy() || rhs.is_truthy())),
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => match (self, rhs) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    _ => a ^ b,
                })),
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    _ => a ^ b,
                })),
                _ => Err(self.mismatch(op, rhs)),
            },
            BinaryOp::Shl | BinaryOp::Shr => match (self, rhs) {
                (Value::Int(a), Value::Int(b)) => {
                    let shift = u32::try_from(*b)
                        .ok()
                        .filter(|s| *s < 64)
                        .ok_or_else(|| TriggerError::runtime(format!("invalid shift amount {}", b)))?;
                    Ok(Value::Int(if op == BinaryOp::Shl { a << shift } else { a >> shift }))
                }
                _ => Err(self.mismatch(op, rhs)),
            },
        }
    }

    /// Apply a unary operator
    pub fn unary(&self, op: UnaryOp) -> Result<Value> {
        match (op, self) {
            (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
            (UnaryOp::Neg, Value::Int(i)) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| TriggerError::runtime("integer overflow in negation")),
            (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::BitNot, Value::Int(i)) => Ok(Value::Int(!i)),
            (_, v) => Err(TriggerError::runtime(format!(
                "cannot apply unary operator to {}",
                v.type_name()
            ))),
        }
    }

    fn numeric(
        &self,
        op: BinaryOp,
        rhs: &Value,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => int_op(*a, *b).map(Value::Int).ok_or_else(|| {
                TriggerError::runtime(format!("integer overflow in {} {} {}", a, op.symbol(), b))
            }),
            (a, b) if a.is_number() && b.is_number() => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => Ok(Value::Float(float_op(x, y))),
                _ => Err(self.mismatch(op, rhs)),
            },
            _ => Err(self.mismatch(op, rhs)),
        }
    }

    fn mismatch(&self, op: BinaryOp, rhs: &Value) -> TriggerError {
        TriggerError::runtime(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            self.type_name(),
            rhs.type_name()
        ))
    }

    /// Persistable form, `None` for host handles
    pub fn to_stored(&self) -> Option<StoredValue> {
        match self {
            Value::Null => Some(StoredValue::Null),
            Value::Bool(b) => Some(StoredValue::Bool(*b)),
            Value::Int(i) => Some(StoredValue::Int(*i)),
            Value::Float(f) => Some(StoredValue::Float(*f)),
            Value::String(s) => Some(StoredValue::String(s.clone())),
            Value::Handle(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Handle(h) => write!(f, "<{}>", h.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<HostHandle> for Value {
    fn from(h: HostHandle) -> Self {
        Value::Handle(h)
    }
}

/// Value shape that can be written to a persistent global store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<StoredValue> for Value {
    fn from(stored: StoredValue) -> Self {
        match stored {
            StoredValue::Null => Value::Null,
            StoredValue::Bool(b) => Value::Bool(b),
            StoredValue::Int(i) => Value::Int(i),
            StoredValue::Float(f) => Value::Float(f),
            StoredValue::String(s) => Value::String(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Player {
        name: String,
    }

    #[test]
    fn test_value_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Handle(HostHandle::new(1u8)).is_truthy());
    }

    #[test]
    fn test_value_equality() {
        assert!(Value::Int(42).equals(&Value::Float(42.0)));
        assert!(!Value::Int(1).equals(&Value::from("1")));
        assert!(!Value::Null.equals(&Value::Bool(false)));

        let a = HostHandle::new(Player { name: "a".into() });
        let b = HostHandle::new(Player { name: "a".into() });
        assert!(Value::Handle(a.clone()).equals(&Value::Handle(a.clone())));
        assert!(!Value::Handle(a).equals(&Value::Handle(b)));
    }

    #[test]
    fn test_arithmetic_promotion_and_concat() {
        let v = Value::Int(7).binary(BinaryOp::Div, &Value::Int(2)).unwrap();
        assert_eq!(v, Value::Int(3));
        let v = Value::Int(7).binary(BinaryOp::Div, &Value::Float(2.0)).unwrap();
        assert_eq!(v, Value::Float(3.5));
        let v = Value::from("a").binary(BinaryOp::Add, &Value::Int(1)).unwrap();
        assert_eq!(v, Value::from("a1"));
        let v = Value::Null.binary(BinaryOp::Add, &Value::from("!")).unwrap();
        assert_eq!(v, Value::from("null!"));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(Value::Int(1).binary(BinaryOp::Div, &Value::Int(0)).is_err());
        assert!(Value::Int(1).binary(BinaryOp::Mod, &Value::Int(0)).is_err());
        assert!(Value::Int(i64::MAX).binary(BinaryOp::Add, &Value::Int(1)).is_err());
        assert!(Value::Bool(true).binary(BinaryOp::Sub, &Value::Int(1)).is_err());
        assert!(Value::Int(1).binary(BinaryOp::Lt, &Value::from("2")).is_err());
        assert!(Value::Int(1).binary(BinaryOp::Shl, &Value::Int(64)).is_err());
        assert!(Value::Int(i64::MIN).unary(UnaryOp::Neg).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_handle_downcast() {
        let handle = HostHandle::new(Player { name: "steve".into() });
        assert_eq!(handle.downcast_ref::<Player>().unwrap().name, "steve");
        assert!(handle.downcast_ref::<String>().is_none());
        assert!(handle.type_name().ends_with("Player"));
    }

    #[test]
    fn test_stored_value_json() {
        let values = vec![
            StoredValue::Null,
            StoredValue::Bool(true),
            StoredValue::Int(3),
            StoredValue::Float(1.5),
            StoredValue::String("x".into()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,true,3,1.5,"x"]"#);
        let back: Vec<StoredValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
        assert!(Value::Handle(HostHandle::new(0u8)).to_stored().is_none());
    }
}
