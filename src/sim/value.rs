//! Typed values carried through a simulated call

use crate::ast::Prim;
use crate::codegen::Mode;
use crate::semantic::catalog::MarshalRule;

/// Local view of a callback reference, as the stub's accessor produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackHandle {
    pub interface: String,
    /// Remote handle (user) or service id (kernel)
    pub handle: u32,
    /// Which accessor path produced the handle
    pub mode: Mode,
}

impl CallbackHandle {
    /// Same callback object, whichever path re-hydrated it
    pub fn same_object(&self, other: &CallbackHandle) -> bool {
        self.interface == other.interface && self.handle == other.handle
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Enum(u64),
    String(String),
    Fd(i32),
    Array(Vec<Value>),
    /// Fields in declaration order
    Struct(Vec<(String, Value)>),
    Callback(CallbackHandle),
    /// A pointer local nothing has been stored in yet
    Null,
}

impl Value {
    /// Zero-initialized local for a rule, the way the C stub declares it
    pub fn zero(rule: &MarshalRule) -> Value {
        match rule {
            MarshalRule::Scalar(prim) => match prim {
                Prim::Bool => Value::Bool(false),
                Prim::I8 => Value::I8(0),
                Prim::I16 => Value::I16(0),
                Prim::I32 => Value::I32(0),
                Prim::I64 => Value::I64(0),
                Prim::U8 => Value::U8(0),
                Prim::U16 => Value::U16(0),
                Prim::U32 => Value::U32(0),
                Prim::U64 => Value::U64(0),
                Prim::F32 => Value::F32(0.0),
                Prim::F64 => Value::F64(0.0),
            },
            MarshalRule::Enum { .. } => Value::Enum(0),
            MarshalRule::String => Value::Null,
            MarshalRule::Fd => Value::Fd(-1),
            MarshalRule::Array { .. } => Value::Array(Vec::new()),
            MarshalRule::Struct { fields, .. } => Value::Struct(
                fields
                    .iter()
                    .map(|f| (f.name.clone(), Value::zero(&f.rule)))
                    .collect(),
            ),
            // No proxy until one is decoded
            MarshalRule::Callback { .. } => Value::Null,
        }
    }

    /// Whether this value owns something that must be released
    pub fn holds_resource(&self) -> bool {
        match self {
            Value::String(_) => true,
            Value::Fd(fd) => *fd >= 0,
            Value::Array(items) => !items.is_empty(),
            Value::Struct(fields) => fields.iter().any(|(_, v)| v.holds_resource()),
            Value::Callback(cb) => cb.handle != hdf_rt::sbuf::REMOTE_NULL,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v.into()),
            Value::I16(v) => Some(v.into()),
            Value::I32(v) => Some(v.into()),
            Value::I64(v) => Some(v),
            Value::U8(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::U64(v) => i64::try_from(v).ok(),
            Value::Fd(v) => Some(v.into()),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::catalog::FieldRule;

    #[test]
    fn test_zero_values_hold_nothing() {
        let rules = [
            MarshalRule::Scalar(Prim::I32),
            MarshalRule::String,
            MarshalRule::Fd,
            MarshalRule::Array {
                element: Box::new(MarshalRule::String),
                max_len: 4,
                bounded: true,
            },
            MarshalRule::Callback {
                interface: "SensorCallback".to_string(),
            },
        ];
        for rule in &rules {
            assert!(!Value::zero(rule).holds_resource(), "{:?}", rule);
        }
        assert!(Value::String(String::new()).holds_resource());
    }

    #[test]
    fn test_struct_access() {
        let rule = MarshalRule::Struct {
            name: "Point".to_string(),
            fields: vec![FieldRule {
                name: "x".to_string(),
                rule: MarshalRule::Scalar(Prim::I16),
            }],
        };
        let zero = Value::zero(&rule);
        assert_eq!(zero.field("x"), Some(&Value::I16(0)));
        assert_eq!(zero.field("y"), None);
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
    }

    #[test]
    fn test_same_object_ignores_path() {
        let user = CallbackHandle {
            interface: "SensorCallback".to_string(),
            handle: 9,
            mode: Mode::User,
        };
        let kernel = CallbackHandle {
            mode: Mode::Kernel,
            ..user.clone()
        };
        assert!(user.same_object(&kernel));
        assert_ne!(user, kernel);
    }
}
