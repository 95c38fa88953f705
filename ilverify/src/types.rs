//! The IL's value and type model (§3.1).

use std::fmt;

/// The closed set of types the IL's type system distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    I1,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
    Str,
    Error,
    ResumeTok,
}

impl Type {
    /// True for pointer-class kinds accepted by `const.null` (design note §4.A4).
    pub fn is_pointer_class(self) -> bool {
        matches!(self, Type::Ptr | Type::Str | Type::Error | Type::ResumeTok)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Type::I1 | Type::I16 | Type::I32 | Type::I64)
    }

    /// Signed range of an integer kind; `I1` is treated as `{0, 1}` only.
    pub fn int_range(self) -> Option<(i64, i64)> {
        match self {
            Type::I1 => Some((0, 1)),
            Type::I16 => Some((i16::MIN as i64, i16::MAX as i64)),
            Type::I32 => Some((i32::MIN as i64, i32::MAX as i64)),
            Type::I64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    pub fn fits_int(self, v: i64) -> bool {
        match self.int_range() {
            Some((lo, hi)) => v >= lo && v <= hi,
            None => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F32 => "f32",
            Type::F64 => "f64",
            Type::Ptr => "ptr",
            Type::Str => "str",
            Type::Error => "error",
            Type::ResumeTok => "resume_tok",
        };
        f.write_str(n)
    }
}

/// A value id, unique within a function (§3.1 `Temp`).
pub type ValueId = u32;

/// An operand or branch-argument value (§3.1).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Temp(ValueId),
    ConstInt { val: i64, is_bool: bool },
    ConstFloat(f64),
    ConstStr(String),
    GlobalAddr(String),
    NullPtr,
}

impl Value {
    /// Static type of a value that doesn't require environment lookup.
    /// `Temp` resolution goes through `TypeEnv::value_type` instead.
    pub fn literal_type(&self) -> Option<Type> {
        match self {
            Value::Temp(_) => None,
            Value::ConstInt { is_bool: true, .. } => Some(Type::I1),
            Value::ConstInt { is_bool: false, .. } => Some(Type::I64),
            Value::ConstFloat(_) => Some(Type::F64),
            Value::ConstStr(_) => Some(Type::Str),
            Value::GlobalAddr(_) => Some(Type::Ptr),
            Value::NullPtr => Some(Type::Ptr),
        }
    }

    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Value::ConstInt { val, .. } => Some(*val),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp(id) => write!(f, "%{id}"),
            Value::ConstInt { val, .. } => write!(f, "{val}"),
            Value::ConstFloat(v) => write!(f, "{v}"),
            Value::ConstStr(s) => write!(f, "{s:?}"),
            Value::GlobalAddr(n) => write!(f, "@{n}"),
            Value::NullPtr => write!(f, "null"),
        }
    }
}
