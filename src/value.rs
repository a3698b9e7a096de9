//! Runtime values for element access (variant representation).

use crate::types::{NumericKind, PrimitiveType};

/// A single type-erased element value, one arm per DDL primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Char(i8),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Float(f32),
    Double(f64),
}

impl Value {
    /// Zero of the given primitive type.
    pub fn zero(ty: PrimitiveType) -> Value {
        Value::U8(0).cast(ty)
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            Value::Bool(_) => PrimitiveType::Bool,
            Value::Char(_) => PrimitiveType::Char,
            Value::U8(_) => PrimitiveType::UInt8,
            Value::U16(_) => PrimitiveType::UInt16,
            Value::U32(_) => PrimitiveType::UInt32,
            Value::U64(_) => PrimitiveType::UInt64,
            Value::I8(_) => PrimitiveType::Int8,
            Value::I16(_) => PrimitiveType::Int16,
            Value::I32(_) => PrimitiveType::Int32,
            Value::I64(_) => PrimitiveType::Int64,
            Value::Float(_) => PrimitiveType::Float32,
            Value::Double(_) => PrimitiveType::Float64,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(x) => Some(*x as u64),
            Value::U16(x) => Some(*x as u64),
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            Value::Bool(x) => Some(*x as u64),
            Value::Char(x) | Value::I8(x) => (*x).try_into().ok(),
            Value::I16(x) => (*x).try_into().ok(),
            Value::I32(x) => (*x).try_into().ok(),
            Value::I64(x) => (*x).try_into().ok(),
            Value::Float(_) | Value::Double(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Char(x) | Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::U8(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => (*x).try_into().ok(),
            Value::Bool(x) => Some(*x as i64),
            Value::Float(_) | Value::Double(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Float(x) => *x as f64,
            Value::Double(x) => *x,
            other => other.as_i128() as f64,
        }
    }

    /// Integer view used by casts: floats truncate toward zero (saturating).
    fn as_i128(&self) -> i128 {
        match self {
            Value::Bool(x) => *x as i128,
            Value::Char(x) | Value::I8(x) => *x as i128,
            Value::I16(x) => *x as i128,
            Value::I32(x) => *x as i128,
            Value::I64(x) => *x as i128,
            Value::U8(x) => *x as i128,
            Value::U16(x) => *x as i128,
            Value::U32(x) => *x as i128,
            Value::U64(x) => *x as i128,
            Value::Float(x) => *x as i128,
            Value::Double(x) => *x as i128,
        }
    }

    fn is_nonzero(&self) -> bool {
        match self {
            Value::Float(x) => *x != 0.0,
            Value::Double(x) => *x != 0.0,
            other => other.as_i128() != 0,
        }
    }

    /// Convert to `target` with C-style semantics: integers wrap, floats truncate, non-zero is `true`.
    pub fn cast(&self, target: PrimitiveType) -> Value {
        match target {
            PrimitiveType::Bool => Value::Bool(self.is_nonzero()),
            PrimitiveType::Float32 => Value::Float(self.as_f64() as f32),
            PrimitiveType::Float64 => Value::Double(self.as_f64()),
            _ => {
                let i = self.as_i128();
                match target {
                    PrimitiveType::Char => Value::Char(i as i8),
                    PrimitiveType::Int8 => Value::I8(i as i8),
                    PrimitiveType::UInt8 => Value::U8(i as u8),
                    PrimitiveType::Int16 => Value::I16(i as i16),
                    PrimitiveType::UInt16 => Value::U16(i as u16),
                    PrimitiveType::Int32 => Value::I32(i as i32),
                    PrimitiveType::UInt32 => Value::U32(i as u32),
                    PrimitiveType::Int64 => Value::I64(i as i64),
                    _ => Value::U64(i as u64),
                }
            }
        }
    }

    /// Raw bit pattern of the value in its own type; signed values are sign-extended to 64 bits.
    pub fn to_bits(&self) -> u64 {
        match self {
            Value::Bool(x) => *x as u64,
            Value::Char(x) | Value::I8(x) => *x as i64 as u64,
            Value::I16(x) => *x as i64 as u64,
            Value::I32(x) => *x as i64 as u64,
            Value::I64(x) => *x as u64,
            Value::U8(x) => *x as u64,
            Value::U16(x) => *x as u64,
            Value::U32(x) => *x as u64,
            Value::U64(x) => *x,
            Value::Float(x) => x.to_bits() as u64,
            Value::Double(x) => x.to_bits(),
        }
    }

    /// Rebuild a value from `bit_count` raw bits; signed integers narrower than their type are sign-extended.
    pub fn from_bits(ty: PrimitiveType, raw: u64, bit_count: usize) -> Value {
        let raw = if ty.is_signed() && bit_count > 0 && bit_count < 64 {
            let shift = 64 - bit_count as u32;
            (((raw << shift) as i64) >> shift) as u64
        } else {
            raw
        };
        match ty {
            PrimitiveType::Bool => Value::Bool(raw != 0),
            PrimitiveType::Char => Value::Char(raw as i8),
            PrimitiveType::Int8 => Value::I8(raw as i8),
            PrimitiveType::UInt8 => Value::U8(raw as u8),
            PrimitiveType::Int16 => Value::I16(raw as i16),
            PrimitiveType::UInt16 => Value::U16(raw as u16),
            PrimitiveType::Int32 => Value::I32(raw as i32),
            PrimitiveType::UInt32 => Value::U32(raw as u32),
            PrimitiveType::Int64 => Value::I64(raw as i64),
            PrimitiveType::UInt64 => Value::U64(raw),
            PrimitiveType::Float32 => Value::Float(f32::from_bits(raw as u32)),
            PrimitiveType::Float64 => Value::Double(f64::from_bits(raw)),
        }
    }

    /// Parse a literal of type `ty`: decimal or `0x` hex integers, floats, `true`/`false`.
    pub fn parse(ty: PrimitiveType, text: &str) -> Result<Value, String> {
        let s = text.trim();
        if s.is_empty() {
            return Err(format!("empty literal for {}", ty));
        }
        match ty.kind() {
            NumericKind::Bool => match s {
                "true" | "TRUE" | "True" => Ok(Value::Bool(true)),
                "false" | "FALSE" | "False" => Ok(Value::Bool(false)),
                _ => parse_integer(s).map(|i| Value::Bool(i != 0)).ok_or_else(|| format!("invalid bool literal '{}'", s)),
            },
            NumericKind::Float => s
                .parse::<f64>()
                .map(|f| Value::Double(f).cast(ty))
                .map_err(|_| format!("invalid float literal '{}'", s)),
            NumericKind::Signed | NumericKind::Unsigned => match parse_integer(s) {
                Some(i) => Ok(Value::I64(0).with_i128(i).cast(ty)),
                // Accept float notation for integers the way a C cast would.
                None => s
                    .parse::<f64>()
                    .map(|f| Value::Double(f).cast(ty))
                    .map_err(|_| format!("invalid integer literal '{}'", s)),
            },
        }
    }

    fn with_i128(self, i: i128) -> Value {
        if i < 0 {
            Value::I64(i as i64)
        } else {
            Value::U64(i as u64)
        }
    }
}

fn parse_integer(s: &str) -> Option<i128> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(x) => write!(f, "{}", x),
            Value::Char(x) | Value::I8(x) => write!(f, "{}", x),
            Value::U8(x) => write!(f, "{}", x),
            Value::U16(x) => write!(f, "{}", x),
            Value::U32(x) => write!(f, "{}", x),
            Value::U64(x) => write!(f, "{}", x),
            Value::I16(x) => write!(f, "{}", x),
            Value::I32(x) => write!(f, "{}", x),
            Value::I64(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
        }
    }
}

/// Input of `set_variant_value`: a value, or an enum symbol resolved against the element's enum.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Value(Value),
    Symbol(String),
}

impl From<Value> for Variant {
    fn from(v: Value) -> Self {
        Variant::Value(v)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::Symbol(s.to_string())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::Symbol(s)
    }
}

/// Rust scalar types usable with the typed `get_value` / `set_value` accessors.
pub trait Primitive: Copy {
    const TYPE: PrimitiveType;
    fn from_value(v: &Value) -> Self;
    fn into_value(self) -> Value;
}

macro_rules! impl_primitive {
    ($t:ty, $ptype:expr, $arm:ident) => {
        impl Primitive for $t {
            const TYPE: PrimitiveType = $ptype;
            fn from_value(v: &Value) -> Self {
                match v.cast($ptype) {
                    Value::$arm(x) => x,
                    _ => Default::default(),
                }
            }
            fn into_value(self) -> Value {
                Value::$arm(self)
            }
        }
    };
}

impl_primitive!(bool, PrimitiveType::Bool, Bool);
impl_primitive!(u8, PrimitiveType::UInt8, U8);
impl_primitive!(u16, PrimitiveType::UInt16, U16);
impl_primitive!(u32, PrimitiveType::UInt32, U32);
impl_primitive!(u64, PrimitiveType::UInt64, U64);
impl_primitive!(i8, PrimitiveType::Int8, I8);
impl_primitive!(i16, PrimitiveType::Int16, I16);
impl_primitive!(i32, PrimitiveType::Int32, I32);
impl_primitive!(i64, PrimitiveType::Int64, I64);
impl_primitive!(f32, PrimitiveType::Float32, Float);
impl_primitive!(f64, PrimitiveType::Float64, Double);
