//! Predefined DDL primitive types: bit size, natural alignment and numeric kind.

/// Numeric interpretation of a primitive's raw bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Bool,
    Signed,
    Unsigned,
    Float,
}

/// One of the DDL predefined data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 12] = [
        PrimitiveType::Bool,
        PrimitiveType::Char,
        PrimitiveType::Int8,
        PrimitiveType::UInt8,
        PrimitiveType::Int16,
        PrimitiveType::UInt16,
        PrimitiveType::Int32,
        PrimitiveType::UInt32,
        PrimitiveType::Int64,
        PrimitiveType::UInt64,
        PrimitiveType::Float32,
        PrimitiveType::Float64,
    ];

    /// Look up a primitive by its DDL name (`tUInt16`) or the lowercase alias (`uint16`).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "tBool" | "bool" => PrimitiveType::Bool,
            "tChar" | "char" => PrimitiveType::Char,
            "tInt8" | "int8" => PrimitiveType::Int8,
            "tUInt8" | "uint8" => PrimitiveType::UInt8,
            "tInt16" | "int16" => PrimitiveType::Int16,
            "tUInt16" | "uint16" => PrimitiveType::UInt16,
            "tInt32" | "int32" => PrimitiveType::Int32,
            "tUInt32" | "uint32" => PrimitiveType::UInt32,
            "tInt64" | "int64" => PrimitiveType::Int64,
            "tUInt64" | "uint64" => PrimitiveType::UInt64,
            "tFloat32" | "float" | "float32" => PrimitiveType::Float32,
            "tFloat64" | "double" | "float64" => PrimitiveType::Float64,
            _ => return None,
        })
    }

    /// Canonical DDL name.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "tBool",
            PrimitiveType::Char => "tChar",
            PrimitiveType::Int8 => "tInt8",
            PrimitiveType::UInt8 => "tUInt8",
            PrimitiveType::Int16 => "tInt16",
            PrimitiveType::UInt16 => "tUInt16",
            PrimitiveType::Int32 => "tInt32",
            PrimitiveType::UInt32 => "tUInt32",
            PrimitiveType::Int64 => "tInt64",
            PrimitiveType::UInt64 => "tUInt64",
            PrimitiveType::Float32 => "tFloat32",
            PrimitiveType::Float64 => "tFloat64",
        }
    }

    pub fn bit_size(self) -> usize {
        match self {
            PrimitiveType::Bool | PrimitiveType::Char | PrimitiveType::Int8 | PrimitiveType::UInt8 => 8,
            PrimitiveType::Int16 | PrimitiveType::UInt16 => 16,
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => 32,
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => 64,
        }
    }

    pub fn byte_size(self) -> usize {
        self.bit_size() / 8
    }

    /// Natural alignment in bytes (equal to the byte size for every predefined type).
    pub fn alignment(self) -> usize {
        self.byte_size()
    }

    pub fn kind(self) -> NumericKind {
        match self {
            PrimitiveType::Bool => NumericKind::Bool,
            PrimitiveType::Char
            | PrimitiveType::Int8
            | PrimitiveType::Int16
            | PrimitiveType::Int32
            | PrimitiveType::Int64 => NumericKind::Signed,
            PrimitiveType::UInt8 | PrimitiveType::UInt16 | PrimitiveType::UInt32 | PrimitiveType::UInt64 => {
                NumericKind::Unsigned
            }
            PrimitiveType::Float32 | PrimitiveType::Float64 => NumericKind::Float,
        }
    }

    pub fn is_signed(self) -> bool {
        self.kind() == NumericKind::Signed
    }

    /// Integer-like types may control a dynamic array size.
    pub fn is_integer(self) -> bool {
        matches!(self.kind(), NumericKind::Signed | NumericKind::Unsigned)
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// `AlignmentValidation`: an alignment is usable when it is at least 1 and a power of two.
pub fn is_valid_alignment(alignment: usize) -> bool {
    alignment >= 1 && alignment.is_power_of_two()
}

/// Round `value` up to the next multiple of `alignment` (`alignment` must be valid).
pub fn align_up(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return value;
    }
    (value + alignment - 1) & !(alignment - 1)
}
