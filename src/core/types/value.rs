//! Scalar values that can be searched for, written and locked

use super::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A typed scalar as stored in the target's memory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ScalarValue {
    Int32(i32),
    Float32(f32),
    Float64(f64),
}

impl ScalarValue {
    /// Returns the size in bytes of the value
    pub fn size(&self) -> usize {
        self.value_type().size()
    }

    /// Converts the value to its little-endian bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ScalarValue::Int32(v) => v.to_le_bytes().to_vec(),
            ScalarValue::Float32(v) => v.to_le_bytes().to_vec(),
            ScalarValue::Float64(v) => v.to_le_bytes().to_vec(),
        }
    }

    /// Reinterprets little-endian bytes as a value of the given type.
    ///
    /// The slice must be exactly `value_type.size()` bytes long. No validity
    /// checks are made on float bit patterns; see [`crate::memory::ValueCodec`].
    pub fn from_bytes(bytes: &[u8], value_type: ValueType) -> Option<Self> {
        match value_type {
            ValueType::Int32 => {
                let raw: [u8; 4] = bytes.try_into().ok()?;
                Some(ScalarValue::Int32(i32::from_le_bytes(raw)))
            }
            ValueType::Float32 => {
                let raw: [u8; 4] = bytes.try_into().ok()?;
                Some(ScalarValue::Float32(f32::from_le_bytes(raw)))
            }
            ValueType::Float64 => {
                let raw: [u8; 8] = bytes.try_into().ok()?;
                Some(ScalarValue::Float64(f64::from_le_bytes(raw)))
            }
        }
    }

    /// Gets the value type tag for this value
    pub fn value_type(&self) -> ValueType {
        match self {
            ScalarValue::Int32(_) => ValueType::Int32,
            ScalarValue::Float32(_) => ValueType::Float32,
            ScalarValue::Float64(_) => ValueType::Float64,
        }
    }

    /// Widens the value to f64 for ordering and tolerance checks
    pub fn as_f64(&self) -> f64 {
        match *self {
            ScalarValue::Int32(v) => v as f64,
            ScalarValue::Float32(v) => v as f64,
            ScalarValue::Float64(v) => v,
        }
    }

    /// Converts the value to another type.
    ///
    /// Floats converted to `Int32` are truncated toward zero; out of range or
    /// non-finite floats are rejected.
    pub fn cast(self, value_type: ValueType) -> MemoryResult<Self> {
        if self.value_type() == value_type {
            return Ok(self);
        }

        match value_type {
            ValueType::Int32 => {
                let v = self.as_f64();
                if !v.is_finite() || v < i32::MIN as f64 || v > i32::MAX as f64 {
                    return Err(MemoryError::InvalidValue(format!(
                        "{} does not fit in int32",
                        self
                    )));
                }
                Ok(ScalarValue::Int32(v as i32))
            }
            ValueType::Float32 => Ok(ScalarValue::Float32(self.as_f64() as f32)),
            ValueType::Float64 => Ok(ScalarValue::Float64(self.as_f64())),
        }
    }

    /// Parses user input as a value of the given type
    pub fn parse(text: &str, value_type: ValueType) -> MemoryResult<Self> {
        let text = text.trim();
        let invalid = || MemoryError::InvalidValue(format!("'{}' is not a valid {}", text, value_type));

        match value_type {
            ValueType::Int32 => {
                let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    u32::from_str_radix(hex, 16).map(|v| v as i32).map_err(|_| invalid())?
                } else {
                    text.parse::<i32>().map_err(|_| invalid())?
                };
                Ok(ScalarValue::Int32(parsed))
            }
            ValueType::Float32 => {
                let v = text.parse::<f32>().map_err(|_| invalid())?;
                if !v.is_finite() {
                    return Err(invalid());
                }
                Ok(ScalarValue::Float32(v))
            }
            ValueType::Float64 => {
                let v = text.parse::<f64>().map_err(|_| invalid())?;
                if !v.is_finite() {
                    return Err(invalid());
                }
                Ok(ScalarValue::Float64(v))
            }
        }
    }
}

/// Enum representing the type of a scalar value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int32,
    Float32,
    Float64,
}

impl ValueType {
    /// Returns the size in bytes for this value type
    pub const fn size(&self) -> usize {
        match self {
            ValueType::Int32 | ValueType::Float32 => 4,
            ValueType::Float64 => 8,
        }
    }

    /// Alignment used when stepping through a region; equal to the size
    pub const fn alignment(&self) -> usize {
        self.size()
    }

    /// Whether values of this type use tolerance comparison
    pub const fn is_float(&self) -> bool {
        matches!(self, ValueType::Float32 | ValueType::Float64)
    }

    /// All supported value types
    pub const ALL: [ValueType; 3] = [ValueType::Int32, ValueType::Float32, ValueType::Float64];
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int32 => write!(f, "int32"),
            ValueType::Float32 => write!(f, "float32"),
            ValueType::Float64 => write!(f, "float64"),
        }
    }
}

impl FromStr for ValueType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int32" | "i32" | "int" => Ok(ValueType::Int32),
            "float32" | "f32" | "float" => Ok(ValueType::Float32),
            "float64" | "f64" | "double" => Ok(ValueType::Float64),
            other => Err(MemoryError::InvalidValue(format!("unknown value type '{}'", other))),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int32(v) => write!(f, "{}", v),
            ScalarValue::Float32(v) => write!(f, "{:.6}", v),
            ScalarValue::Float64(v) => write!(f, "{:.6}", v),
        }
    }
}
