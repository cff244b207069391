//! Encoding, decoding and tolerant comparison of scalar values

use crate::core::types::{CompareMode, MemoryError, MemoryResult, ScalarValue, ValueType};

/// Float comparison tolerances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Used when the target's magnitude is below this value
    pub absolute: f64,
    /// Relative tolerance for `Float32`, multiplied by `|target|`
    pub float32: f64,
    /// Relative tolerance for `Float64`, multiplied by `|target|`
    pub float64: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance {
            absolute: 1e-6,
            float32: 1e-4,
            float64: 1e-8,
        }
    }
}

impl Tolerance {
    /// Allowed distance from `target` for a value of `value_type`
    pub fn for_target(&self, target: f64, value_type: ValueType) -> f64 {
        let magnitude = target.abs();
        if magnitude < self.absolute {
            return self.absolute;
        }
        match value_type {
            ValueType::Float32 => self.float32 * magnitude,
            ValueType::Float64 => self.float64 * magnitude,
            ValueType::Int32 => 0.0,
        }
    }
}

/// Converts scalars to and from target bytes and compares them
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCodec {
    tolerance: Tolerance,
}

impl ValueCodec {
    pub fn new(tolerance: Tolerance) -> Self {
        ValueCodec { tolerance }
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Little-endian bytes of `value`
    pub fn encode(&self, value: ScalarValue) -> Vec<u8> {
        value.to_bytes()
    }

    /// Decodes exactly `value_type.size()` bytes.
    ///
    /// Returns `None` on a length mismatch and for NaN or infinite floats.
    pub fn decode(&self, bytes: &[u8], value_type: ValueType) -> Option<ScalarValue> {
        let value = ScalarValue::from_bytes(bytes, value_type)?;
        match value {
            ScalarValue::Float32(v) if !v.is_finite() => None,
            ScalarValue::Float64(v) if !v.is_finite() => None,
            other => Some(other),
        }
    }

    /// Like [`decode`](Self::decode) but reports why the bytes were rejected
    pub fn try_decode(&self, bytes: &[u8], value_type: ValueType) -> MemoryResult<ScalarValue> {
        if bytes.len() != value_type.size() {
            return Err(MemoryError::decode_invalid(
                value_type,
                format!("expected {} bytes, got {}", value_type.size(), bytes.len()),
            ));
        }
        self.decode(bytes, value_type).ok_or_else(|| {
            MemoryError::decode_invalid(
                value_type,
                format!("non-finite bit pattern {}", hex::encode(bytes)),
            )
        })
    }

    /// Equality with float tolerance; values of different types never match
    pub fn equals(&self, value: ScalarValue, target: ScalarValue) -> bool {
        match (value, target) {
            (ScalarValue::Int32(a), ScalarValue::Int32(b)) => a == b,
            (ScalarValue::Float32(a), ScalarValue::Float32(b)) => {
                self.close(a as f64, b as f64, ValueType::Float32)
            }
            (ScalarValue::Float64(a), ScalarValue::Float64(b)) => {
                self.close(a, b, ValueType::Float64)
            }
            _ => false,
        }
    }

    fn close(&self, a: f64, b: f64, value_type: ValueType) -> bool {
        if !a.is_finite() || !b.is_finite() {
            return false;
        }
        (a - b).abs() <= self.tolerance.for_target(b, value_type)
    }

    /// Tests `current` against `target` under `mode`.
    ///
    /// For `Changed`/`Unchanged` the `target` is the reference value the
    /// current one is compared with.
    pub fn compare(&self, current: ScalarValue, target: ScalarValue, mode: CompareMode) -> bool {
        if current.value_type() != target.value_type() {
            return false;
        }
        match mode {
            CompareMode::Exact | CompareMode::Unchanged => self.equals(current, target),
            CompareMode::Changed => !self.equals(current, target),
            CompareMode::Greater => match (current, target) {
                (ScalarValue::Int32(a), ScalarValue::Int32(b)) => a > b,
                _ => current.as_f64() > target.as_f64(),
            },
            CompareMode::Less => match (current, target) {
                (ScalarValue::Int32(a), ScalarValue::Int32(b)) => a < b,
                _ => current.as_f64() < target.as_f64(),
            },
        }
    }
}
