//! ## mqttrace-telemetry::fields
//! Scalar values carried by telemetry events.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Event tags: low-cardinality string labels.
pub type Tags = BTreeMap<String, String>;

/// Event fields: measured or captured values.
pub type Fields = BTreeMap<String, FieldValue>;

/// Signed fixed-point decimal: `units * 10^-scale`.
///
/// Arithmetic stays in integers so results do not depend on binary
/// floating-point rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedDecimal {
    units: i64,
    scale: u32,
}

impl FixedDecimal {
    pub const fn new(units: i64, scale: u32) -> Self {
        Self { units, scale }
    }

    pub const fn zero(scale: u32) -> Self {
        Self { units: 0, scale }
    }

    #[inline]
    pub fn units(&self) -> i64 {
        self.units
    }

    #[inline]
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Changes the scale. Reducing it truncates toward zero, like `bcsub`
    /// with a result scale.
    pub fn rescale(self, scale: u32) -> Self {
        let units = if scale >= self.scale {
            self.units * 10i64.pow(scale - self.scale)
        } else {
            self.units / 10i64.pow(self.scale - scale)
        };
        Self { units, scale }
    }

    /// Exact subtraction at the larger of both scales.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        let scale = self.scale.max(other.scale);
        let lhs = self.checked_rescale_up(scale)?;
        let rhs = other.checked_rescale_up(scale)?;
        Some(Self {
            units: lhs.checked_sub(rhs)?,
            scale,
        })
    }

    fn checked_rescale_up(self, scale: u32) -> Option<i64> {
        self.units
            .checked_mul(10i64.checked_pow(scale - self.scale)?)
    }

    /// Lossy conversion for serialization boundaries.
    pub fn to_f64(self) -> f64 {
        self.units as f64 / 10f64.powi(self.scale as i32)
    }
}

impl fmt::Display for FixedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.units < 0 { "-" } else { "" };
        let magnitude = self.units.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{}{}", sign, magnitude);
        }
        let divisor = 10u64.pow(self.scale);
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            magnitude / divisor,
            magnitude % divisor,
            width = self.scale as usize
        )
    }
}

impl Serialize for FixedDecimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

/// A single event field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(FixedDecimal),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<FixedDecimal> {
        match self {
            FieldValue::Decimal(decimal) => Some(*decimal),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(value) => write!(f, "{}", value),
            FieldValue::Integer(value) => write!(f, "{}", value),
            FieldValue::Decimal(value) => write!(f, "{}", value),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<FixedDecimal> for FieldValue {
    fn from(value: FixedDecimal) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}
