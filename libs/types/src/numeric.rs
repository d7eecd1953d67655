//! Exact decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Binary floats are forbidden in the kernel; every monetary value is a
//! `Decimal`, and order prices/sizes carry the positive-only newtypes below.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Price type with exact decimal representation
///
/// Must always be positive. Serialized as string to prevent JSON number
/// precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price from a Decimal
    ///
    /// # Panics
    /// Panics if the price is negative or zero
    pub fn new(value: Decimal) -> Self {
        assert!(value > Decimal::ZERO, "Price must be positive");
        Self(value)
    }

    /// Try to create a Price, returning None if invalid
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from integer (for testing/convenience)
    pub fn from_u64(value: u64) -> Self {
        Self::new(Decimal::from(value))
    }

    /// Create from string
    pub fn from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        let decimal = Decimal::from_str(s)?;
        Ok(Self::new(decimal))
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Round to specified decimal places using HALF_UP strategy
    pub fn round_dp(&self, dp: u32) -> Self {
        Self(self.0.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        assert!(self.0 >= rhs.0, "Price subtraction would result in negative");
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Self::Output {
        self.0 * rhs
    }
}

impl Div<Decimal> for Price {
    type Output = Price;

    fn div(self, rhs: Decimal) -> Self::Output {
        assert!(rhs != Decimal::ZERO, "Division by zero");
        Price(self.0 / rhs)
    }
}

// Custom serialization to preserve precision
impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("Price must be positive"))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantity type with exact decimal representation
///
/// Order sizes are always positive; a zero `Quantity` only appears as the
/// filled size of an untouched order. Serialized as string to prevent JSON
/// number precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a new Quantity from a Decimal
    ///
    /// # Panics
    /// Panics if the quantity is negative or zero
    pub fn new(value: Decimal) -> Self {
        assert!(value > Decimal::ZERO, "Quantity must be positive");
        Self(value)
    }

    /// Try to create a Quantity, returning None if invalid
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create zero quantity (for filled sizes of fresh orders)
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from integer (for testing/convenience)
    pub fn from_u64(value: u64) -> Self {
        Self::new(Decimal::from(value))
    }

    /// Create from string
    pub fn from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        let decimal = Decimal::from_str(s)?;
        Ok(Self::new(decimal))
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Check if quantity is zero
    pub fn is_zero(&self) -> bool {
        self.0 == Decimal::ZERO
    }

    /// The smaller of two quantities.
    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        assert!(self.0 >= rhs.0, "Quantity subtraction would result in negative");
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Quantity {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Self::Output {
        self.0 * rhs
    }
}

impl Mul<Price> for Quantity {
    type Output = Decimal;

    fn mul(self, rhs: Price) -> Self::Output {
        self.0 * rhs.as_decimal()
    }
}

// Custom serialization to preserve precision
impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        // Allow zero or positive (zero is the filled size of a fresh order)
        if decimal >= Decimal::ZERO {
            Ok(Self(decimal))
        } else {
            Err(serde::de::Error::custom("Quantity cannot be negative"))
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
