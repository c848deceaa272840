//! Line quantity type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when validating a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The value is zero or negative.
    #[error("quantity must be a positive integer (got {0})")]
    NotPositive(i64),
    /// The value exceeds the per-line maximum.
    #[error("quantity must be at most {max} (got {value})")]
    TooLarge {
        /// Rejected value.
        value: i64,
        /// Maximum allowed quantity.
        max: u32,
    },
    /// Adding to a line would take it past the per-line maximum.
    #[error("line already holds {current}; adding {added} would exceed {max}")]
    LineLimit {
        /// Quantity already on the line.
        current: u32,
        /// Quantity being added.
        added: u32,
        /// Maximum allowed line quantity.
        max: u32,
    },
}

/// A positive number of units to add to a cart line.
///
/// ## Constraints
///
/// - Must be at least 1
/// - Must be at most [`Quantity::MAX`], which also caps the quantity of a
///   whole line
///
/// ## Examples
///
/// ```
/// use newofyou_core::Quantity;
///
/// assert!(Quantity::new(3).is_ok());
/// assert!(Quantity::new(0).is_err());
/// assert!(Quantity::new(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Largest quantity of a single line, and so of a single mutation.
    pub const MAX: u32 = 10_000;

    /// One unit.
    pub const ONE: Self = Self(1);

    /// Validate a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] for values `<= 0` and
    /// [`QuantityError::TooLarge`] above [`Quantity::MAX`].
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value <= 0 {
            return Err(QuantityError::NotPositive(value));
        }

        match u32::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(QuantityError::TooLarge {
                value,
                max: Self::MAX,
            }),
        }
    }

    /// Get the underlying count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}
