//! Allocator options.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default rounding tolerance in shares (0.001).
pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Options controlling an allocation run.
///
/// # Examples
///
/// ```
/// use lotledger_booking::AllocatorOptions;
/// use rust_decimal_macros::dec;
///
/// let options = AllocatorOptions::default().with_tolerance(dec!(0.01));
/// assert_eq!(options.tolerance, dec!(0.01));
/// assert!(options.verify_balances);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorOptions {
    /// Rounding tolerance in shares.
    ///
    /// Used to decide whether a lot exactly covers a requirement, whether
    /// the two sides of a transfer balance, and for balance verification.
    pub tolerance: Decimal,
    /// Compare every account's open lots with its running share balance
    /// after each step.
    pub verify_balances: bool,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            verify_balances: true,
        }
    }
}

impl AllocatorOptions {
    /// Set the rounding tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Enable or disable balance verification.
    #[must_use]
    pub const fn with_verify_balances(mut self, verify: bool) -> Self {
        self.verify_balances = verify;
        self
    }
}
