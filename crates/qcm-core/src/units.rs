//! Compile-time unit safety for the handful of power-system quantities the
//! congestion optimizer works with.
//!
//! Dispatch adjustments, line ratings, and voltage magnitudes all travel as
//! `f64` internally; these `#[repr(transparent)]` newtypes keep megawatts from
//! being added to per-unit voltages by accident while compiling down to plain
//! doubles.
//!
//! ```
//! use qcm_core::units::{Megawatts, PerUnit};
//!
//! let dispatch = Megawatts(50.0) + Megawatts(12.5);
//! let vm = PerUnit(1.02);
//! assert!((dispatch.value() - 62.5).abs() < 1e-12);
//! assert!(vm.deviation_from_nominal() > 0.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Implements the arithmetic every unit newtype needs.
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Absolute value
            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// Clamp value to range
            #[inline]
            pub fn clamp(self, min: Self, max: Self) -> Self {
                Self(self.0.clamp(min.0, max.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Active power in megawatts (MW).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Reactive power in megavolt-amperes reactive (Mvar).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megavars(pub f64);

impl_unit_ops!(Megavars, "Mvar");

/// Apparent power in megavolt-amperes (MVA). Used for branch thermal ratings.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);

impl_unit_ops!(MegavoltAmperes, "MVA");

/// Dimensionless per-unit quantity (voltage magnitudes, impedances).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_unit_ops!(PerUnit, "pu");

impl Default for PerUnit {
    fn default() -> Self {
        PerUnit(1.0)
    }
}

impl PerUnit {
    /// Distance from the 1.0 pu nominal point, always non-negative.
    ///
    /// This is the per-bus term of the voltage-deviation penalty.
    #[inline]
    pub fn deviation_from_nominal(self) -> f64 {
        (self.0 - 1.0).abs()
    }
}

/// Loading as a percentage of a branch's thermal rating.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Percent(pub f64);

impl_unit_ops!(Percent, "%");

impl Percent {
    /// Loading in excess of 100%, or zero when within the rating.
    ///
    /// This is the per-line term of the congestion penalty.
    #[inline]
    pub fn overload(self) -> f64 {
        (self.0 - 100.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn megawatts_arithmetic() {
        let total = Megawatts(50.0) + Megawatts(25.0) - Megawatts(10.0);
        assert_eq!(total.value(), 65.0);
        assert_eq!((-total).value(), -65.0);
        assert_eq!((total * 2.0).value(), 130.0);
    }

    #[test]
    fn per_unit_deviation() {
        assert!((PerUnit(1.02).deviation_from_nominal() - 0.02).abs() < 1e-12);
        assert!((PerUnit(0.99).deviation_from_nominal() - 0.01).abs() < 1e-12);
        assert_eq!(PerUnit::default().deviation_from_nominal(), 0.0);
    }

    #[test]
    fn percent_overload() {
        assert!((Percent(105.0).overload() - 5.0).abs() < 1e-12);
        assert_eq!(Percent(98.0).overload(), 0.0);
        assert!((Percent(120.0).overload() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn clamp_respects_limits() {
        let p = Megawatts(250.0).clamp(Megawatts(0.0), Megawatts(100.0));
        assert_eq!(p.value(), 100.0);
    }

    #[test]
    fn sum_over_iterator() {
        let loadings = [Percent(50.0), Percent(75.0), Percent(110.0)];
        let total: Percent = loadings.iter().copied().sum();
        assert_eq!(total.value(), 235.0);
    }
}
