#![allow(missing_docs)]

//! Unit types for the quantities the model moves around.
//!
//! Only the arithmetic the model actually performs is defined; anything else
//! is a compile error rather than a silent unit bug.

/// Represents a dimensionless quantity (demand factors, utilisation).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    derive_more::Add,
    derive_more::Sub,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Dimensionless(pub f64);

impl Dimensionless {
    /// Creates a new instance from a f64 value.
    pub fn new(val: f64) -> Self {
        Self(val)
    }

    /// Returns the value as a bare f64.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Dimensionless {
    fn from(val: f64) -> Self {
        Self(val)
    }
}

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            derive_more::Add,
            derive_more::Sub,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from a f64 value.
            pub fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|v| v.0).sum())
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

// Base quantities
unit_struct!(Tonnes);
unit_struct!(Money);
unit_struct!(Kilometres);

// Derived quantities
unit_struct!(MoneyPerTonne);
unit_struct!(MoneyPerTonneKilometre);

// Multiplication rules
impl_mul!(MoneyPerTonne, Tonnes, Money);
impl_mul!(MoneyPerTonneKilometre, Kilometres, MoneyPerTonne);

// Division rules
impl_div!(Money, Tonnes, MoneyPerTonne);
impl_div!(Tonnes, Tonnes, Dimensionless);

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_unit_arithmetic() {
        let cost = MoneyPerTonne(30.0) * Tonnes(2.0);
        assert_approx_eq!(f64, cost.value(), 60.0);

        let unit = MoneyPerTonneKilometre(0.5) * Kilometres(100.0);
        assert_approx_eq!(f64, unit.value(), 50.0);

        let scaled = Tonnes(8.0) * Dimensionless(1.5);
        assert_approx_eq!(f64, scaled.value(), 12.0);

        let utilisation = Tonnes(5.0) / Tonnes(10.0);
        assert_approx_eq!(f64, utilisation.value(), 0.5);
    }

    #[test]
    fn test_sum() {
        let total: Tonnes = [Tonnes(1.0), Tonnes(2.5)].into_iter().sum();
        assert_approx_eq!(f64, total.value(), 3.5);
    }
}
