//! Strongly typed physical quantities.
//!
//! Every quantity is a thin wrapper around an `f32` (or an integer for
//! [`Percent`] and [`Hertz`]). Quantities of the same dimension can be added,
//! subtracted and scaled; mixing dimensions requires going through
//! [`value`](Ampere::value) explicitly.

use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use core::time::Duration;

macro_rules! quantity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(f32);

        impl $name {
            pub const ZERO: Self = Self(0.);

            pub const fn new(value: f32) -> Self {
                Self(value)
            }

            pub const fn value(self) -> f32 {
                self.0
            }

            pub fn abs(self) -> Self {
                Self(libm::fabsf(self.0))
            }
        }

        impl Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }

        impl Neg for $name {
            type Output = Self;

            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Mul<f32> for $name {
            type Output = Self;

            fn mul(self, rhs: f32) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl Div<f32> for $name {
            type Output = Self;

            fn div(self, rhs: f32) -> Self {
                Self(self.0 / rhs)
            }
        }

        impl From<f32> for $name {
            fn from(value: f32) -> Self {
                Self(value)
            }
        }
    };
}

quantity!(
    /// Electrical current.
    Ampere
);
quantity!(
    /// Electrical potential.
    Volts
);
quantity!(
    /// Angle. Encoder readings are wrapped to (-π, π].
    Radians
);
quantity!(RadiansPerSecond);
quantity!(RevPerMinute);
quantity!(NewtonMeter);
quantity!(Ohm);
quantity!(Henry);

impl From<RevPerMinute> for RadiansPerSecond {
    fn from(rpm: RevPerMinute) -> Self {
        Self(rpm.0 * core::f32::consts::PI / 30.)
    }
}

/// Duty cycle or ratio between 0 and 100 percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Percent(u8);

impl Percent {
    /// Values above 100 saturate.
    pub const fn new(value: u8) -> Self {
        if value > 100 {
            Self(100)
        } else {
            Self(value)
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// The ratio as a fraction, e.g. `0.2` for 20%.
    pub fn fraction(self) -> f32 {
        f32::from(self.0) / 100.
    }
}

/// Sampling or switching frequency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hertz(u32);

impl Hertz {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Time between two consecutive events.
    pub fn period(self) -> Duration {
        debug_assert!(self.0 > 0, "period of a zero frequency");
        Duration::from_nanos(1_000_000_000 / u64::from(self.0.max(1)))
    }

    pub fn period_secs(self) -> f32 {
        debug_assert!(self.0 > 0, "period of a zero frequency");
        1. / self.0 as f32
    }
}
