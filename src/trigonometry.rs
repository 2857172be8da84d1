//! Sine/cosine providers for the control loop.
//!
//! Trigonometry dominates the cost of one FOC cycle on a microcontroller, so
//! the controllers are generic over [`TrigonometricFunctions`]. Production
//! code uses [`CordicTrigonometry`]; [`LibmTrigonometry`] is the accurate
//! reference used to validate it.

use core::f32::consts::{PI, TAU};

use fixed::types::I16F16;

pub trait TrigonometricFunctions {
    fn cosine(&self, angle: f32) -> f32;
    fn sine(&self, angle: f32) -> f32;
    fn arctangent(&self, value: f32) -> f32;
    /// Angle of the complex number `real + j·imag`, in (-π, π].
    fn phase(&self, real: f32, imag: f32) -> f32;

    /// Both values for one angle. Providers that get them in a single
    /// evaluation should override this.
    fn sine_cosine(&self, angle: f32) -> (f32, f32) {
        (self.sine(angle), self.cosine(angle))
    }
}

/// Wraps any finite angle into (-π, π].
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle - TAU * libm::floorf((angle + PI) / TAU);
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Fixed-point CORDIC evaluation in I16F16.
#[derive(Debug, Clone, Copy, Default)]
pub struct CordicTrigonometry;

impl CordicTrigonometry {
    fn to_fixed(value: f32) -> I16F16 {
        I16F16::saturating_from_num(value)
    }
}

impl TrigonometricFunctions for CordicTrigonometry {
    fn cosine(&self, angle: f32) -> f32 {
        self.sine_cosine(angle).1
    }

    fn sine(&self, angle: f32) -> f32 {
        self.sine_cosine(angle).0
    }

    fn arctangent(&self, value: f32) -> f32 {
        cordic::atan(Self::to_fixed(value)).to_num()
    }

    fn phase(&self, real: f32, imag: f32) -> f32 {
        cordic::atan2(Self::to_fixed(imag), Self::to_fixed(real)).to_num()
    }

    fn sine_cosine(&self, angle: f32) -> (f32, f32) {
        // Keep the argument small; electrical angles grow with the pole count.
        let (sin, cos) = cordic::sin_cos(Self::to_fixed(wrap_angle(angle)));
        (sin.to_num(), cos.to_num())
    }
}

/// Single-precision `libm` evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibmTrigonometry;

impl TrigonometricFunctions for LibmTrigonometry {
    fn cosine(&self, angle: f32) -> f32 {
        libm::cosf(angle)
    }

    fn sine(&self, angle: f32) -> f32 {
        libm::sinf(angle)
    }

    fn arctangent(&self, value: f32) -> f32 {
        libm::atanf(value)
    }

    fn phase(&self, real: f32, imag: f32) -> f32 {
        libm::atan2f(imag, real)
    }
}
