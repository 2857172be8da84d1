//! Park and Clarke transformations (along with their inverses).
//!
//! The Clarke transform here is the amplitude-invariant form that uses all
//! three phases, so it does not rely on `a + b + c == 0`. The sine and cosine
//! of the electrical angle are passed in rather than recomputed, so one
//! evaluation can serve both the forward and the inverse Park transform of a
//! control cycle.

use crate::{FRAC_1_SQRT_3, FRAC_SQRT_3_2};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RotatingFrame {
    pub d: f32,
    pub q: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TwoPhase {
    pub alpha: f32,
    pub beta: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThreePhase {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

/// Clarke transform
pub fn clarke(inputs: ThreePhase) -> TwoPhase {
    TwoPhase {
        alpha: 2. / 3. * (inputs.a - 0.5 * (inputs.b + inputs.c)),
        beta: FRAC_1_SQRT_3 * (inputs.b - inputs.c),
    }
}

/// Inverse Clarke transform
pub fn inverse_clarke(inputs: TwoPhase) -> ThreePhase {
    let alpha_half = 0.5 * inputs.alpha;
    let beta_sqrt_3_half = FRAC_SQRT_3_2 * inputs.beta;

    ThreePhase {
        a: inputs.alpha,
        b: -alpha_half + beta_sqrt_3_half,
        c: -alpha_half - beta_sqrt_3_half,
    }
}

/// Park transform
pub fn park(cos_angle: f32, sin_angle: f32, inputs: TwoPhase) -> RotatingFrame {
    RotatingFrame {
        d: cos_angle * inputs.alpha + sin_angle * inputs.beta,
        q: cos_angle * inputs.beta - sin_angle * inputs.alpha,
    }
}

/// Inverse Park transform
pub fn inverse_park(cos_angle: f32, sin_angle: f32, inputs: RotatingFrame) -> TwoPhase {
    TwoPhase {
        alpha: cos_angle * inputs.d - sin_angle * inputs.q,
        beta: sin_angle * inputs.d + cos_angle * inputs.q,
    }
}

/// Clarke followed by Park: phase quantities straight into the rotor frame.
pub fn clarke_park(cos_angle: f32, sin_angle: f32, inputs: ThreePhase) -> RotatingFrame {
    park(cos_angle, sin_angle, clarke(inputs))
}

/// Inverse Park followed by inverse Clarke.
pub fn inverse_clarke_park(cos_angle: f32, sin_angle: f32, inputs: RotatingFrame) -> ThreePhase {
    inverse_clarke(inverse_park(cos_angle, sin_angle, inputs))
}
