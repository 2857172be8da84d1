//! Space vector modulation: stationary frame voltages to per-phase duty
//! cycles.

use crate::park_clarke::{ThreePhase, TwoPhase};
use crate::{FRAC_1_SQRT_3, FRAC_SQRT_3_2};

/// Space vector modulation using min/max common mode injection.
///
/// The phase voltages are shifted by the mean of their extremes, which
/// centres them in the available range and gives the same linear range as
/// classic sector based SVPWM. The input is normalised to the bus voltage;
/// the returned duty cycles are clipped into `0..=1` and a zero vector maps
/// to `0.5` on every phase.
pub fn svpwm(value: TwoPhase) -> ThreePhase {
    let alpha_half = 0.5 * value.alpha;
    let beta_sqrt_3_half = FRAC_SQRT_3_2 * value.beta;

    let v_a = value.alpha;
    let v_b = -alpha_half + beta_sqrt_3_half;
    let v_c = -alpha_half - beta_sqrt_3_half;

    let v_max = v_a.max(v_b).max(v_c);
    let v_min = v_a.min(v_b).min(v_c);
    let v_common = -0.5 * (v_max + v_min);

    ThreePhase {
        a: clip(v_a + v_common),
        b: clip(v_b + v_common),
        c: clip(v_c + v_common),
    }
}

fn clip(duty_cycle: f32) -> f32 {
    (duty_cycle * FRAC_1_SQRT_3 + 0.5).clamp(0., 1.)
}
