//! Field oriented control: phase currents and rotor angle in, PWM duty
//! cycles out.
//!
//! All variants share the inner d/q current loop ([`CurrentLoop`]). The speed
//! and position variants cascade outer loops onto it that produce the q-axis
//! current set point on every sample.

mod position;
mod speed;
mod torque;

pub use position::FieldOrientedPosition;
pub use speed::FieldOrientedSpeed;
pub use torque::FieldOrientedTorque;

use crate::driver::{PhaseCurrents, PhasePwmDutyCycles};
use crate::park_clarke::{clarke_park, inverse_park, RotatingFrame, ThreePhase};
use crate::pid::{Pid, PidLimits, PidTunings};
use crate::svpwm::svpwm;
use crate::trigonometry::{wrap_angle, TrigonometricFunctions};
use crate::units::{Ampere, Percent, Radians, RadiansPerSecond, Volts};
use crate::FRAC_1_SQRT_3;

pub type SpeedTunings = PidTunings;
pub type PositionTunings = PidTunings;

/// Current set points in the rotor frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdAndIqPoint {
    /// Flux producing current, usually zero.
    pub id: Ampere,
    /// Torque producing current.
    pub iq: Ampere,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdAndIqTunings {
    pub d: PidTunings,
    pub q: PidTunings,
}

pub trait FieldOrientedController {
    fn set_pole_pairs(&mut self, pole_pairs: usize);
    fn pole_pairs(&self) -> usize;
    /// Clears all loop history. Called on every transition into running.
    fn reset(&mut self);
    /// One control cycle. `position` is the mechanical rotor angle.
    fn calculate(&mut self, currents: PhaseCurrents, position: Radians) -> PhasePwmDutyCycles;
}

pub trait TorqueControl: FieldOrientedController {
    fn set_point(&mut self, point: IdAndIqPoint);
    /// Gains in volts per ampere; normalised to the bus voltage internally.
    fn set_current_tunings(&mut self, vdc: Volts, tunings: IdAndIqTunings);
}

pub trait SpeedControl: FieldOrientedController {
    fn set_point(&mut self, point: RadiansPerSecond);
    fn set_current_tunings(&mut self, vdc: Volts, tunings: IdAndIqTunings);
    /// Continuous gains in amperes per radian per second.
    fn set_speed_tunings(&mut self, tunings: SpeedTunings);

    fn set_tunings(&mut self, vdc: Volts, speed: SpeedTunings, current: IdAndIqTunings) {
        self.set_speed_tunings(speed);
        self.set_current_tunings(vdc, current);
    }
}

pub trait PositionControl: FieldOrientedController {
    fn set_point(&mut self, point: Radians);
    fn set_current_tunings(&mut self, vdc: Volts, tunings: IdAndIqTunings);
    fn set_speed_tunings(&mut self, tunings: SpeedTunings);
    /// Continuous gains in radians per second per radian.
    fn set_position_tunings(&mut self, tunings: PositionTunings);
}

/// Converts physical current loop gains into gains on the normalised
/// modulator input.
fn bus_voltage_scale(vdc: Volts) -> f32 {
    debug_assert!(vdc.value() > 0., "bus voltage must be positive");
    1. / (FRAC_1_SQRT_3 * vdc.value())
}

fn to_percent(duty_cycle: f32) -> Percent {
    Percent::new((duty_cycle * 100. + 0.5) as u8)
}

/// Mechanical to electrical angle, cosine and sine in one go.
fn electrical_cos_sin<T: TrigonometricFunctions>(
    trig: &T,
    position: Radians,
    pole_pairs: usize,
) -> (f32, f32) {
    let electrical_angle = position.value() * pole_pairs as f32;
    let (sin_angle, cos_angle) = trig.sine_cosine(electrical_angle);
    (cos_angle, sin_angle)
}

/// The d/q current PI(D) pair with the transforms around it.
#[derive(Debug, Clone)]
struct CurrentLoop {
    d: Pid,
    q: Pid,
}

impl CurrentLoop {
    fn new() -> Self {
        let mut d = Pid::new(PidTunings::default(), PidLimits::symmetric(1.));
        let mut q = Pid::new(PidTunings::default(), PidLimits::symmetric(1.));
        d.enable();
        q.enable();

        Self { d, q }
    }

    fn reset(&mut self) {
        self.d.disable();
        self.q.disable();

        self.d.enable();
        self.q.enable();
    }

    fn set_tunings(&mut self, tunings: IdAndIqTunings) {
        self.d.set_tunings(tunings.d);
        self.q.set_tunings(tunings.q);
    }

    fn calculate(
        &mut self,
        currents: PhaseCurrents,
        cos_angle: f32,
        sin_angle: f32,
    ) -> PhasePwmDutyCycles {
        let id_and_iq = clarke_park(
            cos_angle,
            sin_angle,
            ThreePhase {
                a: currents.a.value(),
                b: currents.b.value(),
                c: currents.c.value(),
            },
        );

        let voltage = RotatingFrame {
            d: self.d.process(id_and_iq.d),
            q: self.q.process(id_and_iq.q),
        };
        let output = svpwm(inverse_park(cos_angle, sin_angle, voltage));

        PhasePwmDutyCycles {
            a: to_percent(output.a),
            b: to_percent(output.b),
            c: to_percent(output.c),
        }
    }
}

/// Mechanical speed from consecutive positions, wrap corrected.
#[derive(Debug, Clone)]
struct SpeedEstimator {
    previous_position: Option<f32>,
    dt: f32,
}

impl SpeedEstimator {
    fn new(dt: f32) -> Self {
        debug_assert!(dt > 0., "time step must be positive");
        Self {
            previous_position: None,
            dt,
        }
    }

    fn reset(&mut self) {
        self.previous_position = None;
    }

    /// The first sample after a reset only sets the baseline and reads as
    /// standstill.
    fn update(&mut self, position: f32) -> f32 {
        let speed = match self.previous_position {
            Some(previous) => wrap_angle(position - previous) / self.dt,
            None => 0.,
        };
        self.previous_position = Some(position);

        speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    #[test]
    fn duty_rounding() {
        assert_eq!(to_percent(0.5), Percent::new(50));
        assert_eq!(to_percent(0.504), Percent::new(50));
        assert_eq!(to_percent(0.506), Percent::new(51));
        assert_eq!(to_percent(0.), Percent::new(0));
        assert_eq!(to_percent(1.), Percent::new(100));
    }

    #[test]
    fn bus_voltage_normalisation() {
        let scale = bus_voltage_scale(Volts::new(24.));

        assert!((scale - 1. / (24. / 3f32.sqrt())).abs() < 1e-6);
    }

    #[test]
    fn speed_estimator_starts_at_standstill() {
        let mut estimator = SpeedEstimator::new(0.001);

        assert_eq!(estimator.update(2.5), 0.);
        assert!((estimator.update(2.501) - 1.).abs() < 1e-2);
    }

    #[test]
    fn speed_estimator_handles_wrap_around() {
        let mut estimator = SpeedEstimator::new(0.001);
        estimator.update(PI - 0.001);

        // Crossing +π to -π is a small forward step, not a -2π jump.
        let speed = estimator.update(-PI + 0.001);
        assert!((speed - 2.).abs() < 0.05, "{speed}");

        let speed = estimator.update(PI - 0.001);
        assert!((speed + 2.).abs() < 0.05, "{speed}");
    }

    #[test]
    fn speed_estimator_reset_rebaselines() {
        let mut estimator = SpeedEstimator::new(0.001);
        estimator.update(0.);
        estimator.update(0.1);

        estimator.reset();

        assert_eq!(estimator.update(3.), 0.);
    }

    #[test]
    fn zero_current_loop_output_is_midpoint() {
        let mut current_loop = CurrentLoop::new();

        let duty = current_loop.calculate(PhaseCurrents::default(), 1., 0.);

        assert_eq!(duty, PhasePwmDutyCycles::new(50, 50, 50));
    }
}
