use core::time::Duration;

use super::{
    bus_voltage_scale, electrical_cos_sin, CurrentLoop, FieldOrientedController, IdAndIqTunings,
    SpeedControl, SpeedEstimator, SpeedTunings,
};
use crate::driver::{PhaseCurrents, PhasePwmDutyCycles};
use crate::pid::{Pid, PidLimits};
use crate::trigonometry::TrigonometricFunctions;
use crate::units::{Ampere, Radians, RadiansPerSecond, Volts};

/// Speed control cascaded onto the current loop.
///
/// The speed loop runs once per current loop sample and overwrites the
/// q-axis current set point each time; its output is limited to
/// `±max_current`.
#[derive(Debug, Clone)]
pub struct FieldOrientedSpeed<T> {
    trig: T,
    current: CurrentLoop,
    speed: Pid,
    estimator: SpeedEstimator,
    pole_pairs: usize,
    dt: f32,
}

impl<T: TrigonometricFunctions> FieldOrientedSpeed<T> {
    pub fn new(trig: T, pole_pairs: usize, max_current: Ampere, time_step: Duration) -> Self {
        debug_assert!(pole_pairs > 0, "a motor has at least one pole pair");
        debug_assert!(max_current.value() > 0., "current limit must be positive");

        let dt = time_step.as_secs_f32();
        let mut speed = Pid::new(
            SpeedTunings::default(),
            PidLimits::symmetric(max_current.value()),
        );
        speed.enable();

        Self {
            trig,
            current: CurrentLoop::new(),
            speed,
            estimator: SpeedEstimator::new(dt),
            pole_pairs,
            dt,
        }
    }

    /// Last q-axis current demanded by the speed loop.
    pub fn torque_current(&self) -> Ampere {
        Ampere::new(self.current.q.current_set_point())
    }
}

impl<T: TrigonometricFunctions> FieldOrientedController for FieldOrientedSpeed<T> {
    fn set_pole_pairs(&mut self, pole_pairs: usize) {
        debug_assert!(pole_pairs > 0, "a motor has at least one pole pair");
        self.pole_pairs = pole_pairs;
    }

    fn pole_pairs(&self) -> usize {
        self.pole_pairs
    }

    fn reset(&mut self) {
        self.speed.disable();
        self.speed.enable();
        self.current.reset();
        self.estimator.reset();
    }

    fn calculate(&mut self, currents: PhaseCurrents, position: Radians) -> PhasePwmDutyCycles {
        let (cos_angle, sin_angle) = electrical_cos_sin(&self.trig, position, self.pole_pairs);

        let speed = self.estimator.update(position.value());
        self.current.q.set_point(self.speed.process(speed));

        self.current.calculate(currents, cos_angle, sin_angle)
    }
}

impl<T: TrigonometricFunctions> SpeedControl for FieldOrientedSpeed<T> {
    fn set_point(&mut self, point: RadiansPerSecond) {
        self.speed.set_point(point.value());
        self.current.d.set_point(0.);
    }

    fn set_current_tunings(&mut self, vdc: Volts, tunings: IdAndIqTunings) {
        let scale = bus_voltage_scale(vdc);
        self.current.set_tunings(IdAndIqTunings {
            d: tunings.d.scaled(scale).discretized(self.dt),
            q: tunings.q.scaled(scale).discretized(self.dt),
        });
    }

    fn set_speed_tunings(&mut self, tunings: SpeedTunings) {
        self.speed.set_tunings(tunings.discretized(self.dt));
    }
}
