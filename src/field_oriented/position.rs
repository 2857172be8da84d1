use core::time::Duration;

use super::{
    bus_voltage_scale, electrical_cos_sin, CurrentLoop, FieldOrientedController, IdAndIqTunings,
    PositionControl, PositionTunings, SpeedEstimator, SpeedTunings,
};
use crate::driver::{PhaseCurrents, PhasePwmDutyCycles};
use crate::pid::{Pid, PidLimits};
use crate::trigonometry::{wrap_angle, TrigonometricFunctions};
use crate::units::{Ampere, Radians, RadiansPerSecond, Volts};

/// Position control: position loop into speed loop into current loop.
///
/// The position error is taken the short way round the circle, so a target of
/// `π - ε` seen from `-π + ε` is a small backwards move.
#[derive(Debug, Clone)]
pub struct FieldOrientedPosition<T> {
    trig: T,
    current: CurrentLoop,
    speed: Pid,
    position: Pid,
    estimator: SpeedEstimator,
    pole_pairs: usize,
    dt: f32,
}

impl<T: TrigonometricFunctions> FieldOrientedPosition<T> {
    pub fn new(
        trig: T,
        pole_pairs: usize,
        max_current: Ampere,
        max_speed: RadiansPerSecond,
        time_step: Duration,
    ) -> Self {
        debug_assert!(pole_pairs > 0, "a motor has at least one pole pair");
        debug_assert!(max_current.value() > 0., "current limit must be positive");
        debug_assert!(max_speed.value() > 0., "speed limit must be positive");

        let dt = time_step.as_secs_f32();
        let mut speed = Pid::new(
            SpeedTunings::default(),
            PidLimits::symmetric(max_current.value()),
        );
        let mut position = Pid::new(
            PositionTunings::default(),
            PidLimits::symmetric(max_speed.value()),
        );
        speed.enable();
        position.enable();

        Self {
            trig,
            current: CurrentLoop::new(),
            speed,
            position,
            estimator: SpeedEstimator::new(dt),
            pole_pairs,
            dt,
        }
    }

    /// Last speed demanded by the position loop.
    pub fn speed_demand(&self) -> RadiansPerSecond {
        RadiansPerSecond::new(self.speed.current_set_point())
    }

    /// Last q-axis current demanded by the speed loop.
    pub fn torque_current(&self) -> Ampere {
        Ampere::new(self.current.q.current_set_point())
    }
}

impl<T: TrigonometricFunctions> FieldOrientedController for FieldOrientedPosition<T> {
    fn set_pole_pairs(&mut self, pole_pairs: usize) {
        debug_assert!(pole_pairs > 0, "a motor has at least one pole pair");
        self.pole_pairs = pole_pairs;
    }

    fn pole_pairs(&self) -> usize {
        self.pole_pairs
    }

    fn reset(&mut self) {
        self.position.disable();
        self.speed.disable();
        self.position.enable();
        self.speed.enable();
        self.current.reset();
        self.estimator.reset();
    }

    fn calculate(&mut self, currents: PhaseCurrents, position: Radians) -> PhasePwmDutyCycles {
        let (cos_angle, sin_angle) = electrical_cos_sin(&self.trig, position, self.pole_pairs);

        let target = self.position.current_set_point();
        let measurement = target - wrap_angle(target - position.value());
        self.speed.set_point(self.position.process(measurement));

        let speed = self.estimator.update(position.value());
        self.current.q.set_point(self.speed.process(speed));

        self.current.calculate(currents, cos_angle, sin_angle)
    }
}

impl<T: TrigonometricFunctions> PositionControl for FieldOrientedPosition<T> {
    fn set_point(&mut self, point: Radians) {
        self.position.set_point(wrap_angle(point.value()));
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

    fn set_position_tunings(&mut self, tunings: PositionTunings) {
        self.position.set_tunings(tunings.discretized(self.dt));
    }
}
