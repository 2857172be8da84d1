use super::{
    bus_voltage_scale, electrical_cos_sin, CurrentLoop, FieldOrientedController, IdAndIqPoint,
    IdAndIqTunings, TorqueControl,
};
use crate::driver::{PhaseCurrents, PhasePwmDutyCycles};
use crate::trigonometry::TrigonometricFunctions;
use crate::units::{Radians, Volts};

/// Current (torque) control: the d/q set points come straight from the user.
#[derive(Debug, Clone)]
pub struct FieldOrientedTorque<T> {
    trig: T,
    current: CurrentLoop,
    pole_pairs: usize,
}

impl<T: TrigonometricFunctions> FieldOrientedTorque<T> {
    pub fn new(trig: T, pole_pairs: usize) -> Self {
        debug_assert!(pole_pairs > 0, "a motor has at least one pole pair");
        Self {
            trig,
            current: CurrentLoop::new(),
            pole_pairs,
        }
    }
}

impl<T: TrigonometricFunctions> FieldOrientedController for FieldOrientedTorque<T> {
    fn set_pole_pairs(&mut self, pole_pairs: usize) {
        debug_assert!(pole_pairs > 0, "a motor has at least one pole pair");
        self.pole_pairs = pole_pairs;
    }

    fn pole_pairs(&self) -> usize {
        self.pole_pairs
    }

    fn reset(&mut self) {
        self.current.reset();
    }

    fn calculate(&mut self, currents: PhaseCurrents, position: Radians) -> PhasePwmDutyCycles {
        let (cos_angle, sin_angle) = electrical_cos_sin(&self.trig, position, self.pole_pairs);
        self.current.calculate(currents, cos_angle, sin_angle)
    }
}

impl<T: TrigonometricFunctions> TorqueControl for FieldOrientedTorque<T> {
    fn set_point(&mut self, point: IdAndIqPoint) {
        self.current.d.set_point(point.id.value());
        self.current.q.set_point(point.iq.value());
    }

    fn set_current_tunings(&mut self, vdc: Volts, tunings: IdAndIqTunings) {
        let scale = bus_voltage_scale(vdc);
        self.current.set_tunings(IdAndIqTunings {
            d: tunings.d.scaled(scale),
            q: tunings.q.scaled(scale),
        });
    }
}
