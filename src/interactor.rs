//! Operator facing front of a controller.
//!
//! Operators tune one gain at a time. [`FocInteractor`] keeps the complete
//! set of gains, merges every partial update into it and hands the full set
//! to the controller, which only ever accepts complete tunings.

use crate::controller::{Controller, PositionController, SpeedController, TorqueController};
use crate::driver::{Encoder, MotorDriver};
use crate::field_oriented::{IdAndIqPoint, IdAndIqTunings, PositionTunings, SpeedTunings};
use crate::pid::PidParameters;
use crate::trigonometry::TrigonometricFunctions;
use crate::units::{Ampere, NewtonMeter, Radians, RadiansPerSecond, Volts};

#[derive(Debug)]
pub struct FocInteractor<C> {
    vdc: Volts,
    controller: C,
    current_tunings: IdAndIqTunings,
    speed_tunings: SpeedTunings,
    position_tunings: PositionTunings,
}

impl<C: Controller> FocInteractor<C> {
    pub fn new(vdc: Volts, controller: C) -> Self {
        Self {
            vdc,
            controller,
            current_tunings: IdAndIqTunings::default(),
            speed_tunings: SpeedTunings::default(),
            position_tunings: PositionTunings::default(),
        }
    }

    pub fn set_dq_pid_parameters(&mut self, d: PidParameters, q: PidParameters) {
        self.current_tunings.d.merge(d);
        self.current_tunings.q.merge(q);
        self.controller.set_current_tunings(self.vdc, self.current_tunings);
    }

    pub fn start(&mut self) {
        self.controller.enable();
    }

    pub fn stop(&mut self) {
        self.controller.disable();
    }

    pub fn vdc(&self) -> Volts {
        self.vdc
    }

    pub fn current_tunings(&self) -> IdAndIqTunings {
        self.current_tunings
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }
}

impl<D, E, T> FocInteractor<TorqueController<'_, D, E, T>>
where
    D: MotorDriver,
    E: Encoder,
    T: TrigonometricFunctions,
{
    /// Commands the q-axis current, with a torque constant of 1 A/Nm.
    pub fn set_torque(&mut self, torque: NewtonMeter) {
        self.controller.set_point(IdAndIqPoint {
            id: Ampere::ZERO,
            iq: Ampere::new(torque.value()),
        });
    }
}

impl<D, E, T> FocInteractor<SpeedController<'_, D, E, T>>
where
    D: MotorDriver,
    E: Encoder,
    T: TrigonometricFunctions,
{
    /// Accepts [`RadiansPerSecond`] or [`RevPerMinute`](crate::units::RevPerMinute).
    pub fn set_speed(&mut self, speed: impl Into<RadiansPerSecond>) {
        self.controller.set_point(speed.into());
    }

    pub fn set_speed_pid_parameters(&mut self, parameters: PidParameters) {
        self.speed_tunings.merge(parameters);
        self.controller
            .set_tunings(self.vdc, self.speed_tunings, self.current_tunings);
    }
}

impl<D, E, T> FocInteractor<PositionController<'_, D, E, T>>
where
    D: MotorDriver,
    E: Encoder,
    T: TrigonometricFunctions,
{
    pub fn set_position(&mut self, position: Radians) {
        self.controller.set_point(position);
    }

    pub fn set_speed_pid_parameters(&mut self, parameters: PidParameters) {
        self.speed_tunings.merge(parameters);
        self.controller.set_speed_tunings(self.speed_tunings);
    }

    pub fn set_position_pid_parameters(&mut self, parameters: PidParameters) {
        self.position_tunings.merge(parameters);
        self.controller.set_position_tunings(self.position_tunings);
    }
}
