//! Controllers tie a field oriented control cycle to the hardware.
//!
//! A controller registers for phase current samples once, when it is built,
//! at the driver's base frequency. Every sample delivered while the
//! controller is running is turned into one control cycle:
//!
//! ```text
//! encoder.read() -> foc.calculate(currents, position) -> driver.three_phase_pwm_output()
//! ```
//!
//! The registration is released when the controller is dropped.

use log::debug;

use crate::driver::{Encoder, MotorDriver, PhaseCurrents, PhaseCurrentsHandler};
use crate::field_oriented::{
    FieldOrientedController, FieldOrientedPosition, FieldOrientedSpeed, FieldOrientedTorque,
    IdAndIqPoint, IdAndIqTunings, PositionControl, PositionTunings, SpeedControl, SpeedTunings,
    TorqueControl,
};
use crate::trigonometry::TrigonometricFunctions;
use crate::units::{Hertz, Radians, RadiansPerSecond, Volts};

/// Operations every controller variant supports.
pub trait Controller {
    fn enable(&mut self);
    fn disable(&mut self);
    fn is_running(&self) -> bool;
    fn set_current_tunings(&mut self, vdc: Volts, tunings: IdAndIqTunings);
    fn base_frequency(&self) -> Hertz;
}

/// Running state and sampling loop shared by all controller variants.
#[derive(Debug)]
pub struct ControllerCore<'a, D: MotorDriver, E: Encoder, F> {
    driver: &'a mut D,
    encoder: &'a mut E,
    foc: F,
    running: bool,
}

impl<'a, D: MotorDriver, E: Encoder, F: FieldOrientedController> ControllerCore<'a, D, E, F> {
    pub fn new(driver: &'a mut D, encoder: &'a mut E, foc: F) -> Self {
        let frequency = driver.base_frequency();
        driver.phase_currents_ready(frequency);

        Self {
            driver,
            encoder,
            foc,
            running: false,
        }
    }

    pub fn enable(&mut self) {
        debug!("controller enabled");
        self.running = true;
        self.foc.reset();
        self.driver.start();
    }

    pub fn disable(&mut self) {
        debug!("controller disabled");
        self.running = false;
        self.driver.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn base_frequency(&self) -> Hertz {
        self.driver.base_frequency()
    }

    pub fn foc(&self) -> &F {
        &self.foc
    }

    pub fn foc_mut(&mut self) -> &mut F {
        &mut self.foc
    }
}

impl<D: MotorDriver, E: Encoder, F: FieldOrientedController> PhaseCurrentsHandler
    for ControllerCore<'_, D, E, F>
{
    fn phase_currents_ready(&mut self, currents: PhaseCurrents) {
        // Late samples after stop() are dropped.
        if !self.running {
            return;
        }

        let position = self.encoder.read();
        let duty_cycles = self.foc.calculate(currents, position);
        self.driver.three_phase_pwm_output(duty_cycles);
    }
}

impl<D: MotorDriver, E: Encoder, F> Drop for ControllerCore<'_, D, E, F> {
    fn drop(&mut self) {
        if self.running {
            self.driver.stop();
        }
        self.driver.release_phase_currents();
    }
}

macro_rules! controller {
    ($(#[$meta:meta])* $name:ident, $foc:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name<'a, D: MotorDriver, E: Encoder, T> {
            core: ControllerCore<'a, D, E, $foc<T>>,
        }

        impl<'a, D: MotorDriver, E: Encoder, T: TrigonometricFunctions> $name<'a, D, E, T> {
            pub fn new(driver: &'a mut D, encoder: &'a mut E, foc: $foc<T>) -> Self {
                Self {
                    core: ControllerCore::new(driver, encoder, foc),
                }
            }

            pub fn foc(&self) -> &$foc<T> {
                self.core.foc()
            }
        }

        impl<D: MotorDriver, E: Encoder, T: TrigonometricFunctions>
            Controller for $name<'_, D, E, T>
        {
            fn enable(&mut self) {
                self.core.enable();
            }

            fn disable(&mut self) {
                self.core.disable();
            }

            fn is_running(&self) -> bool {
                self.core.is_running()
            }

            fn set_current_tunings(&mut self, vdc: Volts, tunings: IdAndIqTunings) {
                self.core.foc_mut().set_current_tunings(vdc, tunings);
            }

            fn base_frequency(&self) -> Hertz {
                self.core.base_frequency()
            }
        }

        impl<D: MotorDriver, E: Encoder, T: TrigonometricFunctions>
            PhaseCurrentsHandler for $name<'_, D, E, T>
        {
            fn phase_currents_ready(&mut self, currents: PhaseCurrents) {
                self.core.phase_currents_ready(currents);
            }
        }
    };
}

controller!(
    /// Controls the d/q currents directly.
    TorqueController,
    FieldOrientedTorque
);
controller!(
    /// Controls the mechanical speed through the q-axis current.
    SpeedController,
    FieldOrientedSpeed
);
controller!(
    /// Controls the mechanical position through speed and q-axis current.
    PositionController,
    FieldOrientedPosition
);

impl<D: MotorDriver, E: Encoder, T: TrigonometricFunctions> TorqueController<'_, D, E, T> {
    pub fn set_point(&mut self, point: IdAndIqPoint) {
        TorqueControl::set_point(self.core.foc_mut(), point);
    }
}

impl<D: MotorDriver, E: Encoder, T: TrigonometricFunctions> SpeedController<'_, D, E, T> {
    pub fn set_point(&mut self, point: RadiansPerSecond) {
        SpeedControl::set_point(self.core.foc_mut(), point);
    }

    pub fn set_speed_tunings(&mut self, tunings: SpeedTunings) {
        SpeedControl::set_speed_tunings(self.core.foc_mut(), tunings);
    }

    pub fn set_tunings(&mut self, vdc: Volts, speed: SpeedTunings, current: IdAndIqTunings) {
        SpeedControl::set_tunings(self.core.foc_mut(), vdc, speed, current);
    }
}

impl<D: MotorDriver, E: Encoder, T: TrigonometricFunctions> PositionController<'_, D, E, T> {
    pub fn set_point(&mut self, point: Radians) {
        PositionControl::set_point(self.core.foc_mut(), point);
    }

    pub fn set_speed_tunings(&mut self, tunings: SpeedTunings) {
        PositionControl::set_speed_tunings(self.core.foc_mut(), tunings);
    }

    pub fn set_position_tunings(&mut self, tunings: PositionTunings) {
        PositionControl::set_position_tunings(self.core.foc_mut(), tunings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::PidTunings;
    use crate::test_doubles::{DriverMock, EncoderMock, Event};
    use crate::trigonometry::LibmTrigonometry;
    use crate::units::Ampere;
    use core::time::Duration;

    const BASE_FREQUENCY: Hertz = Hertz::new(20_000);

    fn tunings() -> IdAndIqTunings {
        IdAndIqTunings {
            d: PidTunings::new(1., 0.1, 0.),
            q: PidTunings::new(1., 0.1, 0.),
        }
    }

    #[test]
    fn registers_once_at_base_frequency() {
        let mut driver = DriverMock::new(BASE_FREQUENCY);
        let mut encoder = EncoderMock::default();
        let log = driver.log();

        let mut controller = TorqueController::new(
            &mut driver,
            &mut encoder,
            FieldOrientedTorque::new(LibmTrigonometry, 7),
        );
        controller.enable();
        controller.disable();
        controller.enable();

        assert_eq!(
            log.count(|event| matches!(event, Event::PhaseCurrentsReady(_))),
            1
        );
        assert_eq!(log.events()[0], Event::PhaseCurrentsReady(BASE_FREQUENCY));
    }

    #[test]
    fn running_state_follows_enable_and_disable() {
        let mut driver = DriverMock::new(BASE_FREQUENCY);
        let mut encoder = EncoderMock::default();
        let log = driver.log();

        let mut controller = TorqueController::new(
            &mut driver,
            &mut encoder,
            FieldOrientedTorque::new(LibmTrigonometry, 7),
        );
        assert!(!controller.is_running());

        for _ in 0..3 {
            controller.enable();
            assert!(controller.is_running());
            controller.disable();
            assert!(!controller.is_running());
        }

        assert_eq!(log.count(|event| *event == Event::Start), 3);
        assert_eq!(log.count(|event| *event == Event::Stop), 3);
    }

    #[test]
    fn samples_while_running_drive_the_pwm() {
        let mut driver = DriverMock::new(BASE_FREQUENCY);
        let mut encoder = EncoderMock::new([0.1, 0.2]);
        let log = driver.log();

        {
            let mut controller = TorqueController::new(
                &mut driver,
                &mut encoder,
                FieldOrientedTorque::new(LibmTrigonometry, 1),
            );
            controller.set_current_tunings(Volts::new(24.), tunings());
            controller.set_point(IdAndIqPoint {
                id: Ampere::ZERO,
                iq: Ampere::new(1.),
            });

            controller.phase_currents_ready(PhaseCurrents::default());
            assert!(log.outputs().is_empty());

            controller.enable();
            controller.phase_currents_ready(PhaseCurrents::default());
            controller.phase_currents_ready(PhaseCurrents::default());
        }

        assert_eq!(log.outputs().len(), 2);
        assert_ne!(log.outputs()[0], crate::driver::PhasePwmDutyCycles::new(50, 50, 50));
        assert_eq!(encoder.reads(), 2);
    }

    #[test]
    fn drop_stops_and_releases() {
        let mut driver = DriverMock::new(BASE_FREQUENCY);
        let mut encoder = EncoderMock::default();
        let log = driver.log();

        let mut controller = SpeedController::new(
            &mut driver,
            &mut encoder,
            FieldOrientedSpeed::new(
                LibmTrigonometry,
                4,
                Ampere::new(3.),
                BASE_FREQUENCY.period(),
            ),
        );
        controller.enable();
        log.clear();
        drop(controller);

        assert_eq!(log.events(), [Event::Stop, Event::Released]);
    }

    #[test]
    fn enable_resets_the_control_loops() {
        let mut driver = DriverMock::new(BASE_FREQUENCY);
        let mut encoder = EncoderMock::default();
        let log = driver.log();

        let mut controller = SpeedController::new(
            &mut driver,
            &mut encoder,
            FieldOrientedSpeed::new(
                LibmTrigonometry,
                4,
                Ampere::new(3.),
                Duration::from_micros(50),
            ),
        );
        controller.set_tunings(
            Volts::new(24.),
            PidTunings::new(0.01, 1., 0.),
            tunings(),
        );
        controller.set_point(RadiansPerSecond::new(100.));

        controller.enable();
        controller.phase_currents_ready(PhaseCurrents::default());
        let first = log.outputs()[0];
        for _ in 0..10 {
            controller.phase_currents_ready(PhaseCurrents::default());
        }
        controller.disable();
        controller.enable();
        controller.phase_currents_ready(PhaseCurrents::default());

        assert_eq!(log.outputs().last().copied(), Some(first));
    }

    #[test]
    fn position_controller_forwards_set_point() {
        let mut driver = DriverMock::new(BASE_FREQUENCY);
        let mut encoder = EncoderMock::new([0.]);

        let mut controller = PositionController::new(
            &mut driver,
            &mut encoder,
            FieldOrientedPosition::new(
                LibmTrigonometry,
                2,
                Ampere::new(1.),
                RadiansPerSecond::new(10.),
                BASE_FREQUENCY.period(),
            ),
        );
        controller.set_position_tunings(PidTunings::new(2., 0., 0.));
        controller.set_speed_tunings(PidTunings::new(0.1, 0., 0.));
        controller.set_point(Radians::new(1.));
        controller.enable();

        controller.phase_currents_ready(PhaseCurrents::default());

        assert!((controller.foc().speed_demand().value() - 2.).abs() < 1e-5);
        assert_eq!(controller.base_frequency(), BASE_FREQUENCY);
    }
}
