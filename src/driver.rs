//! Boundary between the control code and the hardware adaptation layer.
//!
//! The hardware glue implements [`MotorDriver`] and [`Encoder`]. Sampling is
//! push based: once [`MotorDriver::phase_currents_ready`] armed the ADC
//! trigger, the glue hands every sample to the [`PhaseCurrentsHandler`] that
//! currently owns the driver, from the sampling interrupt.
//!
//! Only one service may drive the motor at a time. Every service takes the
//! driver and encoder by `&mut`, so that rule is enforced by the borrow
//! checker rather than by convention.

use crate::units::{Ampere, Hertz, Percent, Radians};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseCurrents {
    pub a: Ampere,
    pub b: Ampere,
    pub c: Ampere,
}

impl PhaseCurrents {
    pub const fn new(a: f32, b: f32, c: f32) -> Self {
        Self {
            a: Ampere::new(a),
            b: Ampere::new(b),
            c: Ampere::new(c),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhasePwmDutyCycles {
    pub a: Percent,
    pub b: Percent,
    pub c: Percent,
}

impl PhasePwmDutyCycles {
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self {
            a: Percent::new(a),
            b: Percent::new(b),
            c: Percent::new(c),
        }
    }
}

pub trait MotorDriver {
    /// Arms periodic phase current sampling at `frequency`. Samples are
    /// delivered until [`stop`](MotorDriver::stop) is called.
    fn phase_currents_ready(&mut self, frequency: Hertz);
    /// Drops the sampling registration made with
    /// [`phase_currents_ready`](MotorDriver::phase_currents_ready).
    fn release_phase_currents(&mut self) {}
    /// Applies the duty cycles immediately.
    fn three_phase_pwm_output(&mut self, duty_cycles: PhasePwmDutyCycles);
    /// Enables the power stage and sampling.
    fn start(&mut self);
    /// Disables the power stage and sampling.
    fn stop(&mut self);
    fn base_frequency(&self) -> Hertz;
}

pub trait Encoder {
    /// Mechanical rotor position, wrapped to (-π, π].
    fn read(&mut self) -> Radians;
    fn set(&mut self, value: Radians);
    fn set_zero(&mut self) {
        self.set(Radians::ZERO);
    }
}

/// Receives the phase current samples of an armed [`MotorDriver`].
pub trait PhaseCurrentsHandler {
    fn phase_currents_ready(&mut self, currents: PhaseCurrents);
}

impl<T: PhaseCurrentsHandler + ?Sized> PhaseCurrentsHandler for &mut T {
    fn phase_currents_ready(&mut self, currents: PhaseCurrents) {
        (**self).phase_currents_ready(currents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_doubles::EncoderMock;

    #[test]
    fn set_zero_overrides_queued_positions() {
        let mut encoder = EncoderMock::new([1.5, 2.5]);

        encoder.set_zero();

        assert_eq!(encoder.read(), Radians::ZERO);
        assert_eq!(encoder.read(), Radians::ZERO);
    }

    #[test]
    fn handler_behind_a_reference_receives_samples() {
        struct Counter(usize);

        impl PhaseCurrentsHandler for Counter {
            fn phase_currents_ready(&mut self, _currents: PhaseCurrents) {
                self.0 += 1;
            }
        }

        let mut counter = Counter(0);
        let mut handler = &mut counter;
        handler.phase_currents_ready(PhaseCurrents::default());
        PhaseCurrentsHandler::phase_currents_ready(&mut handler, PhaseCurrents::new(1., 0., -1.));

        assert_eq!(counter.0, 2);
    }
}
