//! Rotor alignment: find where the rotor's d-axis sits on the encoder.
//!
//! A fixed voltage vector is applied at electrical angle zero, which pulls
//! the rotor onto it. Once the encoder reading stops moving for
//! `settled_count` consecutive samples, the settled position scaled to
//! electrical radians is the offset between encoder zero and electrical
//! zero.

use log::{info, warn};

use super::{normalized_duty_cycles, Completion};
use crate::driver::{Encoder, MotorDriver, PhaseCurrents, PhaseCurrentsHandler};
use crate::park_clarke::{inverse_clarke_park, RotatingFrame};
use crate::trigonometry::wrap_angle;
use crate::units::{Hertz, Percent, Radians};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignmentConfig {
    /// Amplitude of the aligning voltage vector relative to the bus voltage.
    pub test_voltage: Percent,
    pub sampling_frequency: Hertz,
    /// Samples after which the rotor is considered stuck.
    pub max_samples: usize,
    /// Largest movement between two samples that still counts as settled.
    pub settled_threshold: Radians,
    pub settled_count: usize,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            test_voltage: Percent::new(20),
            sampling_frequency: Hertz::new(1000),
            max_samples: 500,
            settled_threshold: Radians::new(0.001),
            settled_count: 10,
        }
    }
}

#[derive(Debug)]
pub struct MotorAlignment<'a, D, E> {
    driver: &'a mut D,
    encoder: &'a mut E,
}

impl<'a, D: MotorDriver, E: Encoder> MotorAlignment<'a, D, E> {
    pub fn new(driver: &'a mut D, encoder: &'a mut E) -> Self {
        Self { driver, encoder }
    }

    /// Starts aligning the rotor. `on_done` receives the electrical offset,
    /// or `None` if the rotor did not settle within `max_samples`.
    pub fn force_alignment<F>(
        &mut self,
        pole_pairs: usize,
        config: AlignmentConfig,
        on_done: F,
    ) -> AlignmentRun<'_, D, E, F>
    where
        F: FnOnce(Option<Radians>),
    {
        debug_assert!(pole_pairs > 0, "a motor has at least one pole pair");

        let previous_position = self.encoder.read();

        self.driver.stop();
        let voltage = RotatingFrame {
            d: config.test_voltage.fraction(),
            q: 0.,
        };
        let voltages = inverse_clarke_park(1., 0., voltage);
        self.driver.three_phase_pwm_output(normalized_duty_cycles(voltages));
        self.driver.phase_currents_ready(config.sampling_frequency);

        AlignmentRun {
            driver: &mut *self.driver,
            encoder: &mut *self.encoder,
            pole_pairs,
            config,
            samples: 0,
            settled_samples: 0,
            previous_position,
            completion: Completion::new(on_done),
        }
    }
}

/// One alignment in progress.
#[derive(Debug)]
pub struct AlignmentRun<'s, D, E, F>
where
    D: MotorDriver,
    E: Encoder,
    F: FnOnce(Option<Radians>),
{
    driver: &'s mut D,
    encoder: &'s mut E,
    pole_pairs: usize,
    config: AlignmentConfig,
    samples: usize,
    settled_samples: usize,
    previous_position: Radians,
    completion: Completion<F>,
}

impl<D, E, F> AlignmentRun<'_, D, E, F>
where
    D: MotorDriver,
    E: Encoder,
    F: FnOnce(Option<Radians>),
{
    pub fn is_finished(&self) -> bool {
        !self.completion.is_pending()
    }

    fn finish(&mut self, offset: Option<Radians>) {
        self.driver.stop();
        self.completion.complete(offset);
    }
}

impl<D, E, F> PhaseCurrentsHandler for AlignmentRun<'_, D, E, F>
where
    D: MotorDriver,
    E: Encoder,
    F: FnOnce(Option<Radians>),
{
    fn phase_currents_ready(&mut self, _currents: PhaseCurrents) {
        if self.is_finished() {
            return;
        }

        self.samples += 1;
        if self.samples >= self.config.max_samples {
            warn!("rotor did not settle within {} samples", self.config.max_samples);
            self.finish(None);
            return;
        }

        let position = self.encoder.read();
        let movement = wrap_angle((position - self.previous_position).value());

        if libm::fabsf(movement) < self.config.settled_threshold.value() {
            self.settled_samples += 1;
            if self.settled_samples >= self.config.settled_count {
                let offset = Radians::new(position.value() * self.pole_pairs as f32);
                info!("rotor aligned, electrical offset {} rad", offset.value());
                self.finish(Some(offset));
            }
        } else {
            self.settled_samples = 0;
        }

        self.previous_position = position;
    }
}

impl<D, E, F> Drop for AlignmentRun<'_, D, E, F>
where
    D: MotorDriver,
    E: Encoder,
    F: FnOnce(Option<Radians>),
{
    fn drop(&mut self) {
        if !self.is_finished() {
            self.driver.stop();
        }
    }
}
