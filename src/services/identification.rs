//! Motor parameter identification.
//!
//! Three independent procedures, run one at a time:
//!
//! - resistance: a small DC voltage across the A-B line, averaged current;
//! - inductance: a voltage step across the A-B line, slope of the first two
//!   current samples;
//! - pole pairs: the voltage vector is stepped through a number of electrical
//!   revolutions while the encoder tracks how far the rotor turned.
//!
//! Resistance and inductance are line-to-line values; convert them with
//! [`WindingConfiguration`].

use core::f32::consts::{PI, TAU};

use log::{info, warn};

use super::{normalized_duty_cycles, Completion};
use crate::driver::{
    Encoder, MotorDriver, PhaseCurrents, PhaseCurrentsHandler, PhasePwmDutyCycles,
};
use crate::park_clarke::{inverse_clarke_park, RotatingFrame};
use crate::trigonometry::wrap_angle;
use crate::units::{Ampere, Henry, Hertz, Ohm, Percent, Radians, Volts};

const STEPS_PER_REVOLUTION: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResistanceConfig {
    pub test_voltage: Percent,
    pub sampling_frequency: Hertz,
    pub sample_count: usize,
    /// Average currents at or below this are treated as no measurement.
    pub min_current: Ampere,
}

impl Default for ResistanceConfig {
    fn default() -> Self {
        Self {
            test_voltage: Percent::new(5),
            sampling_frequency: Hertz::new(1000),
            sample_count: 64,
            min_current: Ampere::new(0.01),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InductanceConfig {
    pub test_voltage: Percent,
    pub sampling_frequency: Hertz,
    pub min_current_change: Ampere,
    /// Samples held at the neutral 50 % duty before the step is applied.
    pub settle_samples: usize,
}

impl Default for InductanceConfig {
    fn default() -> Self {
        Self {
            test_voltage: Percent::new(5),
            sampling_frequency: Hertz::new(10_000),
            min_current_change: Ampere::new(0.001),
            settle_samples: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolePairsConfig {
    pub test_voltage: Percent,
    pub electrical_revolutions: usize,
    /// Rate at which the voltage vector advances one step.
    pub sampling_frequency: Hertz,
    pub min_rotation: Radians,
}

impl Default for PolePairsConfig {
    fn default() -> Self {
        Self {
            test_voltage: Percent::new(20),
            electrical_revolutions: 5,
            sampling_frequency: Hertz::new(1000),
            min_rotation: Radians::new(PI / 2.),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WindingConfiguration {
    /// Star: the A-B line spans two phase windings.
    #[default]
    Wye,
    /// The A-B line is one winding in parallel with the other two in series.
    Delta,
}

impl WindingConfiguration {
    pub fn phase_resistance(self, line_to_line: Ohm) -> Ohm {
        line_to_line * self.line_to_phase()
    }

    pub fn phase_inductance(self, line_to_line: Henry) -> Henry {
        line_to_line * self.line_to_phase()
    }

    fn line_to_phase(self) -> f32 {
        match self {
            Self::Wye => 0.5,
            Self::Delta => 1.5,
        }
    }
}

/// A and B split `test_voltage` around the midpoint, C stays at it.
fn line_duty_cycles(test_voltage: Percent) -> PhasePwmDutyCycles {
    let value = test_voltage.value();
    PhasePwmDutyCycles::new(50 + value.div_ceil(2), 50 - value / 2, 50)
}

#[derive(Debug)]
pub struct MotorIdentification<'a, D, E> {
    driver: &'a mut D,
    encoder: &'a mut E,
    vdc: Volts,
}

impl<'a, D: MotorDriver, E: Encoder> MotorIdentification<'a, D, E> {
    pub fn new(driver: &'a mut D, encoder: &'a mut E, vdc: Volts) -> Self {
        debug_assert!(vdc.value() > 0., "bus voltage must be positive");
        Self {
            driver,
            encoder,
            vdc,
        }
    }

    /// Line-to-line resistance, `None` if the current stayed below
    /// `min_current`.
    pub fn get_resistance<F>(
        &mut self,
        config: ResistanceConfig,
        on_done: F,
    ) -> ResistanceRun<'_, D, F>
    where
        F: FnOnce(Option<Ohm>),
    {
        debug_assert!(config.sample_count > 0, "at least one sample is needed");

        self.driver.three_phase_pwm_output(line_duty_cycles(config.test_voltage));
        self.driver.phase_currents_ready(config.sampling_frequency);

        ResistanceRun {
            driver: &mut *self.driver,
            applied_voltage: self.vdc * config.test_voltage.fraction(),
            config,
            samples: 0,
            accumulated_current: 0.,
            completion: Completion::new(on_done),
        }
    }

    /// Line-to-line inductance from the initial slope of the current, given
    /// the line-to-line `resistance`. `None` if the current barely changed.
    pub fn get_inductance<F>(
        &mut self,
        config: InductanceConfig,
        resistance: Ohm,
        on_done: F,
    ) -> InductanceRun<'_, D, F>
    where
        F: FnOnce(Option<Henry>),
    {
        let mut run = InductanceRun {
            driver: &mut *self.driver,
            applied_voltage: self.vdc * config.test_voltage.fraction(),
            resistance,
            config,
            settle_samples: config.settle_samples,
            first_sample: None,
            completion: Completion::new(on_done),
        };

        if run.settle_samples > 0 {
            run.driver.three_phase_pwm_output(PhasePwmDutyCycles::new(50, 50, 50));
        } else {
            run.apply_step();
        }
        run.driver.phase_currents_ready(config.sampling_frequency);
        run
    }

    /// Pole pairs from the mechanical rotation over
    /// `electrical_revolutions`. `None` if the rotor turned less than
    /// `min_rotation`.
    pub fn get_number_of_pole_pairs<F>(
        &mut self,
        config: PolePairsConfig,
        on_done: F,
    ) -> PolePairsRun<'_, D, E, F>
    where
        F: FnOnce(Option<usize>),
    {
        debug_assert!(
            config.electrical_revolutions > 0,
            "at least one electrical revolution is needed"
        );

        let previous_position = self.encoder.read();
        let mut run = PolePairsRun {
            driver: &mut *self.driver,
            encoder: &mut *self.encoder,
            config,
            step: 0,
            previous_position,
            accumulated_rotation: 0.,
            completion: Completion::new(on_done),
        };

        run.apply_step();
        run.driver.phase_currents_ready(config.sampling_frequency);
        run
    }
}

/// A resistance measurement in progress.
#[derive(Debug)]
pub struct ResistanceRun<'s, D: MotorDriver, F: FnOnce(Option<Ohm>)> {
    driver: &'s mut D,
    config: ResistanceConfig,
    applied_voltage: Volts,
    samples: usize,
    accumulated_current: f32,
    completion: Completion<F>,
}

impl<D: MotorDriver, F: FnOnce(Option<Ohm>)> ResistanceRun<'_, D, F> {
    pub fn is_finished(&self) -> bool {
        !self.completion.is_pending()
    }

    fn finish(&mut self) {
        self.driver.stop();

        let average_current = self.accumulated_current / self.config.sample_count as f32;
        let resistance = if libm::fabsf(average_current) > self.config.min_current.value() {
            let resistance = Ohm::new(self.applied_voltage.value() / average_current);
            info!("line resistance {} Ω", resistance.value());
            Some(resistance)
        } else {
            warn!("resistance: average current {average_current} A is too small");
            None
        };

        self.completion.complete(resistance);
    }
}

impl<D: MotorDriver, F: FnOnce(Option<Ohm>)> PhaseCurrentsHandler for ResistanceRun<'_, D, F> {
    fn phase_currents_ready(&mut self, currents: PhaseCurrents) {
        if self.is_finished() {
            return;
        }

        self.accumulated_current += currents.a.value();
        self.samples += 1;

        if self.samples >= self.config.sample_count {
            self.finish();
        }
    }
}

impl<D: MotorDriver, F: FnOnce(Option<Ohm>)> Drop for ResistanceRun<'_, D, F> {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.driver.stop();
        }
    }
}

/// An inductance measurement in progress.
#[derive(Debug)]
pub struct InductanceRun<'s, D: MotorDriver, F: FnOnce(Option<Henry>)> {
    driver: &'s mut D,
    config: InductanceConfig,
    applied_voltage: Volts,
    resistance: Ohm,
    settle_samples: usize,
    first_sample: Option<f32>,
    completion: Completion<F>,
}

impl<D: MotorDriver, F: FnOnce(Option<Henry>)> InductanceRun<'_, D, F> {
    pub fn is_finished(&self) -> bool {
        !self.completion.is_pending()
    }

    fn apply_step(&mut self) {
        self.driver.three_phase_pwm_output(line_duty_cycles(self.config.test_voltage));
    }

    fn finish(&mut self, first: f32, second: f32) {
        self.driver.stop();

        let current_change = second - first;
        let inductance = if libm::fabsf(current_change) > self.config.min_current_change.value() {
            let average_current = 0.5 * (first + second);
            let slope = current_change * self.config.sampling_frequency.value() as f32;
            let voltage = self.applied_voltage.value() - average_current * self.resistance.value();
            let inductance = Henry::new(voltage / slope);
            info!("line inductance {} H", inductance.value());
            Some(inductance)
        } else {
            warn!("inductance: current change {current_change} A is too small");
            None
        };

        self.completion.complete(inductance);
    }
}

impl<D: MotorDriver, F: FnOnce(Option<Henry>)> PhaseCurrentsHandler for InductanceRun<'_, D, F> {
    fn phase_currents_ready(&mut self, currents: PhaseCurrents) {
        if self.is_finished() {
            return;
        }

        if self.settle_samples > 0 {
            self.settle_samples -= 1;
            if self.settle_samples == 0 {
                self.apply_step();
            }
            return;
        }

        let current = currents.a.value();
        match self.first_sample {
            None => self.first_sample = Some(current),
            Some(first) => self.finish(first, current),
        }
    }
}

impl<D: MotorDriver, F: FnOnce(Option<Henry>)> Drop for InductanceRun<'_, D, F> {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.driver.stop();
        }
    }
}

/// A pole pair count in progress.
#[derive(Debug)]
pub struct PolePairsRun<'s, D, E, F>
where
    D: MotorDriver,
    E: Encoder,
    F: FnOnce(Option<usize>),
{
    driver: &'s mut D,
    encoder: &'s mut E,
    config: PolePairsConfig,
    step: usize,
    previous_position: Radians,
    accumulated_rotation: f32,
    completion: Completion<F>,
}

impl<D, E, F> PolePairsRun<'_, D, E, F>
where
    D: MotorDriver,
    E: Encoder,
    F: FnOnce(Option<usize>),
{
    pub fn is_finished(&self) -> bool {
        !self.completion.is_pending()
    }

    fn total_steps(&self) -> usize {
        self.config.electrical_revolutions * STEPS_PER_REVOLUTION
    }

    fn apply_step(&mut self) {
        let angle = self.step as f32 * (TAU / STEPS_PER_REVOLUTION as f32);
        let voltage = RotatingFrame {
            d: self.config.test_voltage.fraction(),
            q: 0.,
        };
        let voltages = inverse_clarke_park(libm::cosf(angle), libm::sinf(angle), voltage);

        self.driver.three_phase_pwm_output(normalized_duty_cycles(voltages));
    }

    fn finish(&mut self) {
        self.driver.stop();

        let rotation = libm::fabsf(self.accumulated_rotation);
        let pole_pairs = if rotation > self.config.min_rotation.value() {
            let mechanical_revolutions = rotation / TAU;
            let electrical_revolutions = self.config.electrical_revolutions as f32;
            let pole_pairs = libm::roundf(electrical_revolutions / mechanical_revolutions) as usize;
            if pole_pairs > 0 {
                info!("{pole_pairs} pole pairs ({rotation} rad mechanical rotation)");
                Some(pole_pairs)
            } else {
                warn!("pole pairs: rotor turned {rotation} rad, too far for the applied field");
                None
            }
        } else {
            warn!("pole pairs: rotor turned only {rotation} rad");
            None
        };

        self.completion.complete(pole_pairs);
    }
}

impl<D, E, F> PhaseCurrentsHandler for PolePairsRun<'_, D, E, F>
where
    D: MotorDriver,
    E: Encoder,
    F: FnOnce(Option<usize>),
{
    fn phase_currents_ready(&mut self, _currents: PhaseCurrents) {
        if self.is_finished() {
            return;
        }

        let position = self.encoder.read();
        self.accumulated_rotation += wrap_angle((position - self.previous_position).value());
        self.previous_position = position;

        self.step += 1;
        if self.step < self.total_steps() {
            self.apply_step();
        } else {
            self.finish();
        }
    }
}

impl<D, E, F> Drop for PolePairsRun<'_, D, E, F>
where
    D: MotorDriver,
    E: Encoder,
    F: FnOnce(Option<usize>),
{
    fn drop(&mut self) {
        if !self.is_finished() {
            self.driver.stop();
        }
    }
}
