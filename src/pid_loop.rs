//! A [`Pid`] closed around a scalar input and output, ticked from a timer.
//!
//! This is the plain speed loop for brushed DC motors: read the speed,
//! process, write the duty cycle.

use crate::pid::{Pid, PidLimits, PidParameters, PidTunings};

pub trait Input {
    fn read(&mut self) -> f32;
}

pub trait Output {
    fn update(&mut self, action: f32);
    fn disable(&mut self);
}

#[derive(Debug)]
pub struct PidLoop<I, O> {
    input: I,
    output: O,
    pid: Pid,
    tunings: PidTunings,
    running: bool,
}

impl<I: Input, O: Output> PidLoop<I, O> {
    pub fn new(input: I, output: O, tunings: PidTunings, limits: PidLimits) -> Self {
        Self {
            input,
            output,
            pid: Pid::new(tunings, limits),
            tunings,
            running: false,
        }
    }

    pub fn set_tunings(&mut self, tunings: PidTunings) {
        self.tunings = tunings;
        self.pid.set_tunings(tunings);
    }

    /// Updates only the gains present in `parameters`.
    pub fn set_pid_parameters(&mut self, parameters: PidParameters) {
        let mut tunings = self.tunings;
        tunings.merge(parameters);
        self.set_tunings(tunings);
    }

    pub fn set_point(&mut self, set_point: f32) {
        self.pid.set_point(set_point);
    }

    pub fn enable(&mut self) {
        self.pid.enable();
        self.running = true;
    }

    pub fn disable(&mut self) {
        self.running = false;
        self.pid.disable();
        self.output.disable();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// One sample period elapsed. Does nothing while stopped.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        let measurement = self.input.read();
        let action = self.pid.process(measurement);
        self.output.update(action);
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    struct ConstantInput(f32);

    impl Input for ConstantInput {
        fn read(&mut self) -> f32 {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingOutput {
        actions: Vec<f32>,
        disabled: usize,
    }

    impl Output for RecordingOutput {
        fn update(&mut self, action: f32) {
            self.actions.push(action);
        }

        fn disable(&mut self) {
            self.disabled += 1;
        }
    }

    fn pid_loop(measurement: f32) -> PidLoop<ConstantInput, RecordingOutput> {
        PidLoop::new(
            ConstantInput(measurement),
            RecordingOutput::default(),
            PidTunings::new(0.5, 0.1, 0.),
            PidLimits::new(0., 1.),
        )
    }

    #[test]
    fn stopped_loop_ignores_ticks() {
        let mut pid_loop = pid_loop(0.);
        pid_loop.set_point(1.);

        pid_loop.tick();

        assert!(!pid_loop.is_running());
        assert!(pid_loop.output().actions.is_empty());
    }

    #[test]
    fn running_loop_drives_output() {
        let mut pid_loop = pid_loop(0.);
        pid_loop.set_point(1.);
        pid_loop.enable();

        pid_loop.tick();
        pid_loop.tick();

        let actions = &pid_loop.output().actions;
        assert_eq!(actions.len(), 2);
        assert!((actions[0] - 0.6).abs() < 1e-6);
        assert!((actions[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn disable_stops_output_and_clears_history() {
        let mut pid_loop = pid_loop(0.);
        pid_loop.set_point(1.);
        pid_loop.enable();
        pid_loop.tick();
        pid_loop.tick();

        pid_loop.disable();
        pid_loop.tick();
        pid_loop.enable();
        pid_loop.tick();

        let output = pid_loop.output();
        assert_eq!(output.disabled, 1);
        assert_eq!(output.actions.len(), 3);
        assert!((output.actions[2] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn partial_parameters_keep_other_gains() {
        let mut pid_loop = pid_loop(0.);
        pid_loop.set_pid_parameters(PidParameters {
            kp: None,
            ki: Some(0.3),
            kd: None,
        });
        pid_loop.set_point(1.);
        pid_loop.enable();

        pid_loop.tick();

        assert!((pid_loop.output().actions[0] - 0.8).abs() < 1e-6);
    }
}
