//! Hand written doubles for the hardware boundary.
//!
//! Both doubles share an [`EventLog`] so tests can check the order of calls
//! across the driver and the completion callbacks.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use crate::driver::{Encoder, MotorDriver, PhasePwmDutyCycles};
use crate::units::{Hertz, Radians};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    PhaseCurrentsReady(Hertz),
    Released,
    Output(PhasePwmDutyCycles),
    Start,
    Stop,
    /// Pushed by completion callbacks under test.
    Completed,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.0.borrow().iter().filter(|event| predicate(event)).count()
    }

    pub fn outputs(&self) -> Vec<PhasePwmDutyCycles> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Output(duty) => Some(*duty),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug)]
pub struct DriverMock {
    log: EventLog,
    base_frequency: Hertz,
}

impl DriverMock {
    pub fn new(base_frequency: Hertz) -> Self {
        Self {
            log: EventLog::default(),
            base_frequency,
        }
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }
}

impl MotorDriver for DriverMock {
    fn phase_currents_ready(&mut self, frequency: Hertz) {
        self.log.push(Event::PhaseCurrentsReady(frequency));
    }

    fn release_phase_currents(&mut self) {
        self.log.push(Event::Released);
    }

    fn three_phase_pwm_output(&mut self, duty_cycles: PhasePwmDutyCycles) {
        self.log.push(Event::Output(duty_cycles));
    }

    fn start(&mut self) {
        self.log.push(Event::Start);
    }

    fn stop(&mut self) {
        self.log.push(Event::Stop);
    }

    fn base_frequency(&self) -> Hertz {
        self.base_frequency
    }
}

/// Plays back queued positions, then keeps returning the last one.
#[derive(Debug, Default)]
pub struct EncoderMock {
    positions: VecDeque<Radians>,
    last: Radians,
    reads: usize,
}

impl EncoderMock {
    pub fn new(positions: impl IntoIterator<Item = f32>) -> Self {
        Self {
            positions: positions.into_iter().map(Radians::new).collect(),
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Encoder for EncoderMock {
    fn read(&mut self) -> Radians {
        self.reads += 1;
        if let Some(position) = self.positions.pop_front() {
            self.last = position;
        }
        self.last
    }

    fn set(&mut self, value: Radians) {
        self.positions.clear();
        self.last = value;
    }
}
