//! Commissioning procedures that run open loop before a controller takes
//! over: rotor alignment and motor parameter identification.
//!
//! Every procedure borrows the driver and encoder for its whole duration and
//! is represented by a run object. The hardware glue feeds phase current
//! samples to the run through [`PhaseCurrentsHandler`]; the run stops the
//! driver and then calls its completion exactly once. Dropping a run that
//! has not finished stops the driver without calling the completion.
//!
//! [`PhaseCurrentsHandler`]: crate::driver::PhaseCurrentsHandler

pub mod alignment;
pub mod identification;

use crate::driver::PhasePwmDutyCycles;
use crate::park_clarke::ThreePhase;
use crate::units::Percent;

/// Maps phase voltages normalised to the bus voltage (`-1..=1`) onto duty
/// cycles around the 50 % midpoint.
pub fn normalized_duty_cycles(voltages: ThreePhase) -> PhasePwmDutyCycles {
    fn duty(voltage: f32) -> Percent {
        Percent::new((50. + voltage * 50.).clamp(0., 100.) as u8)
    }

    PhasePwmDutyCycles {
        a: duty(voltages.a),
        b: duty(voltages.b),
        c: duty(voltages.c),
    }
}

/// A completion callback that can be called once.
#[derive(Debug)]
struct Completion<F>(Option<F>);

impl<F> Completion<F> {
    fn new(on_done: F) -> Self {
        Self(Some(on_done))
    }

    fn is_pending(&self) -> bool {
        self.0.is_some()
    }

    fn complete<T>(&mut self, result: T)
    where
        F: FnOnce(T),
    {
        if let Some(on_done) = self.0.take() {
            on_done(result);
        }
    }
}
