//! Field oriented control for permanent magnet synchronous and brushless DC
//! motors.
//!
//! The crate is split along the signal path: [`park_clarke`] and [`svpwm`]
//! hold the stateless math, [`pid`] the incremental controller,
//! [`field_oriented`] combines them into one control cycle, and
//! [`controller`] ties a control cycle to a [`driver::MotorDriver`] and
//! [`driver::Encoder`]. The [`services`] commission a motor before it is
//! controlled: rotor alignment and parameter identification.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod controller;
pub mod driver;
pub mod field_oriented;
pub mod interactor;
pub mod park_clarke;
pub mod pid;
pub mod pid_loop;
pub mod services;
pub mod svpwm;
pub mod trigonometry;
pub mod units;

#[cfg(test)]
mod test_doubles;

/// 1/√3
pub const FRAC_1_SQRT_3: f32 = 0.577_350_26;
/// √3/2
pub const FRAC_SQRT_3_2: f32 = 0.866_025_4;
