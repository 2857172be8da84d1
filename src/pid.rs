//! Incremental (velocity form) PID controller.
//!
//! Each call to [`Pid::process`] computes the change of the output from the
//! last three errors and adds it to the previous output:
//!
//! ```text
//! Δu = kp·(e − e₁) + ki·e + kd·(e − 2e₁ + e₂)
//! u  = clamp(u + Δu, min, max)
//! ```
//!
//! The output itself is the accumulator, so clamping it is all the
//! anti-windup needed. Gains are per sample: scale `ki` by the sample time
//! and `kd` by its inverse before handing them over.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidTunings {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidTunings {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }

    /// Every gain multiplied by `factor`.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            kp: self.kp * factor,
            ki: self.ki * factor,
            kd: self.kd * factor,
        }
    }

    /// Converts continuous gains to per-sample gains for a sample time `dt`
    /// in seconds.
    pub fn discretized(self, dt: f32) -> Self {
        Self {
            kp: self.kp,
            ki: self.ki * dt,
            kd: self.kd / dt,
        }
    }

    /// Overwrites the gains that are present in `parameters`.
    pub fn merge(&mut self, parameters: PidParameters) {
        if let Some(kp) = parameters.kp {
            self.kp = kp;
        }
        if let Some(ki) = parameters.ki {
            self.ki = ki;
        }
        if let Some(kd) = parameters.kd {
            self.kd = kd;
        }
    }
}

/// A partial set of gains, as entered by an operator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidParameters {
    pub kp: Option<f32>,
    pub ki: Option<f32>,
    pub kd: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidLimits {
    pub min: f32,
    pub max: f32,
}

impl PidLimits {
    pub fn new(min: f32, max: f32) -> Self {
        debug_assert!(min < max, "PID limits must satisfy min < max");
        Self { min, max }
    }

    /// Limits symmetric around zero.
    pub fn symmetric(bound: f32) -> Self {
        Self::new(-bound, bound)
    }
}

#[derive(Debug, Clone)]
pub struct Pid {
    tunings: PidTunings,
    limits: PidLimits,
    set_point: f32,
    output: f32,
    previous_error: f32,
    second_previous_error: f32,
    enabled: bool,
}

impl Pid {
    /// Creates a disabled controller.
    pub fn new(tunings: PidTunings, limits: PidLimits) -> Self {
        Self {
            tunings,
            limits,
            set_point: 0.,
            output: 0.,
            previous_error: 0.,
            second_previous_error: 0.,
            enabled: false,
        }
    }

    /// Replaces all three gains. The accumulated output is kept.
    pub fn set_tunings(&mut self, tunings: PidTunings) {
        self.tunings = tunings;
    }

    pub fn tunings(&self) -> PidTunings {
        self.tunings
    }

    /// Replaces the target. The accumulated output is kept.
    pub fn set_point(&mut self, set_point: f32) {
        self.set_point = set_point;
    }

    pub fn current_set_point(&self) -> f32 {
        self.set_point
    }

    pub fn set_limits(&mut self, limits: PidLimits) {
        self.limits = limits;
        self.output = self.output.clamp(limits.min, limits.max);
    }

    pub fn limits(&self) -> PidLimits {
        self.limits
    }

    /// Arms the controller with cleared history.
    pub fn enable(&mut self) {
        self.clear();
        self.enabled = true;
    }

    /// Disarms the controller and clears its history.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Advances the controller by one sample and returns the new output.
    ///
    /// Must be called once per sample while enabled.
    pub fn process(&mut self, measurement: f32) -> f32 {
        debug_assert!(self.enabled, "PID processed while disabled");
        if !self.enabled {
            return self.output;
        }

        let PidTunings { kp, ki, kd } = self.tunings;
        let error = self.set_point - measurement;

        let delta = kp * (error - self.previous_error)
            + ki * error
            + kd * (error - 2. * self.previous_error + self.second_previous_error);

        self.output = (self.output + delta).clamp(self.limits.min, self.limits.max);
        self.second_previous_error = self.previous_error;
        self.previous_error = error;

        self.output
    }

    fn clear(&mut self) {
        self.output = 0.;
        self.previous_error = 0.;
        self.second_previous_error = 0.;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(tunings: PidTunings) -> Pid {
        let mut pid = Pid::new(tunings, PidLimits::new(-10., 10.));
        pid.enable();
        pid
    }

    #[test]
    fn proportional_only_tracks_error() {
        let mut pid = pid(PidTunings::new(2., 0., 0.));
        pid.set_point(1.);

        assert_eq!(pid.process(0.), 2.);
        assert_eq!(pid.process(0.5), 1.);
        assert_eq!(pid.process(1.), 0.);
    }

    #[test]
    fn integral_accumulates_constant_error() {
        let mut pid = pid(PidTunings::new(0., 0.5, 0.));
        pid.set_point(1.);

        assert_eq!(pid.process(0.), 0.5);
        assert_eq!(pid.process(0.), 1.);
        assert_eq!(pid.process(0.), 1.5);
    }

    #[test]
    fn derivative_reacts_to_error_change() {
        let mut pid = pid(PidTunings::new(0., 0., 1.));
        pid.set_point(1.);

        // e = 1, 1, 1: the second difference is 1, -1, 0.
        assert_eq!(pid.process(0.), 1.);
        assert_eq!(pid.process(0.), 0.);
        assert_eq!(pid.process(0.), 0.);
    }

    #[test]
    fn output_is_clamped_without_windup() {
        let mut pid = pid(PidTunings::new(0., 4., 0.));
        pid.set_point(1.);

        for _ in 0..100 {
            assert!(pid.process(0.) <= 10.);
        }

        // Reversing the error leaves saturation immediately.
        pid.set_point(-1.);
        assert_eq!(pid.process(0.), 6.);
    }

    #[test]
    fn re_enable_clears_history() {
        let mut pid = pid(PidTunings::new(1.5, 0.3, 0.2));
        pid.set_point(2.);

        let first = pid.process(0.7);
        pid.process(0.1);
        pid.process(-0.4);
        pid.disable();
        pid.enable();
        let second = pid.process(0.7);

        assert_eq!(first, second);
    }

    #[test]
    fn enable_alone_clears_history() {
        let mut pid = pid(PidTunings::new(0., 1., 0.));
        pid.set_point(1.);
        pid.process(0.);
        pid.process(0.);

        pid.enable();

        assert_eq!(pid.process(0.), 1.);
    }

    #[test]
    fn tunings_and_set_point_keep_accumulator() {
        let mut pid = pid(PidTunings::new(0., 1., 0.));
        pid.set_point(1.);
        pid.process(0.);

        pid.set_tunings(PidTunings::new(0., 2., 0.));
        pid.set_point(1.);

        assert_eq!(pid.process(0.), 3.);
    }

    #[test]
    fn shrinking_limits_clamps_current_output() {
        let mut pid = pid(PidTunings::new(0., 5., 0.));
        pid.set_point(1.);
        pid.process(0.);

        pid.set_limits(PidLimits::symmetric(1.));

        assert_eq!(pid.process(1.), 1.);
    }

    #[test]
    fn merge_only_overwrites_present_gains() {
        let mut tunings = PidTunings::new(1., 2., 3.);

        tunings.merge(PidParameters {
            kp: None,
            ki: Some(5.),
            kd: None,
        });

        assert_eq!(tunings, PidTunings::new(1., 5., 3.));
    }

    #[test]
    fn discretized_scales_integral_and_derivative() {
        let tunings = PidTunings::new(1., 100., 0.01).discretized(0.001);

        assert_eq!(tunings.kp, 1.);
        assert!((tunings.ki - 0.1).abs() < 1e-6);
        assert!((tunings.kd - 10.).abs() < 1e-4);
    }
}
