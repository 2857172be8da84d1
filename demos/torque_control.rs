//! Closes the torque loop around a simulated PMSM and records the run to
//! `out.mcap`.
//!
//! ```text
//! RUST_LOG=debug cargo run --example torque_control
//! ```

use std::{
    cell::Cell, collections::BTreeMap, f32::consts::TAU, fs::File, io::BufWriter, rc::Rc,
    sync::Arc,
};

use foc_drive::{
    controller::TorqueController,
    driver::{Encoder, MotorDriver, PhaseCurrents, PhaseCurrentsHandler, PhasePwmDutyCycles},
    field_oriented::FieldOrientedTorque,
    interactor::FocInteractor,
    park_clarke::{clarke_park, inverse_clarke_park, RotatingFrame, ThreePhase},
    pid::PidParameters,
    trigonometry::CordicTrigonometry,
    units::{Hertz, NewtonMeter, Radians, Volts},
};
use serde::Serialize;

/// Surface mounted PMSM, integrated with forward Euler.
struct PmsmModel {
    resistance: f32,
    inductance: f32,
    flux_linkage: f32,
    pole_pairs: f32,
    inertia: f32,
    friction: f32,
    load_torque: f32,
    vdc: f32,
    dt: f32,

    id: f32,
    iq: f32,
    electrical_angle: f32,
    mechanical_angle: f32,
    mechanical_speed: f32,
}

impl PmsmModel {
    fn new(vdc: f32, dt: f32) -> Self {
        Self {
            resistance: 0.5,
            inductance: 0.001,
            flux_linkage: 0.1,
            pole_pairs: 4.,
            inertia: 0.001,
            friction: 0.0001,
            load_torque: 0.1,
            vdc,
            dt,
            id: 0.,
            iq: 0.,
            electrical_angle: 0.,
            mechanical_angle: 0.,
            mechanical_speed: 0.,
        }
    }

    /// Applies the duty cycles for one time step.
    fn step(&mut self, duty: PhasePwmDutyCycles) {
        let phase_voltage = |duty: u8| (f32::from(duty) / 100. - 0.5) * self.vdc;
        let voltage = clarke_park(
            self.electrical_angle.cos(),
            self.electrical_angle.sin(),
            ThreePhase {
                a: phase_voltage(duty.a.value()),
                b: phase_voltage(duty.b.value()),
                c: phase_voltage(duty.c.value()),
            },
        );

        let omega = self.pole_pairs * self.mechanical_speed;
        let did = (voltage.d - self.resistance * self.id + omega * self.inductance * self.iq)
            / self.inductance;
        let diq = (voltage.q
            - self.resistance * self.iq
            - omega * self.inductance * self.id
            - omega * self.flux_linkage)
            / self.inductance;
        self.id += did * self.dt;
        self.iq += diq * self.dt;

        let torque = 1.5 * self.pole_pairs * self.flux_linkage * self.iq;
        let acceleration =
            (torque - self.friction * self.mechanical_speed - self.load_torque) / self.inertia;
        self.mechanical_speed += acceleration * self.dt;

        self.mechanical_angle =
            (self.mechanical_angle + self.mechanical_speed * self.dt).rem_euclid(TAU);
        self.electrical_angle = (self.mechanical_angle * self.pole_pairs).rem_euclid(TAU);
    }

    fn phase_currents(&self) -> PhaseCurrents {
        let (sin, cos) = self.electrical_angle.sin_cos();
        let currents = inverse_clarke_park(
            cos,
            sin,
            RotatingFrame {
                d: self.id,
                q: self.iq,
            },
        );

        PhaseCurrents::new(currents.a, currents.b, currents.c)
    }

    /// Encoder convention: (-π, π].
    fn position(&self) -> Radians {
        Radians::new(foc_drive::trigonometry::wrap_angle(self.mechanical_angle))
    }
}

/// Hands the last duty cycles to the model.
struct SimulatedDriver {
    duty: Rc<Cell<PhasePwmDutyCycles>>,
    base_frequency: Hertz,
}

impl MotorDriver for SimulatedDriver {
    fn phase_currents_ready(&mut self, frequency: Hertz) {
        log::info!("sampling at {} Hz", frequency.value());
    }

    fn three_phase_pwm_output(&mut self, duty_cycles: PhasePwmDutyCycles) {
        self.duty.set(duty_cycles);
    }

    fn start(&mut self) {
        log::info!("power stage on");
    }

    fn stop(&mut self) {
        self.duty.set(PhasePwmDutyCycles::new(50, 50, 50));
        log::info!("power stage off");
    }

    fn base_frequency(&self) -> Hertz {
        self.base_frequency
    }
}

struct SimulatedEncoder {
    position: Rc<Cell<Radians>>,
}

impl Encoder for SimulatedEncoder {
    fn read(&mut self) -> Radians {
        self.position.get()
    }

    fn set(&mut self, value: Radians) {
        self.position.set(value);
    }
}

#[derive(Serialize)]
struct Values {
    time_ns: u64,
    position_rad: f32,
    speed_rad_per_sec: f32,
    phase_currents: [f32; 3],
    id: f32,
    iq: f32,
    duty_cycles: [u8; 3],
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let mut writer = mcap::Writer::new(BufWriter::new(File::create("out.mcap")?))?;
    let my_channel = mcap::Channel {
        topic: String::from("foc"),
        schema: Some(Arc::new(mcap::Schema {
            name: "".to_owned(),
            encoding: "".to_owned(),
            data: std::borrow::Cow::default(),
        })),
        message_encoding: "cbor".to_owned(),
        metadata: BTreeMap::default(),
    };
    let channel_id = writer.add_channel(&my_channel)?;

    let vdc = 72.;
    let base_frequency = Hertz::new(10_000);
    let dt_ns = base_frequency.period().as_nanos() as u64;
    let mut model = PmsmModel::new(vdc, base_frequency.period_secs());

    let duty = Rc::new(Cell::new(PhasePwmDutyCycles::new(50, 50, 50)));
    let position = Rc::new(Cell::new(model.position()));
    let mut driver = SimulatedDriver {
        duty: duty.clone(),
        base_frequency,
    };
    let mut encoder = SimulatedEncoder {
        position: position.clone(),
    };

    let controller = TorqueController::new(
        &mut driver,
        &mut encoder,
        FieldOrientedTorque::new(CordicTrigonometry, 4),
    );
    let mut interactor = FocInteractor::new(Volts::new(vdc), controller);
    let current_gains = PidParameters {
        kp: Some(0.15),
        ki: Some(1.5 * base_frequency.period_secs()),
        kd: Some(0.),
    };
    interactor.set_dq_pid_parameters(current_gains, current_gains);
    interactor.set_torque(NewtonMeter::new(2.));
    interactor.start();

    let mut time_ns = 0;
    while time_ns <= 200_000_000 {
        model.step(duty.get());
        position.set(model.position());

        let currents = model.phase_currents();
        interactor.controller_mut().phase_currents_ready(currents);

        let (sin, cos) = model.electrical_angle.sin_cos();
        let rotating = clarke_park(
            cos,
            sin,
            ThreePhase {
                a: currents.a.value(),
                b: currents.b.value(),
                c: currents.c.value(),
            },
        );
        let applied = duty.get();

        let mut buffer = Vec::with_capacity(128);
        ciborium::into_writer(
            &Values {
                time_ns,
                position_rad: model.position().value(),
                speed_rad_per_sec: model.mechanical_speed,
                phase_currents: [currents.a.value(), currents.b.value(), currents.c.value()],
                id: rotating.d,
                iq: rotating.q,
                duty_cycles: [applied.a.value(), applied.b.value(), applied.c.value()],
            },
            &mut buffer,
        )?;
        writer.write_to_known_channel(
            &mcap::records::MessageHeader {
                channel_id,
                sequence: 0,
                log_time: time_ns,
                publish_time: time_ns,
            },
            &buffer,
        )?;

        time_ns += dt_ns;
    }

    interactor.stop();
    log::info!("final speed {:.1} rad/s", model.mechanical_speed);
    writer.finish()?;

    Ok(())
}
