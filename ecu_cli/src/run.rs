//! Hardware assembly, calibration and the control loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use ecu_core::error::EcuError;
use ecu_core::runner::RunEvent;
use ecu_core::{
    ActuatorBank, ActuatorCfg, ActuatorController, ActuatorId, DriverCfg, DriverPins,
    MotorDriver, RunSummary, Runner, ScriptStep,
};
use ecu_hardware::{SimActuator, SimActuatorCfg, SimPosition};
use ecu_traits::{AnalogInput, Clock, DigitalInput, DigitalOutput, ManualClock, MonotonicClock};
use eyre::WrapErr;
use serde_json::json;

use crate::rt::setup_rt_once;

type Out = Box<dyn DigitalOutput>;
type In = Box<dyn DigitalInput>;
type An = Box<dyn AnalogInput>;
type Bank = ActuatorBank<Out, In, An>;
type SharedClock = Arc<dyn Clock + Send + Sync>;

pub struct RunArgs {
    pub script: Option<PathBuf>,
    pub duration_ms: Option<u32>,
    pub virtual_time: bool,
    pub sim: bool,
    pub rt: bool,
    pub rt_prio: Option<i32>,
}

struct Assembly {
    bank: Bank,
    clock: SharedClock,
    /// (hood, trunk) plants when simulating.
    plants: Option<(SimActuator, SimActuator)>,
}

pub fn run(
    cfg: &ecu_config::Config,
    args: &RunArgs,
    shutdown: &AtomicBool,
    json: bool,
) -> eyre::Result<()> {
    if args.rt {
        setup_rt_once(args.rt_prio);
    }

    let steps: Vec<ScriptStep> = match &args.script {
        Some(path) => ecu_config::load_script_csv(path)
            .map_err(|e| EcuError::Config(format!("{e:#}")))?
            .iter()
            .map(ScriptStep::from)
            .collect(),
        None => Vec::new(),
    };

    let Assembly {
        mut bank,
        clock,
        plants,
    } = assemble(cfg, use_sim(args.sim), args.virtual_time)?;

    bank.init().wrap_err("driver init")?;
    let (hood, trunk) = bank.calibrate()?;
    if json {
        println!(
            "{}",
            json!({ "event": "calibrated", "hood": hood.as_str(), "trunk": trunk.as_str() })
        );
    } else {
        println!("calibrated hood={hood} trunk={trunk}");
    }

    let mut runner = Runner::new(
        bank,
        Arc::clone(&clock),
        Duration::from_millis(cfg.runner.period_ms),
    );
    if let Some((h, t)) = plants {
        runner = runner.with_fault_injector(move |id, asserted| match id {
            ActuatorId::Hood => h.inject_fault(asserted),
            ActuatorId::Trunk => t.inject_fault(asserted),
        });
    }

    let summary = runner.run(args.duration_ms, &steps, shutdown, |ev| {
        print_event(ev, json);
    })?;
    print_summary(&summary, json);
    Ok(())
}

pub fn self_check(cfg: &ecu_config::Config, sim: bool, json: bool) -> eyre::Result<()> {
    let Assembly { mut bank, .. } = assemble(cfg, use_sim(sim), false)?;
    bank.init().wrap_err("driver init")?;
    let mut readings = [0u16; 2];
    for (slot, id) in readings.iter_mut().zip(ActuatorId::ALL) {
        let driver = bank.get_mut(id).driver_mut();
        if driver.fault_asserted()? {
            let msg = format!("{id} bridge fault line asserted");
            return Err(EcuError::HardwareFault(msg).into());
        }
        *slot = driver
            .current_milliamps(true)
            .wrap_err_with(|| format!("{id}: read current"))?;
    }
    bank.power_off()?;
    if json {
        println!(
            "{}",
            json!({ "status": "ok", "hood_ma": readings[0], "trunk_ma": readings[1] })
        );
    } else {
        println!("hood current: {} mA", readings[0]);
        println!("trunk current: {} mA", readings[1]);
        println!("OK");
    }
    Ok(())
}

/// Simulation is the only backend unless built with `hardware` on Linux.
fn use_sim(requested: bool) -> bool {
    requested || cfg!(not(all(feature = "hardware", target_os = "linux")))
}

fn assemble(cfg: &ecu_config::Config, sim: bool, virtual_time: bool) -> eyre::Result<Assembly> {
    let clock: SharedClock = if virtual_time {
        Arc::new(ManualClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    };
    if sim {
        return sim_assembly(cfg, clock);
    }
    if virtual_time {
        return Err(
            EcuError::Config("--virtual-time needs the simulated actuators (add --sim)".into())
                .into(),
        );
    }
    hardware_assembly(cfg, clock)
}

fn controller(
    name: &'static str,
    pins: DriverPins<Out, In, An>,
    cfg: &ecu_config::Config,
    clock: &SharedClock,
) -> eyre::Result<ActuatorController<Out, In, An>> {
    let driver = MotorDriver::new(name, pins, DriverCfg::from(cfg), Arc::clone(clock))?;
    Ok(ActuatorController::new(driver, ActuatorCfg::from(&cfg.actuator)))
}

fn start_position(p: ecu_config::StartPosition) -> SimPosition {
    match p {
        ecu_config::StartPosition::Closed => SimPosition::Closed,
        ecu_config::StartPosition::Open => SimPosition::Open,
        ecu_config::StartPosition::Middle => SimPosition::Middle,
    }
}

fn sim_pins(plant: &SimActuator) -> DriverPins<Out, In, An> {
    DriverPins {
        in1: Box::new(plant.in1()),
        in2: Box::new(plant.in2()),
        enable: Box::new(plant.enable()),
        fault: Box::new(plant.fault_line()),
        current: Box::new(plant.current_sense()),
    }
}

fn sim_assembly(cfg: &ecu_config::Config, clock: SharedClock) -> eyre::Result<Assembly> {
    let s = &cfg.simulation;
    let plant = |start| {
        SimActuator::new(
            SimActuatorCfg {
                travel_ms: s.travel_ms,
                running_raw: s.running_raw,
                idle_raw: s.idle_raw,
                start: start_position(start),
            },
            Arc::clone(&clock),
        )
    };
    let hood = plant(s.hood_start);
    let trunk = plant(s.trunk_start);
    let bank = ActuatorBank::new(
        controller("hood", sim_pins(&hood), cfg, &clock)?,
        controller("trunk", sim_pins(&trunk), cfg, &clock)?,
    );
    tracing::info!(travel_ms = s.travel_ms, "using simulated actuators");
    Ok(Assembly {
        bank,
        clock,
        plants: Some((hood, trunk)),
    })
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn hardware_assembly(cfg: &ecu_config::Config, clock: SharedClock) -> eyre::Result<Assembly> {
    use std::cell::RefCell;
    use std::rc::Rc;

    use ecu_hardware::gpio::{Gpio, GpioInput, GpioOutput, open_gpio};
    use ecu_hardware::{AdcChannel, Mcp3204};

    fn pins(
        gpio: &Gpio,
        adc: &Rc<RefCell<Mcp3204>>,
        p: &ecu_config::Pins,
    ) -> eyre::Result<DriverPins<Out, In, An>> {
        Ok(DriverPins {
            in1: Box::new(GpioOutput::open(gpio, p.in1)?),
            in2: Box::new(GpioOutput::open(gpio, p.in2)?),
            enable: Box::new(GpioOutput::open(gpio, p.enable)?),
            fault: Box::new(GpioInput::open(gpio, p.fault)?),
            current: Box::new(AdcChannel::new(Rc::clone(adc), p.current_channel)?),
        })
    }

    let gpio = open_gpio().wrap_err("open gpio")?;
    let adc = Mcp3204::open(cfg.adc.spi_bus, cfg.adc.slave_select, cfg.adc.clock_hz)
        .wrap_err("open current-sense adc")?;
    let adc = Rc::new(RefCell::new(adc));
    let hood = pins(&gpio, &adc, &cfg.hood.pins).wrap_err("open hood pins")?;
    let trunk = pins(&gpio, &adc, &cfg.trunk.pins).wrap_err("open trunk pins")?;
    let bank = ActuatorBank::new(
        controller("hood", hood, cfg, &clock)?,
        controller("trunk", trunk, cfg, &clock)?,
    );
    tracing::info!("using gpio/spi actuators");
    Ok(Assembly {
        bank,
        clock,
        plants: None,
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn hardware_assembly(_cfg: &ecu_config::Config, _clock: SharedClock) -> eyre::Result<Assembly> {
    Err(EcuError::Config("built without the `hardware` feature".into()).into())
}

fn print_event(ev: &RunEvent, json: bool) {
    match (ev, json) {
        (RunEvent::Transition(t), false) => {
            println!("[{:>7} ms] {} {} -> {}", t.at_ms, t.actuator, t.from, t.to);
        }
        (RunEvent::Transition(t), true) => println!(
            "{}",
            json!({
                "event": "transition",
                "at_ms": t.at_ms,
                "actuator": t.actuator.as_str(),
                "from": t.from.as_str(),
                "to": t.to.as_str(),
            })
        ),
        (RunEvent::Reply { at_ms, frame }, false) => {
            let data: Vec<String> = frame.payload().iter().map(|b| format!("{b:02x}")).collect();
            println!(
                "[{at_ms:>7} ms] reply id=0x{:04x} fn=0x{:02x} data={}",
                frame.object_id,
                frame.function,
                data.join(" ")
            );
        }
        (RunEvent::Reply { at_ms, frame }, true) => println!(
            "{}",
            json!({
                "event": "reply",
                "at_ms": at_ms,
                "object_id": frame.object_id,
                "function": frame.function,
                "data": frame.payload(),
            })
        ),
        (RunEvent::BusError { at_ms, error }, false) => {
            println!(
                "[{at_ms:>7} ms] error section={:?} code=0x{:02x}",
                error.section, error.code
            );
        }
        (RunEvent::BusError { at_ms, error }, true) => println!(
            "{}",
            json!({
                "event": "error",
                "at_ms": at_ms,
                "section": format!("{:?}", error.section),
                "code": error.code,
            })
        ),
    }
}

fn print_summary(s: &RunSummary, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "event": "summary",
                "hood": s.hood.as_str(),
                "trunk": s.trunk.as_str(),
                "elapsed_ms": s.elapsed_ms,
                "frames": s.frames,
                "transitions": s.transitions,
                "faults_reported": s.faults_reported,
                "interrupted": s.interrupted,
            })
        );
    } else {
        println!("hood={} trunk={}", s.hood, s.trunk);
    }
}
