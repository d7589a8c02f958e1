use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use ecu_core::bus::{ErrorSection, Frame};
use ecu_core::{
    ActuatorBank, ActuatorCfg, ActuatorController, ActuatorId, ActuatorState, DriverCfg,
    DriverPins, MotorDriver, RunEvent, Runner, ScriptAction, ScriptStep, Transition,
};
use ecu_hardware::{SimActuator, SimActuatorCfg, SimCurrent, SimFault, SimPin, SimPosition};
use ecu_traits::{Clock, ManualClock};
use rstest::rstest;

type SimRunner = Runner<SimPin, SimFault, SimCurrent>;

struct Rig {
    runner: SimRunner,
    hood: SimActuator,
    trunk: SimActuator,
}

fn controller(
    name: &'static str,
    plant: &SimActuator,
    clock: &Arc<dyn Clock + Send + Sync>,
) -> ActuatorController<SimPin, SimFault, SimCurrent> {
    let pins = DriverPins {
        in1: plant.in1(),
        in2: plant.in2(),
        enable: plant.enable(),
        fault: plant.fault_line(),
        current: plant.current_sense(),
    };
    let driver = MotorDriver::new(name, pins, DriverCfg::default(), Arc::clone(clock)).unwrap();
    ActuatorController::new(driver, ActuatorCfg::default())
}

fn rig(hood_start: SimPosition, trunk_start: SimPosition) -> Rig {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(ManualClock::new());
    let plant = |start| {
        SimActuator::new(
            SimActuatorCfg {
                start,
                ..SimActuatorCfg::default()
            },
            Arc::clone(&clock),
        )
    };
    let hood = plant(hood_start);
    let trunk = plant(trunk_start);
    let mut bank = ActuatorBank::new(
        controller("hood", &hood, &clock),
        controller("trunk", &trunk, &clock),
    );
    bank.init().unwrap();
    bank.calibrate().unwrap();

    let (h, t) = (hood.clone(), trunk.clone());
    let runner = Runner::new(bank, Arc::clone(&clock), Duration::from_millis(1))
        .with_fault_injector(move |id, asserted| match id {
            ActuatorId::Hood => h.inject_fault(asserted),
            ActuatorId::Trunk => t.inject_fault(asserted),
        });
    Rig {
        runner,
        hood,
        trunk,
    }
}

fn frame_at(at_ms: u32, frame: Frame) -> ScriptStep {
    ScriptStep {
        at_ms,
        action: ScriptAction::Frame(frame),
    }
}

fn transitions(events: &[RunEvent], actuator: ActuatorId) -> Vec<(ActuatorState, ActuatorState)> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Transition(Transition { actuator: a, from, to, .. }) if *a == actuator => {
                Some((*from, *to))
            }
            _ => None,
        })
        .collect()
}

#[rstest]
#[case(SimPosition::Closed, ActuatorState::Closed)]
#[case(SimPosition::Open, ActuatorState::Opened)]
#[case(SimPosition::Middle, ActuatorState::Stopped)]
fn calibration_against_plant(#[case] start: SimPosition, #[case] expected: ActuatorState) {
    let r = rig(start, SimPosition::Closed);
    assert_eq!(r.runner.bank().get(ActuatorId::Hood).state(), expected);
    assert!(r.hood.is_calibrated());
}

#[test]
fn toggle_opens_trunk_to_the_end() {
    let mut r = rig(SimPosition::Closed, SimPosition::Closed);
    let script = [frame_at(0, Frame::toggle(ActuatorId::Trunk))];
    let mut events = Vec::new();
    let summary = r
        .runner
        .run(Some(4_000), &script, &AtomicBool::new(false), |e| events.push(*e))
        .unwrap();

    assert_eq!(summary.trunk, ActuatorState::Opened);
    assert_eq!(summary.hood, ActuatorState::Closed);
    assert!(!summary.interrupted);
    assert!(r.trunk.is_open());
    assert_eq!(
        transitions(&events, ActuatorId::Trunk),
        vec![
            (ActuatorState::Closed, ActuatorState::Opening),
            (ActuatorState::Opening, ActuatorState::Opened),
        ]
    );
    assert!(transitions(&events, ActuatorId::Hood).is_empty());
    // de-energized on exit
    assert_eq!(r.trunk.bridge(), (false, false, false));
}

#[test]
fn stick_release_pauses_and_toggle_resumes_closing() {
    let mut r = rig(SimPosition::Closed, SimPosition::Closed);
    let script = [
        frame_at(0, Frame::set(ActuatorId::Hood, 100)),
        frame_at(1_000, Frame::set(ActuatorId::Hood, 0)),
        frame_at(1_100, Frame::toggle(ActuatorId::Hood)),
    ];
    let summary = r
        .runner
        .run(Some(3_000), &script, &AtomicBool::new(false), |_| {})
        .unwrap();
    assert_eq!(summary.hood, ActuatorState::Closed);
    assert!(r.hood.is_closed());
}

#[test]
fn injected_fault_is_reported_and_pauses() {
    let mut r = rig(SimPosition::Closed, SimPosition::Closed);
    let script = [
        frame_at(0, Frame::toggle(ActuatorId::Trunk)),
        ScriptStep {
            at_ms: 500,
            action: ScriptAction::Fault {
                actuator: ActuatorId::Trunk,
                asserted: true,
            },
        },
        ScriptStep {
            at_ms: 600,
            action: ScriptAction::Fault {
                actuator: ActuatorId::Trunk,
                asserted: false,
            },
        },
        frame_at(700, Frame::toggle(ActuatorId::Trunk)),
    ];
    let mut events = Vec::new();
    let summary = r
        .runner
        .run(Some(2_500), &script, &AtomicBool::new(false), |e| events.push(*e))
        .unwrap();

    assert!(summary.faults_reported >= 1);
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::BusError { error, .. }
            if error.section == ErrorSection::Hardware && error.code == 0x01
    )));
    assert_eq!(
        transitions(&events, ActuatorId::Trunk),
        vec![
            (ActuatorState::Closed, ActuatorState::Opening),
            (ActuatorState::Opening, ActuatorState::Stopped),
            (ActuatorState::Stopped, ActuatorState::Closing),
            (ActuatorState::Closing, ActuatorState::Closed),
        ]
    );
    assert!(r.trunk.is_closed());
}

#[test]
fn raised_shutdown_flag_stops_immediately() {
    let mut r = rig(SimPosition::Closed, SimPosition::Closed);
    let script = [frame_at(0, Frame::toggle(ActuatorId::Hood))];
    let summary = r
        .runner
        .run(None, &script, &AtomicBool::new(true), |_| {})
        .unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.frames, 0);
    assert_eq!(r.hood.bridge(), (false, false, false));
}

#[test]
fn script_rows_convert_to_steps() {
    let rows = ecu_config::parse_script_str(
        "at_ms,target,command,value\n0,trunk,toggle,\n5,hood,set,-30\n9,hood,fault,1\n",
    )
    .unwrap();
    let steps: Vec<ScriptStep> = rows.iter().map(ScriptStep::from).collect();
    assert_eq!(steps[0], frame_at(0, Frame::toggle(ActuatorId::Trunk)));
    assert_eq!(steps[1], frame_at(5, Frame::set(ActuatorId::Hood, -30)));
    assert_eq!(
        steps[2].action,
        ScriptAction::Fault {
            actuator: ActuatorId::Hood,
            asserted: true
        }
    );
}

#[test]
fn unsorted_script_is_rejected() {
    let mut r = rig(SimPosition::Closed, SimPosition::Closed);
    let script = [
        frame_at(10, Frame::toggle(ActuatorId::Hood)),
        frame_at(5, Frame::toggle(ActuatorId::Trunk)),
    ];
    let err = r
        .runner
        .run(Some(100), &script, &AtomicBool::new(false), |_| {})
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ecu_core::EcuError>(),
        Some(ecu_core::EcuError::State(_))
    ));
}

/// Clock that moves forward by 1 ms on every read, like a wall clock crossing
/// millisecond boundaries while a pass does work.
#[derive(Default)]
struct SteppingClock {
    now: std::sync::atomic::AtomicU32,
}

impl Clock for SteppingClock {
    fn now_ms(&self) -> u32 {
        self.now
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            .wrapping_add(1)
    }

    fn sleep(&self, d: Duration) {
        self.now
            .fetch_add(d.as_millis() as u32, std::sync::atomic::Ordering::Relaxed);
    }
}

#[test]
fn partial_stick_is_not_braked_before_stale_timeout_on_advancing_clock() {
    use ecu_core::mocks::MockBridge;

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(SteppingClock::default());
    let hood_bridge = MockBridge::new();
    let trunk_bridge = MockBridge::new();
    hood_bridge.current.set_steady(20);
    trunk_bridge.current.set_steady(20);
    let ctl = |name, bridge: &MockBridge| {
        let driver =
            MotorDriver::new(name, bridge.pins(), DriverCfg::default(), Arc::clone(&clock))
                .unwrap();
        ActuatorController::new(driver, ActuatorCfg::default())
    };
    let mut bank = ActuatorBank::new(ctl("hood", &hood_bridge), ctl("trunk", &trunk_bridge));
    bank.init().unwrap();
    assert_eq!(
        bank.calibrate().unwrap(),
        (ActuatorState::Closed, ActuatorState::Closed)
    );
    // Loaded motor from here on, so only the stale-input cutoff can end the move.
    hood_bridge.current.set_steady(2000);

    let mut runner = Runner::new(bank, Arc::clone(&clock), Duration::from_millis(1));
    let mut events = Vec::new();
    runner
        .run(
            Some(600),
            &[frame_at(0, Frame::set(ActuatorId::Hood, 30))],
            &AtomicBool::new(false),
            |e| events.push(*e),
        )
        .unwrap();

    let hood: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Transition(t) if t.actuator == ActuatorId::Hood => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(hood[0].from, ActuatorState::Closed);
    assert_eq!(hood[0].to, ActuatorState::Opening);
    let stop = hood
        .iter()
        .find(|t| t.to == ActuatorState::Stopped)
        .expect("stale stick should brake within the run");
    assert!(stop.at_ms > 400, "braked at {} ms", stop.at_ms);
}
