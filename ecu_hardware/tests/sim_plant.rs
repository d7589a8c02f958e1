use std::sync::Arc;
use std::time::Duration;

use ecu_hardware::{SimActuator, SimActuatorCfg, SimPosition};
use ecu_traits::{AnalogInput, DigitalInput, DigitalOutput, ManualClock};
use rstest::rstest;

const T: Duration = Duration::from_millis(5);

fn rig(start: SimPosition, travel_ms: u32) -> (SimActuator, ManualClock) {
    let clock = ManualClock::new();
    let cfg = SimActuatorCfg {
        travel_ms,
        running_raw: 1800,
        idle_raw: 20,
        start,
    };
    (SimActuator::new(cfg, Arc::new(clock.clone())), clock)
}

/// Apply an (in1, in2, en) pattern through the pins.
fn drive(act: &SimActuator, in1: bool, in2: bool, en: bool) {
    act.in1().set_level(in1).unwrap();
    act.in2().set_level(in2).unwrap();
    act.enable().set_level(en).unwrap();
}

#[rstest]
#[case::closing_from_closed(SimPosition::Closed, (false, true, true), 20)]
#[case::opening_from_closed(SimPosition::Closed, (true, false, true), 1800)]
#[case::closing_from_open(SimPosition::Open, (false, true, true), 1800)]
#[case::opening_from_open(SimPosition::Open, (true, false, true), 20)]
#[case::coast(SimPosition::Middle, (false, false, false), 20)]
#[case::brake(SimPosition::Middle, (true, true, true), 20)]
fn current_reflects_limit_switches(
    #[case] start: SimPosition,
    #[case] pins: (bool, bool, bool),
    #[case] expected_raw: u16,
) {
    let (act, _clock) = rig(start, 1000);
    drive(&act, pins.0, pins.1, pins.2);
    let mut sense = act.current_sense();
    assert_eq!(sense.read_raw(T).unwrap(), expected_raw);
}

#[rstest]
fn full_stroke_reaches_open_limit_and_current_drops() {
    let (act, clock) = rig(SimPosition::Closed, 1000);
    let mut sense = act.current_sense();
    drive(&act, true, false, true);

    clock.advance(600);
    assert_eq!(act.position_ms(), 600);
    assert_eq!(sense.read_raw(T).unwrap(), 1800);

    clock.advance(600);
    assert!(act.is_open());
    assert_eq!(sense.read_raw(T).unwrap(), 20);
}

#[rstest]
fn injected_fault_pulls_line_low_and_freezes_motion() {
    let (act, clock) = rig(SimPosition::Middle, 1000);
    let mut fault = act.fault_line();
    assert!(fault.is_high().unwrap());

    drive(&act, true, false, true);
    clock.advance(100);
    act.inject_fault(true);
    let frozen = act.position_ms();
    clock.advance(100);

    assert!(!fault.is_high().unwrap());
    assert_eq!(act.position_ms(), frozen);
    assert_eq!(act.current_sense().read_raw(T).unwrap(), 20);
}

#[rstest]
fn analog_calibration_is_recorded() {
    let (act, _clock) = rig(SimPosition::Closed, 1000);
    assert!(!act.is_calibrated());
    act.current_sense().calibrate().unwrap();
    assert!(act.is_calibrated());
}
