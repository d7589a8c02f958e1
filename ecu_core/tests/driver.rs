use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ecu_core::mocks::{MockBridge, MockCurrent, MockFault, MockOutput};
use ecu_core::{Direction, DriverCfg, DriverFault, EcuError, MotorDriver};
use ecu_traits::ManualClock;
use rstest::rstest;

/// Raw code reading 1446 mA with default parameters.
const HIGH_RAW: u16 = 2000;
/// Raw code reading 13 mA with default parameters.
const LOW_RAW: u16 = 20;

type Driver = MotorDriver<MockOutput, MockFault, MockCurrent>;

fn driver(bridge: &MockBridge, clock: &ManualClock) -> Driver {
    MotorDriver::new(
        "test",
        bridge.pins(),
        DriverCfg::default(),
        Arc::new(clock.clone()),
    )
    .unwrap()
}

fn recording(d: &mut Driver) -> Rc<RefCell<Vec<DriverFault>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    d.set_fault_handler(move |f| sink.borrow_mut().push(f));
    seen
}

#[test]
fn init_drives_outputs_low_and_calibrates() {
    let bridge = MockBridge::new();
    let clock = ManualClock::new();
    let mut d = driver(&bridge, &clock);
    d.init().unwrap();
    assert_eq!(bridge.levels(), (false, false, false));
    assert_eq!(bridge.writes(), 3);
    assert!(bridge.current.is_calibrated());
    assert_eq!(d.state(), Direction::None);
}

#[test]
fn repeated_act_keeps_pins_but_refreshes_timestamp() {
    let bridge = MockBridge::new();
    let clock = ManualClock::starting_at(10);
    let mut d = driver(&bridge, &clock);
    d.act(Direction::Left).unwrap();
    let levels = bridge.levels();
    assert_eq!(d.last_action_ms(), 10);

    clock.advance(40);
    d.act(Direction::Left).unwrap();
    assert_eq!(bridge.levels(), levels);
    assert_eq!(d.last_action_ms(), 50);
}

#[rstest]
#[case(Direction::Left, Direction::Right)]
#[case(Direction::Right, Direction::Left)]
#[case(Direction::Off, Direction::Right)]
#[case(Direction::Stop, Direction::Right)]
#[case(Direction::None, Direction::Right)]
fn act_invert(#[case] from: Direction, #[case] to: Direction) {
    let bridge = MockBridge::new();
    let mut d = driver(&bridge, &ManualClock::new());
    d.act(from).unwrap();
    d.act_invert().unwrap();
    assert_eq!(d.state(), to);
}

#[test]
fn unforced_read_does_not_sample() {
    let bridge = MockBridge::new();
    bridge.current.set_steady(HIGH_RAW);
    let mut d = driver(&bridge, &ManualClock::new());
    assert_eq!(d.current_milliamps(false).unwrap(), 0);
    assert_eq!(bridge.current.reads(), 0);

    // one sample in an empty window of eight
    assert_eq!(d.current_milliamps(true).unwrap(), 1446 / 8);
    assert_eq!(bridge.current.reads(), 1);
}

#[test]
fn probe_seeds_the_whole_window() {
    let bridge = MockBridge::new();
    bridge.current.push_raw([HIGH_RAW]);
    let mut d = driver(&bridge, &ManualClock::new());
    assert_eq!(d.probe_current().unwrap(), 1446);
    assert_eq!(d.current_milliamps(false).unwrap(), 1446);
}

#[test]
fn set_current_params_changes_conversion() {
    let bridge = MockBridge::new();
    bridge.current.set_steady(4095);
    let mut d = driver(&bridge, &ManualClock::new());
    d.set_current_params(3_324_000, 4980).unwrap();
    // 811 * 4095 / 4980 = 666, / 0.45
    assert_eq!(d.probe_current().unwrap(), 1480);
    assert!(d.set_current_params(3_324_000, 0).is_err());
    assert!(d.set_timeout(0).is_err());
}

#[test]
fn tick_is_rate_limited() {
    let bridge = MockBridge::new();
    let mut d = driver(&bridge, &ManualClock::new());
    d.tick(0).unwrap();
    assert_eq!(bridge.current.reads(), 0);
    d.tick(15).unwrap();
    assert_eq!(bridge.current.reads(), 1);
    d.tick(29).unwrap();
    assert_eq!(bridge.current.reads(), 1);
    d.tick(30).unwrap();
    assert_eq!(bridge.current.reads(), 2);
}

#[test]
fn asserted_fault_line_switches_off() {
    let bridge = MockBridge::new();
    let clock = ManualClock::new();
    let mut d = driver(&bridge, &clock);
    let seen = recording(&mut d);
    d.act(Direction::Right).unwrap();
    bridge.fault.assert_fault(true);

    assert_eq!(d.tick(20).unwrap(), Some(DriverFault::HardwareFault));
    assert_eq!(d.state(), Direction::Off);
    assert_eq!(bridge.levels(), (false, false, false));
    assert_eq!(*seen.borrow(), vec![DriverFault::HardwareFault]);
    assert_eq!(DriverFault::HardwareFault.code(), 0x01);
}

#[test]
fn run_timeout_brakes_after_limit() {
    let bridge = MockBridge::new();
    let clock = ManualClock::new();
    let mut d = driver(&bridge, &clock);
    let seen = recording(&mut d);
    d.act(Direction::Left).unwrap();

    assert_eq!(d.tick(30_000).unwrap(), None);
    assert_eq!(d.state(), Direction::Left);

    assert_eq!(d.tick(30_015).unwrap(), Some(DriverFault::ActionTimeout));
    assert_eq!(d.state(), Direction::Stop);
    assert_eq!(bridge.levels(), (true, true, true));
    assert_eq!(*seen.borrow(), vec![DriverFault::ActionTimeout]);
    assert_eq!(DriverFault::ActionTimeout.code(), 0x02);
}

#[test]
fn timeout_only_applies_while_driving() {
    let bridge = MockBridge::new();
    let mut d = driver(&bridge, &ManualClock::new());
    d.act(Direction::Stop).unwrap();
    assert_eq!(d.tick(60_000).unwrap(), None);
    assert_eq!(d.state(), Direction::Stop);
}

#[test]
fn fault_line_wins_over_timeout() {
    let bridge = MockBridge::new();
    let mut d = driver(&bridge, &ManualClock::new());
    let seen = recording(&mut d);
    d.act(Direction::Right).unwrap();
    bridge.fault.assert_fault(true);

    assert_eq!(d.tick(40_000).unwrap(), Some(DriverFault::HardwareFault));
    assert_eq!(*seen.borrow(), vec![DriverFault::HardwareFault]);
    assert_eq!(d.state(), Direction::Off);
}

#[test]
fn fault_without_handler_is_still_returned() {
    let bridge = MockBridge::new();
    let mut d = driver(&bridge, &ManualClock::new());
    bridge.fault.assert_fault(true);
    assert_eq!(d.tick(15).unwrap(), Some(DriverFault::HardwareFault));
}

#[test]
fn held_fault_is_raised_every_tick() {
    let bridge = MockBridge::new();
    let mut d = driver(&bridge, &ManualClock::new());
    let seen = recording(&mut d);
    bridge.fault.assert_fault(true);
    d.tick(15).unwrap();
    d.tick(30).unwrap();
    bridge.fault.assert_fault(false);
    d.tick(45).unwrap();
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn timestamps_survive_counter_wrap() {
    let bridge = MockBridge::new();
    let start = u32::MAX - 10;
    let clock = ManualClock::starting_at(start);
    let mut d = driver(&bridge, &clock);
    d.act(Direction::Left).unwrap();

    let mut now = start;
    // first tick runs; last tick starts at zero
    assert_eq!(d.tick(now).unwrap(), None);
    now = now.wrapping_add(15);
    assert_eq!(d.tick(now).unwrap(), None);
    assert_eq!(bridge.current.reads(), 2);
    assert_eq!(d.state(), Direction::Left);

    now = start.wrapping_add(30_001);
    assert_eq!(d.tick(now).unwrap(), Some(DriverFault::ActionTimeout));
}

#[test]
fn pin_failure_surfaces_as_hardware_error() {
    let bridge = MockBridge::new();
    let mut d = driver(&bridge, &ManualClock::new());
    bridge.in2.set_failing(true);
    let err = d.act(Direction::Right).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EcuError>(),
        Some(EcuError::Hardware(_))
    ));
    assert!(format!("{err:#}").contains("drive Right"));
}

#[test]
fn low_current_reads_low() {
    let bridge = MockBridge::new();
    bridge.current.set_steady(LOW_RAW);
    let mut d = driver(&bridge, &ManualClock::new());
    assert_eq!(d.probe_current().unwrap(), 13);
}

#[test]
fn fault_line_can_be_read_without_ticking() {
    let bridge = MockBridge::new();
    let clock = ManualClock::new();
    let mut d = driver(&bridge, &clock);
    assert!(!d.fault_asserted().unwrap());
    bridge.fault.assert_fault(true);
    assert!(d.fault_asserted().unwrap());
    assert_eq!(d.state(), Direction::None);
}
