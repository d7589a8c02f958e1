//! Cooperative scheduling loop over an [`ActuatorBank`].
//!
//! Each pass delivers the scripted frames that are due, ticks both
//! controllers, reports hardware faults and records state transitions, then
//! sleeps one period. The loop ends at the deadline or when the shutdown flag
//! is raised, and always leaves both bridges de-energized.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ecu_traits::{AnalogInput, Clock, DigitalInput, DigitalOutput};
use eyre::WrapErr;
use tracing::{debug, info, warn};

use crate::bank::{ActuatorBank, ActuatorId};
use crate::bus::{self, FaultReports, Frame, HandlerResult};
use crate::error::{EcuError, Result};
use crate::status::ActuatorState;
use crate::util::elapsed_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptAction {
    /// Deliver a frame as if received from the bus.
    Frame(Frame),
    /// Assert or release a bridge fault line. Only meaningful with a fault injector.
    Fault { actuator: ActuatorId, asserted: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStep {
    /// Offset from the start of the run.
    pub at_ms: u32,
    pub action: ScriptAction,
}

impl From<&ecu_config::ScriptRow> for ScriptStep {
    fn from(row: &ecu_config::ScriptRow) -> Self {
        use ecu_config::ScriptCommand;
        let actuator = match row.target {
            ecu_config::ScriptTarget::Hood => ActuatorId::Hood,
            ecu_config::ScriptTarget::Trunk => ActuatorId::Trunk,
        };
        let value = row.value.unwrap_or(0);
        let action = match row.command {
            // Rows are range-checked at load; clamp keeps the conversion total.
            ScriptCommand::Set => {
                ScriptAction::Frame(Frame::set(actuator, value.clamp(-100, 100) as i8))
            }
            ScriptCommand::Toggle => ScriptAction::Frame(Frame::toggle(actuator)),
            ScriptCommand::Request => ScriptAction::Frame(Frame::request(actuator)),
            ScriptCommand::Fault => ScriptAction::Fault {
                actuator,
                asserted: value != 0,
            },
        };
        Self {
            at_ms: row.at_ms,
            action,
        }
    }
}

/// State change observed by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Offset from the start of the run.
    pub at_ms: u32,
    pub actuator: ActuatorId,
    pub from: ActuatorState,
    pub to: ActuatorState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    Transition(Transition),
    /// Reply frame produced by a delivered command.
    Reply { at_ms: u32, frame: Frame },
    /// Error descriptor for a rejected command or a reported hardware fault.
    BusError {
        at_ms: u32,
        error: bus::BusError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub hood: ActuatorState,
    pub trunk: ActuatorState,
    pub elapsed_ms: u32,
    pub frames: u32,
    pub transitions: u32,
    pub faults_reported: u32,
    /// Loop ended on the shutdown flag rather than the deadline.
    pub interrupted: bool,
}

type FaultInjector = Box<dyn FnMut(ActuatorId, bool)>;

pub struct Runner<O, I, A> {
    bank: ActuatorBank<O, I, A>,
    clock: Arc<dyn Clock + Send + Sync>,
    period: Duration,
    inject_fault: Option<FaultInjector>,
}

impl<O, I, A> Runner<O, I, A>
where
    O: DigitalOutput,
    I: DigitalInput,
    A: AnalogInput,
{
    /// A zero period is raised to 1 ms so virtual time always advances.
    pub fn new(
        bank: ActuatorBank<O, I, A>,
        clock: Arc<dyn Clock + Send + Sync>,
        period: Duration,
    ) -> Self {
        Self {
            bank,
            clock,
            period: period.max(Duration::from_millis(1)),
            inject_fault: None,
        }
    }

    /// Hook used for scripted [`ScriptAction::Fault`] steps.
    pub fn with_fault_injector(mut self, f: impl FnMut(ActuatorId, bool) + 'static) -> Self {
        self.inject_fault = Some(Box::new(f));
        self
    }

    pub fn bank(&self) -> &ActuatorBank<O, I, A> {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut ActuatorBank<O, I, A> {
        &mut self.bank
    }

    /// Run until `duration_ms` elapsed (forever when `None`) or `shutdown` is set.
    ///
    /// Script steps must be sorted by `at_ms`. Every observable event is passed
    /// to `on_event` as it happens.
    pub fn run(
        &mut self,
        duration_ms: Option<u32>,
        script: &[ScriptStep],
        shutdown: &AtomicBool,
        mut on_event: impl FnMut(&RunEvent),
    ) -> Result<RunSummary> {
        let result = self.run_inner(duration_ms, script, shutdown, &mut on_event);
        let off = self.bank.power_off();
        match (result, off) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(off)) => {
                warn!(error = %off, "power off after failed run");
                Err(e)
            }
        }
    }

    fn run_inner(
        &mut self,
        duration_ms: Option<u32>,
        script: &[ScriptStep],
        shutdown: &AtomicBool,
        on_event: &mut dyn FnMut(&RunEvent),
    ) -> Result<RunSummary> {
        if script.windows(2).any(|w| w[1].at_ms < w[0].at_ms) {
            return Err(EcuError::State("script steps are not sorted by at_ms".into()).into());
        }
        let start = self.clock.now_ms();
        let mut next_step = 0usize;
        let mut reports = FaultReports::new();
        let mut last = self.bank.states();
        let mut summary = RunSummary {
            hood: last.0,
            trunk: last.1,
            elapsed_ms: 0,
            frames: 0,
            transitions: 0,
            faults_reported: 0,
            interrupted: false,
        };
        info!(?duration_ms, steps = script.len(), period = ?self.period, "loop start");

        loop {
            let now = self.clock.now_ms();
            let t = elapsed_ms(now, start);
            summary.elapsed_ms = t;
            if shutdown.load(Ordering::Relaxed) {
                summary.interrupted = true;
                info!(at_ms = t, "shutdown requested");
                break;
            }
            if duration_ms.is_some_and(|d| t >= d) {
                break;
            }

            while let Some(step) = script.get(next_step).filter(|s| s.at_ms <= t) {
                next_step += 1;
                match step.action {
                    ScriptAction::Frame(frame) => {
                        summary.frames += 1;
                        let result = bus::handle_frame(&mut self.bank, &frame)
                            .wrap_err_with(|| format!("handle frame at {t} ms"))?;
                        match result {
                            HandlerResult::Ignore => {}
                            HandlerResult::SendFrame(frame) => {
                                on_event(&RunEvent::Reply { at_ms: t, frame });
                            }
                            HandlerResult::Error(error) => {
                                on_event(&RunEvent::BusError { at_ms: t, error });
                            }
                        }
                    }
                    ScriptAction::Fault { actuator, asserted } => match self.inject_fault.as_mut() {
                        Some(inject) => {
                            debug!(%actuator, asserted, "inject fault");
                            inject(actuator, asserted);
                        }
                        None => warn!(%actuator, "fault step ignored; no injector"),
                    },
                }
            }

            // Frames above stamp their own times; the sweeps must not see a stamp
            // later than the `now` they compare against.
            let now = self.clock.now_ms();
            let faults = self.bank.tick(now)?;
            reports.record(&faults);
            for id in ActuatorId::ALL {
                if let HandlerResult::Error(error) = reports.take_fault_report(id) {
                    summary.faults_reported += 1;
                    on_event(&RunEvent::BusError { at_ms: t, error });
                }
            }

            let states = self.bank.states();
            for (actuator, from, to) in [
                (ActuatorId::Hood, last.0, states.0),
                (ActuatorId::Trunk, last.1, states.1),
            ] {
                if from != to {
                    summary.transitions += 1;
                    info!(%actuator, %from, %to, at_ms = t, "transition");
                    on_event(&RunEvent::Transition(Transition {
                        at_ms: t,
                        actuator,
                        from,
                        to,
                    }));
                }
            }
            last = states;

            self.clock.sleep(self.period);
        }

        (summary.hood, summary.trunk) = last;
        info!(
            hood = %summary.hood,
            trunk = %summary.trunk,
            elapsed_ms = summary.elapsed_ms,
            "loop end"
        );
        Ok(summary)
    }
}
