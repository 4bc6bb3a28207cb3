//! Threaded driver around [`TimerMachine`].
//!
//! The controller owns the countdown worker, applies effects outside the
//! machine lock and pushes a fresh [`Frame`] to the tray host after every
//! change.
//!
//! ## Threads
//!
//! ```text
//! host thread ── start/stop/adjust/toggle ──┐
//!                                            ├─ machine: Mutex<TimerMachine>
//! countdown worker ── tick once per minute ──┘
//! ```
//!
//! A minute is `polls_per_minute` sleeps of `poll_interval`; the cancel
//! flag is checked after each sleep. There is at most one worker.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tracing::{debug, error, info};

use super::effect::Outcome;
use super::{TimerMachine, TimerSession};
use crate::error::ValidationError;
use crate::events::Event;
use crate::icon::{IconImage, IconRenderer, PixelIconRenderer};
use crate::integrations::EffectsGateway;
use crate::menu::{build_menu, MenuCommand, MenuEntry, MenuView};
use crate::settings::{load_settings, load_time_worked, Feature, Settings, TimerKind};
use crate::storage::{CountdownConfig, PersistenceStore};

/// Source of the current calendar date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A settable date, for tests.
#[derive(Debug)]
pub struct FixedClock(Mutex<NaiveDate>);

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self(Mutex::new(date))
    }

    pub fn set(&self, date: NaiveDate) {
        *self.0.lock().unwrap_or_else(|p| p.into_inner()) = date;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Everything a tray host shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub icon: IconImage,
    pub menu: Vec<MenuEntry>,
    pub tooltip: String,
    pub session: TimerSession,
}

/// OS tray surface (or a stand-in for it).
pub trait TrayHost: Send + Sync {
    fn present(&self, frame: Frame);

    fn notify(&self, _event: &Event) {}
}

struct Inner {
    machine: Mutex<TimerMachine>,
    effects: Arc<dyn EffectsGateway>,
    host: Arc<dyn TrayHost>,
    renderer: Arc<dyn IconRenderer>,
    clock: Arc<dyn Clock>,
    countdown: CountdownConfig,
    /// Raised to make the worker reset to READY and exit.
    cancel: AtomicBool,
    /// Whether a worker is counting; only changed under the machine lock.
    running: AtomicBool,
    redraw: Mutex<()>,
}

pub struct TimerController {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Collects the optional parts of a [`TimerController`].
pub struct ControllerBuilder {
    machine: TimerMachine,
    effects: Arc<dyn EffectsGateway>,
    host: Arc<dyn TrayHost>,
    renderer: Arc<dyn IconRenderer>,
    clock: Arc<dyn Clock>,
    countdown: CountdownConfig,
}

impl ControllerBuilder {
    pub fn countdown(mut self, countdown: CountdownConfig) -> Self {
        self.countdown = countdown;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn IconRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn build(self) -> TimerController {
        let mut machine = self.machine;
        machine.set_playback_available(self.effects.playback_available());
        TimerController {
            inner: Arc::new(Inner {
                machine: Mutex::new(machine),
                effects: self.effects,
                host: self.host,
                renderer: self.renderer,
                clock: self.clock,
                countdown: self.countdown,
                cancel: AtomicBool::new(false),
                running: AtomicBool::new(false),
                redraw: Mutex::new(()),
            }),
            worker: Mutex::new(None),
        }
    }
}

impl TimerController {
    pub fn builder(
        machine: TimerMachine,
        effects: Arc<dyn EffectsGateway>,
        host: Arc<dyn TrayHost>,
    ) -> ControllerBuilder {
        ControllerBuilder {
            machine,
            effects,
            host,
            renderer: Arc::new(PixelIconRenderer),
            clock: Arc::new(SystemClock),
            countdown: CountdownConfig::default(),
        }
    }

    pub fn new(
        machine: TimerMachine,
        effects: Arc<dyn EffectsGateway>,
        host: Arc<dyn TrayHost>,
    ) -> Self {
        Self::builder(machine, effects, host).build()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session(&self) -> TimerSession {
        self.inner.machine().session()
    }

    pub fn frame(&self) -> Frame {
        self.inner.frame()
    }

    pub fn settings(&self) -> Settings {
        self.inner.machine().settings().clone()
    }

    /// Whether the cancellation flag is raised.
    pub fn cancel_requested(&self) -> bool {
        self.inner.cancel.load(Ordering::SeqCst)
    }

    pub fn worker_alive(&self) -> bool {
        self.worker_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Show STARTING, load settings and today's counter, then go READY.
    pub fn initialize(&self, store: &dyn PersistenceStore) {
        self.inner.redraw();
        let today = self.inner.clock.today();
        let (refs, defaults) = {
            let machine = self.inner.machine();
            (machine.config().refs.clone(), machine.settings().clone())
        };
        let settings = load_settings(store, &refs, &defaults);
        let time_worked = load_time_worked(store, &refs, today);
        info!(time_worked, "timer ready");
        let outcome = self.inner.machine().ready(settings, time_worked, today);
        self.inner.finish(outcome);
    }

    pub fn dispatch(&self, command: MenuCommand) -> Result<(), ValidationError> {
        debug!(?command, "menu command");
        match command {
            MenuCommand::Start => self.start(),
            MenuCommand::Stop => self.stop(),
            MenuCommand::Adjust { kind, delta } => {
                self.adjust(kind, delta);
                Ok(())
            }
            MenuCommand::Toggle { feature } => self.toggle(feature),
            MenuCommand::Exit => {
                self.exit();
                Ok(())
            }
        }
    }

    pub fn start(&self) -> Result<(), ValidationError> {
        let mut worker = self.worker_slot();
        {
            let machine = self.inner.machine();
            if !crate::menu::can_start(machine.state()) {
                return Err(ValidationError::NotAllowed {
                    command: "start".into(),
                    state: machine.state().to_string(),
                });
            }
        }

        // A stopped worker may still be inside its last poll.
        if let Some(previous) = worker.take() {
            if !previous.is_finished() {
                self.inner.cancel.store(true, Ordering::SeqCst);
            }
            if previous.join().is_err() {
                error!("countdown worker panicked");
            }
        }
        self.inner.cancel.store(false, Ordering::SeqCst);

        let outcome = {
            let mut machine = self.inner.machine();
            let outcome = machine.start()?;
            self.inner.running.store(true, Ordering::SeqCst);
            outcome
        };
        self.inner.finish(outcome);

        let inner = Arc::clone(&self.inner);
        match std::thread::Builder::new()
            .name("pomotray-countdown".into())
            .spawn(move || inner.run_countdown())
        {
            Ok(handle) => *worker = Some(handle),
            Err(e) => {
                error!(error = %e, "could not spawn countdown worker");
                let outcome = {
                    let mut machine = self.inner.machine();
                    self.inner.running.store(false, Ordering::SeqCst);
                    machine.cancel_countdown()
                };
                self.inner.finish(outcome);
            }
        }
        Ok(())
    }

    pub fn stop(&self) -> Result<(), ValidationError> {
        let outcome = {
            let mut machine = self.inner.machine();
            let outcome = machine.stop()?;
            if self.inner.running.load(Ordering::SeqCst) {
                self.inner.cancel.store(true, Ordering::SeqCst);
            }
            outcome
        };
        self.inner.finish(outcome);
        Ok(())
    }

    pub fn adjust(&self, kind: TimerKind, delta: i32) {
        let outcome = self.inner.machine().adjust(kind, delta);
        self.inner.finish(outcome);
    }

    pub fn toggle(&self, feature: Feature) -> Result<(), ValidationError> {
        let outcome = self.inner.machine().toggle(feature)?;
        self.inner.finish(outcome);
        Ok(())
    }

    /// One elapsed minute, outside the worker's schedule.
    ///
    /// Returns whether the countdown would keep running.
    pub fn advance_minute(&self) -> bool {
        self.inner.advance_minute()
    }

    /// Stop the worker and background gateways.
    pub fn exit(&self) {
        info!("exiting");
        self.inner.cancel.store(true, Ordering::SeqCst);
        self.join_worker();
        self.inner.cancel.store(false, Ordering::SeqCst);
        self.inner.effects.shutdown();
    }

    /// Wait for the current worker to end on its own (or after a stop).
    pub fn join_worker(&self) {
        let handle = self.worker_slot().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("countdown worker panicked");
            }
        }
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Inner {
    fn machine(&self) -> MutexGuard<'_, TimerMachine> {
        self.machine.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn run_countdown(&self) {
        debug!("countdown worker started");
        loop {
            for _ in 0..self.countdown.polls_per_minute {
                std::thread::sleep(self.countdown.poll_interval());
                if self.cancelled() {
                    self.reset_after_cancel();
                    return;
                }
            }
            if !self.worker_step() {
                debug!("countdown worker finished");
                return;
            }
        }
    }

    fn reset_after_cancel(&self) {
        let outcome = {
            let mut machine = self.machine();
            let outcome = machine.cancel_countdown();
            self.cancel.store(false, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
            outcome
        };
        debug!("countdown cancelled");
        self.finish(outcome);
    }

    fn advance_minute(&self) -> bool {
        let tick = {
            let mut machine = self.machine();
            let tick = machine.tick(self.clock.today());
            if !tick.keep_running {
                self.running.store(false, Ordering::SeqCst);
            }
            tick
        };
        self.finish(tick.outcome);
        tick.keep_running
    }

    /// The worker's end-of-minute step.
    ///
    /// `stop` raises the flag under the machine lock, so checking it under
    /// the same lock leaves no gap between the check and the tick.
    fn worker_step(&self) -> bool {
        let (outcome, keep_running) = {
            let mut machine = self.machine();
            if self.cancelled() {
                let outcome = machine.cancel_countdown();
                self.cancel.store(false, Ordering::SeqCst);
                self.running.store(false, Ordering::SeqCst);
                debug!("countdown cancelled");
                (outcome, false)
            } else {
                let tick = machine.tick(self.clock.today());
                if !tick.keep_running {
                    self.running.store(false, Ordering::SeqCst);
                }
                (tick.outcome, tick.keep_running)
            }
        };
        self.finish(outcome);
        keep_running
    }

    /// Apply effects, forward events and redraw.
    fn finish(&self, outcome: Outcome) {
        for effect in outcome.effects {
            self.effects.apply(effect);
        }
        for event in &outcome.events {
            debug!(kind = event.kind(), "event");
            self.host.notify(event);
        }
        self.redraw();
    }

    fn frame(&self) -> Frame {
        let (session, view, color) = {
            let machine = self.machine();
            let session = machine.session();
            let settings = machine.settings();
            let view = MenuView {
                state: session.state,
                blocks_worked: session.blocks_worked(),
                step_size: settings.step_size,
                hide_windows: settings.hide_windows,
                spotify: settings.spotify,
                home_assistant: settings.home_assistant,
                spotify_available: machine.playback_available(),
            };
            let color = machine.styles().color(session.state).to_string();
            (session, view, color)
        };

        let icon = if session.state.shows_marker() {
            self.renderer.render_circle(&color)
        } else {
            self.renderer
                .render_text(&session.current_timer_value.to_string(), &color)
        };
        let tooltip = if session.state.shows_marker() {
            format!("Pomodoro: {}", session.state)
        } else {
            format!(
                "Pomodoro: {} ({} min)",
                session.state, session.current_timer_value
            )
        };
        Frame {
            icon,
            menu: build_menu(&view),
            tooltip,
            session,
        }
    }

    fn redraw(&self) {
        let _guard = self.redraw.lock().unwrap_or_else(|p| p.into_inner());
        self.host.present(self.frame());
    }
}

impl Drop for TimerController {
    fn drop(&mut self) {
        if self.worker_slot().is_some() {
            self.inner.cancel.store(true, Ordering::SeqCst);
            self.join_worker();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{MachineConfig, TimerState};

    struct NoEffects;

    impl EffectsGateway for NoEffects {
        fn apply(&self, _effect: crate::timer::Effect) {}
    }

    struct NoHost;

    impl TrayHost for NoHost {
        fn present(&self, _frame: Frame) {}
    }

    fn controller() -> TimerController {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let machine = TimerMachine::new(MachineConfig::default(), Settings::default(), today);
        let controller = TimerController::builder(machine, Arc::new(NoEffects), Arc::new(NoHost))
            .clock(Arc::new(FixedClock::new(today)))
            .build();
        controller.initialize(&crate::storage::MemoryStore::new());
        controller
    }

    #[test]
    fn worker_step_after_late_stop_clears_flag() {
        let c = controller();
        // Stand in for a worker that has finished its polls but not ticked yet.
        {
            let mut machine = c.inner.machine();
            machine.start().unwrap();
            c.inner.running.store(true, Ordering::SeqCst);
        }
        c.stop().unwrap();
        assert!(c.cancel_requested());

        assert!(!c.inner.worker_step());
        assert!(!c.cancel_requested());
        assert!(!c.inner.running.load(Ordering::SeqCst));
        let session = c.session();
        assert_eq!(session.state, TimerState::Ready);
        assert_eq!(session.current_timer_value, 25);
        assert_eq!(session.time_worked, 0);
    }

    #[test]
    fn worker_step_ticks_when_not_cancelled() {
        let c = controller();
        {
            let mut machine = c.inner.machine();
            machine.start().unwrap();
            c.inner.running.store(true, Ordering::SeqCst);
        }
        assert!(c.inner.worker_step());
        assert_eq!(c.session().current_timer_value, 24);
        assert_eq!(c.session().time_worked, 1);
    }
}
