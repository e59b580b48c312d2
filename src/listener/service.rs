//! Listener service
//!
//! Runs the single consumer thread that drains the capture queue, pushes
//! events through the pipeline and writes records to storage. Control
//! commands arrive on a channel and are applied between write cycles.

use crate::capture::flags::CaptureFlags;
use crate::capture::hooks::{HookError, InputHook};
use crate::capture::programs::{ExeLookup, ForegroundPid};
use crate::capture::queue::{event_queue, EventConsumer, EventProducer};
use crate::capture::types::{now_stamp, Category, RawInputEvent};
use crate::config::{ConfigError, ListenerConfig};
use crate::keyboard::normalizer::Platform;
use crate::listener::commands::{Command, CommandError, SessionCommand};
use crate::processing::pipeline::Pipeline;
use crate::processing::sessions::SessionStats;
use crate::storage::sink::{EventSink, FlushReport};
use crate::storage::{AppEvent, EventStore, Record, StoreError};
use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex as ParkingMutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Wake-up period while no events arrive, for expiring pending records and
/// retrying failed writes
const IDLE_TICK: Duration = Duration::from_millis(500);

/// Errors that can occur while running the listener
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid command: {0}")]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input hook error: {0}")]
    Hook(#[from] HookError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Listener is not running")]
    NotRunning,

    #[error("Listener thread panicked")]
    Panicked,
}

/// Result type for listener operations
pub type ListenerResult<T> = Result<T, ListenerError>;

/// Result of an applied command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Done,
    /// Display snapshots recorded by `screen_size`
    ScreenSizes(usize),
    /// Events deleted by `clear` or `session clear`
    Cleared(u64),
    /// Id of the session opened by `session start`
    SessionStarted(i64),
    /// Id of the session closed by `session stop`, if one was running
    SessionStopped(Option<i64>),
    /// Command accepted without effect
    Ignored,
}

/// Counters reported to the host after every write cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CounterSnapshot {
    /// Records produced per category since start
    pub counts: BTreeMap<Category, u64>,
    /// Malformed events skipped by the reducer
    pub soft_errors: u64,
    /// Raw events dropped because the capture queue was full
    pub dropped_events: u64,
    /// Records stored since start
    pub written: u64,
    /// Records waiting for storage to recover
    pub pending_writes: usize,
    /// Records discarded because the write backlog was full
    pub dropped_writes: u64,
    pub storage_failing: bool,
    pub last_error: Option<String>,
    pub typing: SessionStats,
}

pub type CountsCallback = Box<dyn Fn(&CounterSnapshot) + Send>;

enum Control {
    Command {
        command: Command,
        reply: Option<Sender<ListenerResult<CommandOutcome>>>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Shutdown,
}

/// Builder for a [`Listener`]
pub struct ListenerBuilder {
    config: ListenerConfig,
    platform: Option<Platform>,
    hooks: Vec<Box<dyn InputHook>>,
    on_counts: Option<CountsCallback>,
    foreground: Option<Arc<dyn ForegroundPid>>,
    exe_lookup: Option<Box<dyn ExeLookup>>,
}

impl ListenerBuilder {
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            platform: None,
            hooks: Vec::new(),
            on_counts: None,
            foreground: None,
            exe_lookup: None,
        }
    }

    /// Key code conventions of fed events, defaults to the first hook's or the host's
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn hook(mut self, hook: Box<dyn InputHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Attribute events to the program in the foreground when they are pushed
    pub fn programs(
        mut self,
        foreground: impl ForegroundPid + 'static,
        exe_lookup: impl ExeLookup + 'static,
    ) -> Self {
        self.foreground = Some(Arc::new(foreground));
        self.exe_lookup = Some(Box::new(exe_lookup));
        self
    }

    /// Called on the consumer thread after every write cycle
    pub fn on_counts(mut self, callback: impl Fn(&CounterSnapshot) + Send + 'static) -> Self {
        self.on_counts = Some(Box::new(callback));
        self
    }

    /// Start the consumer thread writing to `store`
    pub fn spawn<S: EventStore + 'static>(self, mut store: S) -> ListenerResult<Listener> {
        let ListenerBuilder {
            config,
            platform,
            hooks,
            on_counts,
            foreground,
            exe_lookup,
        } = self;
        let platform = platform
            .or_else(|| hooks.first().map(|h| h.platform()))
            .unwrap_or_else(Platform::current);

        let flags = Arc::new(CaptureFlags::default());
        let (mut producer, consumer) = event_queue(config.max_events_for_queue, flags.clone());

        let mut pipeline = Pipeline::new(platform, &config);
        if let (Some(foreground), Some(exe_lookup)) = (foreground, exe_lookup) {
            producer = producer.with_foreground(foreground);
            pipeline.set_exe_lookup(exe_lookup);
        }
        match store.screen_sizes() {
            Ok(history) => pipeline.seed_geometry(history, &config),
            Err(e) => tracing::warn!("Failed to load display history: {}", e),
        }
        let (stamp, _) = now_stamp();
        if let Err(e) = store.insert_app_event(AppEvent::Start, stamp) {
            tracing::warn!("Failed to record listener start: {}", e);
        }

        let (control_tx, control_rx) = unbounded();
        let snapshot = Arc::new(ParkingMutex::new(CounterSnapshot::default()));
        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            sink: EventSink::new(store, &config),
            config,
            flags: flags.clone(),
            consumer,
            producer: producer.clone(),
            control: control_rx,
            pipeline,
            hooks,
            batch: Vec::new(),
            snapshot: snapshot.clone(),
            on_counts,
            running: running.clone(),
        };

        let handle = thread::Builder::new()
            .name("inputscope-consumer".to_string())
            .spawn(move || worker.run())?;

        tracing::info!("Listener started ({:?} key codes)", platform);
        Ok(Listener {
            control: control_tx,
            producer,
            flags,
            snapshot,
            running,
            thread_handle: Arc::new(ParkingMutex::new(Some(handle))),
        })
    }
}

/// Handle to a running listener.
///
/// Dropping the handle stops the listener, draining and writing whatever is
/// still queued.
pub struct Listener {
    control: Sender<Control>,
    producer: EventProducer,
    flags: Arc<CaptureFlags>,
    snapshot: Arc<ParkingMutex<CounterSnapshot>>,
    running: Arc<AtomicBool>,
    thread_handle: Arc<ParkingMutex<Option<JoinHandle<()>>>>,
}

impl Listener {
    pub fn builder(config: ListenerConfig) -> ListenerBuilder {
        ListenerBuilder::new(config)
    }

    /// Handle for feeding raw events, e.g. from host-side hooks
    pub fn producer(&self) -> EventProducer {
        self.producer.clone()
    }

    pub fn flags(&self) -> &Arc<CaptureFlags> {
        &self.flags
    }

    /// Counters as of the last write cycle
    pub fn snapshot(&self) -> CounterSnapshot {
        self.snapshot.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Apply a command and wait for its outcome
    pub fn execute(&self, command: Command) -> ListenerResult<CommandOutcome> {
        let (reply_tx, reply_rx) = bounded(1);
        self.control
            .send(Control::Command {
                command,
                reply: Some(reply_tx),
            })
            .map_err(|_| ListenerError::NotRunning)?;
        reply_rx.recv().map_err(|_| ListenerError::NotRunning)?
    }

    /// Queue a command without waiting; failures are only logged
    pub fn send(&self, command: Command) -> ListenerResult<()> {
        self.control
            .send(Control::Command {
                command,
                reply: None,
            })
            .map_err(|_| ListenerError::NotRunning)
    }

    /// Parse and apply one command line
    pub fn handle_line(&self, line: &str) -> ListenerResult<CommandOutcome> {
        let command: Command = line.parse()?;
        self.execute(command)
    }

    /// Stop capture, write everything pending and wait for the consumer to exit
    pub fn stop(&self) -> ListenerResult<()> {
        // Already gone after `exit`
        let _ = self.control.send(Control::Shutdown);

        let handle = self.thread_handle.lock().take();
        match handle {
            Some(handle) => handle.join().map_err(|_| ListenerError::Panicked),
            None => Ok(()),
        }
    }

    /// Wait for the consumer to exit on its own, after `exit`
    pub fn join(&self) -> ListenerResult<()> {
        let handle = self.thread_handle.lock().take();
        match handle {
            Some(handle) => handle.join().map_err(|_| ListenerError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!("Listener did not stop cleanly: {}", e);
        }
    }
}

/// State owned by the consumer thread
struct Worker<S> {
    config: ListenerConfig,
    flags: Arc<CaptureFlags>,
    consumer: EventConsumer,
    producer: EventProducer,
    control: Receiver<Control>,
    pipeline: Pipeline,
    sink: EventSink<S>,
    hooks: Vec<Box<dyn InputHook>>,
    /// Records produced since the last write cycle
    batch: Vec<Record>,
    snapshot: Arc<ParkingMutex<CounterSnapshot>>,
    on_counts: Option<CountsCallback>,
    running: Arc<AtomicBool>,
}

impl<S: EventStore> Worker<S> {
    fn run(mut self) {
        if let Err(e) = self.sync_hooks() {
            tracing::error!("Failed to start input hooks: {}", e);
        }

        let events = self.consumer.receiver().clone();
        let control = self.control.clone();
        loop {
            let step = select! {
                recv(events) -> event => match event {
                    Ok(event) => {
                        self.process(event);
                        for event in self.consumer.drain() {
                            self.process(event);
                        }
                        self.write_cycle();
                        self.pause(&control)
                    }
                    Err(_) => Step::Shutdown,
                },
                recv(control) -> msg => match msg {
                    Ok(msg) => self.handle_control(msg),
                    Err(_) => Step::Shutdown,
                },
                default(IDLE_TICK) => {
                    self.write_cycle();
                    Step::Continue
                }
            };
            if step == Step::Shutdown {
                break;
            }
        }

        self.shutdown();
    }

    fn process(&mut self, event: RawInputEvent) {
        let records = self.pipeline.process(event, &self.flags, &self.config);
        self.batch.extend(records);
    }

    /// Let events accumulate for the write interval, still serving commands
    fn pause(&mut self, control: &Receiver<Control>) -> Step {
        let interval = self.config.events_write_interval;
        if !interval.is_finite() || interval <= 0.0 {
            return Step::Continue;
        }
        let deadline = Instant::now() + Duration::from_secs_f64(interval);
        loop {
            match control.recv_deadline(deadline) {
                Ok(msg) => {
                    if self.handle_control(msg) == Step::Shutdown {
                        return Step::Shutdown;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Step::Continue,
                Err(RecvTimeoutError::Disconnected) => return Step::Shutdown,
            }
        }
    }

    fn write_cycle(&mut self) {
        let (now, _) = now_stamp();
        let expired = self.pipeline.flush_expired(now, &self.config);
        self.batch.extend(expired);
        if self.batch.is_empty() && self.sink.pending() == 0 {
            return;
        }
        let report = self.sink.submit(std::mem::take(&mut self.batch));
        self.publish(report);
    }

    fn publish(&mut self, report: FlushReport) {
        let reducer = self.pipeline.reducer();
        let snapshot = CounterSnapshot {
            counts: reducer.counts().clone(),
            soft_errors: reducer.soft_errors(),
            dropped_events: self.consumer.dropped(),
            written: self.sink.written_total(),
            pending_writes: report.pending,
            dropped_writes: self.sink.dropped_total(),
            storage_failing: report.failing,
            last_error: report.error,
            typing: reducer.session_stats(None, self.config.keyboard_session_max_delta),
        };
        if let Some(callback) = &self.on_counts {
            callback(&snapshot);
        }
        *self.snapshot.lock() = snapshot;
    }

    fn handle_control(&mut self, msg: Control) -> Step {
        match msg {
            Control::Command { command, reply } => {
                let exit = command == Command::Exit;
                let result = self.apply(command);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            tracing::warn!("Command failed: {}", e);
                        }
                    }
                }
                if exit {
                    Step::Shutdown
                } else {
                    Step::Continue
                }
            }
            Control::Shutdown => Step::Shutdown,
        }
    }

    fn apply(&mut self, command: Command) -> ListenerResult<CommandOutcome> {
        tracing::debug!("Applying {:?}", command);
        match command {
            Command::Start(target) | Command::Stop(target) => {
                let start = matches!(command, Command::Start(_));
                self.flags.toggle(target, start);
                self.sync_hooks()?;
                Ok(CommandOutcome::Done)
            }
            Command::Ignore(reason) => {
                tracing::warn!("Ignoring command: {}", reason);
                Ok(CommandOutcome::Ignored)
            }
            Command::ScreenSize(sizes) => {
                let (now, _) = now_stamp();
                let appended = self.pipeline.set_screen_sizes(&sizes, now, &self.config);
                if !appended.is_empty() {
                    self.sink.store_mut().insert_screen_sizes(&appended)?;
                }
                Ok(CommandOutcome::ScreenSizes(appended.len()))
            }
            Command::Clear { target, range } => {
                let deleted = self.sink.store_mut().clear(&target.categories(), range)?;
                tracing::info!("Cleared {} events of {:?}", deleted, target);
                Ok(CommandOutcome::Cleared(deleted))
            }
            Command::Configure { name, value } => {
                self.config.configure(&name, &value)?;
                self.pipeline.apply_config(&self.config);
                self.sink.reconfigure(&self.config);
                tracing::info!("Set {} to {}", name, value);
                Ok(CommandOutcome::Done)
            }
            Command::Session(session) => self.apply_session(session),
            Command::Vacuum => {
                self.sink.store_mut().vacuum()?;
                Ok(CommandOutcome::Done)
            }
            Command::Exit => Ok(CommandOutcome::Done),
        }
    }

    fn apply_session(&mut self, command: SessionCommand) -> ListenerResult<CommandOutcome> {
        let (now, _) = now_stamp();
        let store = self.sink.store_mut();
        match command {
            SessionCommand::Start(name) => {
                Ok(CommandOutcome::SessionStarted(store.start_session(&name, now)?))
            }
            SessionCommand::Stop => Ok(CommandOutcome::SessionStopped(store.stop_session(now)?)),
            SessionCommand::Rename { name, id } => {
                store.rename_session(id, &name)?;
                Ok(CommandOutcome::Done)
            }
            SessionCommand::Clear { target, id } => {
                let deleted = store.clear_session(&target.categories(), id)?;
                tracing::info!("Cleared {} events of {:?} in session {}", deleted, target, id);
                Ok(CommandOutcome::Cleared(deleted))
            }
            SessionCommand::Delete(id) => {
                store.delete_session(id)?;
                Ok(CommandOutcome::Done)
            }
        }
    }

    /// Start or stop hooks to match the input flags
    fn sync_hooks(&mut self) -> ListenerResult<()> {
        let mut first_error = None;
        for hook in &mut self.hooks {
            let wanted = self.flags.is_input_enabled(hook.input());
            if wanted && !hook.is_running() {
                if let Err(e) = hook.start(self.producer.clone()) {
                    tracing::error!("Failed to start {} hook: {}", hook.input(), e);
                    first_error.get_or_insert(e);
                }
            } else if !wanted && hook.is_running() {
                hook.stop();
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn shutdown(&mut self) {
        // Nothing may be enqueued once the consumer is gone
        for hook in &mut self.hooks {
            if hook.is_running() {
                hook.stop();
            }
        }

        for event in self.consumer.drain() {
            self.process(event);
        }
        let pending = self.pipeline.flush_all();
        self.batch.extend(pending);

        let mut report = self.sink.submit(std::mem::take(&mut self.batch));
        if report.pending > 0 {
            report = self.sink.flush();
        }
        if report.pending > 0 {
            tracing::error!("{} records could not be written before exit", report.pending);
        }

        let (stamp, _) = now_stamp();
        if let Err(e) = self.sink.store_mut().insert_app_event(AppEvent::Stop, stamp) {
            tracing::warn!("Failed to record listener stop: {}", e);
        }
        self.publish(report);
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::flags::CaptureTarget;
    use crate::capture::hooks::HookResult;
    use crate::capture::types::{InputKind, MouseButton, RawInput};
    use crate::display::geometry::ScreenRect;
    use crate::listener::commands::ClearTarget;
    use crate::storage::MemoryStore;

    fn quick_config() -> ListenerConfig {
        ListenerConfig {
            events_write_interval: 0.0,
            ..Default::default()
        }
    }

    fn click_at(x: f64, stamp: f64) -> RawInputEvent {
        RawInputEvent::at(
            RawInput::MouseClick {
                x,
                y: 10.0,
                button: MouseButton::Left,
                pressed: true,
            },
            stamp,
        )
    }

    /// Hook that only tracks whether it was started
    struct FakeHook {
        input: InputKind,
        running: Arc<AtomicBool>,
    }

    impl InputHook for FakeHook {
        fn input(&self) -> InputKind {
            self.input
        }

        fn start(&mut self, _producer: EventProducer) -> HookResult<()> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) {
            self.running.store(false, Ordering::SeqCst);
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_stop_writes_queued_events() {
        let store = MemoryStore::new();
        let listener = Listener::builder(quick_config())
            .platform(Platform::Linux)
            .spawn(store.clone())
            .unwrap();

        let producer = listener.producer();
        assert!(producer.push_event(click_at(10.0, 1_700_000_000.0)));
        assert!(producer.push_event(click_at(500.0, 1_700_000_001.0)));
        listener.stop().unwrap();

        assert!(!listener.is_running());
        assert_eq!(store.len(Category::Clicks), 2);
        let events: Vec<AppEvent> = store.app_events().into_iter().map(|(e, _)| e).collect();
        assert_eq!(events, vec![AppEvent::Start, AppEvent::Stop]);
        assert_eq!(listener.snapshot().counts.get(&Category::Clicks), Some(&2));
    }

    #[test]
    fn test_commands_reach_store() {
        let store = MemoryStore::new();
        let listener = Listener::builder(quick_config()).spawn(store.clone()).unwrap();

        let outcome = listener
            .execute(Command::ScreenSize(vec![
                ScreenRect::new(0, 0, 1920, 1080),
                ScreenRect::new(1920, 0, 1280, 1024),
            ]))
            .unwrap();
        assert_eq!(outcome, CommandOutcome::ScreenSizes(2));
        assert_eq!(store.screen_sizes().unwrap().len(), 2);

        listener.producer().push_event(click_at(10.0, 1_700_000_000.0));
        assert_eq!(
            listener.handle_line("configure MouseScrollJoinInterval 1.5").unwrap(),
            CommandOutcome::Done
        );
        assert!(matches!(
            listener.handle_line("configure NoSuchOption 1"),
            Err(ListenerError::Config(_))
        ));
        assert!(matches!(
            listener.handle_line("bogus"),
            Err(ListenerError::Command(_))
        ));
        listener.stop().unwrap();
        assert!(matches!(
            listener.execute(Command::Vacuum),
            Err(ListenerError::NotRunning)
        ));
    }

    #[test]
    fn test_clear_removes_stored_events() {
        let store = MemoryStore::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        let listener = Listener::builder(quick_config())
            .on_counts(move |snapshot| {
                let _ = tx.send(snapshot.clone());
            })
            .spawn(store.clone())
            .unwrap();

        listener.producer().push_event(click_at(10.0, 1_700_000_000.0));
        let snapshot = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(snapshot.written, 1);

        let outcome = listener
            .execute(Command::Clear {
                target: ClearTarget::Input(InputKind::Mouse),
                range: None,
            })
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Cleared(1));
        assert_eq!(store.len(Category::Clicks), 0);
    }

    #[test]
    fn test_session_commands_reach_store() {
        let store = MemoryStore::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        let listener = Listener::builder(quick_config())
            .on_counts(move |snapshot| {
                let _ = tx.send(snapshot.clone());
            })
            .spawn(store.clone())
            .unwrap();

        let started = listener.handle_line("session start Deep work").unwrap();
        let CommandOutcome::SessionStarted(id) = started else {
            panic!("unexpected outcome {:?}", started);
        };
        let (now, _) = now_stamp();
        listener.producer().push_event(click_at(10.0, now));
        while rx.recv_timeout(Duration::from_secs(5)).unwrap().written == 0 {}

        assert_eq!(
            listener.handle_line("session stop").unwrap(),
            CommandOutcome::SessionStopped(Some(id))
        );
        listener
            .handle_line(&format!("session rename Shallow work {}", id))
            .unwrap();
        assert_eq!(store.sessions().unwrap()[0].name, "Shallow work");

        assert_eq!(
            listener.handle_line(&format!("session clear mouse {}", id)).unwrap(),
            CommandOutcome::Cleared(1)
        );
        assert_eq!(store.len(Category::Clicks), 0);

        listener.handle_line(&format!("session delete {}", id)).unwrap();
        assert!(store.sessions().unwrap().is_empty());
        assert!(matches!(
            listener.handle_line(&format!("session delete {}", id)),
            Err(ListenerError::Store(StoreError::UnknownSession(_)))
        ));
        listener.stop().unwrap();
    }

    #[test]
    fn test_configure_restart_only_and_live_options() {
        let listener = Listener::builder(quick_config()).spawn(MemoryStore::new()).unwrap();
        assert!(matches!(
            listener.handle_line("configure MaxEventsForQueue 10"),
            Err(ListenerError::Config(ConfigError::RestartRequired(_)))
        ));
        assert_eq!(
            listener.handle_line("configure DefaultScreenSize [1366, 768]").unwrap(),
            CommandOutcome::Done
        );
        assert_eq!(
            listener.handle_line("start joystick").unwrap(),
            CommandOutcome::Ignored
        );
        listener.stop().unwrap();
    }

    #[test]
    fn test_toggling_input_drives_hooks() {
        let running = Arc::new(AtomicBool::new(false));
        let hook = FakeHook {
            input: InputKind::Keyboard,
            running: running.clone(),
        };
        let listener = Listener::builder(quick_config())
            .hook(Box::new(hook))
            .spawn(MemoryStore::new())
            .unwrap();

        listener
            .execute(Command::Stop(CaptureTarget::Input(InputKind::Keyboard)))
            .unwrap();
        assert!(!running.load(Ordering::SeqCst));
        assert!(!listener.flags().is_input_enabled(InputKind::Keyboard));

        listener
            .execute(Command::Start(CaptureTarget::Category(Category::Combos)))
            .unwrap();
        assert!(running.load(Ordering::SeqCst));
        assert!(!listener.flags().is_category_enabled(Category::Keys));

        listener.stop().unwrap();
        assert!(!running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_exit_command_stops_consumer() {
        let store = MemoryStore::new();
        let listener = Listener::builder(quick_config()).spawn(store.clone()).unwrap();
        listener.producer().push_event(click_at(10.0, 1_700_000_000.0));

        assert_eq!(listener.execute(Command::Exit).unwrap(), CommandOutcome::Done);
        listener.join().unwrap();
        assert!(!listener.is_running());
        assert_eq!(store.len(Category::Clicks), 1);
    }
}
