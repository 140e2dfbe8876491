//! Lifecycle of one interface to the acquisition application, and the
//! processing loop that runs on its dedicated thread while it is started.

use flume::TryRecvError;
use oetools::cfg::{InterfaceConfig, SyncChannels, SyncMode};
use oetools::{DecodeError, Event, Message, SPIKE, TTL};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, span, warn, Level};

use crate::clock::HostClock;
use crate::dispatch::{Dispatcher, SpikeSink};
use crate::error::LifecycleError;
use crate::registry::{NotifierRegistry, Slot, SyncNotifier};
use crate::status::{StatusSnapshot, SyncStatus};
use crate::sync::{ClockOffset, DigitalOutput, SyncEngine, SyncOutcome};
use crate::transport::{EventSource, Received};

/// Host-facing lifecycle. Every step reports failure to the caller and
/// leaves the device in its previous state.
pub trait Device {
    fn initialize(&self) -> Result<(), LifecycleError>;
    fn start(&self) -> Result<(), LifecycleError>;
    fn stop(&self) -> Result<(), LifecycleError>;
}

/// Everything the processing thread owns while running.
/// Handed back through the join handle so the socket can be disconnected.
pub(crate) struct Worker {
    source: Box<dyn EventSource>,
    output: Box<dyn DigitalOutput>,
    clock: Arc<dyn HostClock>,
    dispatcher: Option<Dispatcher>,
    engine: SyncEngine,
    channels: SyncChannels,
    mode: SyncMode,
    sync_interval: Duration,
    receipt_check_interval: Duration,
    handoff: Option<Slot>,
    offset: ClockOffset,
    status: SyncStatus,
}

impl Worker {
    fn new(
        config: &InterfaceConfig,
        channels: SyncChannels,
        source: Box<dyn EventSource>,
        output: Box<dyn DigitalOutput>,
        clock: Arc<dyn HostClock>,
    ) -> Self {
        let offset = ClockOffset::new();
        let status = SyncStatus::new();
        let engine = SyncEngine::new(
            channels.clone(),
            config.sync_interval,
            config.sync_receipt_check_interval,
            clock.now_us(),
        )
        .with_handles(offset.clone(), status.clone());
        Worker {
            source,
            output,
            clock,
            dispatcher: None,
            engine,
            channels,
            mode: config.sync_mode,
            sync_interval: config.sync_interval,
            receipt_check_interval: config.sync_receipt_check_interval,
            handoff: None,
            offset,
            status,
        }
    }

    /// Forget all sync state; nothing carries over between starts
    fn restart(&mut self) {
        self.offset.reset();
        self.status.reset();
        self.engine = SyncEngine::new(
            self.channels.clone(),
            self.sync_interval,
            self.receipt_check_interval,
            self.clock.now_us(),
        )
        .with_handles(self.offset.clone(), self.status.clone());
        if let Some(slot) = &self.handoff {
            slot.lock().take();
        }
        if let Some(d) = self.dispatcher.as_mut() {
            d.rearm();
        }
    }

    /// One pass of the processing loop
    fn iterate(&mut self) {
        match self.mode {
            SyncMode::Drive => {
                self.engine.drive(self.output.as_mut(), self.clock.as_ref());
            }
            SyncMode::External => self.apply_external(),
        }

        self.engine.check_stall(self.clock.now_us());

        match self.source.receive_message() {
            Received::Message(msg) => self.route(&msg),
            Received::Timeout => {}
            Received::Failed(e) => {
                self.status.record_transport_error();
                warn!("error receiving Open Ephys event: {}", e);
            }
        }
    }

    fn apply_external(&mut self) {
        let pending = match &self.handoff {
            Some(slot) => slot.lock().take(),
            None => None,
        };
        if let Some(ext) = pending {
            match u32::try_from(ext.value) {
                Ok(code) => self.engine.accept_external(code, ext.time),
                Err(_) => warn!("ignoring external sync value {}", ext.value),
            }
        }
    }

    fn route(&mut self, msg: &Message) {
        match msg.decode() {
            Ok(Event::Ttl(ttl)) => {
                // A code written while blocked in receive must be in place before its echo
                if self.mode == SyncMode::External {
                    self.apply_external();
                }
                let now = self.clock.now_us();
                if let SyncOutcome::Ignored = self.engine.receive(&ttl, msg.timestamp, now) {
                    debug!("TTL event on line {} is not a sync line", ttl.channel + 1);
                }
            }
            Ok(Event::Spike(spike)) => match self.dispatcher.as_mut() {
                Some(d) => {
                    d.dispatch(&spike, msg.timestamp);
                }
                None => debug!("spike forwarding is disabled; dropping spike"),
            },
            Err(DecodeError::UnrecognizedEventType(tag)) => {
                self.status.record_unrecognized();
                warn!("Open Ephys event has unexpected type {}", tag);
            }
            Err(e) => {
                self.status.record_decode_error();
                warn!("dropping Open Ephys event: {}", e);
            }
        }
    }
}

#[cfg(test)]
thread_local! {
    static REFUSE_SPAWN: std::cell::Cell<bool> = std::cell::Cell::new(false);
}

#[cfg(test)]
fn spawn_refused() -> bool {
    REFUSE_SPAWN.with(|r| r.get())
}

#[cfg(not(test))]
fn spawn_refused() -> bool {
    false
}

fn spawn_handler<F>(body: F) -> std::io::Result<JoinHandle<Option<Worker>>>
where
    F: FnOnce() -> Option<Worker> + Send + 'static,
{
    if spawn_refused() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "thread creation refused",
        ));
    }
    std::thread::Builder::new()
        .name(String::from("oe-events"))
        .spawn(body)
}

/// Processing thread body. Returns the worker once cancelled.
fn run(mut worker: Worker, cancel: flume::Receiver<()>, endpoint: String) -> Worker {
    let span = span!(Level::INFO, "oe_events", %endpoint);
    let _enter = span.enter();
    info!("event handler started");
    loop {
        worker.iterate();
        match cancel.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => break,
        }
    }
    info!("event handler stopped");
    worker
}

struct Running {
    handle: JoinHandle<Option<Worker>>,
    cancel: flume::Sender<()>,
}

struct State {
    initialized: bool,
    /// `None` while the thread owns it, or if it was lost
    worker: Option<Worker>,
    running: Option<Running>,
    notifier_id: Option<u64>,
}

/// Interface to one Open Ephys event publisher.
///
/// Subscribes to the acquisition application's events, keeps the clock
/// offset between its clock and the host clock current through the sync
/// code round trip, and forwards spikes re-stamped into host time.
pub struct EphysInterface {
    config: InterfaceConfig,
    endpoint: String,
    registry: NotifierRegistry,
    offset: ClockOffset,
    status: SyncStatus,
    state: Mutex<State>,
}

impl EphysInterface {
    /// Validate the configuration and take ownership of the collaborators.
    /// Nothing touches the network until `initialize`.
    pub fn new<S, O, C>(
        config: InterfaceConfig,
        source: S,
        output: O,
        clock: C,
    ) -> Result<Self, LifecycleError>
    where
        S: EventSource + 'static,
        O: DigitalOutput + 'static,
        C: HostClock + 'static,
    {
        let channels = config.validate().map_err(|e| {
            error!("invalid Open Ephys interface configuration: {}", e);
            e
        })?;
        let worker = Worker::new(
            &config,
            channels,
            Box::new(source),
            Box::new(output),
            Arc::new(clock),
        );
        Ok(EphysInterface {
            endpoint: config.endpoint(),
            config,
            registry: NotifierRegistry::new(),
            offset: worker.offset.clone(),
            status: worker.status.clone(),
            state: Mutex::new(State {
                initialized: false,
                worker: Some(worker),
                running: None,
                notifier_id: None,
            }),
        })
    }

    /// Where spikes go. Ignored unless spike forwarding is enabled.
    pub fn with_spike_sink(mut self, sink: impl SpikeSink + 'static) -> Self {
        if !self.config.spikes {
            debug!("spike forwarding is disabled; ignoring spike sink");
            return self;
        }
        let (offset, status) = (self.offset.clone(), self.status.clone());
        if let Some(w) = self.state.get_mut().worker.as_mut() {
            w.dispatcher = Some(Dispatcher::new(Box::new(sink), offset, status));
        }
        self
    }

    /// Share a registry with other interfaces. Must be set before `initialize`.
    pub fn with_registry(mut self, registry: NotifierRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Live handle on the current clock offset
    pub fn clock_offset(&self) -> ClockOffset {
        self.offset.clone()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running.is_some()
    }

    /// Handle for reporting externally written sync codes.
    /// Only available in external sync mode after `initialize`.
    pub fn notifier(&self) -> Option<SyncNotifier> {
        self.state
            .lock()
            .notifier_id
            .map(|id| self.registry.notifier(id))
    }

    fn initialize_locked(&self, state: &mut State) -> Result<(), LifecycleError> {
        if state.initialized {
            return Ok(());
        }
        let worker = state.worker.as_mut().ok_or(LifecycleError::WorkerLost)?;
        worker.source.open()?;
        // Bounds how long housekeeping and cancellation can wait
        worker.source.set_receive_timeout(self.config.sync_interval / 2);
        if worker.dispatcher.is_some() {
            worker.source.subscribe(SPIKE)?;
        }
        worker.source.subscribe(TTL)?;
        if self.config.sync_mode == SyncMode::External {
            let (id, slot) = self.registry.register();
            worker.handoff = Some(slot);
            state.notifier_id = Some(id);
        }
        state.initialized = true;
        info!("Open Ephys interface for {} initialized", self.endpoint);
        Ok(())
    }

    fn start_locked(&self, state: &mut State) -> Result<(), LifecycleError> {
        if state.running.is_some() {
            return Ok(());
        }
        if !state.initialized {
            return Err(LifecycleError::NotInitialized);
        }
        let mut worker = state.worker.take().ok_or(LifecycleError::WorkerLost)?;

        // The thread exists before the socket connects, so a failed spawn loses nothing
        let (cancel, cancelled) = flume::bounded(1);
        let (hand_over, handed) = flume::bounded::<Worker>(1);
        let endpoint = self.endpoint.clone();
        let handle = match spawn_handler(move || {
            let worker = handed.recv().ok()?;
            Some(run(worker, cancelled, endpoint))
        }) {
            Ok(h) => h,
            Err(e) => {
                state.worker = Some(worker);
                return Err(e.into());
            }
        };

        if let Err(e) = worker.source.connect(&self.endpoint) {
            state.worker = Some(worker);
            drop(hand_over);
            let _ = handle.join();
            return Err(e.into());
        }
        info!("connected to Open Ephys at {}", self.endpoint);
        worker.restart();

        if let Err(flume::SendError(mut worker)) = hand_over.send(worker) {
            let _ = handle.join();
            let _ = worker.source.disconnect(&self.endpoint);
            state.worker = Some(worker);
            return Err(LifecycleError::WorkerLost);
        }
        state.running = Some(Running { handle, cancel });
        Ok(())
    }

    fn stop_locked(&self, state: &mut State) -> Result<(), LifecycleError> {
        let running = match state.running.take() {
            Some(r) => r,
            None => return Ok(()),
        };
        // The thread may already be gone; joining tells us either way
        let _ = running.cancel.send(());
        let mut worker = match running.handle.join() {
            Ok(Some(w)) => w,
            Ok(None) | Err(_) => return Err(LifecycleError::WorkerLost),
        };
        let disconnected = worker.source.disconnect(&self.endpoint);
        state.worker = Some(worker);
        disconnected?;
        info!("disconnected from Open Ephys at {}", self.endpoint);
        Ok(())
    }
}

/// Log a failed lifecycle step before handing it to the caller
fn logged(step: &str, result: Result<(), LifecycleError>) -> Result<(), LifecycleError> {
    if let Err(e) = &result {
        error!("Open Ephys interface {} failed: {}", step, e);
    }
    result
}

impl Device for EphysInterface {
    fn initialize(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        logged("initialize", self.initialize_locked(&mut state))
    }

    fn start(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        logged("start", self.start_locked(&mut state))
    }

    fn stop(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        logged("stop", self.stop_locked(&mut state))
    }
}

impl Drop for EphysInterface {
    fn drop(&mut self) {
        let _ = self.stop();
        if let Some(id) = self.state.get_mut().notifier_id.take() {
            self.registry.deregister(id);
        }
    }
}
