//! Run scheduler
//!
//! A state machine layered over a [`WorkerBackend`] that serializes the
//! worker lifecycle: at most one live process, cooperative stops, and a
//! single pending followup action for requests that arrive while a stop is
//! still draining. Later followup requests overwrite earlier ones, so the
//! scheduler converges on the most recent intent instead of queueing
//! history.

use crate::controller::{
    ControllerError, EventSender, ProcessEvent, ProcessHandle, WorkerBackend,
};
use crate::options::RunOptions;
use crate::store::ResultStore;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;
use sweepbench_ipc::WorkerRequest;
use thiserror::Error;

/// What to do once the currently stopping worker settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    /// Nothing; rest in `Idle`.
    Idle,
    /// Launch a fresh task-list query.
    Reload,
    /// Launch a fresh run with the options captured when the restart was
    /// requested.
    Restart,
}

/// The scheduler's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    /// No worker has been loaded yet; the task list is unknown.
    NoWorker,
    /// The last load attempt failed; the task list is unknown.
    FailedWorker,
    /// The task list is known and no process is live.
    Idle,
    /// A list query is in flight.
    Loading(ProcessHandle),
    /// A start was requested but could not be honored yet (no runnable
    /// selection); it fires as soon as one exists.
    Waiting,
    /// A measurement run is in flight.
    Running(ProcessHandle),
    /// A stop was signaled and the process has not settled yet.
    Stopping(ProcessHandle, Followup),
}

impl SchedulerState {
    /// The handle of the live process, if any.
    pub fn live_handle(&self) -> Option<ProcessHandle> {
        match self {
            Self::Loading(h) | Self::Running(h) | Self::Stopping(h, _) => Some(*h),
            _ => None,
        }
    }
}

/// Errors surfaced by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The backend could not start a worker process.
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Drives the measurement lifecycle over a [`WorkerBackend`], recording
/// results into a [`ResultStore`].
pub struct RunScheduler<B: WorkerBackend> {
    backend: B,
    state: SchedulerState,
    options: RunOptions,
    pending_start: bool,
    events: EventSender,
    inbox: Receiver<(ProcessHandle, ProcessEvent)>,
    store: ResultStore,
}

impl<B: WorkerBackend> RunScheduler<B> {
    /// A scheduler in `NoWorker` with an empty result store.
    pub fn new(backend: B, options: RunOptions) -> Self {
        let (events, inbox) = mpsc::channel();
        Self {
            backend,
            state: SchedulerState::NoWorker,
            options,
            pending_start: false,
            events,
            inbox,
            store: ResultStore::new(),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// The accumulated results.
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Mutable access to the store, for selection changes and restores.
    pub fn store_mut(&mut self) -> &mut ResultStore {
        &mut self.store
    }

    /// The options the next run will use.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// True while a process is live or a start is pending.
    pub fn is_active(&self) -> bool {
        !matches!(
            self.state,
            SchedulerState::NoWorker | SchedulerState::FailedWorker | SchedulerState::Idle
        )
    }

    /// Queries the worker for its task list.
    ///
    /// From a settled state this launches a list process immediately. With a
    /// process live, the process is stopped first and the reload becomes the
    /// followup, overwriting any followup already pending.
    pub fn load_tasks(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::NoWorker
            | SchedulerState::FailedWorker
            | SchedulerState::Idle
            | SchedulerState::Waiting => {
                let handle = self.spawn(WorkerRequest::List)?;
                self.state = SchedulerState::Loading(handle);
                tracing::debug!(?handle, "loading task list");
            }
            SchedulerState::Loading(_) => {}
            SchedulerState::Running(handle) => {
                self.backend.signal_stop(handle);
                self.state = SchedulerState::Stopping(handle, Followup::Reload);
            }
            SchedulerState::Stopping(handle, _) => {
                self.state = SchedulerState::Stopping(handle, Followup::Reload);
            }
        }
        Ok(())
    }

    /// Starts measuring the selected tasks.
    ///
    /// Without a known task list this loads first and starts once the list
    /// arrives. With no runnable selection the scheduler waits in `Waiting`
    /// until the selection changes. While a process is stopping, the start
    /// becomes a `Restart` followup.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::NoWorker | SchedulerState::FailedWorker => {
                self.pending_start = true;
                self.load_tasks()
            }
            SchedulerState::Idle | SchedulerState::Waiting => self.start_run(),
            SchedulerState::Loading(_) => {
                self.pending_start = true;
                Ok(())
            }
            SchedulerState::Running(_) => Ok(()),
            SchedulerState::Stopping(handle, _) => {
                self.state = SchedulerState::Stopping(handle, Followup::Restart);
                Ok(())
            }
        }
    }

    /// Requests a cooperative stop of whatever is in flight.
    ///
    /// Stopping an already stopping process only clears its followup, so a
    /// stop after a queued restart means stop. Idempotent everywhere else.
    pub fn stop(&mut self) {
        self.pending_start = false;
        match self.state {
            SchedulerState::Loading(handle) | SchedulerState::Running(handle) => {
                self.backend.signal_stop(handle);
                self.state = SchedulerState::Stopping(handle, Followup::Idle);
            }
            SchedulerState::Stopping(handle, _) => {
                self.state = SchedulerState::Stopping(handle, Followup::Idle);
            }
            SchedulerState::Waiting => {
                self.state = SchedulerState::Idle;
            }
            SchedulerState::NoWorker | SchedulerState::FailedWorker | SchedulerState::Idle => {}
        }
    }

    /// Installs new run options.
    ///
    /// A live run is stopped and restarted so it picks up the change; a
    /// waiting start is retried in case the new options make it runnable.
    pub fn set_options(&mut self, options: RunOptions) -> Result<(), SchedulerError> {
        self.options = options;
        match self.state {
            SchedulerState::Running(handle) => {
                self.backend.signal_stop(handle);
                self.state = SchedulerState::Stopping(handle, Followup::Restart);
                Ok(())
            }
            // A pending restart will pick up the new options when it fires.
            SchedulerState::Waiting => self.start_run(),
            _ => Ok(()),
        }
    }

    /// Notifies the scheduler that the task selection changed.
    ///
    /// A waiting start fires if the selection became runnable; a live run is
    /// stopped and restarted so it measures the new selection.
    pub fn selection_changed(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Waiting => self.start_run(),
            SchedulerState::Running(handle) => {
                self.backend.signal_stop(handle);
                self.state = SchedulerState::Stopping(handle, Followup::Restart);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Processes every event already delivered, without blocking.
    pub fn drain_events(&mut self) -> Result<(), SchedulerError> {
        while let Ok((handle, event)) = self.inbox.try_recv() {
            self.handle_event(handle, event)?;
        }
        Ok(())
    }

    /// Waits up to `timeout` for one event and processes it. Returns whether
    /// an event arrived.
    pub fn pump_event(&mut self, timeout: Duration) -> Result<bool, SchedulerError> {
        match self.inbox.recv_timeout(timeout) {
            Ok((handle, event)) => {
                self.handle_event(handle, event)?;
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(false),
        }
    }

    fn start_run(&mut self) -> Result<(), SchedulerError> {
        self.pending_start = false;
        let tasks = self.store.selected_runnable();
        if tasks.is_empty() {
            self.state = SchedulerState::Waiting;
            tracing::debug!("no runnable selection, waiting");
            return Ok(());
        }
        let request = WorkerRequest::Run(self.options.to_request(tasks));
        let handle = self.spawn(request)?;
        self.state = SchedulerState::Running(handle);
        tracing::debug!(?handle, "run started");
        Ok(())
    }

    /// Spawns a worker process. A launch failure settles the scheduler in
    /// `FailedWorker`, the same terminal state an asynchronous load failure
    /// reaches, and still surfaces the error to the caller.
    fn spawn(&mut self, request: WorkerRequest) -> Result<ProcessHandle, SchedulerError> {
        match self.backend.start(request, self.events.clone()) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.pending_start = false;
                self.state = SchedulerState::FailedWorker;
                Err(e.into())
            }
        }
    }

    fn handle_event(
        &mut self,
        handle: ProcessHandle,
        event: ProcessEvent,
    ) -> Result<(), SchedulerError> {
        if self.state.live_handle() != Some(handle) {
            tracing::trace!(?handle, ?event, "dropping stale event");
            return Ok(());
        }
        match event {
            ProcessEvent::TaskList(tasks) => {
                self.store.set_runnable_tasks(&tasks);
                tracing::info!(count = tasks.len(), "task list loaded");
            }
            ProcessEvent::WillMeasure { task, size } => {
                tracing::debug!(%task, size, "measuring");
            }
            ProcessEvent::DidMeasure {
                task,
                size,
                elapsed,
            } => {
                // Samples arriving while the run drains are still valid
                // measurements from this process; keep them.
                self.store.record(&task, size, elapsed);
            }
            ProcessEvent::OutputLine { stream, text } => {
                tracing::info!(?stream, "worker: {text}");
            }
            ProcessEvent::Failed { message } => {
                tracing::error!(?handle, "worker failed: {message}");
                self.settle(handle, true)?;
            }
            ProcessEvent::Stopped => {
                self.settle(handle, false)?;
            }
        }
        Ok(())
    }

    /// Routes a settled process to its next state.
    fn settle(&mut self, handle: ProcessHandle, failed: bool) -> Result<(), SchedulerError> {
        match self.state.clone() {
            SchedulerState::Loading(h) if h == handle => {
                if failed {
                    self.pending_start = false;
                    self.state = SchedulerState::FailedWorker;
                } else {
                    self.state = SchedulerState::Idle;
                    if self.pending_start {
                        self.start_run()?;
                    }
                }
            }
            SchedulerState::Running(h) if h == handle => {
                // An unsolicited exit, clean or not. The task list stays
                // known, so the scheduler rests in Idle either way.
                self.state = SchedulerState::Idle;
            }
            SchedulerState::Stopping(h, followup) if h == handle => {
                self.state = SchedulerState::Idle;
                match followup {
                    Followup::Idle => {}
                    Followup::Reload => self.load_tasks()?,
                    Followup::Restart => self.start_run()?,
                }
            }
            _ => {}
        }
        Ok(())
    }
}
