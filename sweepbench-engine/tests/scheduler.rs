//! Scheduler lifecycle tests over a scripted backend.
//!
//! The backend records every start and stop signal and hands the test the
//! event sender for each spawned process, so worker behavior can be played
//! back deterministically without real processes.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use sweepbench_engine::{
    EventSender, Followup, ProcessEvent, ProcessHandle, RunOptions, RunScheduler, SchedulerState,
    WorkerBackend,
};
use sweepbench_ipc::WorkerRequest;
use sweepbench_stats::Time;

#[derive(Default)]
struct Inner {
    next_id: u64,
    starts: Vec<(ProcessHandle, WorkerRequest)>,
    senders: Vec<(ProcessHandle, EventSender)>,
    stops: Vec<ProcessHandle>,
    fail_next_start: bool,
}

#[derive(Clone, Default)]
struct ScriptedBackend(Arc<Mutex<Inner>>);

impl ScriptedBackend {
    fn starts(&self) -> Vec<(ProcessHandle, WorkerRequest)> {
        self.0.lock().unwrap().starts.clone()
    }

    fn stops(&self) -> Vec<ProcessHandle> {
        self.0.lock().unwrap().stops.clone()
    }

    fn last_start(&self) -> (ProcessHandle, WorkerRequest) {
        self.starts().last().cloned().expect("a process was started")
    }

    fn sender_for(&self, handle: ProcessHandle) -> EventSender {
        self.0
            .lock()
            .unwrap()
            .senders
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, tx)| tx.clone())
            .expect("sender for handle")
    }

    fn fail_next_start(&self) {
        self.0.lock().unwrap().fail_next_start = true;
    }

    fn emit(&self, handle: ProcessHandle, event: ProcessEvent) {
        self.sender_for(handle).send((handle, event)).unwrap();
    }
}

impl WorkerBackend for ScriptedBackend {
    fn start(
        &mut self,
        request: WorkerRequest,
        events: EventSender,
    ) -> Result<ProcessHandle, sweepbench_engine::ControllerError> {
        let mut inner = self.0.lock().unwrap();
        if inner.fail_next_start {
            inner.fail_next_start = false;
            return Err(sweepbench_engine::ControllerError::Launch {
                program: "scripted".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
            });
        }
        inner.next_id += 1;
        let handle = ProcessHandle::from_raw(inner.next_id);
        inner.starts.push((handle, request));
        inner.senders.push((handle, events));
        Ok(handle)
    }

    fn signal_stop(&mut self, handle: ProcessHandle) {
        self.0.lock().unwrap().stops.push(handle);
    }
}

fn small_options() -> RunOptions {
    RunOptions {
        lowest_scale: 2,
        highest_scale: 4,
        subdivisions: 1,
        ..RunOptions::default()
    }
}

fn scheduler() -> (RunScheduler<ScriptedBackend>, ScriptedBackend) {
    let backend = ScriptedBackend::default();
    (
        RunScheduler::new(backend.clone(), small_options()),
        backend,
    )
}

/// Drives the scheduler into `Running` with tasks "a" and "b" loaded.
fn running_scheduler() -> (RunScheduler<ScriptedBackend>, ScriptedBackend, ProcessHandle) {
    let (mut scheduler, backend) = scheduler();
    scheduler.start().unwrap();
    let (loader, request) = backend.last_start();
    assert!(matches!(request, WorkerRequest::List));
    backend.emit(loader, ProcessEvent::TaskList(vec!["a".into(), "b".into()]));
    backend.emit(loader, ProcessEvent::Stopped);
    scheduler.drain_events().unwrap();

    let (runner, request) = backend.last_start();
    assert!(matches!(request, WorkerRequest::Run(_)));
    assert_eq!(*scheduler.state(), SchedulerState::Running(runner));
    (scheduler, backend, runner)
}

#[test]
fn test_start_loads_tasks_then_runs() {
    let (scheduler, backend, runner) = running_scheduler();
    let starts = backend.starts();
    assert_eq!(starts.len(), 2);
    let WorkerRequest::Run(request) = &starts[1].1 else {
        panic!("second start must be a run");
    };
    assert_eq!(request.tasks, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(request.sizes, vec![4, 8, 16]);
    assert_eq!(scheduler.state().live_handle(), Some(runner));
}

#[test]
fn test_start_with_nothing_selected_waits_for_selection() {
    let (mut scheduler, backend) = scheduler();
    scheduler.start().unwrap();
    let (loader, _) = backend.last_start();
    backend.emit(loader, ProcessEvent::TaskList(vec!["a".into()]));
    backend.emit(loader, ProcessEvent::Stopped);
    scheduler.store_mut().set_selected("a", false);
    scheduler.drain_events().unwrap();
    assert_eq!(*scheduler.state(), SchedulerState::Waiting);
    assert_eq!(backend.starts().len(), 1);

    // Selecting the task releases the waiting start.
    scheduler.store_mut().set_selected("a", true);
    scheduler.selection_changed().unwrap();
    let (_, request) = backend.last_start();
    assert!(matches!(request, WorkerRequest::Run(_)));
    assert!(matches!(scheduler.state(), SchedulerState::Running(_)));
}

#[test]
fn test_stop_is_idempotent() {
    let (mut scheduler, backend, runner) = running_scheduler();
    scheduler.stop();
    assert_eq!(
        *scheduler.state(),
        SchedulerState::Stopping(runner, Followup::Idle)
    );
    scheduler.stop();
    scheduler.stop();
    // Only one cooperative signal went out.
    assert_eq!(backend.stops(), vec![runner]);

    backend.emit(runner, ProcessEvent::Stopped);
    scheduler.drain_events().unwrap();
    assert_eq!(*scheduler.state(), SchedulerState::Idle);
    assert_eq!(backend.starts().len(), 2);
}

#[test]
fn test_followup_is_last_write_wins() {
    let (mut scheduler, backend, runner) = running_scheduler();
    // A reload request while running queues a reload followup.
    scheduler.load_tasks().unwrap();
    assert_eq!(
        *scheduler.state(),
        SchedulerState::Stopping(runner, Followup::Reload)
    );
    // A later start overwrites it.
    scheduler.start().unwrap();
    assert_eq!(
        *scheduler.state(),
        SchedulerState::Stopping(runner, Followup::Restart)
    );

    backend.emit(runner, ProcessEvent::Stopped);
    scheduler.drain_events().unwrap();
    let (_, request) = backend.last_start();
    assert!(matches!(request, WorkerRequest::Run(_)));
}

#[test]
fn test_stop_cancels_a_queued_restart() {
    let (mut scheduler, backend, runner) = running_scheduler();
    scheduler.start().unwrap(); // no-op while running
    scheduler.set_options(small_options()).unwrap(); // queues a restart
    assert_eq!(
        *scheduler.state(),
        SchedulerState::Stopping(runner, Followup::Restart)
    );
    scheduler.stop();
    backend.emit(runner, ProcessEvent::Stopped);
    scheduler.drain_events().unwrap();
    assert_eq!(*scheduler.state(), SchedulerState::Idle);
    assert_eq!(backend.starts().len(), 2);
}

#[test]
fn test_options_change_restarts_a_live_run() {
    let (mut scheduler, backend, runner) = running_scheduler();
    let options = RunOptions {
        highest_scale: 6,
        ..small_options()
    };
    scheduler.set_options(options).unwrap();
    assert_eq!(
        *scheduler.state(),
        SchedulerState::Stopping(runner, Followup::Restart)
    );
    backend.emit(runner, ProcessEvent::Stopped);
    scheduler.drain_events().unwrap();

    let (_, request) = backend.last_start();
    let WorkerRequest::Run(request) = request else {
        panic!("restart must be a run");
    };
    assert_eq!(request.sizes, vec![4, 8, 16, 32, 64]);
}

#[test]
fn test_stale_events_are_dropped() {
    let (mut scheduler, backend, old) = running_scheduler();
    scheduler.stop();
    backend.emit(old, ProcessEvent::Stopped);
    scheduler.drain_events().unwrap();
    scheduler.start().unwrap();
    let (new, _) = backend.last_start();
    assert_ne!(old, new);

    // A measurement from the settled process must not be recorded; one from
    // the live process must.
    backend.emit(
        old,
        ProcessEvent::DidMeasure {
            task: "a".into(),
            size: 8,
            elapsed: Time::from_picoseconds(999),
        },
    );
    backend.emit(
        new,
        ProcessEvent::DidMeasure {
            task: "a".into(),
            size: 8,
            elapsed: Time::from_picoseconds(100),
        },
    );
    scheduler.drain_events().unwrap();

    let task = scheduler.store().task("a").unwrap();
    assert_eq!(task.samples[&8].count(), 1);
    assert_eq!(task.samples[&8].minimum(), Some(Time::from_picoseconds(100)));
}

#[test]
fn test_measurements_arriving_while_stopping_are_kept() {
    let (mut scheduler, backend, runner) = running_scheduler();
    scheduler.stop();
    backend.emit(
        runner,
        ProcessEvent::DidMeasure {
            task: "b".into(),
            size: 16,
            elapsed: Time::from_nanoseconds(5),
        },
    );
    backend.emit(runner, ProcessEvent::Stopped);
    scheduler.drain_events().unwrap();
    assert_eq!(
        scheduler.store().task("b").unwrap().samples[&16].count(),
        1
    );
}

#[test]
fn test_failed_load_settles_in_failed_worker() {
    let (mut scheduler, backend) = scheduler();
    scheduler.start().unwrap();
    let (loader, _) = backend.last_start();
    backend.emit(
        loader,
        ProcessEvent::Failed {
            message: "exec format error".into(),
        },
    );
    scheduler.drain_events().unwrap();
    assert_eq!(*scheduler.state(), SchedulerState::FailedWorker);
    // The pending start died with the load; nothing else was spawned.
    assert_eq!(backend.starts().len(), 1);

    // A later load can recover.
    scheduler.load_tasks().unwrap();
    assert!(matches!(scheduler.state(), SchedulerState::Loading(_)));
}

#[test]
fn test_failed_run_settles_in_idle() {
    let (mut scheduler, backend, runner) = running_scheduler();
    backend.emit(
        runner,
        ProcessEvent::Failed {
            message: "task panicked".into(),
        },
    );
    scheduler.drain_events().unwrap();
    assert_eq!(*scheduler.state(), SchedulerState::Idle);
}

#[test]
fn test_launch_error_is_surfaced() {
    let (mut scheduler, backend) = scheduler();
    backend.fail_next_start();
    assert!(scheduler.start().is_err());
}

#[test]
fn test_launch_failure_enters_failed_worker() {
    let (mut scheduler, backend) = scheduler();
    backend.fail_next_start();
    assert!(scheduler.load_tasks().is_err());
    assert_eq!(*scheduler.state(), SchedulerState::FailedWorker);

    // An explicit reload can still recover.
    scheduler.load_tasks().unwrap();
    assert!(matches!(scheduler.state(), SchedulerState::Loading(_)));
}

#[test]
fn test_launch_failure_on_restart_enters_failed_worker() {
    let (mut scheduler, backend, runner) = running_scheduler();
    scheduler.set_options(small_options()).unwrap();
    assert_eq!(
        *scheduler.state(),
        SchedulerState::Stopping(runner, Followup::Restart)
    );
    // The queued restart fires when the stop settles, and its spawn fails.
    backend.fail_next_start();
    backend.emit(runner, ProcessEvent::Stopped);
    assert!(scheduler.drain_events().is_err());
    assert_eq!(*scheduler.state(), SchedulerState::FailedWorker);
}

#[test]
fn test_selection_change_while_running_restarts() {
    let (mut scheduler, backend, runner) = running_scheduler();
    scheduler.store_mut().set_selected("b", false);
    scheduler.selection_changed().unwrap();
    assert_eq!(
        *scheduler.state(),
        SchedulerState::Stopping(runner, Followup::Restart)
    );
    assert_eq!(backend.stops(), vec![runner]);

    backend.emit(runner, ProcessEvent::Stopped);
    scheduler.drain_events().unwrap();
    let (_, request) = backend.last_start();
    let WorkerRequest::Run(request) = request else {
        panic!("restart must be a run");
    };
    // The new run measures only the surviving selection.
    assert_eq!(request.tasks, vec!["a".to_string()]);
}

#[test]
fn test_pump_event_times_out_when_quiet() {
    let (mut scheduler, _backend) = scheduler();
    let got = scheduler
        .pump_event(Duration::from_millis(10))
        .unwrap();
    assert!(!got);
}
