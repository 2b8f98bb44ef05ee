// src/scheduler.rs

//! Sequential two-phase task scheduling
//!
//! Long-running operations are serialized behind one dedicated worker
//! thread. A task has two stages: stage-1 runs on the worker (fetch and
//! parse; it may block on an external process) and returns the stage-2
//! continuation, which runs on the coordinator thread when it drains the
//! completion channel (apply and notify). Because every stage-2 runs on
//! the coordinator, the repository and its dependents need no locking of
//! their own.
//!
//! The queue is the only structure touched from both threads. It is
//! guarded by a mutex, and the guard is never held while a stage-1 body
//! executes; a long-running external call can therefore never block
//! scheduling. There is no cancellation: a queued task can only be
//! pre-empted by the remove-first insert modes before it starts, and a
//! running task always runs to completion.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use strum_macros::Display;
use tracing::debug;

/// Continuation applied on the coordinator thread after stage-1 finishes.
pub type Stage2<C> = Box<dyn FnOnce(&mut C) + Send>;

type Stage1<C> = Box<dyn FnOnce() -> Stage2<C> + Send>;

/// Category of a task; the dedup and remove-first insert modes match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TaskKind {
    /// General purpose, intended for the plain push-back mode
    Unspecified,
    /// Will be the last task ever accepted
    Shutdown,
    FetchForeignInfo,
    SyncRepositories,
    UpdateNews,
    UpdateGroupList,
    UpdateGroupMembers,
    UpdatePackageInfo,
    UpdatePackageList,
    UpdateForeignList,
}

/// How a task is inserted into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// There may be only one task of that kind queued or running
    OnlyOne,
    /// Default mode: append
    PushBack,
    /// Remove the first pending task of the same kind, then append.
    /// The running task is never removed.
    RemoveFirstOfTypePushBack,
    /// Overwrite the first pending task of the same kind in place,
    /// preserving its queue position; append when there is none.
    /// The running task is never overwritten.
    RemoveFirstOfTypeOverwrite,
}

struct Task<C> {
    kind: TaskKind,
    stage1: Stage1<C>,
}

struct QueueState<C> {
    /// Kind of the task currently on the worker, if any
    running: Option<TaskKind>,
    pending: VecDeque<Task<C>>,
    shutdown: bool,
}

impl<C> QueueState<C> {
    fn contains_kind(&self, kind: TaskKind) -> bool {
        self.running == Some(kind) || self.pending.iter().any(|task| task.kind == kind)
    }

    fn first_pending_of(&self, kind: TaskKind) -> Option<usize> {
        self.pending.iter().position(|task| task.kind == kind)
    }

    fn total(&self) -> usize {
        self.pending.len() + usize::from(self.running.is_some())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Schedules tasks and executes them sequentially in two stages each.
///
/// `C` is the coordinator context handed to every stage-2 continuation;
/// the thread draining completions is the coordinator by definition and
/// must be the one owning `C`.
pub struct TaskScheduler<C> {
    state: Mutex<QueueState<C>>,
    jobs: Option<Sender<Stage1<C>>>,
    finished: Mutex<Receiver<Stage2<C>>>,
    worker: Option<JoinHandle<()>>,
}

impl<C: 'static> TaskScheduler<C> {
    pub fn new() -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Stage1<C>>();
        let (done_tx, done_rx) = mpsc::channel::<Stage2<C>>();
        let worker = thread::spawn(move || {
            while let Ok(stage1) = job_rx.recv() {
                let stage2 = stage1();
                if done_tx.send(stage2).is_err() {
                    break;
                }
            }
        });
        Self {
            state: Mutex::new(QueueState {
                running: None,
                pending: VecDeque::new(),
                shutdown: false,
            }),
            jobs: Some(job_tx),
            finished: Mutex::new(done_rx),
            worker: Some(worker),
        }
    }

    /// Schedule `stage1` for sequential execution.
    ///
    /// Returns `false` when the task was dropped (shutdown has been
    /// requested, or an `OnlyOne` duplicate exists) or when it replaced a
    /// pending task of its kind. That is a normal "superseded or
    /// deduplicated" signal, not an error. Scheduling a
    /// [`TaskKind::Shutdown`] task permanently latches the scheduler
    /// against further work.
    pub fn schedule<F>(&self, mode: InsertMode, kind: TaskKind, stage1: F) -> bool
    where
        F: FnOnce() -> Stage2<C> + Send + 'static,
    {
        let mut state = lock(&self.state);
        if state.shutdown || (mode == InsertMode::OnlyOne && state.contains_kind(kind)) {
            return false;
        }
        if kind == TaskKind::Shutdown {
            state.shutdown = true;
        }

        let task = Task {
            kind,
            stage1: Box::new(stage1),
        };
        let mut accepted = true;
        match mode {
            InsertMode::RemoveFirstOfTypePushBack => {
                if let Some(index) = state.first_pending_of(kind) {
                    state.pending.remove(index);
                    accepted = false;
                }
                state.pending.push_back(task);
            }
            InsertMode::OnlyOne | InsertMode::PushBack => {
                state.pending.push_back(task);
            }
            InsertMode::RemoveFirstOfTypeOverwrite => {
                if let Some(index) = state.first_pending_of(kind) {
                    state.pending[index] = task;
                    accepted = false;
                } else {
                    state.pending.push_back(task);
                }
            }
        }

        // An idle scheduler starts the new task at once.
        let start = if state.running.is_none() {
            state.pending.pop_front().map(|task| {
                state.running = Some(task.kind);
                task.stage1
            })
        } else {
            None
        };
        drop(state);
        if let Some(stage1) = start {
            self.dispatch(stage1);
        }
        accepted
    }

    /// Whether work remains. A lone queued task counts only when it is
    /// not the terminal shutdown task.
    pub fn has_tasks(&self) -> bool {
        let state = lock(&self.state);
        let total = state.total();
        total > 1 || (!state.shutdown && total > 0)
    }

    /// Run every stage-2 continuation the worker has already delivered.
    /// Non-blocking; returns the number of tasks completed.
    pub fn run_pending(&self, ctx: &mut C) -> usize {
        let mut completed = 0;
        loop {
            let next = {
                let finished = lock(&self.finished);
                finished.try_recv()
            };
            match next {
                Ok(stage2) => {
                    self.complete(stage2, ctx);
                    completed += 1;
                }
                Err(_) => break,
            }
        }
        completed
    }

    /// Block for the next completion and run its stage-2 continuation.
    /// Returns `false` immediately when no task is in flight.
    pub fn wait_task(&self, ctx: &mut C) -> bool {
        if lock(&self.state).running.is_none() {
            return false;
        }
        let next = {
            let finished = lock(&self.finished);
            finished.recv()
        };
        let Ok(stage2) = next else {
            return false;
        };
        self.complete(stage2, ctx);
        true
    }

    fn complete(&self, stage2: Stage2<C>, ctx: &mut C) {
        // The finished task keeps its running slot while stage-2 runs,
        // so dedup checks and has_tasks still see it.
        stage2(ctx);

        let mut state = lock(&self.state);
        state.running = None;
        let next = match state.pending.pop_front() {
            Some(task) => {
                state.running = Some(task.kind);
                Some(task.stage1)
            }
            None => None,
        };
        drop(state);
        if let Some(stage1) = next {
            self.dispatch(stage1);
        }
    }

    fn dispatch(&self, stage1: Stage1<C>) {
        if let Some(jobs) = &self.jobs
            && jobs.send(stage1).is_err()
        {
            debug!("worker thread is gone, task dropped");
        }
    }
}

impl<C: 'static> Default for TaskScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Drop for TaskScheduler<C> {
    fn drop(&mut self) {
        // Closing the job channel lets the worker finish its current
        // stage-1 and exit.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    type Log = Vec<String>;

    /// Schedule a task whose stage-1 blocks until the returned gate is
    /// signalled, then logs `tag` in stage-2.
    fn gated(
        sched: &TaskScheduler<Log>,
        mode: InsertMode,
        kind: TaskKind,
        tag: &str,
    ) -> (bool, Sender<()>) {
        let (gate_tx, gate_rx) = channel::<()>();
        let tag = tag.to_string();
        let accepted = sched.schedule(mode, kind, move || {
            gate_rx.recv().ok();
            Box::new(move |log: &mut Log| log.push(tag))
        });
        (accepted, gate_tx)
    }

    fn logging(sched: &TaskScheduler<Log>, mode: InsertMode, kind: TaskKind, tag: &str) -> bool {
        let tag = tag.to_string();
        sched.schedule(mode, kind, move || {
            Box::new(move |log: &mut Log| log.push(tag))
        })
    }

    fn drain(sched: &TaskScheduler<Log>) -> Log {
        let mut log = Log::new();
        while sched.wait_task(&mut log) {}
        log
    }

    #[test]
    fn test_stage1_runs_off_thread_and_stage2_on_coordinator() {
        let sched = TaskScheduler::<Vec<bool>>::new();
        let coordinator = thread::current().id();
        sched.schedule(InsertMode::PushBack, TaskKind::Unspecified, move || {
            let stage1_on_coordinator = thread::current().id() == coordinator;
            Box::new(move |log: &mut Vec<bool>| {
                log.push(stage1_on_coordinator);
                log.push(thread::current().id() == coordinator);
            })
        });

        let mut log = Vec::new();
        while sched.wait_task(&mut log) {}
        assert_eq!(log, vec![false, true]);
    }

    #[test]
    fn test_push_back_runs_in_fifo_order() {
        let sched = TaskScheduler::<Log>::new();
        let (_, gate) = gated(&sched, InsertMode::PushBack, TaskKind::Unspecified, "first");
        assert!(logging(&sched, InsertMode::PushBack, TaskKind::UpdateGroupList, "second"));
        assert!(logging(&sched, InsertMode::PushBack, TaskKind::UpdatePackageList, "third"));

        gate.send(()).unwrap();
        assert_eq!(drain(&sched), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_only_one_accepts_first_of_three() {
        let sched = TaskScheduler::<Log>::new();
        let (accepted, gate) = gated(
            &sched,
            InsertMode::OnlyOne,
            TaskKind::SyncRepositories,
            "sync",
        );
        assert!(accepted);
        assert!(!logging(&sched, InsertMode::OnlyOne, TaskKind::SyncRepositories, "dup-1"));
        assert!(!logging(&sched, InsertMode::OnlyOne, TaskKind::SyncRepositories, "dup-2"));

        gate.send(()).unwrap();
        assert_eq!(drain(&sched), vec!["sync"]);

        // Once the instance completed, the kind is accepted again.
        assert!(logging(&sched, InsertMode::OnlyOne, TaskKind::SyncRepositories, "again"));
        assert_eq!(drain(&sched), vec!["again"]);
    }

    #[test]
    fn test_overwrite_keeps_queue_position_and_signals_replacement() {
        let sched = TaskScheduler::<Log>::new();
        let (_, gate) = gated(&sched, InsertMode::PushBack, TaskKind::Unspecified, "running");
        assert!(logging(&sched, InsertMode::PushBack, TaskKind::UpdateGroupList, "groups"));
        assert!(logging(
            &sched,
            InsertMode::RemoveFirstOfTypeOverwrite,
            TaskKind::UpdateNews,
            "news-1",
        ));
        assert!(logging(&sched, InsertMode::PushBack, TaskKind::UpdatePackageList, "packages"));
        // The second overwrite replaces the idle news task in place.
        assert!(!logging(
            &sched,
            InsertMode::RemoveFirstOfTypeOverwrite,
            TaskKind::UpdateNews,
            "news-2",
        ));

        gate.send(()).unwrap();
        assert_eq!(drain(&sched), vec!["running", "groups", "news-2", "packages"]);
    }

    #[test]
    fn test_remove_first_of_type_push_back_supersedes() {
        let sched = TaskScheduler::<Log>::new();
        let (_, gate) = gated(&sched, InsertMode::PushBack, TaskKind::Unspecified, "running");
        assert!(logging(
            &sched,
            InsertMode::RemoveFirstOfTypePushBack,
            TaskKind::UpdatePackageList,
            "stale",
        ));
        assert!(logging(&sched, InsertMode::PushBack, TaskKind::UpdateGroupList, "groups"));
        assert!(!logging(
            &sched,
            InsertMode::RemoveFirstOfTypePushBack,
            TaskKind::UpdatePackageList,
            "fresh",
        ));

        gate.send(()).unwrap();
        // The superseded task is gone and the fresh one went to the back.
        assert_eq!(drain(&sched), vec!["running", "groups", "fresh"]);
    }

    #[test]
    fn test_remove_first_never_touches_the_running_task() {
        let sched = TaskScheduler::<Log>::new();
        let (_, gate) = gated(
            &sched,
            InsertMode::PushBack,
            TaskKind::UpdatePackageList,
            "running",
        );
        // Same kind as the running task: nothing pending to remove, so
        // this is a plain append and reports itself as added.
        assert!(logging(
            &sched,
            InsertMode::RemoveFirstOfTypePushBack,
            TaskKind::UpdatePackageList,
            "queued",
        ));

        gate.send(()).unwrap();
        assert_eq!(drain(&sched), vec!["running", "queued"]);
    }

    #[test]
    fn test_shutdown_latches_the_scheduler() {
        let sched = TaskScheduler::<Log>::new();
        assert!(logging(&sched, InsertMode::PushBack, TaskKind::Shutdown, "bye"));
        // Nothing is accepted after a shutdown task was scheduled.
        assert!(!logging(&sched, InsertMode::PushBack, TaskKind::Unspecified, "late"));
        assert!(!logging(&sched, InsertMode::PushBack, TaskKind::Shutdown, "bye-again"));

        assert_eq!(drain(&sched), vec!["bye"]);
    }

    #[test]
    fn test_has_tasks_ignores_lone_shutdown_task() {
        let sched = TaskScheduler::<Log>::new();
        assert!(!sched.has_tasks());

        let (_, gate) = gated(&sched, InsertMode::PushBack, TaskKind::Unspecified, "work");
        assert!(sched.has_tasks());

        assert!(logging(&sched, InsertMode::PushBack, TaskKind::Shutdown, "bye"));
        // Two tasks total: still work remaining.
        assert!(sched.has_tasks());

        gate.send(()).unwrap();
        let mut log = Log::new();
        assert!(sched.wait_task(&mut log));
        // Only the shutdown task remains now.
        assert!(!sched.has_tasks());

        assert!(sched.wait_task(&mut log));
        assert_eq!(log, vec!["work", "bye"]);
        assert!(!sched.has_tasks());
    }

    #[test]
    fn test_run_pending_is_non_blocking() {
        let sched = TaskScheduler::<Log>::new();
        let (_, gate) = gated(&sched, InsertMode::PushBack, TaskKind::Unspecified, "task");

        let mut log = Log::new();
        // Stage-1 is still gated: nothing to complete yet.
        assert_eq!(sched.run_pending(&mut log), 0);

        gate.send(()).unwrap();
        let mut completed = 0;
        for _ in 0..500 {
            completed += sched.run_pending(&mut log);
            if completed > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(completed, 1);
        assert_eq!(log, vec!["task"]);
    }

    #[test]
    fn test_wait_task_returns_false_when_idle() {
        let sched = TaskScheduler::<Log>::new();
        let mut log = Log::new();
        assert!(!sched.wait_task(&mut log));
    }
}
