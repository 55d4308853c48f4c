//! Synchronous-call bridge onto the host's mutation thread
//!
//! World mutation is only legal on one thread. Work submitted from any other
//! thread is queued FIFO and the caller blocks until it has run there.
//!
//! The mutation thread is either a dedicated thread owned by the bridge
//! ([`MainThread::spawn`]) or the host's own tick thread
//! ([`MainThread::attach_current`]), which must then drain the queue with
//! [`MainThread::run_pending`] once per tick.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, TriggerError};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the mutation thread
pub struct MainThread {
    sender: Mutex<Option<Sender<Task>>>,
    /// Queue drained by `run_pending` when attached to a host thread
    pending: Mutex<Option<Receiver<Task>>>,
    thread_id: ThreadId,
    timeout: Option<Duration>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MainThread {
    /// Spawn a dedicated mutation thread
    pub fn spawn(timeout: Option<Duration>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();

        let handle = thread::Builder::new()
            .name("trigger-main".into())
            .spawn(move || {
                log::debug!("Main thread started");
                while let Ok(task) = receiver.recv() {
                    task();
                }
                log::debug!("Main thread stopped");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            pending: Mutex::new(None),
            thread_id: handle.thread().id(),
            timeout,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Treat the calling thread as the mutation thread
    pub fn attach_current(timeout: Option<Duration>) -> Self {
        let (sender, receiver) = mpsc::channel::<Task>();
        Self {
            sender: Mutex::new(Some(sender)),
            pending: Mutex::new(Some(receiver)),
            thread_id: thread::current().id(),
            timeout,
            handle: Mutex::new(None),
        }
    }

    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Run every queued unit of work. Only does anything on the attached
    /// thread; returns the number of units run.
    pub fn run_pending(&self) -> usize {
        if !self.is_main_thread() {
            log::warn!("run_pending called off the main thread");
            return 0;
        }

        let tasks: Vec<Task> = match self.pending.lock().as_ref() {
            Some(receiver) => receiver.try_iter().collect(),
            None => return 0,
        };

        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Run `f` on the mutation thread and wait for its result.
    ///
    /// Runs inline when already on the mutation thread. A panic inside `f`
    /// or a missing reply becomes [`TriggerError::HostBridge`].
    pub fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_main_thread() {
            return panic::catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| TriggerError::HostBridge(panic_message(payload)));
        }

        let (reply, result) = mpsc::sync_channel(1);
        let task: Task = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message);
            // Caller may have timed out already
            let _ = reply.send(outcome);
        });

        {
            let sender = self.sender.lock();
            let sender = sender
                .as_ref()
                .ok_or_else(|| TriggerError::HostBridge("main thread is shut down".into()))?;
            sender
                .send(task)
                .map_err(|_| TriggerError::HostBridge("main thread is gone".into()))?;
        }

        let outcome = match self.timeout {
            Some(timeout) => result.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => TriggerError::HostBridge(format!(
                    "main thread did not answer within {:?}",
                    timeout
                )),
                RecvTimeoutError::Disconnected => {
                    TriggerError::HostBridge("main thread dropped the task".into())
                }
            })?,
            None => result
                .recv()
                .map_err(|_| TriggerError::HostBridge("main thread dropped the task".into()))?,
        };

        outcome.map_err(TriggerError::HostBridge)
    }

    /// Stop accepting work. The dedicated thread finishes its queue and exits;
    /// work still queued for an attached thread is dropped and its callers
    /// get an error.
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_none() {
            return;
        }
        drop(self.pending.lock().take());

        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::error!("Main thread panicked during shutdown");
            }
        }
    }
}

impl Drop for MainThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("unit of work panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("unit of work panicked: {}", s)
    } else {
        "unit of work panicked".to_string()
    }
}
