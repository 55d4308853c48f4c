//! Worker thread pool for asynchronous activations

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::error::{Result, TriggerError};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of named worker threads sharing one FIFO queue
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one)
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("trigger-worker-{}", id))
                .spawn(move || worker_loop(id, receiver))?;
            workers.push(handle);
        }

        log::debug!("Started {} trigger workers", size);

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a job; fails once the pool is shut down
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or(TriggerError::ShuttingDown)?;
        sender
            .send(Box::new(job))
            .map_err(|_| TriggerError::ShuttingDown)
    }

    /// Stop accepting jobs, let queued ones finish and join the workers
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());

        let current = thread::current().id();
        for handle in self.workers.lock().drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                log::error!("Trigger worker panicked during shutdown");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = receiver.lock().recv();
        match job {
            Ok(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    log::error!("Job panicked on trigger-worker-{}", id);
                }
            }
            Err(_) => break,
        }
    }
    log::trace!("trigger-worker-{} exiting", id);
}
