use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, instrument};

use super::ThreadPool;
use crate::{FtpError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A thread pool implemented with a shared job queue (i.e. channel).
///
/// This implementation uses the MPMC [`channel`] provided by the crossbeam crate as a single
/// producer, multiple consumer queue. The single producer is the pool itself (driven by the
/// accept loop), and the threads in the pool are the consumers.
///
/// If a job panics, the thread running it is replaced by a new one. A failure to create the
/// replacement is logged, so the pool can shrink if the OS refuses new threads.
///
/// [`channel`]: https://docs.rs/crossbeam/0.8.1/crossbeam/channel/index.html
pub struct SharedQueueThreadPool {
    /// the sending part of the channel
    tx: Sender<Job>,
}

impl ThreadPool for SharedQueueThreadPool {
    /// create a new thread pool with the given number of `threads`.
    /// Every thread created will have a handle to the receiving end of the channel
    fn new(threads: u32) -> Result<Self> {
        if threads == 0 {
            return Err(FtpError::Parsing(
                "a shared queue pool needs at least one thread".to_string(),
            ));
        }
        let (tx, rx) = channel::unbounded::<Job>();
        for i in 0..threads {
            let task_rx = TaskReceiver(rx.clone());
            thread::Builder::new()
                .name(format!("mftp-queue-{}", i))
                .spawn(move || run_tasks(task_rx))?;
        }
        Ok(SharedQueueThreadPool { tx })
    }

    /// Queues a job for the next free thread. A job queued after every thread is gone is
    /// dropped with an error on the operator stream.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            error!("there are no threads left in the pool, dropping job");
        }
    }
}

/// A type that can receive jobs (i.e. closures) from a channel and run them.
/// Additionally, this type is responsible for restarting any threads that panicked
#[derive(Clone)]
struct TaskReceiver(Receiver<Job>);

impl Drop for TaskReceiver {
    fn drop(&mut self) {
        if thread::panicking() {
            debug!("worker panicked, starting a new thread");
            let task_rx = self.clone();
            if let Err(e) = thread::Builder::new().spawn(move || run_tasks(task_rx)) {
                error!("Failed to spawn a thread: {}", e);
            }
        }
    }
}

/// waits for jobs to arrive on the (wrapped) receiver and runs them, until the pool is dropped
#[instrument(skip(rx))]
fn run_tasks(rx: TaskReceiver) {
    while let Ok(job) = rx.0.recv() {
        debug!("received a new job");
        job();
    }
    debug!("Thread exited because the thread pool was destroyed.");
}
