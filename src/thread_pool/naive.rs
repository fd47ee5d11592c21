use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tracing::error;

use super::ThreadPool;
use crate::Result;

/// a simple thread-pool that is not actually a pool. It starts a new, named thread on every
/// spawn request and never joins it
#[derive(Debug, Default)]
pub struct NaiveThreadPool {
    spawned: AtomicU64,
}

impl ThreadPool for NaiveThreadPool {
    fn new(_threads: u32) -> Result<Self> {
        Ok(NaiveThreadPool::default())
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.spawned.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = thread::Builder::new()
            .name(format!("mftp-worker-{}", id))
            .spawn(job)
        {
            error!("could not start worker thread {}: {}", id, e);
        }
    }
}
