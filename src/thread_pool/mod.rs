//! Worker pools that run one job per accepted connection.
//!
//! - [`NaiveThreadPool`] is not actually a pool, it starts a fresh thread for every job so
//! every connection gets its own worker. This is the server's default.
//! - [`SharedQueueThreadPool`] runs jobs on a fixed set of threads fed by a crossbeam channel.
//! - [`RayonThreadPool`] runs jobs on a rayon work-stealing pool.
//!
//! The fixed size pools bound the number of connections served at once: a connection holds its
//! worker until it ends, further connections wait in the queue until a worker frees up.
use crate::Result;

/// The functionality a pool of worker threads must provide
pub trait ThreadPool: Send + 'static {
    /// creates a new pool with `threads` worker threads.
    ///
    /// # Errors
    /// returns an error if the pool, or any of its threads, could not be created
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// runs `job` on one of the pool's threads. Does not wait for the job to finish
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static;
}

mod naive;
mod rayon_pool;
mod shared_queue;

pub use self::naive::NaiveThreadPool;
pub use self::rayon_pool::RayonThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;
