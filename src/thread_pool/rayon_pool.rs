use tracing::debug;

use super::ThreadPool;
use crate::{FtpError, Result};

/// A thread pool that uses a work stealing strategy as implemented by the [`Rayon`] library.
///
/// [`Rayon`]: https://docs.rs/rayon/latest/rayon/index.html
pub struct RayonThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool for RayonThreadPool {
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads as usize)
            .thread_name(|i| format!("mftp-rayon-{}", i))
            .build()
            .map_err(|e| FtpError::StringErr(format!("could not build thread pool: {:?}", &e)))?;
        debug!("created rayon thread pool with {} threads", &threads);

        Ok(Self { pool })
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // `install` would block the accept loop until the connection ends
        self.pool.spawn(job);
    }
}
