use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::sync::WaitGroup;
use mftp::{NaiveThreadPool, RayonThreadPool, Result, SharedQueueThreadPool, ThreadPool};

fn spawn_counter<P: ThreadPool>(pool: P) -> Result<()> {
    const TASK_NUM: usize = 20;
    const ADD_COUNT: usize = 1000;

    let wg = WaitGroup::new();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..TASK_NUM {
        let counter = Arc::clone(&counter);
        let wg = wg.clone();
        pool.spawn(move || {
            for _ in 0..ADD_COUNT {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            drop(wg);
        })
    }

    wg.wait();
    assert_eq!(counter.load(Ordering::SeqCst), TASK_NUM * ADD_COUNT);
    Ok(())
}

/// jobs that block for a while, like long lived connections, must not block `spawn`
fn spawn_does_not_wait<P: ThreadPool>(pool: P) -> Result<()> {
    let wg = WaitGroup::new();
    let started = std::time::Instant::now();
    for _ in 0..4 {
        let wg = wg.clone();
        pool.spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            drop(wg);
        });
    }
    assert!(started.elapsed() < Duration::from_millis(200));
    wg.wait();
    Ok(())
}

#[test]
fn naive_thread_pool_spawn_counter() -> Result<()> {
    let pool = NaiveThreadPool::new(4)?;
    spawn_counter(pool)
}

#[test]
fn shared_queue_thread_pool_spawn_counter() -> Result<()> {
    let pool = SharedQueueThreadPool::new(4)?;
    spawn_counter(pool)
}

#[test]
fn rayon_thread_pool_spawn_counter() -> Result<()> {
    let pool = RayonThreadPool::new(4)?;
    spawn_counter(pool)
}

#[test]
fn naive_thread_pool_spawn_does_not_wait() -> Result<()> {
    spawn_does_not_wait(NaiveThreadPool::new(0)?)
}

#[test]
fn rayon_thread_pool_spawn_does_not_wait() -> Result<()> {
    spawn_does_not_wait(RayonThreadPool::new(4)?)
}

#[test]
fn shared_queue_thread_pool_panic_task() -> Result<()> {
    const TASK_NUM: usize = 20;
    const THREAD_NUM: u32 = 4;

    let pool = SharedQueueThreadPool::new(THREAD_NUM)?;
    for _ in 0..TASK_NUM {
        pool.spawn(move || {
            // the panic replaces the worker thread, the pool keeps serving
            panic!("a job went wrong");
        })
    }

    spawn_counter(pool)
}

#[test]
fn shared_queue_thread_pool_needs_threads() {
    assert!(SharedQueueThreadPool::new(0).is_err());
}
