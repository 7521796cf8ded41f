use std::thread::JoinHandle;

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};

use crate::core::error::{Error, ErrorKind, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub const DEFAULT_POOL_SIZE: usize = 5;

/// Fixed pool of worker threads running typed tasks
///
/// Tasks return their value through a one-shot channel wrapped in
/// `TaskHandle`; dropping the pool drains the queue and joins the
/// workers.
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Self {
        let size = size.clamp(1, num_cpus::get().max(DEFAULT_POOL_SIZE));
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = unbounded();
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let receiver = receiver.clone();
            workers.push(
                std::thread::Builder::new()
                    .name(format!("search-pool-{}", i))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn pool worker"),
            );
        }
        ThreadPool {
            sender: Some(sender),
            workers,
        }
    }

    /// Runs `task` on a worker; the handle resolves to its return value
    pub fn execute<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let job: Job = Box::new(move || {
            let _ = tx.send(task());
        });
        self.sender
            .as_ref()
            .expect("pool already shut down")
            .send(job)
            .expect("pool workers are gone");
        TaskHandle { receiver: rx }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        ThreadPool::new(DEFAULT_POOL_SIZE)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Typed future for one pool task
pub struct TaskHandle<T> {
    receiver: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task finishes
    pub fn join(self) -> Result<T> {
        self.receiver.recv().map_err(|_| {
            Error::new(
                ErrorKind::InvalidState,
                "pool task dropped without producing a result".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_results() {
        let pool = ThreadPool::new(3);
        let handles: Vec<TaskHandle<u64>> =
            (0..10u64).map(|i| pool.execute(move || i * i)).collect();
        let mut results: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort_unstable();
        assert_eq!(results, (0..10u64).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_joins_workers() {
        let pool = ThreadPool::new(2);
        let handle = pool.execute(|| 7);
        drop(pool);
        assert_eq!(handle.join().unwrap(), 7);
    }
}
