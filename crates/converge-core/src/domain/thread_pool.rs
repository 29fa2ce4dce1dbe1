use std::sync::{Arc, Mutex, mpsc};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of long-lived worker threads fed from one shared job
/// queue. The pool bounds concurrency: no matter how many evaluations are
/// submitted, at most `num_workers` run at once.
///
/// Shutdown is by disconnection. Dropping the pool closes the job channel,
/// each worker finishes the job it holds, drains what is still queued and
/// exits, and the drop joins them all.
pub struct ThreadPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ThreadPool {
    /// Create a pool with `size` workers. A size of zero falls back to the
    /// machine's available parallelism.
    pub fn new(size: usize) -> Self {
        let size = if size == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            size
        };

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || {
                    loop {
                        // hold the lock only for the dequeue, not the job
                        let job = receiver.lock().unwrap().recv();
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    }
                })
            })
            .collect();

        ThreadPool {
            sender: Some(sender),
            workers,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Fire-and-forget submission.
    pub fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .as_ref()
            .expect("pool is alive while not dropped")
            .send(Box::new(f))
            .expect("workers outlive the sender");
    }

    /// Submission with a [WorkResult] handle to the job's return value.
    pub fn submit_with_result<F, T>(&self, f: F) -> WorkResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        self.submit(move || {
            // the caller may have dropped the handle; the job still ran
            let _ = tx.send(f());
        });

        WorkResult { receiver: rx }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Blocking handle to one submitted job's return value.
pub struct WorkResult<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> WorkResult<T> {
    /// Blocks until the job has run and returns its value.
    pub fn result(&self) -> T {
        self.receiver.recv().expect("job ran to completion")
    }
}
