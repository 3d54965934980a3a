//! Bounded channels and worker stages for the acquisition pipeline.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Create a bounded channel pair with the given capacity.
///
/// When the buffer is full, the sender will block, providing backpressure
/// so a fast discovery stage cannot queue unbounded work.
pub fn bounded_channel<T>(capacity: usize) -> (mpsc::Sender<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, SharedReceiver::new(rx))
}

/// A receiver that several workers of one pool pull from.
///
/// The channel closes for producers once every clone has been dropped.
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedReceiver<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// Receive the next item, or `None` once all senders are gone.
    pub async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }
}

/// Flag shared by every worker of one acquisition; once raised, no new work starts.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One worker of a pipeline stage: pulls from a shared input, pushes every
/// produced item downstream.
pub struct PipelineStage<I, O> {
    name: &'static str,
    input: SharedReceiver<I>,
    output: mpsc::Sender<O>,
    stop: StopSignal,
}

impl<I, O> PipelineStage<I, O> {
    /// Create a new pipeline stage worker.
    pub fn new(
        name: &'static str,
        input: SharedReceiver<I>,
        output: mpsc::Sender<O>,
        stop: StopSignal,
    ) -> Self {
        Self {
            name,
            input,
            output,
            stop,
        }
    }

    /// Run the stage with a fallible, one-to-many processing function.
    ///
    /// Errors are logged and the item is skipped. Returns the number of items
    /// sent downstream. Exits when the input is drained, the downstream
    /// receiver is gone, or the stop signal is raised.
    pub async fn run_fallible<F, Fut, E>(self, f: F) -> usize
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<Vec<O>, E>>,
        E: std::fmt::Display,
    {
        let mut sent = 0usize;
        while !self.stop.is_stopped() {
            let Some(item) = self.input.recv().await else {
                break;
            };
            match f(item).await {
                Ok(results) => {
                    for result in results {
                        if self.stop.is_stopped() || self.output.send(result).await.is_err() {
                            // Downstream closed or enough work issued
                            return sent;
                        }
                        sent += 1;
                    }
                }
                Err(e) => {
                    tracing::debug!("{} stage error: {}", self.name, e);
                }
            }
        }
        sent
    }
}
