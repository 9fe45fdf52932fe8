//! Fixed-size batch accumulation for one entity stream.
//!
//! Appends are serialized by a mutex around the open window. A slot on the
//! flush queue is reserved before the lock is taken for a closing window,
//! and the window is only taken once the slot is held, so a full queue
//! never blocks the buffer and an append cancelled while waiting for
//! capacity leaves the window untouched.

use tokio::sync::{mpsc, Mutex};

use crate::error::PipelineError;

struct Window<T> {
    items: Vec<T>,
    closed: bool,
}

/// Accumulates events into batches of `batch_size` and hands each full
/// batch to the stream's flush queue.
pub struct Batcher<T> {
    batch_size: usize,
    window: Mutex<Window<T>>,
    queue: mpsc::Sender<Vec<T>>,
}

impl<T: Send> Batcher<T> {
    /// A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize, queue: mpsc::Sender<Vec<T>>) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            window: Mutex::new(Window {
                items: Vec::with_capacity(batch_size),
                closed: false,
            }),
            queue,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Append one event.
    pub async fn push(&self, item: T) -> Result<(), PipelineError> {
        self.extend(vec![item]).await.map(|_| ())
    }

    /// Append events in order.
    ///
    /// Every window filled along the way is closed and queued. When the
    /// queue is full the call waits for capacity without holding the window
    /// lock; if it is cancelled while waiting, events already appended by
    /// other callers stay buffered and only this call's unqueued tail is
    /// lost. Returns the number of items appended.
    pub async fn extend(&self, items: Vec<T>) -> Result<usize, PipelineError> {
        let accepted = items.len();
        let mut items = items.into_iter();
        let mut permit: Option<mpsc::Permit<'_, Vec<T>>> = None;
        loop {
            {
                let mut window = self.window.lock().await;
                if window.closed {
                    return Err(PipelineError::Closed);
                }
                let room = self.batch_size - window.items.len();
                if items.len() < room {
                    window.items.extend(items);
                    return Ok(accepted);
                }
                if let Some(permit) = permit.take() {
                    window.items.extend(items.by_ref().take(room));
                    let batch = std::mem::replace(
                        &mut window.items,
                        Vec::with_capacity(self.batch_size),
                    );
                    permit.send(batch);
                    continue;
                }
            }
            permit = Some(self.reserve().await?);
        }
    }

    /// Take the open window if it holds anything, leaving an empty one.
    pub async fn take(&self) -> Option<Vec<T>> {
        let mut window = self.window.lock().await;
        if window.items.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut window.items))
    }

    /// Stop accepting appends and return whatever was buffered.
    pub async fn close(&self) -> Vec<T> {
        let mut window = self.window.lock().await;
        window.closed = true;
        std::mem::take(&mut window.items)
    }

    /// Number of events buffered in the open window.
    pub async fn pending(&self) -> usize {
        self.window.lock().await.items.len()
    }

    async fn reserve(&self) -> Result<mpsc::Permit<'_, Vec<T>>, PipelineError> {
        self.queue.reserve().await.map_err(|_| {
            tracing::error!("Flush queue closed, append rejected");
            PipelineError::Closed
        })
    }
}
