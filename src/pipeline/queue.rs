use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("payload queue is closed")]
pub struct QueueClosed;

/// Fixed-capacity FIFO shared by one producer and many consumers.
///
/// `push` suspends while the buffer is full and `pop` while it is empty, so the
/// number of buffered items never exceeds the capacity. The queue has no
/// timeouts of its own; callers race it against their own deadlines.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    tx: async_channel::Sender<T>,
    rx: async_channel::Receiver<T>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> BoundedQueue<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        let (tx, rx) = async_channel::bounded(capacity);
        Self { tx, rx }
    }

    pub async fn push(&self, item: T) -> Result<(), QueueClosed> {
        self.tx.send(item).await.map_err(|_| QueueClosed)
    }

    pub async fn pop(&self) -> Result<T, QueueClosed> {
        self.rx.recv().await.map_err(|_| QueueClosed)
    }

    /// Take an item only if one is already buffered.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Wake every blocked `push`/`pop`; buffered items can still be popped.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }
}
