use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Bounded buffer between a group's readers and its workers.
///
/// `push` waits while the buffer is full. Once the cancellation token fires
/// `push` hands the item back instead of queueing it, while `pop` and
/// `try_pop` keep returning whatever is already buffered.
#[derive(Debug)]
pub struct Multiplexer<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
    cancellation: CancellationToken,
}

impl<T: Send> Multiplexer<T> {
    pub fn new(capacity: usize, cancellation: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            cancellation,
        }
    }

    /// Queue an item, waiting for space. Returns the item if the buffer has
    /// been cancelled.
    pub async fn push(&self, item: T) -> Result<(), T> {
        if self.cancellation.is_cancelled() {
            return Err(item);
        }
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(item),
            permit = self.sender.reserve() => match permit {
                Ok(permit) => {
                    permit.send(item);
                    Ok(())
                }
                Err(_) => Err(item),
            },
        }
    }

    /// Take the next item, waiting until one is available.
    pub async fn pop(&self) -> Option<T> {
        self.receiver.lock().await.recv().await
    }

    /// Take the next item if one is buffered and no other consumer is popping.
    pub fn try_pop(&self) -> Option<T> {
        self.receiver.try_lock().ok()?.try_recv().ok()
    }

    /// Items currently buffered (including slots reserved by a pending push).
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
