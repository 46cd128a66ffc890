//! Thread-safe FIFO queues connecting tasks and ports.
//!
//! A [`Slot`] is the sole mechanism by which stages exchange data. Multiple
//! producers and the owning consumer may operate concurrently; every operation
//! runs under the slot's single mutex, so dequeue order equals enqueue order
//! and no message is ever delivered to two consumers. Capacity is unbounded.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::Message;

/// Named FIFO queue of [`Message`]s.
///
/// Slots are shared by reference across a flow graph; tasks never own their
/// slots. Tasks also never hold two slot locks across a blocking operation, so
/// one coarse lock per slot is sufficient.
///
/// # Examples
///
/// ```
/// use ductwork::document::Document;
/// use ductwork::message::Message;
/// use ductwork::slot::Slot;
///
/// let slot = Slot::new("inbox");
/// slot.enqueue(Message::new(Document::element("a")));
/// slot.enqueue(Message::new(Document::element("b")));
///
/// assert_eq!(slot.len(), 2);
/// assert_eq!(slot.dequeue().unwrap().payload.unwrap().name, "a");
/// ```
#[derive(Debug)]
pub struct Slot {
    id: String,
    queue: Mutex<VecDeque<Message>>,
}

impl Slot {
    /// Creates an empty slot wrapped in an [`Arc`] for sharing across stages.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            queue: Mutex::new(VecDeque::new()),
        })
    }

    /// Identifier used in diagnostics.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Appends a message to the tail. Always succeeds.
    pub fn enqueue(&self, message: Message) {
        self.queue.lock().push_back(message);
    }

    /// Removes and returns the head, or `None` when empty. Non-blocking.
    pub fn dequeue(&self) -> Option<Message> {
        self.queue.lock().pop_front()
    }

    /// Returns a clone of the head without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<Message> {
        self.queue.lock().front().cloned()
    }

    /// Whether at least one message is queued.
    #[must_use]
    pub fn has_message(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
