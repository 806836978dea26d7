//! # Bounded Queue
//!
//! A fixed-capacity FIFO queue built from one [`Lock`] and two [`Condition`]s:
//!
//! - `put` waits on **not_full** while the queue is at capacity, then notifies
//!   **not_empty**.
//! - `get` waits on **not_empty** while the queue is empty, then notifies
//!   **not_full**.
//!
//! Each completed operation wakes exactly one blocked counterpart. Occupancy stays
//! within `0..=capacity`; a queue found over capacity is an invariant violation.
//!
//! Callers that want to report what happened *in the order it happened* pass an
//! observer to the `*_observed` operations. The observer runs while the queue
//! lock is held.
//!
//! ## Closing
//!
//! [`BoundedQueue::close`] stops admission. The closed flag lives under the same
//! lock as the items, so a put either lands before the close or is rejected:
//!
//! - `try_put` hands the item back as [`PutOutcome::Closed`];
//! - a blocking `put` fails;
//! - gets drain what is left, after which a blocking `get` fails.

use crate::actor::ActorId;
use crate::error::CoordinationError;
use crate::sync::condition::Condition;
use crate::sync::lock::Lock;
use std::collections::VecDeque;

/// What a queue operation is doing, reported to an observer under the queue lock.
#[derive(Debug)]
pub enum QueueSignal<'a, T> {
    /// The queue is full; a blocking put is about to wait, a `try_put` gives up.
    Full { occupancy: usize },
    /// The queue is empty; a blocking get is about to wait, a `try_get` gives up.
    Empty,
    /// The queue is closed; the item was not added.
    Closed { occupancy: usize },
    Put { item: &'a T, occupancy: usize },
    Got { item: &'a T, occupancy: usize },
}

/// Outcome of a non-blocking [`BoundedQueue::try_put`].
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome<T> {
    Accepted { occupancy: usize },
    /// The queue was at capacity; the item is handed back.
    Full(T),
    /// The queue was closed; the item is handed back.
    Closed(T),
}

#[derive(Debug)]
struct Slots<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Fixed-capacity blocking FIFO queue.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    slots: Lock<Slots<T>>,
    not_full: Condition,
    not_empty: Condition,
}

impl<T: Send> BoundedQueue<T> {
    pub fn new(name: &str, capacity: usize) -> Result<Self, CoordinationError> {
        if capacity == 0 {
            return Err(CoordinationError::InvalidConfig(format!(
                "queue `{name}` needs a capacity of at least 1"
            )));
        }
        let slots = Lock::new(
            name,
            Slots {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            },
        );
        let not_full = Condition::new(format!("{name}.not_full"), &slots);
        let not_empty = Condition::new(format!("{name}.not_empty"), &slots);
        Ok(Self {
            capacity,
            slots,
            not_full,
            not_empty,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn put(&self, actor: ActorId, item: T) -> Result<usize, CoordinationError> {
        self.put_observed(actor, item, |_| {}).await
    }

    pub async fn get(&self, actor: ActorId) -> Result<(T, usize), CoordinationError> {
        self.get_observed(actor, |_| {}).await
    }

    /// Appends `item`, blocking while the queue is full. Returns the new occupancy.
    pub async fn put_observed<F>(
        &self,
        actor: ActorId,
        item: T,
        mut observe: F,
    ) -> Result<usize, CoordinationError>
    where
        F: FnMut(QueueSignal<'_, T>) + Send,
    {
        let mut slots = self.slots.acquire(actor).await?;
        loop {
            let occupancy = slots.items.len();
            if slots.closed {
                observe(QueueSignal::Closed { occupancy });
                return Err(self.closed_error(actor, "put into"));
            }
            if occupancy < self.capacity {
                break;
            }
            observe(QueueSignal::Full { occupancy });
            slots = self.not_full.wait(slots).await?;
        }

        slots.items.push_back(item);
        let occupancy = self.checked_occupancy(slots.items.len())?;
        if let Some(item) = slots.items.back() {
            observe(QueueSignal::Put { item, occupancy });
        }
        self.not_empty.notify(&slots)?;
        Ok(occupancy)
    }

    /// Removes the oldest item, blocking while the queue is empty. Returns the item
    /// and the new occupancy.
    pub async fn get_observed<F>(
        &self,
        actor: ActorId,
        mut observe: F,
    ) -> Result<(T, usize), CoordinationError>
    where
        F: FnMut(QueueSignal<'_, T>) + Send,
    {
        let mut slots = self.slots.acquire(actor).await?;
        loop {
            if let Some(item) = slots.items.pop_front() {
                let occupancy = self.checked_occupancy(slots.items.len())?;
                observe(QueueSignal::Got {
                    item: &item,
                    occupancy,
                });
                self.not_full.notify(&slots)?;
                return Ok((item, occupancy));
            }
            if slots.closed {
                return Err(self.closed_error(actor, "get from drained"));
            }
            observe(QueueSignal::Empty);
            slots = self.not_empty.wait(slots).await?;
        }
    }

    /// Appends `item` unless the queue is full or closed. Never waits for space.
    pub async fn try_put(
        &self,
        actor: ActorId,
        item: T,
    ) -> Result<PutOutcome<T>, CoordinationError> {
        self.try_put_observed(actor, item, |_| {}).await
    }

    /// [`try_put`](Self::try_put), reporting the outcome to `observe` under the lock.
    pub async fn try_put_observed<F>(
        &self,
        actor: ActorId,
        item: T,
        observe: F,
    ) -> Result<PutOutcome<T>, CoordinationError>
    where
        F: FnOnce(QueueSignal<'_, T>) + Send,
    {
        let mut slots = self.slots.acquire(actor).await?;
        let occupancy = slots.items.len();
        if slots.closed {
            observe(QueueSignal::Closed { occupancy });
            return Ok(PutOutcome::Closed(item));
        }
        if occupancy >= self.capacity {
            observe(QueueSignal::Full { occupancy });
            return Ok(PutOutcome::Full(item));
        }

        slots.items.push_back(item);
        let occupancy = self.checked_occupancy(slots.items.len())?;
        if let Some(item) = slots.items.back() {
            observe(QueueSignal::Put { item, occupancy });
        }
        self.not_empty.notify(&slots)?;
        Ok(PutOutcome::Accepted { occupancy })
    }

    /// Removes the oldest item if there is one. Never waits for an item.
    pub async fn try_get(&self, actor: ActorId) -> Result<Option<(T, usize)>, CoordinationError> {
        self.try_get_observed(actor, |_| {}).await
    }

    /// [`try_get`](Self::try_get), reporting the outcome to `observe` under the lock.
    pub async fn try_get_observed<F>(
        &self,
        actor: ActorId,
        observe: F,
    ) -> Result<Option<(T, usize)>, CoordinationError>
    where
        F: FnOnce(QueueSignal<'_, T>) + Send,
    {
        let mut slots = self.slots.acquire(actor).await?;
        match slots.items.pop_front() {
            Some(item) => {
                let occupancy = self.checked_occupancy(slots.items.len())?;
                observe(QueueSignal::Got {
                    item: &item,
                    occupancy,
                });
                self.not_full.notify(&slots)?;
                Ok(Some((item, occupancy)))
            }
            None => {
                observe(QueueSignal::Empty);
                Ok(None)
            }
        }
    }

    /// Stops admission and wakes every blocked caller. Returns `false` if the queue
    /// was already closed.
    pub async fn close(&self, actor: ActorId) -> Result<bool, CoordinationError> {
        let mut slots = self.slots.acquire(actor).await?;
        if slots.closed {
            return Ok(false);
        }
        slots.closed = true;
        self.not_full.notify_all(&slots)?;
        self.not_empty.notify_all(&slots)?;
        Ok(true)
    }

    pub async fn is_closed(&self, actor: ActorId) -> Result<bool, CoordinationError> {
        Ok(self.slots.acquire(actor).await?.closed)
    }

    pub async fn occupancy(&self, actor: ActorId) -> Result<usize, CoordinationError> {
        Ok(self.slots.acquire(actor).await?.items.len())
    }

    fn checked_occupancy(&self, occupancy: usize) -> Result<usize, CoordinationError> {
        if occupancy > self.capacity {
            return Err(CoordinationError::invariant(format!(
                "queue `{}` holds {occupancy} items, capacity {}",
                self.slots.name(),
                self.capacity
            )));
        }
        Ok(occupancy)
    }

    fn closed_error(&self, actor: ActorId, op: &str) -> CoordinationError {
        CoordinationError::invariant(format!(
            "{actor} tried to {op} closed queue `{}`",
            self.slots.name()
        ))
    }
}
