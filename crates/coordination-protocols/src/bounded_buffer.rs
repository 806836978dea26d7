//! # Bounded Buffer
//!
//! Producers and consumers exchange labeled [`Item`]s through one fixed-capacity
//! [`BoundedQueue`]. A producer that finds the buffer full, or a consumer that
//! finds it empty, logs the fact (`buffer-full` / `buffer-empty`) and waits.
//!
//! Every item is produced once and consumed once. The configuration must balance
//! total production against total consumption, otherwise some actor would wait
//! forever.

use async_trait::async_trait;
use coordination_framework::sync::{BoundedQueue, QueueSignal};
use coordination_framework::{
    Action, Actor, ActorEnv, ActorId, CoordinationError, Crew, ResourceState, Role, WorkRange,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BufferConfig;

/// A produced item, labeled with its producer and sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Item {
    pub producer: usize,
    pub seq: usize,
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}-Item{}", self.producer, self.seq)
    }
}

/// The shared buffer.
#[derive(Debug)]
pub struct Buffer {
    queue: BoundedQueue<Item>,
}

impl Buffer {
    pub fn new(capacity: usize) -> Result<Self, CoordinationError> {
        Ok(Self {
            queue: BoundedQueue::new("buffer", capacity)?,
        })
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Puts `item`, logging a `buffer-full` wait and then the `produced-item` event.
    pub async fn produce(
        &self,
        producer: ActorId,
        item: Item,
        env: &ActorEnv,
    ) -> Result<usize, CoordinationError> {
        let capacity = self.capacity();
        self.queue
            .put_observed(producer, item, |signal| match signal {
                QueueSignal::Full { occupancy } => {
                    env.record(
                        producer,
                        Action::BufferFull,
                        ResourceState::Buffer {
                            occupancy,
                            capacity,
                        },
                    );
                }
                QueueSignal::Put { item, occupancy } => {
                    env.record(
                        producer,
                        Action::ProducedItem(item.to_string()),
                        ResourceState::Buffer {
                            occupancy,
                            capacity,
                        },
                    );
                }
                _ => {}
            })
            .await
    }

    /// Takes the oldest item, logging a `buffer-empty` wait and then the
    /// `consumed-item` event.
    pub async fn consume(
        &self,
        consumer: ActorId,
        env: &ActorEnv,
    ) -> Result<Item, CoordinationError> {
        let capacity = self.capacity();
        let (item, _) = self
            .queue
            .get_observed(consumer, |signal| match signal {
                QueueSignal::Empty => {
                    env.record(
                        consumer,
                        Action::BufferEmpty,
                        ResourceState::Buffer {
                            occupancy: 0,
                            capacity,
                        },
                    );
                }
                QueueSignal::Got { item, occupancy } => {
                    env.record(
                        consumer,
                        Action::ConsumedItem(item.to_string()),
                        ResourceState::Buffer {
                            occupancy,
                            capacity,
                        },
                    );
                }
                _ => {}
            })
            .await?;
        Ok(item)
    }
}

pub struct Producer {
    id: ActorId,
    items: usize,
    work: WorkRange,
}

impl Producer {
    pub fn new(index: usize, items: usize, work: WorkRange) -> Self {
        Self {
            id: ActorId::new(Role::Producer, index),
            items,
            work,
        }
    }
}

#[async_trait]
impl Actor for Producer {
    type Context = Buffer;

    fn id(&self) -> ActorId {
        self.id
    }

    async fn run(self, buffer: Arc<Buffer>, env: ActorEnv) -> Result<(), CoordinationError> {
        for seq in 0..self.items {
            env.work(self.work).await;
            let item = Item {
                producer: self.id.index,
                seq,
            };
            buffer.produce(self.id, item, &env).await?;
        }
        env.record(self.id, Action::Finished, ResourceState::None);
        Ok(())
    }
}

pub struct Consumer {
    id: ActorId,
    items: usize,
    work: WorkRange,
}

impl Consumer {
    pub fn new(index: usize, items: usize, work: WorkRange) -> Self {
        Self {
            id: ActorId::new(Role::Consumer, index),
            items,
            work,
        }
    }
}

#[async_trait]
impl Actor for Consumer {
    type Context = Buffer;

    fn id(&self) -> ActorId {
        self.id
    }

    async fn run(self, buffer: Arc<Buffer>, env: ActorEnv) -> Result<(), CoordinationError> {
        for _ in 0..self.items {
            buffer.consume(self.id, &env).await?;
            env.work(self.work).await;
        }
        env.record(self.id, Action::Finished, ResourceState::None);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferReport {
    pub produced: usize,
    pub consumed: usize,
    pub capacity: usize,
    /// Highest occupancy observed after any put or get.
    pub peak_occupancy: usize,
    pub full_waits: usize,
    pub empty_waits: usize,
}

pub async fn run(
    config: &BufferConfig,
    work: WorkRange,
    env: ActorEnv,
    deadline: Duration,
) -> Result<BufferReport, CoordinationError> {
    config.validate()?;
    let buffer = Arc::new(Buffer::new(config.capacity)?);
    let mut crew = Crew::new("bounded-buffer", env.clone())?;
    for index in 0..config.producers {
        crew.spawn(
            Producer::new(index, config.items_per_producer, work),
            buffer.clone(),
        );
    }
    for index in 0..config.consumers {
        crew.spawn(
            Consumer::new(index, config.items_per_consumer, work),
            buffer.clone(),
        );
    }
    crew.join(deadline).await?;

    let events = env.events();
    let peak_occupancy = events
        .snapshot()
        .iter()
        .filter_map(|e| match e.state {
            ResourceState::Buffer { occupancy, .. } => Some(occupancy),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    Ok(BufferReport {
        produced: events.count("produced-item"),
        consumed: events.count("consumed-item"),
        capacity: config.capacity,
        peak_occupancy,
        full_waits: events.count("buffer-full"),
        empty_waits: events.count("buffer-empty"),
    })
}
