//! `sendkit`: an outbound email delivery pipeline with self-governance —
//! warm-up rate limiting, self-healing retries, queue monitoring, and
//! predictive blocker detection, wired together behind one
//! [`container::ServiceContainer`].

pub mod config;
pub mod container;
pub mod persistence;
pub mod producer;

pub use config::Options;
pub use container::ServiceContainer;
pub use persistence::{AlertRecord, AttemptRecord, AttemptTerminal, InMemoryPersistence, Persistence};
pub use producer::{EnqueueAck, Producer, ProducerStats};
