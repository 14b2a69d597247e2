//! Shared types, ports, and error taxonomy for the sendkit delivery
//! pipeline: the data model (`EmailJob`, `SendOutcome`, `Priority`,
//! `QueueName`), the `Domain` newtype, the injectable `Clock`/`Sleeper`/
//! `Randomness` ports, the shutdown `Signal`, and the error taxonomy every
//! other crate builds on.

pub mod address;
pub mod clock;
pub mod domain;
pub mod error;
pub mod job;
pub mod randomness;
pub mod signal;

pub use address::Address;
pub use clock::{Clock, FakeClock, NoopSleeper, Sleeper, SystemClock, TokioSleeper};
pub use domain::Domain;
pub use error::{JobValidationError, SendkitError};
pub use job::{EmailJob, ErrorKind, JobId, NewEmailJob, Priority, QueueName, SendOutcome};
pub use randomness::{FakeRandomness, Randomness, SystemRandomness};
pub use signal::Signal;
