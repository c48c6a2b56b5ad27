//! Tenure common types
//!
//! Shared building blocks for the certificate renewal crates:
//!
//! - [`DomainKey`] and [`KeyType`] identify managed certificate slots
//! - [`Clock`] abstracts wall-clock time
//! - [`RandomSource`] abstracts the uniform draws used for jitter

pub mod clock;
pub mod ids;
pub mod random;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{DomainKey, EmptyDomainError, KeyType};
pub use random::{FixedRandom, RandomSource, SeededRandom, ThreadRandom};
