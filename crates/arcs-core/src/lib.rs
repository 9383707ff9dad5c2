#![deny(missing_docs)]
#![doc = "Core types, errors and the profile store contract shared by the ARCS group-formation crates."]

pub mod control;
pub mod errors;
mod priority;
pub mod retry;
pub mod rng;
pub mod store;
mod types;

pub use control::{CancelToken, Clock, MonotonicClock, RunBudget, SteppingClock};
pub use errors::{ArcsError, ErrorInfo};
pub use priority::{GroupingMode, PriorityMode};
pub use retry::{RetryPolicy, RetryingStore};
pub use rng::{derive_substream_seed, seed_from_students, RngHandle};
pub use store::{InMemoryProfileStore, InjectedFault, ProfileStore};
pub use types::{
    level_distribution, ArcsScores, Dimension, LikertAnswer, MotivationLevel,
    MotivationProfile, StudentId,
};
