//! Client-side state: the reconciler that owns one canonical job list and
//! the adaptive poller that keeps it converging to the ledger even when
//! the push channel is unavailable.

pub mod poller;
pub mod reconciler;

pub use poller::{AdaptivePoller, FetchError, JobFetch, PollDriver, PollTier};
pub use reconciler::{ClientEvent, JobReconciler, MergeOutcome};
