//! Application layer: the billing reconciler and the triggers that drive it.
//!
//! `BillingReconciler` owns the three per-explorer transitions. The
//! `RestStateScheduler` runs the daily pause and cancel scans, and
//! `spawn_resting_listener` resumes sponsorships when an explorer becomes
//! active again.

pub mod events;
pub mod reconciler;
pub mod scheduler;
