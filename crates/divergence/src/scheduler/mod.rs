//! The fresh/refresh job queues and the single render worker.
//!
//! Requests push values into [`JobQueues`]; one background task, spawned by
//! [`JobScheduler::start`], drains them sequentially. Fresh work always goes
//! first. The render backend is owned by that task alone and is only ever
//! touched from one blocking thread at a time.
//!
//! ## Submodules
//!
//! - [`manager`] - shared queue state, status and the scheduler handle.
//! - [`worker`] - the worker loop and per-job execution.

mod manager;
mod worker;


pub use manager::*;
pub use worker::*;
