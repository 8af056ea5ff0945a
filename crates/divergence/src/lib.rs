//! # `divergence`: render-job orchestration for a nixie-tube odometer
//!
//! `divergence` turns a monotonically increasing counter into a short looping
//! animation of flickering nixie tubes. Rendering an animation is expensive (a
//! full scene render per frame plus an external encode), so this crate keeps
//! rendering off the request path entirely:
//!
//! - Requests consult an [`AssetStore`] and either serve the cached asset or
//!   report that it is not ready yet.
//! - Cold values are queued together with a lookahead window as *fresh* work;
//!   warm values are queued alone as *refresh* work.
//! - A single background worker drains the queues, fresh before refresh, and
//!   is the only code that ever touches the [`RenderBackend`].
//!
//! ## Module Overview
//!
//! - [`DedupQueue`] - insertion-ordered set with FIFO pop.
//! - [`FlickerGenerator`] - per-frame, per-tube material state machine.
//! - [`RenderBackend`], [`TubeRenderer`], [`FfmpegEncoder`] - frame rendering
//!   and animation encoding.
//! - [`DiskAssetStore`] - staging/durable asset cache with atomic promotion.
//! - [`JobScheduler`], [`JobQueues`] - the fresh/refresh queues and the worker.
//! - [`RequestRouter`] - promotion, lookahead and enqueue policy per request.
//! - [`CounterStore`] - view counts behind the static SVG path.

mod cache;
mod common;
mod counter;
mod flicker;
mod queue;
mod render;
mod router;
mod scheduler;

pub use crate::cache::*;
pub use crate::common::*;
pub use crate::counter::*;
pub use crate::flicker::*;
pub use crate::queue::*;
pub use crate::render::*;
pub use crate::router::*;
pub use crate::scheduler::*;
