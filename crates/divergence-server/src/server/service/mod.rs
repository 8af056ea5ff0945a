//! HTTP surface of the odometer.
//!
//! ## Routes
//!
//! - `GET /` - JSON array of queued values, fresh first.
//! - `GET /{value}` - the cached animation, or `404` while it renders.
//! - `GET /status` - queue lengths, in-flight value and job counters.
//! - `GET /health` - `SERVING` until shutdown begins.
//! - `GET /count/{key}` - increments `key` and returns the static counter SVG.
//!
//! ## Submodules
//!
//! - [`handler`] - shared state, handlers and the route table.
//! - [`error`] - maps core errors onto status codes.

pub mod error;
pub mod handler;
