//! Per-request promotion, lookahead and enqueue policy.

use crate::{AssetStore, CachedAsset, Error, JobQueues, Priority, Result, Value};
use std::sync::Arc;

/// What a request for a value can be answered with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// The durable cache holds an asset for the value, possibly stale.
    Ready(CachedAsset),
    /// Nothing is cached yet; the value is queued or rendering.
    Pending,
}

/// Result of routing one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routed {
    pub lookup: Lookup,
    /// The queue this request fed.
    pub priority: Priority,
    /// How many values were newly queued.
    pub enqueued: usize,
}

/// Decides, per request, what to promote, what to queue and what to serve.
///
/// Never renders and never waits for the worker.
pub struct RequestRouter<S: AssetStore + ?Sized> {
    store: Arc<S>,
    queues: Arc<JobQueues>,
    lookahead: u64,
    max_value: Value,
}

impl<S: AssetStore + ?Sized> Clone for RequestRouter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            queues: Arc::clone(&self.queues),
            lookahead: self.lookahead,
            max_value: self.max_value,
        }
    }
}

impl<S: AssetStore + ?Sized> RequestRouter<S> {
    /// `digits` is the display width; values beyond it are rejected and the
    /// lookahead window stops at the largest displayable value.
    pub fn new(store: Arc<S>, queues: Arc<JobQueues>, lookahead: u64, digits: usize) -> Self {
        Self {
            store,
            queues,
            lookahead,
            max_value: Value::max_for_width(digits),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn queues(&self) -> &Arc<JobQueues> {
        &self.queues
    }

    pub fn max_value(&self) -> Value {
        self.max_value
    }

    /// Handles a request for `value`.
    ///
    /// 1. Promotes a staged asset for `value` into the durable cache.
    /// 2. If any value in `[value, value + lookahead]` is neither cached nor
    ///    staged, queues each such value as fresh work.
    /// 3. Otherwise queues `value` alone as refresh work.
    /// 4. Serves the durable asset, or [`Lookup::Pending`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidValue`] if `value` does not fit on the display.
    /// - [`Error::ServiceShutdown`] once the queues are closed.
    /// - [`Error::Io`] if the cached asset exists but cannot be read.
    pub fn lookup(&self, value: Value) -> Result<Routed> {
        if value > self.max_value {
            return Err(Error::InvalidValue {
                reason: format!("{value} exceeds the largest displayable value {}", self.max_value),
            });
        }

        if let Err(e) = self.store.promote(value) {
            // The previous asset, if any, is still servable.
            tracing::warn!(%value, error = %e, "Failed to promote staged asset");
        }

        // The value being rendered is neither queued nor staged yet; treat it
        // as present so it is not rendered twice.
        let in_flight = self.queues.in_flight();
        let missing: Vec<Value> = value
            .window(self.lookahead, self.max_value)
            .filter(|v| Some(*v) != in_flight && !self.store.exists(*v))
            .collect();

        let (priority, enqueued) = if missing.is_empty() {
            if in_flight == Some(value) {
                (Priority::Fresh, 0)
            } else {
                let added = self.queues.push(Priority::Refresh, value)?;
                (Priority::Refresh, usize::from(added))
            }
        } else {
            let mut added = 0;
            for v in missing {
                if self.queues.push(Priority::Fresh, v)? {
                    added += 1;
                }
            }
            (Priority::Fresh, added)
        };

        let lookup = match self.store.read(value)? {
            Some(asset) => Lookup::Ready(asset),
            None => Lookup::Pending,
        };
        tracing::debug!(%value, %priority, enqueued, ready = matches!(lookup, Lookup::Ready(_)), "routed request");

        Ok(Routed {
            lookup,
            priority,
            enqueued,
        })
    }
}
