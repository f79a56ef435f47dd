//! Capability traits for values that expire.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

/// A value that may carry a deadline.
///
/// Maps only look at this capability when deciding whether to arm a timer;
/// `None` means the value is never scheduled.
pub trait Timed {
    fn deadline(&self) -> Option<DateTime<Utc>>;
}

/// Side effect run when a scheduled value reaches its deadline.
///
/// Handlers are attached to a map when it is created, so they carry their
/// own collaborators (gateways, stores) instead of looking them up globally.
/// The returned future must not do any work until it is polled.
pub trait ExpiryHandler<K, V>: Send + Sync {
    fn on_expire(&self, key: K, value: V) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// Handler for maps whose values never expire.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExpiry;

impl<K, V> ExpiryHandler<K, V> for NoExpiry {
    fn on_expire(&self, _key: K, _value: V) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
