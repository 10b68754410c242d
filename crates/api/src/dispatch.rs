//! Outbound delivery to connected participants.

use crate::*;
use std::sync::Arc;

/// The real-time transport, as seen from this crate.
///
/// Delivery is best-effort: offline targets are silently dropped.
/// Implementations never own session or presence state, they only
/// deliver addressed events.
pub trait Dispatch: 'static + Send + Sync + std::fmt::Debug {
    /// Deliver an event to one participant.
    fn send_to(
        &self,
        user_id: UserId,
        event: SessionEvent,
    ) -> BoxFut<'_, RvResult<()>>;

    /// Deliver the same event to many participants.
    ///
    /// The default attempts every target and returns the last error, so
    /// one unreachable participant does not starve the rest.
    fn send_to_many(
        &self,
        user_ids: Vec<UserId>,
        event: SessionEvent,
    ) -> BoxFut<'_, RvResult<()>> {
        Box::pin(async move {
            let mut last_err = None;
            for user_id in user_ids {
                if let Err(err) = self.send_to(user_id, event.clone()).await {
                    last_err = Some(err);
                }
            }
            match last_err {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }
}

/// Trait-object [Dispatch].
pub type DynDispatch = Arc<dyn Dispatch>;

/// Resolves display data for participants from durable storage.
pub trait ProfileResolver: 'static + Send + Sync + std::fmt::Debug {
    /// Resolve the display name of a participant. `None` if unknown.
    fn resolve(&self, user_id: UserId) -> BoxFut<'_, RvResult<Option<String>>>;
}

/// Trait-object [ProfileResolver].
pub type DynProfileResolver = Arc<dyn ProfileResolver>;

/// A [Dispatch] that drops everything. For deployments (and tests) that
/// have no connected transport.
#[derive(Debug, Default)]
pub struct NoopDispatch;

impl NoopDispatch {
    /// Construct a new NoopDispatch trait-object.
    pub fn create() -> DynDispatch {
        let out: DynDispatch = Arc::new(Self);
        out
    }
}

impl Dispatch for NoopDispatch {
    fn send_to(
        &self,
        _user_id: UserId,
        _event: SessionEvent,
    ) -> BoxFut<'_, RvResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// A [ProfileResolver] that knows no one.
#[derive(Debug, Default)]
pub struct NoopProfileResolver;

impl NoopProfileResolver {
    /// Construct a new NoopProfileResolver trait-object.
    pub fn create() -> DynProfileResolver {
        let out: DynProfileResolver = Arc::new(Self);
        out
    }
}

impl ProfileResolver for NoopProfileResolver {
    fn resolve(
        &self,
        _user_id: UserId,
    ) -> BoxFut<'_, RvResult<Option<String>>> {
        Box::pin(async { Ok(None) })
    }
}
