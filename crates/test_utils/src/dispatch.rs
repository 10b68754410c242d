//! Collaborator doubles for session tests.

use rendezvous_api::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A [Dispatch] that records every delivered event.
#[derive(Debug, Default)]
pub struct RecordingDispatch {
    sent: Mutex<Vec<(UserId, SessionEvent)>>,
    offline: Mutex<Vec<UserId>>,
}

impl RecordingDispatch {
    /// Construct a new RecordingDispatch.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every event delivered so far, in delivery order.
    pub fn events(&self) -> Vec<(UserId, SessionEvent)> {
        self.sent.lock().unwrap().clone()
    }

    /// The events delivered to one participant, in delivery order.
    pub fn events_for(&self, user_id: &UserId) -> Vec<SessionEvent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == user_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Make deliveries to this participant fail.
    pub fn set_offline(&self, user_id: UserId) {
        self.offline.lock().unwrap().push(user_id);
    }
}

impl Dispatch for RecordingDispatch {
    fn send_to(
        &self,
        user_id: UserId,
        event: SessionEvent,
    ) -> BoxFut<'_, RvResult<()>> {
        let r = if self.offline.lock().unwrap().contains(&user_id) {
            Err(RvError::other(format!("{user_id} is offline")))
        } else {
            self.sent.lock().unwrap().push((user_id, event));
            Ok(())
        };
        Box::pin(async move { r })
    }
}

/// A [ProfileResolver] over a fixed map of display names.
#[derive(Debug, Default)]
pub struct StaticProfiles(HashMap<UserId, String>);

impl StaticProfiles {
    /// Construct a resolver knowing the given `(user, display name)` pairs.
    pub fn create<'a>(
        profiles: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> DynProfileResolver {
        let out: DynProfileResolver = Arc::new(Self(
            profiles
                .into_iter()
                .map(|(u, n)| (UserId::from(u), n.to_string()))
                .collect(),
        ));
        out
    }
}

impl ProfileResolver for StaticProfiles {
    fn resolve(&self, user_id: UserId) -> BoxFut<'_, RvResult<Option<String>>> {
        let r = self.0.get(&user_id).cloned();
        Box::pin(async move { Ok(r) })
    }
}
