use rendezvous_api::*;
use std::sync::Arc;

/// A running rendezvous instance: one kv store shared by one presence
/// store and one session coordinator.
///
/// Every call names its pre-authenticated caller explicitly. The
/// transport layer in front of this is expected to call
/// [Rendezvous::disconnect] when a participant's connection drops.
#[derive(Debug, Clone)]
pub struct Rendezvous {
    builder: Arc<Builder>,
    kv_store: DynKvStore,
    presence: DynPresence,
    session: DynSessionCoordinator,
}

impl Rendezvous {
    /// Validate the builder's config and construct every module.
    pub async fn create(builder: Arc<Builder>) -> RvResult<Self> {
        builder.validate_config()?;

        let kv_store = builder.kv_store.create(builder.clone()).await?;
        let presence = builder
            .presence
            .create(builder.clone(), kv_store.clone())
            .await?;
        let session = builder
            .session
            .create(builder.clone(), kv_store.clone())
            .await?;

        Ok(Self {
            builder,
            kv_store,
            presence,
            session,
        })
    }

    /// The builder this instance was constructed from.
    pub fn builder(&self) -> &Arc<Builder> {
        &self.builder
    }

    /// The shared kv store.
    pub fn kv_store(&self) -> &DynKvStore {
        &self.kv_store
    }

    /// The presence store.
    pub fn presence(&self) -> &DynPresence {
        &self.presence
    }

    /// The session coordinator.
    pub fn session(&self) -> &DynSessionCoordinator {
        &self.session
    }

    /// Advertise the owner under a set of fingerprint hashes.
    pub async fn presence_publish(&self, req: PublishRequest) -> RvResult<()> {
        self.presence.publish(req).await
    }

    /// Withdraw everything the owner still holds.
    pub async fn presence_unpublish(&self, owner_id: UserId) -> RvResult<()> {
        self.presence.unpublish(owner_id).await
    }

    /// Look up a fingerprint hash, issuing an introduction token if the
    /// owner is contactable.
    pub async fn presence_match(
        &self,
        requester_id: UserId,
        hash: FingerprintHash,
    ) -> RvResult<PresenceMatch> {
        self.presence
            .try_match_and_issue_token(requester_id, hash)
            .await
    }

    /// Redeem an introduction token.
    pub async fn token_validate(
        &self,
        token: IntroToken,
    ) -> RvResult<TokenValidation> {
        self.presence.validate_token(token).await
    }

    /// Create a session hosted by the caller.
    pub async fn session_create(
        &self,
        caller: UserId,
        metadata: SessionMetadata,
    ) -> RvResult<SessionId> {
        self.session.create(caller, metadata).await
    }

    /// Join a session.
    pub async fn session_join(
        &self,
        caller: UserId,
        session_id: SessionId,
    ) -> RvResult<Vec<MemberProfile>> {
        self.session.join(caller, session_id).await
    }

    /// Leave the caller's session.
    pub async fn session_leave(
        &self,
        caller: UserId,
    ) -> RvResult<LeaveOutcome> {
        self.session.leave(caller).await
    }

    /// Host only: push state to the other members.
    pub async fn session_push_state(
        &self,
        caller: UserId,
        payload: bytes::Bytes,
    ) -> RvResult<()> {
        self.session.push_state(caller, payload).await
    }

    /// Deliver an event to the other members.
    pub async fn session_trigger_event(
        &self,
        caller: UserId,
        payload: bytes::Bytes,
    ) -> RvResult<()> {
        self.session.trigger_event(caller, payload).await
    }

    /// Host only: deliver a branching choice to the other members.
    pub async fn session_branching_choice(
        &self,
        caller: UserId,
        payload: bytes::Bytes,
    ) -> RvResult<()> {
        self.session.branching_choice(caller, payload).await
    }

    /// The participant's connection is gone: leave any session, then
    /// withdraw presence. Both steps are attempted, the first error
    /// is returned.
    pub async fn disconnect(&self, user_id: UserId) -> RvResult<()> {
        tracing::debug!(%user_id, "disconnect");

        let left = self.session.leave(user_id.clone()).await;
        if let Err(err) = &left {
            tracing::warn!(
                %user_id,
                ?err,
                "session leave on disconnect failed",
            );
        }

        let unpublished = self.presence.unpublish(user_id.clone()).await;
        if let Err(err) = &unpublished {
            tracing::warn!(%user_id, ?err, "unpublish on disconnect failed");
        }

        left?;
        unpublished
    }
}
