//! The core session coordinator implementation.
//!
//! A session is three independent key families in the kv store:
//!
//! - `session:user:{userId}` -> the session the user is bound to.
//! - `session:members:{sessionId}` -> member ids in join order.
//! - `session:host:{sessionId}` -> the host id.
//!
//! None of these are written atomically together. Every operation reads
//! what it needs, tolerates the families disagreeing, and rewrites them
//! consistently for the participant it touches.

use rendezvous_api::*;
use std::sync::Arc;

/// CoreSession configuration types.
pub mod config {
    /// Configuration parameters for
    /// [CoreSessionFactory](super::CoreSessionFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CoreSessionConfig {
        /// How long session keys live without being written, in seconds.
        /// Every write refreshes the ttl of the keys it touches.
        ///
        /// Default: 24 hours.
        pub session_ttl_s: u32,

        /// Session id length in characters.
        ///
        /// Default: 30.
        pub session_id_len: u32,

        /// How many ids to try before giving up on finding an unused one.
        ///
        /// Default: 16.
        pub max_id_attempts: u32,
    }

    impl Default for CoreSessionConfig {
        fn default() -> Self {
            Self {
                session_ttl_s: 60 * 60 * 24,
                session_id_len: 30,
                max_id_attempts: 16,
            }
        }
    }

    impl CoreSessionConfig {
        /// Get the session ttl.
        pub fn session_ttl(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.session_ttl_s as u64)
        }
    }

    /// Module-level configuration for CoreSession.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CoreSessionModConfig {
        /// CoreSession configuration.
        pub core_session: CoreSessionConfig,
    }
}

pub use config::*;

/// The core session coordinator implementation.
#[derive(Debug)]
pub struct CoreSessionFactory {}

impl CoreSessionFactory {
    /// Construct a new CoreSessionFactory.
    pub fn create() -> DynSessionFactory {
        let out: DynSessionFactory = Arc::new(Self {});
        out
    }
}

impl SessionFactory for CoreSessionFactory {
    fn default_config(&self, config: &mut Config) -> RvResult<()> {
        config.set_module_config(&CoreSessionModConfig::default())
    }

    fn validate_config(&self, config: &Config) -> RvResult<()> {
        let config: CoreSessionModConfig = config.get_module_config()?;
        let config = config.core_session;

        if config.session_ttl_s == 0 {
            return Err(RvError::validation("sessionTtlS must be > 0"));
        }

        if config.session_id_len == 0 || config.max_id_attempts == 0 {
            return Err(RvError::validation(
                "sessionIdLen and maxIdAttempts must be > 0",
            ));
        }

        Ok(())
    }

    fn create(
        &self,
        builder: Arc<Builder>,
        kv_store: DynKvStore,
    ) -> BoxFut<'static, RvResult<DynSessionCoordinator>> {
        Box::pin(async move {
            let config: CoreSessionModConfig =
                builder.config.get_module_config()?;
            let out: DynSessionCoordinator = Arc::new(CoreSession {
                config: config.core_session,
                id_gen: builder.id_gen.clone(),
                kv: kv_store,
                dispatch: builder.dispatch.clone(),
                profile: builder.profile.clone(),
            });
            Ok(out)
        })
    }
}

fn user_key(user_id: &UserId) -> String {
    format!("session:user:{user_id}")
}

fn members_key(session_id: &SessionId) -> String {
    format!("session:members:{session_id}")
}

fn host_key(session_id: &SessionId) -> String {
    format!("session:host:{session_id}")
}

fn require_caller(caller: &UserId) -> RvResult<()> {
    if caller.is_empty() {
        return Err(RvError::validation("empty caller id"));
    }
    Ok(())
}

#[derive(Debug)]
struct CoreSession {
    config: CoreSessionConfig,
    id_gen: DynIdGenerator,
    kv: DynKvStore,
    dispatch: DynDispatch,
    profile: DynProfileResolver,
}

impl CoreSession {
    async fn read<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> RvResult<Option<T>> {
        Ok(match self.kv.get(key).await? {
            None => None,
            Some(raw) => decode_record(key, &raw),
        })
    }

    async fn write<T: serde::Serialize>(
        &self,
        key: &str,
        t: &T,
    ) -> RvResult<()> {
        self.kv
            .set_with_ttl(key, encode_record(t)?, self.config.session_ttl())
            .await
    }

    async fn session_of(
        &self,
        user_id: &UserId,
    ) -> RvResult<Option<SessionId>> {
        self.read(&user_key(user_id)).await
    }

    async fn members_of(
        &self,
        session_id: &SessionId,
    ) -> RvResult<Vec<UserId>> {
        Ok(self
            .read(&members_key(session_id))
            .await?
            .unwrap_or_default())
    }

    async fn host_of(
        &self,
        session_id: &SessionId,
    ) -> RvResult<Option<UserId>> {
        self.read(&host_key(session_id)).await
    }

    /// The session the caller is bound to and its member list, if the
    /// caller is actually listed as a member of it.
    async fn membership(
        &self,
        caller: &UserId,
    ) -> RvResult<Option<(SessionId, Vec<UserId>)>> {
        let session_id = match self.session_of(caller).await? {
            None => return Ok(None),
            Some(session_id) => session_id,
        };
        let members = self.members_of(&session_id).await?;
        if !members.contains(caller) {
            return Ok(None);
        }
        Ok(Some((session_id, members)))
    }

    /// Best-effort delivery. Failures are logged, never returned.
    async fn notify(&self, targets: Vec<UserId>, event: SessionEvent) {
        if targets.is_empty() {
            return;
        }
        if let Err(err) = self.dispatch.send_to_many(targets, event).await {
            tracing::warn!(?err, "session event delivery failed");
        }
    }

    async fn profile_of(&self, user_id: UserId) -> MemberProfile {
        let display_name = match self.profile.resolve(user_id.clone()).await {
            Ok(display_name) => display_name,
            Err(err) => {
                tracing::warn!(%user_id, ?err, "profile resolution failed");
                None
            }
        };
        MemberProfile {
            user_id,
            display_name,
        }
    }

    async fn unused_session_id(&self) -> RvResult<SessionId> {
        for _ in 0..self.config.max_id_attempts {
            let session_id = SessionId::from(
                self.id_gen.generate(self.config.session_id_len as usize),
            );
            if self.kv.get(&members_key(&session_id)).await?.is_none() {
                return Ok(session_id);
            }
            tracing::debug!(%session_id, "session id collision, retrying");
        }
        Err(RvError::other("could not generate an unused session id"))
    }

    async fn create_inner(
        &self,
        caller: UserId,
        metadata: SessionMetadata,
    ) -> RvResult<SessionId> {
        require_caller(&caller)?;
        if metadata.topic_id.trim().is_empty() {
            return Err(RvError::validation("empty topic id"));
        }

        tracing::debug!(
            %caller,
            topic_id = %metadata.topic_id,
            "create session",
        );

        if let Some(session_id) = self.session_of(&caller).await? {
            if self.members_of(&session_id).await?.contains(&caller) {
                return Err(RvError::conflict(format!(
                    "{caller} is already in session {session_id}"
                )));
            }
            // the pointer outlived its membership, drop it
            tracing::debug!(
                %caller,
                %session_id,
                "clearing stale session pointer",
            );
            self.kv.remove(&user_key(&caller)).await?;
        }

        let session_id = self.unused_session_id().await?;

        self.write(&members_key(&session_id), &vec![caller.clone()])
            .await?;
        self.write(&host_key(&session_id), &caller).await?;
        self.write(&user_key(&caller), &session_id).await?;

        tracing::info!(%caller, %session_id, "created session");

        Ok(session_id)
    }

    async fn join_inner(
        &self,
        caller: UserId,
        session_id: SessionId,
    ) -> RvResult<Vec<MemberProfile>> {
        require_caller(&caller)?;
        if session_id.is_empty() {
            return Err(RvError::validation("empty session id"));
        }

        tracing::debug!(%caller, %session_id, "join session");

        if self.session_of(&caller).await?.is_some() {
            self.leave_inner(caller.clone()).await?;
        }

        let mut members = self.members_of(&session_id).await?;
        members.retain(|m| m != &caller);
        if members.is_empty() {
            tracing::debug!(%caller, %session_id, "join of vanished session");
            return Ok(Vec::new());
        }
        let prior = members.clone();

        // two joins racing on the same member list can lose one of them,
        // the loser self-heals on its next join or leave
        members.push(caller.clone());
        self.write(&members_key(&session_id), &members).await?;
        self.write(&user_key(&caller), &session_id).await?;
        if let Some(host) = self.host_of(&session_id).await? {
            self.write(&host_key(&session_id), &host).await?;
        }

        let mut profiles = Vec::with_capacity(members.len());
        for member in members {
            profiles.push(self.profile_of(member).await);
        }

        if let Some(me) = profiles.last().cloned() {
            self.notify(
                prior,
                SessionEvent::Joined {
                    session_id: session_id.clone(),
                    member: me,
                },
            )
            .await;
        }

        tracing::info!(
            %caller,
            %session_id,
            count = profiles.len(),
            "joined session",
        );

        Ok(profiles)
    }

    async fn leave_inner(&self, caller: UserId) -> RvResult<LeaveOutcome> {
        require_caller(&caller)?;

        let session_id = match self.session_of(&caller).await? {
            None => return Ok(LeaveOutcome::NotInSession),
            Some(session_id) => session_id,
        };

        tracing::debug!(%caller, %session_id, "leave session");

        // both reads must succeed before deciding whether to tear down
        let members = self.members_of(&session_id).await?;
        let host = self.host_of(&session_id).await?;

        self.kv.remove(&user_key(&caller)).await?;

        let is_host = host.as_ref() == Some(&caller);
        if !is_host && !members.contains(&caller) {
            tracing::debug!(
                %caller,
                %session_id,
                "cleared stale session pointer",
            );
            return Ok(LeaveOutcome::NotInSession);
        }

        let remaining = members
            .into_iter()
            .filter(|m| m != &caller)
            .collect::<Vec<_>>();

        let outcome = if is_host || remaining.is_empty() {
            self.kv.remove(&members_key(&session_id)).await?;
            self.kv.remove(&host_key(&session_id)).await?;
            for member in remaining.iter() {
                // a member that has already moved on keeps its new pointer
                if self.session_of(member).await?.as_ref() == Some(&session_id)
                {
                    self.kv.remove(&user_key(member)).await?;
                }
            }
            tracing::info!(%caller, %session_id, "tore down session");
            LeaveOutcome::TornDown
        } else {
            self.write(&members_key(&session_id), &remaining).await?;
            tracing::info!(%caller, %session_id, "left session");
            LeaveOutcome::Left
        };

        self.notify(
            remaining,
            SessionEvent::Left {
                session_id,
                user_id: caller,
            },
        )
        .await;

        Ok(outcome)
    }

    /// Fan a payload out to everyone but the caller.
    async fn broadcast(
        &self,
        caller: UserId,
        host_only: bool,
        event: impl FnOnce(SessionId, UserId) -> SessionEvent,
    ) -> RvResult<()> {
        require_caller(&caller)?;

        let (session_id, members) = match self.membership(&caller).await? {
            None => {
                tracing::debug!(
                    %caller,
                    "ignoring broadcast outside a session",
                );
                return Ok(());
            }
            Some(m) => m,
        };

        if host_only
            && self.host_of(&session_id).await?.as_ref() != Some(&caller)
        {
            tracing::debug!(
                %caller,
                %session_id,
                "ignoring host-only broadcast from non-host",
            );
            return Ok(());
        }

        let targets = members
            .into_iter()
            .filter(|m| m != &caller)
            .collect::<Vec<_>>();

        self.notify(targets, event(session_id, caller)).await;

        Ok(())
    }
}

impl SessionCoordinator for CoreSession {
    fn create(
        &self,
        caller: UserId,
        metadata: SessionMetadata,
    ) -> BoxFut<'_, RvResult<SessionId>> {
        Box::pin(self.create_inner(caller, metadata))
    }

    fn join(
        &self,
        caller: UserId,
        session_id: SessionId,
    ) -> BoxFut<'_, RvResult<Vec<MemberProfile>>> {
        Box::pin(self.join_inner(caller, session_id))
    }

    fn leave(&self, caller: UserId) -> BoxFut<'_, RvResult<LeaveOutcome>> {
        Box::pin(self.leave_inner(caller))
    }

    fn push_state(
        &self,
        caller: UserId,
        payload: bytes::Bytes,
    ) -> BoxFut<'_, RvResult<()>> {
        Box::pin(self.broadcast(caller, true, |session_id, from| {
            SessionEvent::StateUpdate {
                session_id,
                from,
                payload,
            }
        }))
    }

    fn trigger_event(
        &self,
        caller: UserId,
        payload: bytes::Bytes,
    ) -> BoxFut<'_, RvResult<()>> {
        Box::pin(self.broadcast(caller, false, |session_id, from| {
            SessionEvent::EventTriggered {
                session_id,
                from,
                payload,
            }
        }))
    }

    fn branching_choice(
        &self,
        caller: UserId,
        payload: bytes::Bytes,
    ) -> BoxFut<'_, RvResult<()>> {
        Box::pin(self.broadcast(caller, true, |session_id, from| {
            SessionEvent::BranchingChoice {
                session_id,
                from,
                payload,
            }
        }))
    }

    fn current_session(
        &self,
        caller: UserId,
    ) -> BoxFut<'_, RvResult<Option<SessionId>>> {
        Box::pin(async move {
            require_caller(&caller)?;
            self.session_of(&caller).await
        })
    }

    fn members(
        &self,
        session_id: SessionId,
    ) -> BoxFut<'_, RvResult<Vec<UserId>>> {
        Box::pin(async move { self.members_of(&session_id).await })
    }
}
