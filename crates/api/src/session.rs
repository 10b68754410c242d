//! Shared session related types.
//!
//! A session is an ephemeral group of participants with exactly one host.
//! Its state lives in three independent key families in a [KvStore]:
//! a per-user "current session" pointer, a per-session member list and
//! a per-session host pointer. Nothing keeps those atomic with each other,
//! readers tolerate them disagreeing and writers heal them on the next
//! join or leave.

use crate::*;
use std::sync::Arc;

/// Descriptive metadata supplied when creating a session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// What the session is about (for example a quest or activity id).
    pub topic_id: String,

    /// Human readable title.
    #[serde(default)]
    pub title: String,
}

impl SessionMetadata {
    /// Construct session metadata.
    pub fn new(topic_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            title: title.into(),
        }
    }
}

/// A session member with display data resolved from durable storage.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    /// The member.
    pub user_id: UserId,

    /// The resolved display name, if the profile resolver knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Notifications fanned out to session members through [Dispatch].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A participant joined the session.
    #[serde(rename_all = "camelCase")]
    Joined {
        /// The session.
        session_id: SessionId,
        /// Who joined.
        member: MemberProfile,
    },

    /// A participant left. If they were the host, the session is gone.
    #[serde(rename_all = "camelCase")]
    Left {
        /// The session.
        session_id: SessionId,
        /// Who left.
        user_id: UserId,
    },

    /// The host pushed canonical state.
    #[serde(rename_all = "camelCase")]
    StateUpdate {
        /// The session.
        session_id: SessionId,
        /// The host.
        from: UserId,
        /// Opaque payload.
        payload: bytes::Bytes,
    },

    /// A member triggered an event.
    #[serde(rename_all = "camelCase")]
    EventTriggered {
        /// The session.
        session_id: SessionId,
        /// The member that triggered it.
        from: UserId,
        /// Opaque payload.
        payload: bytes::Bytes,
    },

    /// The host made a branching choice.
    #[serde(rename_all = "camelCase")]
    BranchingChoice {
        /// The session.
        session_id: SessionId,
        /// The host.
        from: UserId,
        /// Opaque payload.
        payload: bytes::Bytes,
    },
}

/// What a [SessionCoordinator::leave] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The caller was not in a session.
    NotInSession,

    /// The caller was removed and the session persists.
    Left,

    /// The caller was the host or the last member, so the session
    /// was dissolved.
    TornDown,
}

/// Represents the session coordinator.
///
/// Every call names the pre-authenticated caller explicitly.
pub trait SessionCoordinator: 'static + Send + Sync + std::fmt::Debug {
    /// Create a session with the caller as sole member and host.
    /// Fails with [RvError::Conflict] if the caller is already in one.
    fn create(
        &self,
        caller: UserId,
        metadata: SessionMetadata,
    ) -> BoxFut<'_, RvResult<SessionId>>;

    /// Join a session, leaving any current one first. Joining a session
    /// with no members returns an empty list and changes nothing.
    fn join(
        &self,
        caller: UserId,
        session_id: SessionId,
    ) -> BoxFut<'_, RvResult<Vec<MemberProfile>>>;

    /// Leave the caller's current session, if any.
    fn leave(&self, caller: UserId) -> BoxFut<'_, RvResult<LeaveOutcome>>;

    /// Host only: push canonical state to every other member.
    fn push_state(
        &self,
        caller: UserId,
        payload: bytes::Bytes,
    ) -> BoxFut<'_, RvResult<()>>;

    /// Any member: deliver an event to every other member.
    fn trigger_event(
        &self,
        caller: UserId,
        payload: bytes::Bytes,
    ) -> BoxFut<'_, RvResult<()>>;

    /// Host only: deliver a branching choice to every other member.
    fn branching_choice(
        &self,
        caller: UserId,
        payload: bytes::Bytes,
    ) -> BoxFut<'_, RvResult<()>>;

    /// The session the caller is currently bound to, if any.
    fn current_session(
        &self,
        caller: UserId,
    ) -> BoxFut<'_, RvResult<Option<SessionId>>>;

    /// The current member list of a session, in join order.
    fn members(
        &self,
        session_id: SessionId,
    ) -> BoxFut<'_, RvResult<Vec<UserId>>>;
}

/// Trait-object [SessionCoordinator].
pub type DynSessionCoordinator = Arc<dyn SessionCoordinator>;

/// A factory for constructing [SessionCoordinator] instances.
pub trait SessionFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &mut Config) -> RvResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &Config) -> RvResult<()>;

    /// Construct a session coordinator on top of a kv store.
    fn create(
        &self,
        builder: Arc<Builder>,
        kv_store: DynKvStore,
    ) -> BoxFut<'static, RvResult<DynSessionCoordinator>>;
}

/// Trait-object [SessionFactory].
pub type DynSessionFactory = Arc<dyn SessionFactory>;
