//! Presence discovery related types.
//!
//! A participant publishes a set of opaque fingerprint hashes. Another
//! participant who derives one of those hashes can match it, and (if the
//! owner allows requests) receives an [IntroToken]. Redeeming the token
//! reveals the real owner id.

use crate::*;
use std::sync::Arc;

/// A published presence record, keyed by fingerprint hash.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    /// The participant that published this hash.
    pub owner_id: UserId,

    /// When this entry must be treated as absent.
    pub expires_at: Timestamp,

    /// Optional display name revealed on match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// If false, matches succeed but no token is issued.
    pub allow_requests: bool,
}

/// A stored introduction token record.
///
/// The owner id is captured by value at issuance time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroTokenRecord {
    /// The owner matched when this token was issued.
    pub target_owner_id: UserId,

    /// When this token must be treated as absent.
    pub expires_at: Timestamp,
}

/// Input to [Presence::publish].
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// The publishing participant.
    pub owner_id: UserId,

    /// The fingerprint hashes to publish. Duplicates are ignored.
    pub hashes: Vec<FingerprintHash>,

    /// Optional display name revealed on match.
    pub display_name: Option<String>,

    /// Whether matches may issue introduction tokens.
    pub allow_requests: bool,
}

impl PublishRequest {
    /// A request with no display name that allows introduction requests.
    pub fn new(
        owner_id: impl Into<UserId>,
        hashes: impl IntoIterator<Item = impl Into<FingerprintHash>>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            hashes: hashes.into_iter().map(Into::into).collect(),
            display_name: None,
            allow_requests: true,
        }
    }

    /// Set the display name.
    pub fn with_display_name(
        mut self,
        display_name: impl Into<String>,
    ) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set whether matches may issue tokens.
    pub fn with_allow_requests(mut self, allow_requests: bool) -> Self {
        self.allow_requests = allow_requests;
        self
    }
}

/// The outcome of [Presence::try_match_and_issue_token].
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceMatch {
    /// Unknown or expired fingerprint, or the requester's own fingerprint.
    NotFound,

    /// The fingerprint belongs to another live participant.
    Found {
        /// The matched owner.
        target_owner_id: UserId,

        /// The owner's display name, if published.
        display_name: Option<String>,

        /// An introduction token. `None` when the owner does not
        /// allow requests.
        token: Option<IntroToken>,
    },
}

impl PresenceMatch {
    /// True if this is [PresenceMatch::Found].
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// The issued token, if any.
    pub fn token(&self) -> Option<&IntroToken> {
        match self {
            Self::Found { token, .. } => token.as_ref(),
            Self::NotFound => None,
        }
    }
}

/// The outcome of [Presence::validate_token].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValidation {
    /// Unknown, expired, or already redeemed.
    Invalid,

    /// The token resolved to this owner.
    Valid {
        /// The owner captured when the token was issued.
        target_owner_id: UserId,
    },
}

impl TokenValidation {
    /// True if this is [TokenValidation::Valid].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Represents the presence discovery store.
pub trait Presence: 'static + Send + Sync + std::fmt::Debug {
    /// Publish presence fingerprints. Each hash is written as an
    /// independent record, so a failure part way leaves some hashes
    /// published and others not.
    fn publish(&self, req: PublishRequest) -> BoxFut<'_, RvResult<()>>;

    /// Remove every stored hash currently owned by `owner_id`.
    fn unpublish(&self, owner_id: UserId) -> BoxFut<'_, RvResult<()>>;

    /// Match a fingerprint, issuing a token if the owner allows it.
    fn try_match_and_issue_token(
        &self,
        requester_id: UserId,
        hash: FingerprintHash,
    ) -> BoxFut<'_, RvResult<PresenceMatch>>;

    /// Redeem an introduction token.
    fn validate_token(
        &self,
        token: IntroToken,
    ) -> BoxFut<'_, RvResult<TokenValidation>>;
}

/// Trait-object [Presence].
pub type DynPresence = Arc<dyn Presence>;

/// A factory for constructing [Presence] instances.
pub trait PresenceFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &mut Config) -> RvResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &Config) -> RvResult<()>;

    /// Construct a presence instance on top of a kv store.
    fn create(
        &self,
        builder: Arc<Builder>,
        kv_store: DynKvStore,
    ) -> BoxFut<'static, RvResult<DynPresence>>;
}

/// Trait-object [PresenceFactory].
pub type DynPresenceFactory = Arc<dyn PresenceFactory>;
