//! The core presence discovery implementation.

use rendezvous_api::*;
use std::sync::Arc;

/// CorePresence configuration types.
pub mod config {
    /// Configuration parameters for
    /// [CorePresenceFactory](super::CorePresenceFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CorePresenceConfig {
        /// How long a published fingerprint stays discoverable, in seconds.
        /// Clients are expected to republish well within this window.
        ///
        /// Default: 5 minutes.
        pub presence_ttl_s: u32,

        /// How long an issued introduction token may be redeemed,
        /// in seconds. Independent of the presence ttl.
        ///
        /// Default: 2 minutes.
        pub token_ttl_s: u32,

        /// Introduction token length in characters. Must be at least
        /// 22 to give 128 bits of entropy.
        ///
        /// Default: 32.
        pub token_len: u32,
    }

    impl Default for CorePresenceConfig {
        fn default() -> Self {
            Self {
                presence_ttl_s: 60 * 5,
                token_ttl_s: 60 * 2,
                token_len: 32,
            }
        }
    }

    impl CorePresenceConfig {
        /// Get the presence ttl.
        pub fn presence_ttl(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.presence_ttl_s as u64)
        }

        /// Get the token ttl.
        pub fn token_ttl(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.token_ttl_s as u64)
        }
    }

    /// Module-level configuration for CorePresence.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CorePresenceModConfig {
        /// CorePresence configuration.
        pub core_presence: CorePresenceConfig,
    }
}

pub use config::*;

/// The core presence discovery implementation.
#[derive(Debug)]
pub struct CorePresenceFactory {}

impl CorePresenceFactory {
    /// Construct a new CorePresenceFactory.
    pub fn create() -> DynPresenceFactory {
        let out: DynPresenceFactory = Arc::new(Self {});
        out
    }
}

impl PresenceFactory for CorePresenceFactory {
    fn default_config(&self, config: &mut Config) -> RvResult<()> {
        config.set_module_config(&CorePresenceModConfig::default())
    }

    fn validate_config(&self, config: &Config) -> RvResult<()> {
        let config: CorePresenceModConfig = config.get_module_config()?;
        let config = config.core_presence;

        if id_gen::entropy_bits(config.token_len as usize) < 128.0 {
            return Err(RvError::validation(
                "tokenLen must give at least 128 bits of entropy",
            ));
        }

        if config.presence_ttl_s == 0 || config.token_ttl_s == 0 {
            return Err(RvError::validation("presence ttls must be > 0"));
        }

        Ok(())
    }

    fn create(
        &self,
        builder: Arc<Builder>,
        kv_store: DynKvStore,
    ) -> BoxFut<'static, RvResult<DynPresence>> {
        Box::pin(async move {
            let config: CorePresenceModConfig =
                builder.config.get_module_config()?;
            let out: DynPresence = Arc::new(CorePresence::new(
                config.core_presence,
                builder.clock.clone(),
                builder.id_gen.clone(),
                kv_store,
            ));
            Ok(out)
        })
    }
}

fn hash_key(hash: &FingerprintHash) -> String {
    format!("presence:hash:{hash}")
}

/// Owner markers live under a per-owner prefix, one key per published
/// hash. The owner id is base64 encoded so no owner's prefix is a prefix
/// of another's.
fn owner_prefix(owner_id: &UserId) -> String {
    use base64::prelude::*;
    format!(
        "presence:owner:{}:",
        BASE64_URL_SAFE_NO_PAD.encode(owner_id.as_bytes())
    )
}

fn owner_key(owner_id: &UserId, hash: &FingerprintHash) -> String {
    format!("{}{hash}", owner_prefix(owner_id))
}

fn token_key(token: &IntroToken) -> String {
    format!("presence:token:{token}")
}

#[derive(Debug)]
struct CorePresence {
    config: CorePresenceConfig,
    clock: DynClock,
    id_gen: DynIdGenerator,
    kv: DynKvStore,
}

impl CorePresence {
    fn new(
        config: CorePresenceConfig,
        clock: DynClock,
        id_gen: DynIdGenerator,
        kv: DynKvStore,
    ) -> Self {
        Self {
            config,
            clock,
            id_gen,
            kv,
        }
    }

    /// Read and decode the live presence entry at `hash`, if any.
    async fn live_entry(
        &self,
        hash: &FingerprintHash,
    ) -> RvResult<Option<PresenceEntry>> {
        let key = hash_key(hash);
        let entry = match self.kv.get(&key).await? {
            None => return Ok(None),
            Some(raw) => decode_record::<PresenceEntry>(&key, &raw),
        };

        // never trust the backend alone for expiry
        Ok(entry.filter(|e| e.expires_at > self.clock.now()))
    }

    async fn publish_inner(&self, req: PublishRequest) -> RvResult<()> {
        let PublishRequest {
            owner_id,
            hashes,
            display_name,
            allow_requests,
        } = req;

        if owner_id.is_empty() {
            return Err(RvError::validation("empty owner id"));
        }

        let mut seen = std::collections::HashSet::new();
        let hashes = hashes
            .into_iter()
            .filter(|h| !h.is_empty() && seen.insert(h.clone()))
            .collect::<Vec<_>>();

        if hashes.is_empty() {
            return Ok(());
        }

        let ttl = self.config.presence_ttl();
        let entry = PresenceEntry {
            owner_id: owner_id.clone(),
            expires_at: self.clock.now() + ttl,
            display_name,
            allow_requests,
        };
        let value = encode_record(&entry)?;

        // each hash and its owner marker are independent keys, keep going
        // past individual failures and report the last one
        let mut last_err = None;
        let marker = encode_record(&owner_id)?;
        let (value, marker, owner) = (&value, &marker, &owner_id);
        let writes = hashes.iter().map(|hash| async move {
            // the marker goes first, so every entry unpublish could miss
            // has one. A marker without its entry is skipped on unpublish.
            self.kv
                .set_with_ttl(&owner_key(owner, hash), marker.clone(), ttl)
                .await?;
            self.kv
                .set_with_ttl(&hash_key(hash), value.clone(), ttl)
                .await
        });
        for result in futures::future::join_all(writes).await {
            if let Err(err) = result {
                tracing::warn!(%owner_id, ?err, "failed to publish hash");
                last_err = Some(err);
            }
        }

        tracing::debug!(%owner_id, count = hashes.len(), "published presence");

        match last_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn unpublish_inner(&self, owner_id: UserId) -> RvResult<()> {
        if owner_id.is_empty() {
            return Err(RvError::validation("empty owner id"));
        }

        let prefix = owner_prefix(&owner_id);
        let markers = self.kv.list_keys(&prefix).await?;

        let mut removed = 0;
        for marker in markers.iter() {
            let hash = match marker.strip_prefix(&prefix) {
                Some(hash) if !hash.is_empty() => FingerprintHash::from(hash),
                _ => continue,
            };

            // only remove hashes this owner still holds, another owner
            // may have republished it since
            if let Some(entry) = self.live_entry(&hash).await? {
                if entry.owner_id == owner_id {
                    self.kv.remove(&hash_key(&hash)).await?;
                    removed += 1;
                }
            }

            self.kv.remove(marker).await?;
        }

        tracing::debug!(%owner_id, removed, "unpublished presence");

        Ok(())
    }

    async fn try_match_inner(
        &self,
        requester_id: UserId,
        hash: FingerprintHash,
    ) -> RvResult<PresenceMatch> {
        if requester_id.is_empty() {
            return Err(RvError::validation("empty requester id"));
        }
        if hash.is_empty() {
            return Err(RvError::validation("empty fingerprint hash"));
        }

        let entry = match self.live_entry(&hash).await? {
            None => return Ok(PresenceMatch::NotFound),
            Some(entry) => entry,
        };

        if entry.owner_id == requester_id {
            tracing::debug!(%requester_id, "rejected self match");
            return Ok(PresenceMatch::NotFound);
        }

        if !entry.allow_requests {
            tracing::debug!(
                %requester_id,
                target = %entry.owner_id,
                "matched non-contactable presence",
            );
            return Ok(PresenceMatch::Found {
                target_owner_id: entry.owner_id,
                display_name: entry.display_name,
                token: None,
            });
        }

        let token = IntroToken::from(
            self.id_gen.generate(self.config.token_len as usize),
        );
        let ttl = self.config.token_ttl();
        let record = IntroTokenRecord {
            target_owner_id: entry.owner_id.clone(),
            expires_at: self.clock.now() + ttl,
        };
        self.kv
            .set_with_ttl(&token_key(&token), encode_record(&record)?, ttl)
            .await?;

        tracing::debug!(
            %requester_id,
            target = %entry.owner_id,
            "issued introduction token",
        );

        Ok(PresenceMatch::Found {
            target_owner_id: entry.owner_id,
            display_name: entry.display_name,
            token: Some(token),
        })
    }

    async fn validate_token_inner(
        &self,
        token: IntroToken,
    ) -> RvResult<TokenValidation> {
        if token.is_empty() {
            return Err(RvError::validation("empty token"));
        }

        let key = token_key(&token);
        let record = match self.kv.get(&key).await? {
            None => return Ok(TokenValidation::Invalid),
            Some(raw) => decode_record::<IntroTokenRecord>(&key, &raw),
        };

        let record = match record {
            Some(r) if r.expires_at > self.clock.now() => r,
            _ => {
                // expired or garbage, reclaim it now rather than at sweep
                if let Err(err) = self.kv.remove(&key).await {
                    tracing::debug!(?err, "failed to reclaim dead token");
                }
                return Ok(TokenValidation::Invalid);
            }
        };

        // tokens are single-use. Two redemptions racing between this get
        // and remove can both succeed, the store has no get-and-delete.
        self.kv.remove(&key).await?;

        tracing::debug!(
            target = %record.target_owner_id,
            "redeemed introduction token",
        );

        Ok(TokenValidation::Valid {
            target_owner_id: record.target_owner_id,
        })
    }
}

impl Presence for CorePresence {
    fn publish(&self, req: PublishRequest) -> BoxFut<'_, RvResult<()>> {
        Box::pin(self.publish_inner(req))
    }

    fn unpublish(&self, owner_id: UserId) -> BoxFut<'_, RvResult<()>> {
        Box::pin(self.unpublish_inner(owner_id))
    }

    fn try_match_and_issue_token(
        &self,
        requester_id: UserId,
        hash: FingerprintHash,
    ) -> BoxFut<'_, RvResult<PresenceMatch>> {
        Box::pin(self.try_match_inner(requester_id, hash))
    }

    fn validate_token(
        &self,
        token: IntroToken,
    ) -> BoxFut<'_, RvResult<TokenValidation>> {
        Box::pin(self.validate_token_inner(token))
    }
}

#[cfg(test)]
mod test;
