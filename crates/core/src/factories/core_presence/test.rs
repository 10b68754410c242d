use super::*;
use rendezvous_test_utils::{enable_tracing, ManualClock};

struct Test {
    clock: Arc<ManualClock>,
    builder: Arc<Builder>,
    kv: DynKvStore,
    presence: DynPresence,
}

impl Test {
    async fn new() -> Self {
        Self::with_config(CorePresenceConfig::default()).await
    }

    async fn with_config(config: CorePresenceConfig) -> Self {
        enable_tracing();

        let clock = ManualClock::create();
        let mut builder = Builder {
            clock: clock.clone(),
            ..crate::default_builder()
        }
        .with_default_config()
        .unwrap();
        builder
            .config
            .update_module_config(&CorePresenceModConfig {
                core_presence: config,
            })
            .unwrap();
        builder.validate_config().unwrap();
        let builder = builder.build();

        let kv = builder.kv_store.create(builder.clone()).await.unwrap();
        let presence = builder
            .presence
            .create(builder.clone(), kv.clone())
            .await
            .unwrap();

        Self {
            clock,
            builder,
            kv,
            presence,
        }
    }

    async fn publish(&self, owner: &str, hashes: &[&str]) {
        self.presence
            .publish(PublishRequest::new(owner, hashes.iter().copied()))
            .await
            .unwrap();
    }

    async fn find(&self, requester: &str, hash: &str) -> PresenceMatch {
        self.presence
            .try_match_and_issue_token(requester.into(), hash.into())
            .await
            .unwrap()
    }

    async fn token(&self, requester: &str, hash: &str) -> IntroToken {
        self.find(requester, hash).await.token().unwrap().clone()
    }
}

/// Wraps a store, failing writes to keys containing "bad".
#[derive(Debug)]
struct FailBadKeys(DynKvStore);

impl KvStore for FailBadKeys {
    fn get(&self, key: &str) -> BoxFut<'_, RvResult<Option<bytes::Bytes>>> {
        self.0.get(key)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: bytes::Bytes,
        ttl: std::time::Duration,
    ) -> BoxFut<'_, RvResult<()>> {
        if key.contains("bad") {
            return Box::pin(async { Err(RvError::store("unreachable")) });
        }
        self.0.set_with_ttl(key, value, ttl)
    }

    fn remove(&self, key: &str) -> BoxFut<'_, RvResult<()>> {
        self.0.remove(key)
    }

    fn list_keys(&self, prefix: &str) -> BoxFut<'_, RvResult<Vec<String>>> {
        self.0.list_keys(prefix)
    }
}

/// Wraps a store, delaying every write so concurrent callers interleave.
#[derive(Debug)]
struct SlowWrites(DynKvStore);

impl KvStore for SlowWrites {
    fn get(&self, key: &str) -> BoxFut<'_, RvResult<Option<bytes::Bytes>>> {
        self.0.get(key)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: bytes::Bytes,
        ttl: std::time::Duration,
    ) -> BoxFut<'_, RvResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.0.set_with_ttl(&key, value, ttl).await
        })
    }

    fn remove(&self, key: &str) -> BoxFut<'_, RvResult<()>> {
        self.0.remove(key)
    }

    fn list_keys(&self, prefix: &str) -> BoxFut<'_, RvResult<Vec<String>>> {
        self.0.list_keys(prefix)
    }
}

impl Test {
    async fn owner_markers(&self) -> Vec<String> {
        let mut keys = self.kv.list_keys("presence:owner:").await.unwrap();
        keys.sort();
        keys
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_empty_ids() {
    let t = Test::new().await;

    let r = t.presence.publish(PublishRequest::new("", ["h1"])).await;
    assert!(r.unwrap_err().is_validation());

    let r = t.presence.unpublish("".into()).await;
    assert!(r.unwrap_err().is_validation());

    let r = t
        .presence
        .try_match_and_issue_token("".into(), "h1".into())
        .await;
    assert!(r.unwrap_err().is_validation());

    let r = t
        .presence
        .try_match_and_issue_token("a".into(), "".into())
        .await;
    assert!(r.unwrap_err().is_validation());

    let r = t.presence.validate_token("".into()).await;
    assert!(r.unwrap_err().is_validation());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_publish_is_a_noop() {
    let t = Test::new().await;

    t.publish("a", &[]).await;
    t.publish("a", &["", ""]).await;

    assert!(t.owner_markers().await.is_empty());
    assert_eq!(None, t.kv.get("presence:hash:").await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_hashes_are_written_once() {
    let t = Test::new().await;

    t.publish("a", &["h1", "h1", "h2"]).await;

    // owner "a" is base64 "YQ"
    assert_eq!(
        vec![
            "presence:owner:YQ:h1".to_string(),
            "presence:owner:YQ:h2".to_string(),
        ],
        t.owner_markers().await,
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn issued_tokens_are_long_alphanumeric() {
    let t = Test::new().await;

    t.publish("a", &["h1"]).await;
    let token = t.token("b", "h1").await;

    assert_eq!(32, token.len());
    assert!(token.bytes().all(|b| id_gen::ID_ALPHABET.contains(&b)));
}

#[tokio::test(flavor = "multi_thread")]
async fn presence_expires_at_ttl() {
    let t = Test::new().await;

    t.publish("a", &["h1"]).await;

    t.clock.advance(std::time::Duration::from_secs(299));
    assert!(t.find("b", "h1").await.is_found());

    t.clock.advance(std::time::Duration::from_secs(1));
    assert_eq!(PresenceMatch::NotFound, t.find("b", "h1").await);
}

#[tokio::test(flavor = "multi_thread")]
async fn republish_refreshes_ttl() {
    let t = Test::new().await;

    t.publish("a", &["h1"]).await;
    t.clock.advance(std::time::Duration::from_secs(200));
    t.publish("a", &["h1"]).await;
    t.clock.advance(std::time::Duration::from_secs(200));

    assert!(t.find("b", "h1").await.is_found());
}

#[tokio::test(flavor = "multi_thread")]
async fn token_outlives_presence() {
    let t = Test::with_config(CorePresenceConfig {
        presence_ttl_s: 10,
        ..Default::default()
    })
    .await;

    t.publish("a", &["h1"]).await;
    let token = t.token("b", "h1").await;

    t.clock.advance(std::time::Duration::from_secs(60));
    assert_eq!(PresenceMatch::NotFound, t.find("b", "h1").await);

    assert_eq!(
        TokenValidation::Valid {
            target_owner_id: "a".into()
        },
        t.presence.validate_token(token).await.unwrap(),
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn token_expires_at_ttl() {
    let t = Test::new().await;

    t.publish("a", &["h1"]).await;
    let t1 = t.token("b", "h1").await;
    let t2 = t.token("b", "h1").await;
    assert_ne!(t1, t2);

    t.clock.advance(std::time::Duration::from_secs(119));
    assert!(t.presence.validate_token(t1).await.unwrap().is_valid());

    t.clock.advance(std::time::Duration::from_secs(1));
    assert_eq!(
        TokenValidation::Invalid,
        t.presence.validate_token(t2.clone()).await.unwrap(),
    );

    // the dead record was reclaimed on read
    assert_eq!(
        None,
        t.kv.get(&format!("presence:token:{t2}")).await.unwrap()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn tokens_are_single_use() {
    let t = Test::new().await;

    t.publish("a", &["h1"]).await;
    let token = t.token("b", "h1").await;

    assert!(t
        .presence
        .validate_token(token.clone())
        .await
        .unwrap()
        .is_valid());
    assert_eq!(
        TokenValidation::Invalid,
        t.presence.validate_token(token).await.unwrap(),
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn token_binds_owner_at_issue() {
    let t = Test::new().await;

    t.publish("a", &["h1"]).await;
    let token = t.token("c", "h1").await;

    // b takes the hash over after issuance
    t.publish("b", &["h1"]).await;

    assert_eq!(
        TokenValidation::Valid {
            target_owner_id: "a".into()
        },
        t.presence.validate_token(token).await.unwrap(),
    );

    let token = t.token("c", "h1").await;
    assert_eq!(
        TokenValidation::Valid {
            target_owner_id: "b".into()
        },
        t.presence.validate_token(token).await.unwrap(),
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_token_is_invalid() {
    let t = Test::new().await;

    assert_eq!(
        TokenValidation::Invalid,
        t.presence.validate_token("nope".into()).await.unwrap(),
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unpublish_spans_publishes() {
    let t = Test::new().await;

    t.publish("a", &["h1"]).await;
    t.publish("a", &["h2"]).await;
    t.presence.unpublish("a".into()).await.unwrap();

    assert_eq!(PresenceMatch::NotFound, t.find("b", "h1").await);
    assert_eq!(PresenceMatch::NotFound, t.find("b", "h2").await);
    assert!(t.owner_markers().await.is_empty());

    // a second unpublish has nothing to do
    t.presence.unpublish("a".into()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unpublish_spares_taken_over_hashes() {
    let t = Test::new().await;

    t.publish("a", &["h1", "h2"]).await;
    t.publish("b", &["h2"]).await;
    t.presence.unpublish("a".into()).await.unwrap();

    assert_eq!(PresenceMatch::NotFound, t.find("c", "h1").await);
    match t.find("c", "h2").await {
        PresenceMatch::Found {
            target_owner_id, ..
        } => assert_eq!(UserId::from("b"), target_owner_id),
        oth => panic!("unexpected {oth:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unpublish_after_concurrent_publishes() {
    let t = Test::new().await;
    let presence = t
        .builder
        .presence
        .create(t.builder.clone(), Arc::new(SlowWrites(t.kv.clone())))
        .await
        .unwrap();

    let (r1, r2) = tokio::join!(
        presence.publish(PublishRequest::new("a", ["h1"])),
        presence.publish(PublishRequest::new("a", ["h2", "h3"])),
    );
    r1.unwrap();
    r2.unwrap();

    for hash in ["h1", "h2", "h3"] {
        assert!(t.find("b", hash).await.is_found());
    }

    presence.unpublish("a".into()).await.unwrap();

    for hash in ["h1", "h2", "h3"] {
        assert_eq!(PresenceMatch::NotFound, t.find("b", hash).await);
    }
    assert!(t.owner_markers().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unpublish_has_no_hash_cap() {
    let t = Test::new().await;

    let hashes = (0..1500).map(|i| format!("h{i}")).collect::<Vec<_>>();
    t.presence
        .publish(PublishRequest::new("a", hashes.iter().map(String::as_str)))
        .await
        .unwrap();

    t.presence.unpublish("a".into()).await.unwrap();

    assert_eq!(PresenceMatch::NotFound, t.find("b", "h0").await);
    assert_eq!(PresenceMatch::NotFound, t.find("b", "h1499").await);
}

#[tokio::test(flavor = "multi_thread")]
async fn unpublish_leaves_similar_owner_ids_alone() {
    let t = Test::new().await;

    // without escaping, "a" would be a key prefix of "a:h"
    t.publish("a", &["h1"]).await;
    t.publish("a:h", &["h2"]).await;

    t.presence.unpublish("a".into()).await.unwrap();

    assert_eq!(PresenceMatch::NotFound, t.find("b", "h1").await);
    assert!(t.find("b", "h2").await.is_found());
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_publish_reports_and_keeps_the_rest() {
    let t = Test::new().await;
    let presence = t
        .builder
        .presence
        .create(t.builder.clone(), Arc::new(FailBadKeys(t.kv.clone())))
        .await
        .unwrap();

    let err = presence
        .publish(PublishRequest::new("a", ["good", "bad"]))
        .await
        .unwrap_err();
    assert!(err.is_store());

    assert!(t.find("b", "good").await.is_found());
    assert_eq!(PresenceMatch::NotFound, t.find("b", "bad").await);

    // the good marker landed, so unpublish cleans up what landed
    presence.unpublish("a".into()).await.unwrap();
    assert_eq!(PresenceMatch::NotFound, t.find("b", "good").await);
}

#[tokio::test(flavor = "multi_thread")]
async fn undecodable_entries_are_absent() {
    let t = Test::new().await;

    t.kv.set_with_ttl(
        "presence:hash:h1",
        bytes::Bytes::from_static(b"not json"),
        std::time::Duration::from_secs(60),
    )
    .await
    .unwrap();

    assert_eq!(PresenceMatch::NotFound, t.find("b", "h1").await);
}

#[test]
fn config_rejects_short_tokens() {
    let f = CorePresenceFactory::create();
    let mut config = Config::default();
    f.default_config(&mut config).unwrap();
    f.validate_config(&config).unwrap();

    config
        .update_module_config(&CorePresenceModConfig {
            core_presence: CorePresenceConfig {
                token_len: 21,
                ..Default::default()
            },
        })
        .unwrap();
    assert!(f.validate_config(&config).unwrap_err().is_validation());
}
