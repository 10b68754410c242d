use super::*;
use rendezvous_test_utils::ManualClock;

fn create() -> (Arc<ManualClock>, KvMap) {
    let clock = ManualClock::create();
    let map = KvMap::new(clock.clone());
    (clock, map)
}

const MIN: std::time::Duration = std::time::Duration::from_secs(60);

#[test]
fn empty_store() {
    let (_, s) = create();
    assert_eq!(None, s.get("nope"));
}

#[test]
fn happy_set_get_remove() {
    let (_, s) = create();

    s.set("a", bytes::Bytes::from_static(b"hello"), MIN);
    assert_eq!(Some(bytes::Bytes::from_static(b"hello")), s.get("a"));

    s.set("a", bytes::Bytes::from_static(b"world"), MIN);
    assert_eq!(Some(bytes::Bytes::from_static(b"world")), s.get("a"));

    s.remove("a");
    assert_eq!(None, s.get("a"));

    // removing an absent key is fine
    s.remove("a");
}

#[test]
fn expired_values_are_absent_before_sweep() {
    let (clock, s) = create();

    s.set("a", bytes::Bytes::from_static(b"x"), MIN);
    clock.advance(MIN - std::time::Duration::from_secs(1));
    assert!(s.get("a").is_some());

    clock.advance(std::time::Duration::from_secs(1));
    assert_eq!(None, s.get("a"));

    // the lazy check also reclaimed it
    assert_eq!(0, s.map.len());
}

#[test]
fn list_skips_expired_and_foreign_keys() {
    let (clock, s) = create();

    s.set("p:a", bytes::Bytes::from_static(b"x"), MIN);
    s.set("p:b", bytes::Bytes::from_static(b"x"), MIN * 2);
    s.set("q:a", bytes::Bytes::from_static(b"x"), MIN * 2);

    let mut keys = s.list("p:");
    keys.sort();
    assert_eq!(vec!["p:a".to_string(), "p:b".to_string()], keys);

    clock.advance(MIN);
    assert_eq!(vec!["p:b".to_string()], s.list("p:"));
    assert_eq!(2, s.list("").len());
}

#[test]
fn sweep_sweeps_only_expired() {
    let (clock, s) = create();

    s.set("short", bytes::Bytes::from_static(b"x"), MIN);
    s.set("long", bytes::Bytes::from_static(b"y"), MIN * 10);

    assert_eq!(0, s.sweep(clock.now()));
    assert_eq!(1, s.sweep(clock.now() + MIN * 2));
    assert_eq!(1, s.map.len());
    assert!(s.get("long").is_some());
}

#[test]
fn happy_multi_thread_sanity() {
    const COUNT: usize = 16;

    let (_, s) = create();
    let s = Arc::new(s);
    let b = Arc::new(std::sync::Barrier::new(COUNT));

    let mut all = Vec::with_capacity(COUNT);
    for i in 0..COUNT {
        let s = s.clone();
        let b = b.clone();
        all.push(std::thread::spawn(move || {
            b.wait();
            let key = format!("key:{i}");
            s.set(&key, bytes::Bytes::from(key.clone().into_bytes()), MIN);
            // sweeping concurrently with writes must not lose live values
            s.sweep(s.clock.now());
            assert_eq!(key.as_bytes(), &s.get(&key).unwrap()[..]);
        }));
    }

    for t in all {
        t.join().unwrap();
    }

    assert_eq!(COUNT, s.map.len());
}

#[tokio::test(flavor = "multi_thread")]
async fn factory_store_sweeps_in_background() {
    let clock = ManualClock::create();
    let mut config = Config::default();
    config
        .set_module_config(&MemKvStoreModConfig {
            mem_kv_store: MemKvStoreConfig {
                sweep_interval_ms: 10,
            },
        })
        .unwrap();

    let store = MemKvStore::new(
        config
            .get_module_config::<MemKvStoreModConfig>()
            .unwrap()
            .mem_kv_store,
        clock.clone(),
    );

    store
        .set_with_ttl("a", bytes::Bytes::from_static(b"x"), MIN)
        .await
        .unwrap();
    clock.advance(MIN * 2);

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !store.map.map.is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(None, store.get("a").await.unwrap());
}
