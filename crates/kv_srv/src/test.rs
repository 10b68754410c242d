use crate::*;

fn b64(key: &str) -> String {
    use base64::prelude::*;
    BASE64_URL_SAFE_NO_PAD.encode(key)
}

fn put(
    s: &KvSrv,
    key: &str,
    ttl_ms: u64,
    value: &[u8],
) -> std::result::Result<String, (u16, String)> {
    let addr =
        format!("http://{:?}/kv/{}/{}", s.listen_addr(), b64(key), ttl_ms);
    match ureq::put(&addr).send_bytes(value) {
        Ok(res) => Ok(res.into_string().unwrap()),
        Err(ureq::Error::Status(status, res)) => {
            Err((status, res.into_string().unwrap_or_default()))
        }
        Err(err) => panic!("{err:?}"),
    }
}

fn get(s: &KvSrv, key: &str) -> std::result::Result<Vec<u8>, (u16, String)> {
    let addr = format!("http://{:?}/kv/{}", s.listen_addr(), b64(key));
    match ureq::get(&addr).call() {
        Ok(res) => {
            let mut out = Vec::new();
            std::io::Read::read_to_end(&mut res.into_reader(), &mut out)
                .unwrap();
            Ok(out)
        }
        Err(ureq::Error::Status(status, res)) => {
            Err((status, res.into_string().unwrap_or_default()))
        }
        Err(err) => panic!("{err:?}"),
    }
}

fn delete(s: &KvSrv, key: &str) -> String {
    let addr = format!("http://{:?}/kv/{}", s.listen_addr(), b64(key));
    ureq::delete(&addr).call().unwrap().into_string().unwrap()
}

#[test]
fn happy_empty_server_health() {
    let s = KvSrv::new(Config::testing()).unwrap();
    let addr = format!("http://{:?}/health", s.listen_addr());
    let res = ureq::get(&addr).call().unwrap().into_string().unwrap();
    assert_eq!("{}", res);
}

#[test]
fn happy_put_get_delete() {
    let s = KvSrv::new(Config::testing()).unwrap();

    assert_eq!("{}", put(&s, "presence:hash:h1", 60_000, b"hello").unwrap());
    assert_eq!(b"hello".to_vec(), get(&s, "presence:hash:h1").unwrap());

    // put replaces
    put(&s, "presence:hash:h1", 60_000, b"world").unwrap();
    assert_eq!(b"world".to_vec(), get(&s, "presence:hash:h1").unwrap());

    assert_eq!("{}", delete(&s, "presence:hash:h1"));
    assert_eq!(
        Err((404, r#"{"error":"NotFound"}"#.to_string())),
        get(&s, "presence:hash:h1"),
    );
}

#[test]
fn binary_values_survive() {
    let s = KvSrv::new(Config::testing()).unwrap();
    let value: Vec<u8> = (0..=255).collect();
    put(&s, "bin", 60_000, &value).unwrap();
    assert_eq!(value, get(&s, "bin").unwrap());
}

#[test]
fn missing_key_is_not_found() {
    let s = KvSrv::new(Config::testing()).unwrap();
    assert_eq!(404, get(&s, "nope").unwrap_err().0);
}

#[test]
fn delete_absent_key_succeeds() {
    let s = KvSrv::new(Config::testing()).unwrap();
    assert_eq!("{}", delete(&s, "nope"));
}

#[test]
fn values_expire() {
    let s = KvSrv::new(Config::testing()).unwrap();
    put(&s, "short", 50, b"v").unwrap();
    put(&s, "long", 60_000, b"v").unwrap();

    std::thread::sleep(std::time::Duration::from_millis(200));

    assert_eq!(404, get(&s, "short").unwrap_err().0);
    assert_eq!(b"v".to_vec(), get(&s, "long").unwrap());
}

#[test]
fn reject_zero_ttl() {
    let s = KvSrv::new(Config::testing()).unwrap();
    assert_eq!(
        Err((400, r#"{"error":"InvalidTtl"}"#.to_string())),
        put(&s, "k", 0, b"v"),
    );
    assert_eq!(404, get(&s, "k").unwrap_err().0);
}

#[test]
fn reject_ttl_over_max() {
    let s = KvSrv::new(Config {
        max_ttl: std::time::Duration::from_secs(10),
        ..Config::testing()
    })
    .unwrap();
    assert_eq!(400, put(&s, "k", 10_001, b"v").unwrap_err().0);
    put(&s, "k", 10_000, b"v").unwrap();
}

#[test]
fn reject_oversize_value() {
    let s = KvSrv::new(Config {
        max_value_bytes: 16,
        ..Config::testing()
    })
    .unwrap();
    assert_eq!(413, put(&s, "k", 60_000, &[0; 17]).unwrap_err().0);
    put(&s, "k", 60_000, &[0; 16]).unwrap();
}

#[test]
fn reject_invalid_key() {
    let s = KvSrv::new(Config::testing()).unwrap();
    let addr = format!("http://{:?}/kv/not+base64", s.listen_addr());
    match ureq::get(&addr).call() {
        Err(ureq::Error::Status(status, res)) => {
            assert_eq!(400, status);
            assert!(res.into_string().unwrap().contains("InvalidKey"));
        }
        oth => panic!("unexpected {oth:?}"),
    }
}

fn list(s: &KvSrv, prefix: &str) -> Vec<String> {
    use base64::prelude::*;

    let addr = if prefix.is_empty() {
        format!("http://{:?}/keys", s.listen_addr())
    } else {
        format!("http://{:?}/keys/{}", s.listen_addr(), b64(prefix))
    };
    let res = ureq::get(&addr).call().unwrap().into_string().unwrap();
    let keys: Vec<String> = serde_json::from_str(&res).unwrap();
    let mut keys = keys
        .into_iter()
        .map(|k| {
            String::from_utf8(BASE64_URL_SAFE_NO_PAD.decode(k).unwrap())
                .unwrap()
        })
        .collect::<Vec<_>>();
    keys.sort();
    keys
}

#[test]
fn list_keys_by_prefix() {
    let s = KvSrv::new(Config::testing()).unwrap();

    put(&s, "presence:owner:a:h1", 60_000, b"v").unwrap();
    put(&s, "presence:owner:a:h2", 60_000, b"v").unwrap();
    put(&s, "presence:owner:ab:h3", 60_000, b"v").unwrap();
    put(&s, "presence:owner:a:gone", 50, b"v").unwrap();

    std::thread::sleep(std::time::Duration::from_millis(200));

    assert_eq!(
        vec![
            "presence:owner:a:h1".to_string(),
            "presence:owner:a:h2".to_string(),
        ],
        list(&s, "presence:owner:a:"),
    );
    assert_eq!(3, list(&s, "").len());
    assert!(list(&s, "nope").is_empty());

    delete(&s, "presence:owner:a:h1");
    assert_eq!(
        vec!["presence:owner:a:h2".to_string()],
        list(&s, "presence:owner:a:"),
    );
}
