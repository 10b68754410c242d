#![deny(missing_docs)]
//! Rendezvous kv server is an HTTP REST server holding ttl-bounded opaque
//! values, shared by any number of rendezvous processes.
//!
//! Like the rendezvous remote kv store client, it offers per-key atomicity
//! only. It knows nothing of presence or sessions: keys and values are
//! opaque bytes.
//!
//! For additional details, please see the [spec].

/// This is a documentation module containing the rendezvous_kv_srv spec.
///
/// #### 1. Types
///
/// All base64 in this spec uses:
/// <https://datatracker.ietf.org/doc/html/rfc4648#section-5>
///
/// The url safe alphabet (with `-` and `_`) and no padding characters (`=`)
/// added when encoding or required when decoding.
///
/// - `Base64Key` - base64UrlSafeNoPad encoded key bytes.
/// - `TtlMs` - decimal time-to-live in milliseconds, > 0.
///
/// #### 2. REST API
///
/// ```text
/// ErrResponse = { "error": string }
/// OkResponse = {}
/// ```
///
/// - `PUT /kv/<Base64Key>/<TtlMs>`
///   - Request Body: opaque value bytes
///   - Response Body: `OkResponse | ErrResponse`
/// - `GET /kv/<Base64Key>`
///   - Response Body: opaque value bytes `| ErrResponse`
/// - `DELETE /kv/<Base64Key>`
///   - Response Body: `OkResponse | ErrResponse`
/// - `GET /keys/<Base64Key>` (or `GET /keys` for every key)
///   - Response Body: `[Base64Key] | ErrResponse`
/// - `GET /health`
///   - Response Body: `OkResponse | ErrResponse`
///
/// ##### 2.1. Put
///
/// - The server MUST reject the request with 413 if the body is larger
///   than the configured max value size.
/// - The server MUST reject the request with 400 if `TtlMs` is 0 or
///   larger than the configured max ttl.
/// - Otherwise the server MUST replace any value held at the key, with
///   an expiry of `TtlMs` from its own clock.
///
/// ##### 2.2. Get
///
/// - The server MUST respond 404 `{"error":"NotFound"}` if no value is
///   held at the key, or if the held value has expired, whether or not
///   it has been pruned yet.
///
/// ##### 2.3. Delete
///
/// - Deleting an absent key MUST succeed.
///
/// ##### 2.4. Keys
///
/// - The server MUST respond with every live key that starts with the
///   given prefix bytes, in no particular order. Expired keys MUST NOT be
///   listed.
///
/// #### 3. Expiry
///
/// - The server SHOULD prune expired values periodically. Pruning only
///   reclaims memory, expiry is enforced on every read.
#[cfg(doc)]
pub mod spec {}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or_default()
}

mod config;
pub use config::*;

mod store;
use store::*;

mod http;
use http::*;

mod server;
pub use server::*;

#[cfg(test)]
mod test;
