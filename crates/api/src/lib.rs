#![deny(missing_docs)]
//! Rendezvous API contains the module traits and the basic types required
//! to define the api of those traits: presence discovery with introduction
//! tokens, ephemeral multi-party sessions, and the key-value store both
//! are built on.
//!
//! If you want the production implementations, please see the
//! rendezvous_core crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub mod builder;
pub use builder::Builder;

pub mod config;
pub use config::Config;

mod error;
pub use error::*;

pub mod id;
pub use id::*;

pub mod id_gen;
pub use id_gen::{DynIdGenerator, IdGenerator};

mod timestamp;
pub use timestamp::*;

pub mod kv_store;
pub use kv_store::*;

pub mod dispatch;
pub use dispatch::*;

pub mod presence;
pub use presence::*;

pub mod session;
pub use session::*;

pub mod schedule;
pub use schedule::*;
