#![deny(missing_docs)]
//! Rendezvous presence discovery and shared session coordination.
//!
//! This crate holds the production implementations of the
//! [rendezvous_api] module traits, the schedule evaluator and the
//! [Rendezvous] facade that wires them together.

use rendezvous_api::*;

/// Construct a production-ready default builder.
///
/// - `clock` - The default clock is [SystemClock].
/// - `id_gen` - The default id generator is [factories::RandIdGenerator].
/// - `kv_store` - The default kv store is [factories::MemKvStoreFactory].
/// - `presence` - The default presence is [factories::CorePresenceFactory].
/// - `session` - The default session coordinator is
///   [factories::CoreSessionFactory].
/// - `dispatch` - The default dispatch drops everything ([NoopDispatch]),
///   replace it with your transport.
/// - `profile` - The default profile resolver knows no one
///   ([NoopProfileResolver]).
pub fn default_builder() -> Builder {
    Builder {
        config: Config::default(),
        clock: SystemClock::create(),
        id_gen: factories::RandIdGenerator::create(),
        kv_store: factories::MemKvStoreFactory::create(),
        presence: factories::CorePresenceFactory::create(),
        session: factories::CoreSessionFactory::create(),
        dispatch: NoopDispatch::create(),
        profile: NoopProfileResolver::create(),
    }
}

pub mod factories;

pub mod schedule;

mod rendezvous;
pub use rendezvous::*;
