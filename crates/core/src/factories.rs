//! Factories for generating instances of rendezvous modules.

pub mod mem_kv_store;
pub use mem_kv_store::MemKvStoreFactory;

pub mod remote_kv_store;
pub use remote_kv_store::RemoteKvStoreFactory;

pub mod core_presence;
pub use core_presence::CorePresenceFactory;

pub mod core_session;
pub use core_session::CoreSessionFactory;

mod rand_id_gen;
pub use rand_id_gen::*;
