//! Builder-related types.

use crate::*;
use std::sync::Arc;

/// The general rendezvous builder.
/// This contains configuration, collaborators and factory instances,
/// allowing construction of runtime module instances.
#[derive(Debug)]
pub struct Builder {
    /// The module configuration to be used when building modules.
    /// This can be loaded from disk or modified before freezing the builder.
    pub config: crate::config::Config,

    /// The [Clock] every expiry decision is made against.
    pub clock: DynClock,

    /// The [id_gen::IdGenerator] used for session ids and tokens.
    pub id_gen: id_gen::DynIdGenerator,

    /// The [kv_store::KvStoreFactory] selecting the storage backend.
    pub kv_store: kv_store::DynKvStoreFactory,

    /// The [presence::PresenceFactory] to be used for creating
    /// [presence::Presence] instances.
    pub presence: presence::DynPresenceFactory,

    /// The [session::SessionFactory] to be used for creating
    /// [session::SessionCoordinator] instances.
    pub session: session::DynSessionFactory,

    /// The transport used to notify session members.
    pub dispatch: dispatch::DynDispatch,

    /// The durable-storage profile lookup.
    pub profile: dispatch::DynProfileResolver,
}

impl Builder {
    /// Construct a default config given the configured module factories.
    /// Note, this should be called before freezing the Builder instance
    /// in an Arc<>.
    pub fn set_default_config(&mut self) -> RvResult<()> {
        let Self {
            config,
            clock: _,
            id_gen: _,
            kv_store,
            presence,
            session,
            dispatch: _,
            profile: _,
        } = self;

        kv_store.default_config(config)?;
        presence.default_config(config)?;
        session.default_config(config)?;

        Ok(())
    }

    /// Generate the default config for the configured module factories,
    /// returning the builder for chaining.
    pub fn with_default_config(mut self) -> RvResult<Self> {
        self.set_default_config()?;
        Ok(self)
    }

    /// Validate the config against every configured module factory.
    pub fn validate_config(&self) -> RvResult<()> {
        self.kv_store.validate_config(&self.config)?;
        self.presence.validate_config(&self.config)?;
        self.session.validate_config(&self.config)?;
        Ok(())
    }

    /// Freeze this builder.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}
