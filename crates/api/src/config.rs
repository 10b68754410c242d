//! Types for use when configuring rendezvous modules.

use crate::*;

/// helper transcode function
fn tc<S: serde::Serialize, D: serde::de::DeserializeOwned>(
    s: &S,
) -> RvResult<D> {
    serde_json::from_str(
        &serde_json::to_string(s)
            .map_err(|e| RvError::other_src("encode", e))?,
    )
    .map_err(|e| RvError::other_src("decode", e))
}

/// Denotes a type used to configure a specific rendezvous module.
///
/// A module config is a struct with a single camelCase field named after
/// the module, wrapping the actual parameters. This lets all module configs
/// share one flat json object, the likes of which might be found in a
/// configuration file.
///
/// Both the wrapper and the inner struct should be `#[serde(default)]`
/// so that configs edited by humans may omit properties.
pub trait ModConfig:
    'static
    + Sized
    + Default
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
{
}

impl<
        T: 'static
            + Sized
            + Default
            + std::fmt::Debug
            + serde::Serialize
            + serde::de::DeserializeOwned
            + Send
            + Sync,
    > ModConfig for T
{
}

/// Rendezvous configuration.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Config(serde_json::Map<String, serde_json::Value>);

impl Config {
    /// When generating a default or example configuration file, module
    /// factories are handed a mutable reference of this config struct.
    /// They should call this to add their default parameters.
    pub fn set_module_config<M: ModConfig>(&mut self, m: &M) -> RvResult<()> {
        let map: serde_json::Map<String, serde_json::Value> = tc(m)?;
        for (module_name, value) in map {
            if self.0.contains_key(&module_name) {
                return Err(RvError::other(format!(
                    "Refusing to overwrite conflicting module name: \
                    {module_name}"
                )));
            }
            self.0.insert(module_name, value);
        }
        Ok(())
    }

    /// Replace a module config, whether or not defaults were set for it.
    /// Use this to apply overrides on top of a default config.
    pub fn update_module_config<M: ModConfig>(
        &mut self,
        m: &M,
    ) -> RvResult<()> {
        let map: serde_json::Map<String, serde_json::Value> = tc(m)?;
        self.0.extend(map);
        Ok(())
    }

    /// Extract a module config. Modules that were never set, and any
    /// missing properties, take their default values. Unknown properties
    /// are ignored.
    pub fn get_module_config<M: ModConfig>(&self) -> RvResult<M> {
        tc(&self.0)
    }
}
