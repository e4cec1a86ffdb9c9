//! vsphere-ccm-config: vSphere cloud-config transformer.
//!
//! This library converts a vSphere cloud-provider configuration into the
//! YAML document expected by the external cloud controller manager,
//! supplementing it with cluster topology facts along the way.
//!
//! It is made of three stages, run once per `transform` call:
//!  * `config::read_config` - parse YAML, falling back to legacy INI.
//!  * `enrich::enrich` - apply topology facts to the parsed config.
//!  * `config::marshal_config` - serialize back to YAML.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod enrich;
pub mod errors;
pub mod topology;

pub use crate::config::{
    marshal_config, read_config, CloudConfig, EndpointConfig, GlobalSettings, Labels,
    NodeNetworkSettings,
};
pub use crate::errors::{config_error, ConfigError};
pub use crate::topology::TopologyFacts;

use failure::{Fallible, ResultExt};

/// Transform a user-provided cloud-config for the external vSphere CCM.
///
/// The platform is checked before the source is looked at; no partial
/// output is ever returned.
pub fn transform(source: &[u8], facts: &TopologyFacts) -> Fallible<String> {
    if !facts.is_vsphere() {
        return Err(ConfigError::Boundary {
            expected: topology::VSPHERE_PLATFORM.to_string(),
            found: facts.platform.clone(),
        }
        .into());
    }

    let mut cfg = read_config(source).context("failed to read the cloud.conf")?;
    enrich::enrich(&mut cfg, facts);
    trace!(
        "enriched config:\n{}",
        serde_json::to_string_pretty(&cfg).unwrap_or_default()
    );

    marshal_config(&cfg)
}
