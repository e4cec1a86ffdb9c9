//! Structured (YAML) cloud-config format.

use crate::config::CloudConfig;
use crate::errors::ConfigError;
use failure::Fallible;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use std::fmt;

/// Parse a YAML document into a `CloudConfig`.
pub(crate) fn read_config_yaml(content: &[u8]) -> Fallible<CloudConfig> {
    if content.is_empty() {
        bail!("empty YAML document");
    }
    let mut cfg: CloudConfig = serde_yaml::from_slice(content)?;
    for endpoint in cfg.vcenter.values_mut() {
        endpoint.dedup_datacenters();
    }
    Ok(cfg)
}

pub(crate) fn write_config_yaml(cfg: &CloudConfig) -> Fallible<String> {
    let out =
        serde_yaml::to_string(cfg).map_err(|e| ConfigError::Serialization(e.to_string()))?;
    Ok(out)
}

pub(crate) fn is_zero(n: &u32) -> bool {
    *n == 0
}

pub(crate) fn is_false(b: &bool) -> bool {
    !*b
}

/// Deserialize a list from either a native sequence or a comma-joined string.
pub(crate) fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrSeq;

    impl<'de> Visitor<'de> for StringOrSeq {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of strings or a comma-separated string")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            let items = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            Ok(items)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(vec![])
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut items = vec![];
            while let Some(item) = seq.next_element::<String>()? {
                items.push(item);
            }
            Ok(items)
        }
    }

    deserializer.deserialize_any(StringOrSeq)
}
