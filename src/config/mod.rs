//! vSphere cloud-provider configuration, parsing and serialization.
//!
//! This module contains four logical entities:
//!  * Snippets: raw sections and variables tokenized from a legacy INI document.
//!  * Inputs: typed values coerced out of snippets into a `CloudConfig`.
//!  * Yaml: the structured document format, read and written directly.
//!  * CloudConfig: canonical configuration consumed by the external CCM.

mod inputs;
mod snippets;
mod yaml;

use crate::errors::ConfigError;
use failure::{Fallible, ResultExt};
use std::collections::BTreeMap;

/// Default connection settings, used when no per-vCenter entry exists.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    /// vCenter username.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// vCenter password in clear text.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Deprecated, single vCenter address.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server: String,
    #[serde(skip_serializing_if = "yaml::is_zero")]
    pub port: u32,
    /// True if vCenter uses a self-signed certificate.
    #[serde(skip_serializing_if = "yaml::is_false")]
    pub insecure_flag: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub datacenters: Vec<String>,
    /// SOAP round tripper count (retries = count - 1).
    #[serde(rename = "soapRoundtripCount", skip_serializing_if = "yaml::is_zero")]
    pub soap_roundtrip_count: u32,
    /// Path to a PEM CA bundle; system roots are used when unset.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ca_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub thumbprint: String,
    /// Secret holding vCenter credentials.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secrets_directory: String,
    #[serde(skip_serializing_if = "yaml::is_false")]
    pub api_disable: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_binding: String,
    /// IP family priority, `ipv4` when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_family: Vec<String>,
}

impl GlobalSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Connection settings for a single vCenter server.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// vCenter address; defaults to the entry key.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server: String,
    #[serde(skip_serializing_if = "yaml::is_zero")]
    pub port: u32,
    #[serde(skip_serializing_if = "yaml::is_false")]
    pub insecure_flag: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub datacenters: Vec<String>,
    #[serde(rename = "soapRoundtripCount", skip_serializing_if = "yaml::is_zero")]
    pub soap_roundtrip_count: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ca_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub thumbprint: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_namespace: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_family: Vec<String>,
}

impl EndpointConfig {
    /// Create an empty entry for the given server address.
    pub fn new<S: Into<String>>(server: S) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Append a datacenter unless already present.
    ///
    /// Returns whether the list changed.
    pub fn add_datacenter(&mut self, datacenter: &str) -> bool {
        if self.datacenters.iter().any(|dc| dc == datacenter) {
            return false;
        }
        self.datacenters.push(datacenter.to_string());
        true
    }

    /// Drop repeated datacenters, keeping the first occurrence of each.
    pub fn dedup_datacenters(&mut self) {
        let datacenters = std::mem::take(&mut self.datacenters);
        for dc in &datacenters {
            self.add_datacenter(dc);
        }
    }
}

/// Topology tag categories for the built-in zone and region node labels.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Labels {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
}

impl Labels {
    pub fn is_empty(&self) -> bool {
        self.zone.is_empty() && self.region.is_empty()
    }
}

/// Node address selection, by VM network name and subnet.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeNetworkSettings {
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "yaml::string_or_seq"
    )]
    pub internal_network_subnet_cidr: Vec<String>,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "yaml::string_or_seq"
    )]
    pub external_network_subnet_cidr: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub internal_vm_network_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub external_vm_network_name: String,
    /// Addresses in these subnets are never reported as node addresses.
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "yaml::string_or_seq"
    )]
    pub exclude_internal_network_subnet_cidr: Vec<String>,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "yaml::string_or_seq"
    )]
    pub exclude_external_network_subnet_cidr: Vec<String>,
}

impl NodeNetworkSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Canonical cloud-provider configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloudConfig {
    #[serde(skip_serializing_if = "GlobalSettings::is_empty")]
    pub global: GlobalSettings,
    /// vCenter entries, keyed by server (or tenant) name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub vcenter: BTreeMap<String, EndpointConfig>,
    #[serde(skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    #[serde(skip_serializing_if = "NodeNetworkSettings::is_empty")]
    pub nodes: NodeNetworkSettings,
}

impl CloudConfig {
    /// Get the entry for `server`, creating an empty one if missing.
    pub fn endpoint_mut(&mut self, server: &str) -> &mut EndpointConfig {
        self.vcenter
            .entry(server.to_string())
            .or_insert_with(|| EndpointConfig::new(server))
    }
}

/// Parse a vSphere cloud-config, in either YAML or legacy INI format.
///
/// YAML takes precedence; if it does not parse, the legacy INI reader
/// is tried and its error is the one reported.
pub fn read_config(content: &[u8]) -> Fallible<CloudConfig> {
    if content.is_empty() {
        return Err(ConfigError::EmptyInput.into());
    }

    trace!("trying to parse vSphere config, yaml format first");
    let yaml_err = match yaml::read_config_yaml(content) {
        Ok(cfg) => {
            debug!("yaml config parsed successfully");
            return Ok(cfg);
        }
        Err(e) => e,
    };
    debug!("parsing yaml config failed, falling back to ini");
    trace!("yaml config parsing error: {}", yaml_err);

    let cfg = match inputs::read_config_ini(content) {
        Ok(cfg) => cfg,
        Err(e) => {
            let msg = format!("yaml parsing failed, ini config parsing failed: {}", e);
            return Err(e.context(msg).into());
        }
    };
    debug!("ini config parsed successfully");

    Ok(cfg)
}

/// Serialize a configuration into a YAML document.
pub fn marshal_config(cfg: &CloudConfig) -> Fallible<String> {
    let out = yaml::write_config_yaml(cfg).context("failed to serialize vSphere config")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::config_error;
    use pretty_assertions::assert_eq;

    static BASIC_CONFIG_INI: &str = r#"
[Global]
server = 0.0.0.0
port = 443
user = user
password = password
insecure-flag = true
datacenters = us-west
ca-file = /some/path/to/a/ca.pem
"#;

    static VCENTER_SECTION_INI: &str = r#"
[Global]
secret-name = "global-secret"
secret-namespace = "global-secret-ns"

[VirtualCenter "vc.rh.com"]
datacenters = "DC0,DC1"

[Labels]
region = "k8s-region"
zone = "k8s-zone"
"#;

    static VCENTER_SECTION_YAML: &str = "global:
  secretName: global-secret
  secretNamespace: global-secret-ns
vcenter:
  vc.rh.com:
    server: vc.rh.com
    datacenters:
    - DC0
    - DC1
labels:
  zone: k8s-zone
  region: k8s-region
";

    static MULTI_VC_INI: &str = r#"
[Global]
port = 443
insecure-flag = true
secret-name = "global-secret"
secret-namespace = "global-secret-ns"

[VirtualCenter "t1"]
server = "10.0.0.1"
datacenters = "DC0,DC1,DC2"
secret-name = "tenant1-secret"
secret-namespace = "kube-system"

[VirtualCenter "10.0.0.2"]
datacenters = "DC3"

[VirtualCenter "10.0.0.3"]
datacenters = "DC5,DC6"
ip-family = "ipv6"
"#;

    #[test]
    fn basic_ini_config() {
        let cfg = read_config(BASIC_CONFIG_INI.as_bytes()).unwrap();
        let expected = GlobalSettings {
            user: "user".to_string(),
            password: "password".to_string(),
            server: "0.0.0.0".to_string(),
            port: 443,
            insecure_flag: true,
            datacenters: vec!["us-west".to_string()],
            ca_file: "/some/path/to/a/ca.pem".to_string(),
            ..GlobalSettings::default()
        };
        assert_eq!(cfg.global, expected);
        assert!(cfg.vcenter.is_empty());
        assert!(cfg.labels.is_empty());
        assert!(cfg.nodes.is_empty());
    }

    #[test]
    fn ini_to_yaml_conversion() {
        let cfg = read_config(VCENTER_SECTION_INI.as_bytes()).unwrap();
        let out = marshal_config(&cfg).unwrap();
        assert_eq!(out, VCENTER_SECTION_YAML);
    }

    #[test]
    fn multi_vcenter_ini() {
        let cfg = read_config(MULTI_VC_INI.as_bytes()).unwrap();
        assert_eq!(cfg.vcenter.len(), 3);

        let vc1 = &cfg.vcenter["t1"];
        assert_eq!(vc1.datacenters, vec!["DC0", "DC1", "DC2"]);
        assert_eq!(vc1.server, "10.0.0.1");
        assert_eq!(vc1.secret_name, "tenant1-secret");
        assert_eq!(vc1.secret_namespace, "kube-system");

        let vc2 = &cfg.vcenter["10.0.0.2"];
        assert_eq!(vc2.datacenters, vec!["DC3"]);
        assert_eq!(vc2.server, "10.0.0.2");
        assert!(vc2.ip_family.is_empty());

        let vc3 = &cfg.vcenter["10.0.0.3"];
        assert_eq!(vc3.datacenters, vec!["DC5", "DC6"]);
        assert_eq!(vc3.ip_family, vec!["ipv6"]);
    }

    #[test]
    fn ini_then_yaml_roundtrip() {
        for input in &[BASIC_CONFIG_INI, VCENTER_SECTION_INI, MULTI_VC_INI] {
            let first = read_config(input.as_bytes()).unwrap();
            let out = marshal_config(&first).unwrap();
            let second = read_config(out.as_bytes()).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn yaml_takes_precedence() {
        let cfg = read_config(VCENTER_SECTION_YAML.as_bytes()).unwrap();
        let from_ini = read_config(VCENTER_SECTION_INI.as_bytes()).unwrap();
        assert_eq!(cfg, from_ini);
    }

    #[test]
    fn serialization_is_sorted_by_server() {
        let mut cfg = CloudConfig::default();
        cfg.endpoint_mut("zeta");
        cfg.endpoint_mut("alpha");
        cfg.endpoint_mut("mid");
        let out = marshal_config(&cfg).unwrap();
        let alpha = out.find("alpha:").unwrap();
        let mid = out.find("mid:").unwrap();
        let zeta = out.find("zeta:").unwrap();
        assert!(alpha < mid && mid < zeta);
    }

    #[test]
    fn empty_sections_are_omitted() {
        let out = marshal_config(&CloudConfig::default()).unwrap();
        assert!(!out.contains("vcenter"));
        assert!(!out.contains("labels"));
        assert!(!out.contains("nodes"));
    }

    #[test]
    fn endpoint_mut_is_get_or_create() {
        let mut cfg = CloudConfig::default();
        cfg.endpoint_mut("vc").port = 443;
        assert_eq!(cfg.endpoint_mut("vc").port, 443);
        assert_eq!(cfg.endpoint_mut("vc").server, "vc");
        assert_eq!(cfg.vcenter.len(), 1);
    }

    #[test]
    fn add_datacenter_is_idempotent() {
        let mut vc = EndpointConfig::new("vc");
        assert!(vc.add_datacenter("DC1"));
        assert!(vc.add_datacenter("DC2"));
        assert!(!vc.add_datacenter("DC1"));
        assert_eq!(vc.datacenters, vec!["DC1", "DC2"]);
    }

    #[test]
    fn datacenters_are_deduplicated_on_read() {
        let cfg = read_config(b"[VirtualCenter \"vc\"]\ndatacenters = DC1,DC1,DC2\n").unwrap();
        assert_eq!(cfg.vcenter["vc"].datacenters, vec!["DC1", "DC2"]);

        let cfg = read_config(b"vcenter:\n  vc:\n    datacenters: [DC1, DC1]\n").unwrap();
        assert_eq!(cfg.vcenter["vc"].datacenters, vec!["DC1"]);
    }

    #[test]
    fn invalid_configs() {
        let cases = vec![
            ("boom[]{}", "expected section header"),
            (
                "\n[Global]\nport = -443\ninsecure-flag = true\n",
                "invalid global port parameter",
            ),
            (
                "\n[Global]\nport = 443\n\n[VirtualCenter \"10.0.0.3\"]\ndatacenters = \"DC5,DC6\"\nport = -1\n",
                "invalid port parameter for vc 10.0.0.3",
            ),
            ("", "vSphere config is empty"),
        ];

        for (input, substring) in cases {
            let err = read_config(input.as_bytes()).unwrap_err();
            assert!(
                err.to_string().contains(substring),
                "'{}' does not contain '{}'",
                err,
                substring
            );
        }
    }

    #[test]
    fn empty_input_is_distinct() {
        let err = read_config(b"").unwrap_err();
        assert_eq!(config_error(&err), Some(&ConfigError::EmptyInput));

        let err = read_config(b"boom[]{}").unwrap_err();
        match config_error(&err) {
            Some(ConfigError::Parse { .. }) => {}
            other => panic!("unexpected error kind: {:?}", other),
        }
    }
}
