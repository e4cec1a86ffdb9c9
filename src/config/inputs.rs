use crate::config::snippets::{self, SectionSnippet, VarSnippet};
use crate::config::{CloudConfig, EndpointConfig, GlobalSettings, Labels, NodeNetworkSettings};
use crate::errors::ConfigError;
use failure::Fallible;
use std::collections::BTreeMap;

/// Parse a legacy INI document into a `CloudConfig`.
pub(crate) fn read_config_ini(content: &[u8]) -> Fallible<CloudConfig> {
    if content.is_empty() {
        return Err(ConfigError::EmptyInput.into());
    }

    let text = match std::str::from_utf8(content) {
        Ok(t) => t,
        Err(e) => {
            let line = content[..e.valid_up_to()]
                .iter()
                .filter(|b| **b == b'\n')
                .count()
                + 1;
            return Err(ConfigError::parse(line, "<binary>", "config is not valid UTF-8").into());
        }
    };

    let sections = snippets::parse_document(text)?;
    let input = ConfigInput::from_snippets(sections)?;
    input.try_into_config()
}

/// Legacy sections merged by kind, holding raw string values.
#[derive(Debug, Default)]
struct ConfigInput {
    global: GlobalInput,
    vcenter: BTreeMap<String, ConnectionInput>,
    labels: LabelsInput,
    nodes: NodesInput,
}

impl ConfigInput {
    /// Merge sections into a single input; repeated sections and keys
    /// are applied in order, so the last value wins.
    fn from_snippets(sections: Vec<SectionSnippet>) -> Fallible<Self> {
        let mut cfg = Self::default();

        for section in sections {
            let header = section_header(&section);
            match (section.name.as_str(), section.subsection.as_ref()) {
                ("global", None) => {
                    for var in section.vars {
                        cfg.global.set(var, &header);
                    }
                }
                ("virtualcenter", Some(server)) => {
                    let vc = cfg.vcenter.entry(server.clone()).or_default();
                    for var in section.vars {
                        if !vc.set(&var) {
                            ignore_var(&var, &header);
                        }
                    }
                }
                ("labels", None) => {
                    for var in section.vars {
                        cfg.labels.set(var, &header);
                    }
                }
                ("nodes", None) => {
                    for var in section.vars {
                        cfg.nodes.set(var, &header);
                    }
                }
                ("workspace", None) => {
                    debug!("section {} is no longer used, dropping it", header);
                }
                ("virtualcenter", None) => {
                    return Err(ConfigError::parse(
                        section.line,
                        header,
                        "section requires a quoted server name",
                    )
                    .into());
                }
                ("global", Some(_)) | ("labels", Some(_)) | ("nodes", Some(_))
                | ("workspace", Some(_)) => {
                    return Err(ConfigError::parse(
                        section.line,
                        header,
                        "section does not take a subsection",
                    )
                    .into());
                }
                _ => warn!("ignoring unknown section {} at line {}", header, section.line),
            }
        }

        Ok(cfg)
    }

    /// Coerce raw values into a typed configuration.
    fn try_into_config(self) -> Fallible<CloudConfig> {
        let global = self.global.try_into_settings()?;

        let mut vcenter = BTreeMap::new();
        for (name, input) in self.vcenter {
            let endpoint = input.try_into_endpoint(&name)?;
            vcenter.insert(name, endpoint);
        }

        let cfg = CloudConfig {
            global,
            vcenter,
            labels: Labels {
                zone: self.labels.zone,
                region: self.labels.region,
            },
            nodes: self.nodes.into_settings(),
        };
        Ok(cfg)
    }
}

/// Keys shared by `[Global]` and `[VirtualCenter "..."]`.
#[derive(Debug, Default)]
struct ConnectionInput {
    user: String,
    password: String,
    server: String,
    port: String,
    insecure_flag: String,
    datacenters: String,
    soap_roundtrip_count: String,
    ca_file: String,
    thumbprint: String,
    secret_name: String,
    secret_namespace: String,
    ip_family: String,
}

impl ConnectionInput {
    /// Store a variable, returning whether the key is known.
    fn set(&mut self, var: &VarSnippet) -> bool {
        let field = match var.name.as_str() {
            "user" => &mut self.user,
            "password" => &mut self.password,
            "server" => &mut self.server,
            "port" => &mut self.port,
            "insecure-flag" => &mut self.insecure_flag,
            "datacenters" => &mut self.datacenters,
            "soap-roundtrip-count" => &mut self.soap_roundtrip_count,
            "ca-file" => &mut self.ca_file,
            "thumbprint" => &mut self.thumbprint,
            "secret-name" => &mut self.secret_name,
            "secret-namespace" => &mut self.secret_namespace,
            "ip-family" => &mut self.ip_family,
            _ => return false,
        };
        *field = var_value(var);
        true
    }

    fn try_into_endpoint(self, name: &str) -> Fallible<EndpointConfig> {
        let scope = |param: &str| format!("invalid {} parameter for vc {}", param, name);

        // Without an explicit server, the section name is the vCenter address.
        let server = if self.server.is_empty() {
            name.to_string()
        } else {
            self.server
        };

        let mut endpoint = EndpointConfig {
            user: self.user,
            password: self.password,
            server,
            port: parse_uint(&self.port).map_err(|e| ConfigError::coercion(scope("port"), e))?,
            insecure_flag: parse_bool(&self.insecure_flag)
                .map_err(|e| ConfigError::coercion(scope("insecure-flag"), e))?,
            datacenters: split_list(&self.datacenters),
            soap_roundtrip_count: parse_uint(&self.soap_roundtrip_count)
                .map_err(|e| ConfigError::coercion(scope("soap-roundtrip-count"), e))?,
            ca_file: self.ca_file,
            thumbprint: self.thumbprint,
            secret_name: self.secret_name,
            secret_namespace: self.secret_namespace,
            ip_family: single_or_empty(self.ip_family),
        };
        endpoint.dedup_datacenters();
        Ok(endpoint)
    }
}

#[derive(Debug, Default)]
struct GlobalInput {
    conn: ConnectionInput,
    secrets_directory: String,
    api_disable: String,
    api_binding: String,
}

impl GlobalInput {
    fn set(&mut self, var: VarSnippet, header: &str) {
        if self.conn.set(&var) {
            return;
        }
        match var.name.as_str() {
            "secrets-directory" => self.secrets_directory = var_value(&var),
            "api-disable" => self.api_disable = var_value(&var),
            "api-binding" => self.api_binding = var_value(&var),
            _ => ignore_var(&var, header),
        }
    }

    fn try_into_settings(self) -> Fallible<GlobalSettings> {
        let scope = |param: &str| format!("invalid global {} parameter", param);
        let conn = self.conn;

        let settings = GlobalSettings {
            user: conn.user,
            password: conn.password,
            server: conn.server,
            port: parse_uint(&conn.port).map_err(|e| ConfigError::coercion(scope("port"), e))?,
            insecure_flag: parse_bool(&conn.insecure_flag)
                .map_err(|e| ConfigError::coercion(scope("insecure-flag"), e))?,
            datacenters: split_list(&conn.datacenters),
            soap_roundtrip_count: parse_uint(&conn.soap_roundtrip_count)
                .map_err(|e| ConfigError::coercion(scope("soap-roundtrip-count"), e))?,
            ca_file: conn.ca_file,
            thumbprint: conn.thumbprint,
            secret_name: conn.secret_name,
            secret_namespace: conn.secret_namespace,
            secrets_directory: self.secrets_directory,
            api_disable: parse_bool(&self.api_disable)
                .map_err(|e| ConfigError::coercion(scope("api-disable"), e))?,
            api_binding: self.api_binding,
            ip_family: single_or_empty(conn.ip_family),
        };
        Ok(settings)
    }
}

#[derive(Debug, Default)]
struct LabelsInput {
    zone: String,
    region: String,
}

impl LabelsInput {
    fn set(&mut self, var: VarSnippet, header: &str) {
        match var.name.as_str() {
            "zone" => self.zone = var_value(&var),
            "region" => self.region = var_value(&var),
            _ => ignore_var(&var, header),
        }
    }
}

#[derive(Debug, Default)]
struct NodesInput {
    internal_network_subnet_cidr: String,
    external_network_subnet_cidr: String,
    internal_vm_network_name: String,
    external_vm_network_name: String,
    exclude_internal_network_subnet_cidr: String,
    exclude_external_network_subnet_cidr: String,
}

impl NodesInput {
    fn set(&mut self, var: VarSnippet, header: &str) {
        let field = match var.name.as_str() {
            "internal-network-subnet-cidr" => &mut self.internal_network_subnet_cidr,
            "external-network-subnet-cidr" => &mut self.external_network_subnet_cidr,
            "internal-vm-network-name" => &mut self.internal_vm_network_name,
            "external-vm-network-name" => &mut self.external_vm_network_name,
            "exclude-internal-network-subnet-cidr" => {
                &mut self.exclude_internal_network_subnet_cidr
            }
            "exclude-external-network-subnet-cidr" => {
                &mut self.exclude_external_network_subnet_cidr
            }
            _ => return ignore_var(&var, header),
        };
        *field = var_value(&var);
    }

    fn into_settings(self) -> NodeNetworkSettings {
        NodeNetworkSettings {
            internal_network_subnet_cidr: split_list(&self.internal_network_subnet_cidr),
            external_network_subnet_cidr: split_list(&self.external_network_subnet_cidr),
            internal_vm_network_name: self.internal_vm_network_name,
            external_vm_network_name: self.external_vm_network_name,
            exclude_internal_network_subnet_cidr: split_list(
                &self.exclude_internal_network_subnet_cidr,
            ),
            exclude_external_network_subnet_cidr: split_list(
                &self.exclude_external_network_subnet_cidr,
            ),
        }
    }
}

fn section_header(section: &SectionSnippet) -> String {
    match &section.subsection {
        Some(sub) => format!("[{} \"{}\"]", section.name, sub),
        None => format!("[{}]", section.name),
    }
}

fn ignore_var(var: &VarSnippet, header: &str) {
    warn!(
        "ignoring unknown key '{}' in section {} at line {}",
        var.name, header, var.line
    );
}

/// A bare key (no `=`) reads as boolean true.
fn var_value(var: &VarSnippet) -> String {
    var.value.clone().unwrap_or_else(|| "true".to_string())
}

/// Parse an unsigned integer; empty means zero.
fn parse_uint(raw: &str) -> Result<u32, String> {
    if raw.is_empty() {
        return Ok(0);
    }
    let parsed: i64 = raw
        .parse()
        .map_err(|e| format!("can not parse '{}' as an integer: {}", raw, e))?;
    if parsed < 0 {
        return Err(format!("value must not be negative, got {}", parsed));
    }
    if parsed > i64::from(u32::max_value()) {
        return Err(format!("value out of range, got {}", parsed));
    }
    Ok(parsed as u32)
}

/// Parse a gcfg boolean; empty means false.
fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_lowercase().as_str() {
        "" | "false" | "no" | "off" | "0" => Ok(false),
        "true" | "yes" | "on" | "1" => Ok(true),
        _ => Err(format!("can not parse '{}' as a boolean", raw)),
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn single_or_empty(raw: String) -> Vec<String> {
    if raw.is_empty() {
        vec![]
    } else {
        vec![raw]
    }
}
