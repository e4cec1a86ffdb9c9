//! Cluster topology facts.
//!
//! These are supplied by the caller (usually extracted from the cluster
//! Infrastructure and Network resources) and are never modified here.

/// Platform tag for vSphere clusters.
pub static VSPHERE_PLATFORM: &str = "VSphere";

/// Read-only cluster facts driving enrichment.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopologyFacts {
    /// Platform type, e.g. `VSphere`.
    pub platform: String,
    /// vSphere platform spec; absent on clusters installed without one.
    pub vsphere: Option<VSphereTopology>,
    /// Service network CIDRs, primary address family first.
    pub service_network: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VSphereTopology {
    pub vcenters: Vec<VCenter>,
    pub failure_domains: Vec<FailureDomain>,
    pub node_networking: NodeNetworking,
    /// API server VIPs.
    pub api_server_internal_ips: Vec<String>,
    /// Ingress VIPs.
    pub ingress_ips: Vec<String>,
}

/// An explicitly configured vCenter.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct VCenter {
    pub server: String,
    pub port: u32,
    pub datacenters: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct FailureDomain {
    pub name: String,
    pub region: String,
    pub zone: String,
    pub server: String,
    pub datacenter: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct NodeNetworking {
    pub internal: NodeNetworkingSpec,
    pub external: NodeNetworkingSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeNetworkingSpec {
    /// VM network name.
    pub network: String,
    #[serde(rename = "networkSubnetCidr")]
    pub network_subnet_cidr: Vec<String>,
    #[serde(rename = "excludeNetworkSubnetCidr")]
    pub exclude_network_subnet_cidr: Vec<String>,
}

impl TopologyFacts {
    pub fn is_vsphere(&self) -> bool {
        self.platform == VSPHERE_PLATFORM
    }
}
