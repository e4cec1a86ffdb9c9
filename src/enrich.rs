//! Topology enrichment.
//!
//! This module supplements a parsed `CloudConfig` with values that only
//! exist in cluster topology facts: IP family priority, node networking,
//! vCenter entries and zonal labels.

use crate::config::{CloudConfig, EndpointConfig, NodeNetworkSettings};
use crate::topology::{NodeNetworking, TopologyFacts, VSphereTopology};
use ipnet::IpNet;
use std::net::IpAddr;

/// Region tag category, applied on multi-zone clusters.
pub static REGION_LABEL: &str = "openshift-region";
/// Zone tag category, applied on multi-zone clusters.
pub static ZONE_LABEL: &str = "openshift-zone";
/// Internal OVN-Kubernetes address, never a valid node address.
pub static INTERNAL_MESH_EXCLUDE: &str = "fd69::2/128";

static IPV4: &str = "ipv4";
static IPV6: &str = "ipv6";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Family {
    V4,
    V6,
}

/// Address family of a CIDR, or `None` if it does not parse.
fn cidr_family(cidr: &str) -> Option<Family> {
    match cidr.trim().parse::<IpNet>() {
        Ok(IpNet::V4(_)) => Some(Family::V4),
        Ok(IpNet::V6(_)) => Some(Family::V6),
        Err(_) => None,
    }
}

/// Supplement `cfg` in place with cluster topology facts.
pub fn enrich(cfg: &mut CloudConfig, facts: &TopologyFacts) {
    set_ip_family(cfg, &facts.service_network);

    let vsphere = match &facts.vsphere {
        Some(v) => v,
        None => {
            debug!("no vSphere platform spec, skipping topology enrichment");
            return;
        }
    };

    let mut node_networking = vsphere.node_networking.clone();
    exclude_internal_addresses(&mut node_networking, vsphere, &facts.service_network);
    merge_node_settings(&mut cfg.nodes, node_networking);
    set_virtual_centers(cfg, vsphere);

    // Labels only on zonal installs, so that single-zone clusters keep working.
    if vsphere.failure_domains.len() > 1 {
        cfg.labels.region = REGION_LABEL.to_string();
        cfg.labels.zone = ZONE_LABEL.to_string();
    }
}

/// Derive IP family priority from the service network.
///
/// The first service network is the cluster's primary family. IPv4
/// single-stack is the CCM default and is left unset.
fn set_ip_family(cfg: &mut CloudConfig, service_network: &[String]) {
    match service_network {
        [single] => {
            if cidr_family(single) == Some(Family::V6) {
                cfg.global.ip_family = vec![IPV6.to_string()];
            }
        }
        [primary, _] => {
            let priority = if cidr_family(primary) == Some(Family::V4) {
                vec![IPV4.to_string(), IPV6.to_string()]
            } else {
                vec![IPV6.to_string(), IPV4.to_string()]
            };
            cfg.global.ip_family = priority;
        }
        _ => trace!(
            "{} service networks, leaving ip family unchanged",
            service_network.len()
        ),
    }
    debug!("ip family priority: {:?}", cfg.global.ip_family);
}

/// Exclude VIPs and the internal mesh address from node addresses.
///
/// Only on clusters with an IPv6 service network; IPv4-only clusters keep
/// their exclusion lists as given.
fn exclude_internal_addresses(
    node_networking: &mut NodeNetworking,
    vsphere: &VSphereTopology,
    service_network: &[String],
) {
    let has_ipv6 = service_network
        .iter()
        .any(|cidr| cidr_family(cidr) == Some(Family::V6));
    if !has_ipv6 {
        return;
    }

    let vips = vsphere
        .api_server_internal_ips
        .iter()
        .chain(vsphere.ingress_ips.iter());
    for addr in vips {
        let excluded = match addr.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => format!("{}/32", addr),
            Ok(IpAddr::V6(_)) => format!("{}/128", addr),
            Err(_) => {
                warn!("VIP '{}' is not an IP address, excluding it as IPv6", addr);
                format!("{}/128", addr)
            }
        };
        append_exclude(node_networking, excluded);
    }
    append_exclude(node_networking, INTERNAL_MESH_EXCLUDE.to_string());
}

fn append_exclude(node_networking: &mut NodeNetworking, cidr: String) {
    trace!("excluding {} from node addresses", cidr);
    node_networking
        .external
        .exclude_network_subnet_cidr
        .push(cidr.clone());
    node_networking
        .internal
        .exclude_network_subnet_cidr
        .push(cidr);
}

/// Set node networking from topology.
///
/// Network names and subnets are replaced. Exclusions already in the
/// config are kept in place, and topology exclusions are appended after
/// them.
fn merge_node_settings(nodes: &mut NodeNetworkSettings, node_networking: NodeNetworking) {
    let NodeNetworking { internal, external } = node_networking;
    nodes.internal_network_subnet_cidr = internal.network_subnet_cidr;
    nodes.external_network_subnet_cidr = external.network_subnet_cidr;
    nodes.internal_vm_network_name = internal.network;
    nodes.external_vm_network_name = external.network;
    append_missing(
        &mut nodes.exclude_internal_network_subnet_cidr,
        internal.exclude_network_subnet_cidr,
    );
    append_missing(
        &mut nodes.exclude_external_network_subnet_cidr,
        external.exclude_network_subnet_cidr,
    );
}

fn append_missing(list: &mut Vec<String>, entries: Vec<String>) {
    for entry in entries {
        if !list.contains(&entry) {
            list.push(entry);
        }
    }
}

/// Populate vCenter entries from explicit vCenters and failure domains.
///
/// Explicit vCenters overwrite existing entries. Failure domains then add
/// their datacenter to their server's entry, creating it if needed.
fn set_virtual_centers(cfg: &mut CloudConfig, vsphere: &VSphereTopology) {
    for vcenter in &vsphere.vcenters {
        let endpoint = cfg.endpoint_mut(&vcenter.server);
        *endpoint = EndpointConfig::new(vcenter.server.as_str());
        endpoint.port = vcenter.port;
        for dc in &vcenter.datacenters {
            endpoint.add_datacenter(dc);
        }
        debug!(
            "vcenter '{}' set from topology, datacenters {:?}",
            vcenter.server, endpoint.datacenters
        );
    }

    for fd in &vsphere.failure_domains {
        let endpoint = cfg.endpoint_mut(&fd.server);
        if endpoint.add_datacenter(&fd.datacenter) {
            debug!(
                "failure domain '{}' added datacenter '{}' to vcenter '{}'",
                fd.name, fd.datacenter, fd.server
            );
        }
    }
}
