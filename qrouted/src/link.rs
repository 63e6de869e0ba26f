use std::net::SocketAddrV4;

use qroute::config::RouterConfig;
use qroute::framework::RoutingSystem;

use crate::routing::IPV4System;

/// Where a configured neighbour can be reached
#[derive(Clone, Debug)]
pub struct NetLink {
    pub neigh_node: <IPV4System as RoutingSystem>::NodeAddress,
    pub neigh_addr: SocketAddrV4,
}

impl NetLink {
    pub fn from_config(config: &RouterConfig<IPV4System>) -> Vec<NetLink> {
        config
            .neighbours
            .iter()
            .map(|neigh| NetLink {
                neigh_node: neigh.id.clone(),
                neigh_addr: SocketAddrV4::new(neigh.ip, config.neighbour_port(neigh)),
            })
            .collect()
    }
}
