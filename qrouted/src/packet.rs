use serde::{Deserialize, Serialize};
use qroute::concepts::packet::Packet;
use qroute::framework::RoutingSystem;

use crate::routing::IPV4System;

/// Largest datagram we accept, anything longer is malformed
pub const MAX_DATAGRAM: usize = 64 * 1024;

/// What actually goes over the wire, one per UDP datagram
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NetPacket {
    pub sender: <IPV4System as RoutingSystem>::NodeAddress,
    pub packet: Packet<IPV4System>,
}
