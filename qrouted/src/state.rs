use std::collections::HashMap;
use std::net::{SocketAddr, SocketAddrV4};

use crossbeam_channel::Sender;
use qroute::metrics::ProbeReport;
use qroute::router::Router;
use qroute::sync::RouteSync;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::kernel::NetRouteKernel;
use crate::link::NetLink;
use crate::packet::NetPacket;
use crate::routing::IPV4System;

/// Everything owned by the main loop. Nothing else ever touches it.
pub struct DaemonState {
    pub router: Router<IPV4System>,
    pub sync: RouteSync<IPV4System>,
    /// `None` in compute-only mode
    pub kernel: Option<NetRouteKernel>,
    pub links: HashMap<String, NetLink>,
}

#[derive(Debug)]
pub enum MainLoopEvent {
    InboundPacket {
        address: SocketAddrV4,
        packet: NetPacket,
    },
    MalformedPacket {
        address: SocketAddr,
        reason: String,
    },
    ProbeResult {
        neighbour: String,
        report: ProbeReport,
    },
    TimerHello,
    TimerSweep,
    TimerRefresh,
    TimerRecompute,
    Shutdown,
}

pub struct QueuedPacket {
    pub to: SocketAddrV4,
    pub packet: NetPacket,
}

#[derive(Clone)]
pub struct MessageQueue {
    pub main: Sender<MainLoopEvent>,
    pub outbound: UnboundedSender<QueuedPacket>,
    pub cancellation_token: CancellationToken,
}
