use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use log::{debug, error, info, trace, warn};
use qroute::framework::{Prober, ProtocolParams};
use qroute::metrics::ProbeReport;
use serde_json::json;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::packet::{NetPacket, MAX_DATAGRAM};
use crate::probe::PingProber;
use crate::state::MainLoopEvent::{
    InboundPacket, MalformedPacket, ProbeResult, Shutdown, TimerHello, TimerRecompute,
    TimerRefresh, TimerSweep,
};
use crate::state::{DaemonState, MainLoopEvent, MessageQueue, QueuedPacket};

/// Spawns every unit of the daemon. The returned handle resolves once the main loop has
/// shut down and flushed its kernel routes.
pub fn start_router(
    state: DaemonState,
    socket: UdpSocket,
) -> (MessageQueue, JoinHandle<anyhow::Result<()>>) {
    let (mtx, mrx) = unbounded();
    let (otx, orx) = unbounded_channel();
    let ct = CancellationToken::new();
    let mq = MessageQueue {
        main: mtx,
        outbound: otx,
        cancellation_token: ct,
    };
    let socket = Arc::new(socket);
    let params = state.router.params.clone();

    tokio::spawn(packet_sender(mq.clone(), socket.clone(), orx));
    tokio::spawn(server(mq.clone(), socket));

    spawn_timer(mq.clone(), params.hello_interval, || TimerHello);
    spawn_timer(mq.clone(), params.hello_interval, || TimerSweep);
    spawn_timer(mq.clone(), params.refresh_interval, || TimerRefresh);
    spawn_timer(mq.clone(), params.recompute_interval, || TimerRecompute);

    for link in state.links.values() {
        spawn_sampler(
            mq.clone(),
            link.neigh_node.clone(),
            *link.neigh_addr.ip(),
            params.clone(),
        );
    }

    let tmq = mq.clone();
    let main = tokio::task::spawn_blocking(move || main_loop(state, tmq, mrx));
    (mq, main)
}

// TIMERS

fn spawn_timer(mq: MessageQueue, period: Duration, event: fn() -> MainLoopEvent) {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = mq.cancellation_token.cancelled() => break,
                _ = ticker.tick() => {
                    if mq.main.send(event()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

// METRIC SAMPLERS, one per neighbour

fn spawn_sampler(mq: MessageQueue, neighbour: String, target: Ipv4Addr, params: ProtocolParams) {
    tokio::spawn(async move {
        let mut ticker = interval(params.metric_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let prober = PingProber::new(params.probe_timeout);
        loop {
            tokio::select! {
                _ = mq.cancellation_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let mut tprober = prober.clone();
            let (count, probe_interval) = (params.probe_count, params.probe_interval);
            let probe = tokio::task::spawn_blocking(move || {
                tprober.probe(&target, count, probe_interval)
            });
            let report = match probe.await {
                Ok(Ok(report)) => report,
                Ok(Err(err)) => {
                    warn!("Probing {neighbour} at {target} failed, counting it as total loss: {err:#}");
                    ProbeReport::total_loss(count)
                }
                Err(err) => {
                    error!("Probe task for {neighbour} did not finish: {err}");
                    continue;
                }
            };

            if mq.cancellation_token.is_cancelled() {
                break;
            }
            let event = ProbeResult {
                neighbour: neighbour.clone(),
                report,
            };
            if mq.main.send(event).is_err() {
                break;
            }
        }
    });
}

// PACKET SENDER

async fn packet_sender(
    mq: MessageQueue,
    socket: Arc<UdpSocket>,
    mut orx: UnboundedReceiver<QueuedPacket>,
) {
    loop {
        let packet = tokio::select! {
            _ = mq.cancellation_token.cancelled() => break,
            packet = orx.recv() => match packet {
                Some(packet) => packet,
                None => break,
            }
        };

        let bytes = match serde_json::to_vec(&packet.packet) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("Failed to encode packet for {}: {err}", packet.to);
                continue;
            }
        };
        if bytes.len() > MAX_DATAGRAM {
            warn!(
                "Dropping {} byte packet for {}, it does not fit in a datagram",
                bytes.len(),
                packet.to
            );
            continue;
        }
        trace!("Writing packet: {} to {}", json!(packet.packet), packet.to);
        if let Err(err) = socket.send_to(&bytes, packet.to).await {
            // the neighbour may simply be down, hellos will find out
            debug!("Error occurred while trying to write packet to {}: {err}", packet.to);
        }
    }
}

// SERVER

async fn server(mq: MessageQueue, socket: Arc<UdpSocket>) {
    let mut buf = vec![0u8; MAX_DATAGRAM + 1];
    loop {
        let (len, addr) = tokio::select! {
            _ = mq.cancellation_token.cancelled() => break,
            res = socket.recv_from(&mut buf) => match res {
                Ok(res) => res,
                Err(err) => {
                    debug!("Error while receiving datagram: {err}");
                    continue;
                }
            }
        };

        let event = match decode(&buf[..len], addr) {
            Ok((address, packet)) => {
                trace!("Got packet {} from {address}", json!(packet));
                InboundPacket { address, packet }
            }
            Err(reason) => MalformedPacket {
                address: addr,
                reason,
            },
        };
        if mq.main.send(event).is_err() {
            break;
        }
    }
}

fn decode(bytes: &[u8], addr: SocketAddr) -> Result<(SocketAddrV4, NetPacket), String> {
    if bytes.len() > MAX_DATAGRAM {
        return Err(format!("datagram of {} bytes is too large", bytes.len()));
    }
    let SocketAddr::V4(address) = addr else {
        return Err("not an IPv4 sender".to_string());
    };
    let packet = serde_json::from_slice(bytes).map_err(|err| err.to_string())?;
    Ok((address, packet))
}

// MAIN THREAD

fn main_loop(
    mut state: DaemonState,
    mqs: MessageQueue,
    mqr: Receiver<MainLoopEvent>,
) -> anyhow::Result<()> {
    while !mqs.cancellation_token.is_cancelled() {
        let Ok(event) = mqr.recv() else {
            break;
        };
        trace!("Main Loop Event: {event:?}");
        let now = Instant::now();
        match event {
            InboundPacket { address, packet } => handle_packet(&mut state, packet, address, now),
            MalformedPacket { address, reason } => {
                state.router.report_malformed(format!("{reason}, from {address}"));
            }
            ProbeResult { neighbour, report } => {
                state.router.handle_probe_report(&neighbour, &report, now);
            }
            TimerHello => state.router.send_hello(),
            TimerSweep => state.router.sweep_neighbours(now),
            TimerRefresh => state.router.originate(),
            TimerRecompute => recompute(&mut state),
            Shutdown => mqs.cancellation_token.cancel(),
        }

        if state.router.needs_recompute() {
            recompute(&mut state);
        }
        write_routing_packets(&mut state, &mqs);

        for warn in state.router.warnings.drain(..) {
            warn!("{warn}");
        }
    }

    info!("The router has shut down, flushing kernel routes...");
    if let Some(kernel) = &mut state.kernel {
        let report = state.sync.flush(kernel);
        info!("Removed {} routes, {} failed", report.removed, report.failed);
    }
    debug!("Final counters: {}", json!(state.router.stats));
    Ok(())
}

fn handle_packet(state: &mut DaemonState, pkt: NetPacket, from: SocketAddrV4, now: Instant) {
    let authorised = state
        .links
        .get(&pkt.sender)
        .is_some_and(|link| link.neigh_addr.ip() == from.ip());
    if !authorised {
        debug!("Packet from {from} claims to be {}", json!(pkt.sender));
        state.router.report_unauthorised(&pkt.sender);
        return;
    }
    state.router.handle_packet(&pkt.packet, &pkt.sender, now);
}

fn recompute(state: &mut DaemonState) {
    if state.router.recompute() {
        info!(
            "Routing table changed: {}",
            json!(state
                .router
                .table
                .iter()
                .map(|route| format!("{} via {} ({:.2})", route.prefix, route.next_hop, route.metric))
                .collect::<Vec<_>>())
        );
    }
    if let Some(kernel) = &mut state.kernel {
        let report = state.sync.reconcile(&state.router.table, kernel);
        if report.mutations() > 0 || report.failed > 0 {
            debug!("Route sync: {}", json!(report));
        }
    }
}

fn write_routing_packets(state: &mut DaemonState, mq: &MessageQueue) {
    for pkt in state.router.outbound_packets.drain(..) {
        let Some(link) = state.links.get(&pkt.dest) else {
            continue;
        };
        let queued = QueuedPacket {
            to: link.neigh_addr,
            packet: NetPacket {
                sender: state.router.address.clone(),
                packet: pkt.packet,
            },
        };
        if mq.outbound.send(queued).is_err() {
            debug!("Outbound queue closed, dropping packet for {}", link.neigh_addr);
        }
    }
}
