mod daemon;
mod kernel;
mod link;
mod packet;
mod probe;
mod routing;
mod state;

use std::collections::HashMap;
use std::env;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use log::{error, info, warn};
use qroute::config::RouterConfig;
use qroute::router::Router;
use qroute::sync::RouteSync;
use serde_json::json;
use simplelog::*;
use tokio::fs;
use tokio::net::UdpSocket;

use crate::kernel::NetRouteKernel;
use crate::link::NetLink;
use crate::routing::IPV4System;
use crate::state::{DaemonState, MainLoopEvent};

async fn load_config(path: &str) -> anyhow::Result<RouterConfig<IPV4System>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config {path}"))?;
    let config: RouterConfig<IPV4System> =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config {path}"))?;
    config
        .validate()
        .with_context(|| format!("Invalid config {path}"))?;
    Ok(config)
}

/// Starts above anything a previous run of this router could have advertised
fn initial_seqno() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let level = env::var("QROUTED_LOG")
        .ok()
        .and_then(|level| LevelFilter::from_str(&level).ok())
        .unwrap_or(LevelFilter::Info);
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;

    let path = env::args().nth(1).unwrap_or_else(|| "./config.json".to_string());
    let config = load_config(&path).await?;

    info!("Starting qrouted as {}", json!(config.router_id));

    let bind = SocketAddrV4::new(
        config.listen_ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
        config.listen_port,
    );
    let socket = UdpSocket::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    let mut router = Router::<IPV4System>::from_config(&config)?;
    router.seqno = initial_seqno();

    let kernel = if config.route_mappings.is_some() {
        Some(NetRouteKernel::new()?)
    } else {
        warn!("No route_mappings configured, running in compute-only mode");
        None
    };

    let links: HashMap<String, NetLink> = NetLink::from_config(&config)
        .into_iter()
        .map(|link| (link.neigh_node.clone(), link))
        .collect();

    let state = DaemonState {
        router,
        sync: RouteSync::new(config.managed_prefixes()),
        kernel,
        links,
    };

    let (mq, main) = daemon::start_router(state, socket);
    info!("Listening on {bind} with {} neighbours", config.neighbours.len());

    let tmq = mq.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutting down..."),
            Err(err) => error!("Failed to listen for Ctrl-C, shutting down: {err}"),
        }
        if tmq.main.send(MainLoopEvent::Shutdown).is_err() {
            tmq.cancellation_token.cancel();
        }
    });

    main.await.context("Main Thread Failed: ")??;
    mq.cancellation_token.cancel();
    Ok(())
}
