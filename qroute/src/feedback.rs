use educe::Educe;
use thiserror::Error;

use crate::framework::RoutingSystem;

/// Invalid startup configuration. These are fatal, the router refuses to start.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Cost weights must sum to 100, got {0}")]
    WeightsSum(u64),
    #[error("Threshold `{name}` must be positive and finite, got {value}")]
    Threshold { name: &'static str, value: f64 },
    #[error("`{0}` must be greater than zero")]
    ZeroValue(&'static str),
    #[error("dead_multiplier must be at least 2, got {0}")]
    DeadMultiplier(u32),
    #[error("cost_hysteresis must be non-negative and finite, got {0}")]
    Hysteresis(f64),
    #[error("Neighbour {0} is configured more than once")]
    DuplicateNeighbour(String),
    #[error("Router {0} cannot be its own neighbour")]
    SelfNeighbour(String),
    #[error("Route mapping for {0} points at the local router")]
    SelfMapping(String),
    #[error("Prefix {0} is mapped more than once")]
    DuplicateMapping(String),
    #[error("Bandwidth of link {a} <-> {b} must be non-negative and finite, got {mbps}")]
    Bandwidth { a: String, b: String, mbps: f64 },
}

/// Although this is an error enum, these should be treated as warnings.
/// None of them are fatal, the offending packet or update is simply dropped.
#[derive(Error, Educe)]
#[educe(Debug(bound()), Clone(bound()))]
pub enum RoutingWarning<T: RoutingSystem + ?Sized> {
    /// The packet could not be decoded, or its contents contradict the envelope it arrived in
    #[error("Dropped malformed packet: {reason}")]
    MalformedPacket { reason: String },
    /// Only configured neighbours may speak to us
    #[error("Dropped packet from {sender}, it is not a configured neighbour")]
    UnauthorisedSender { sender: T::NodeAddress },
    /// A neighbour flooded back our own advertisement with a seqno at or above ours.
    /// This usually means this router restarted, the router adopts the seqno and re-originate above it.
    #[error("Our own advertisement came back with seqno {new_seqno}, local seqno was {old_seqno}")]
    DesynchronizedSeqno { old_seqno: u64, new_seqno: u64 },
}
