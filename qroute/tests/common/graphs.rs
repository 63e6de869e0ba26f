use crate::common::virtual_network::VirtualNetwork;

pub fn vnet_line() -> VirtualNetwork {
    VirtualNetwork::create(&["A", "B", "C"], &[("A", "B", 10.0), ("B", "C", 10.0)])
}

pub fn vnet_simple_weighted() -> VirtualNetwork {
    VirtualNetwork::create(
        &["1", "2", "3", "4", "5"],
        &[
            ("1", "2", 2.0),
            ("1", "3", 1.0),
            ("2", "3", 4.0),
            ("2", "4", 5.0),
            ("3", "4", 100.0),
            ("3", "5", 8.0),
            ("4", "5", 1.0),
        ],
    )
}

/// Two equal cost paths from A to D
pub fn vnet_square() -> VirtualNetwork {
    VirtualNetwork::create(
        &["A", "B", "C", "D"],
        &[
            ("A", "C", 10.0),
            ("A", "B", 10.0),
            ("B", "D", 10.0),
            ("C", "D", 10.0),
        ],
    )
}

/// A-B is the cheap direct link, A-C-B the detour
pub fn vnet_triangle() -> VirtualNetwork {
    VirtualNetwork::create(
        &["A", "B", "C"],
        &[("A", "B", 10.0), ("A", "C", 20.0), ("C", "B", 20.0)],
    )
}

pub fn vnet_star() -> VirtualNetwork {
    VirtualNetwork::create(
        &["A", "B", "C", "D"],
        &[("A", "B", 10.0), ("A", "C", 10.0), ("A", "D", 10.0)],
    )
}
