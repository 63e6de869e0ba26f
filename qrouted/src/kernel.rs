use std::io;
use std::net::{IpAddr, Ipv4Addr};

use anyhow::{anyhow, Context};
use log::debug;
use net_route::{Handle, Route};
use qroute::framework::KernelRoutes;

use crate::routing::{IPV4System, Ipv4Prefix};

/// Kernel forwarding table, mutated over netlink.
///
/// Must be driven from a blocking thread, every call waits on the async netlink handle.
pub struct NetRouteKernel {
    handle: Handle,
    runtime: tokio::runtime::Handle,
}

impl NetRouteKernel {
    /// Needs to be called from within the tokio runtime
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            handle: Handle::new().context("Failed to open the kernel route handle")?,
            runtime: tokio::runtime::Handle::current(),
        })
    }

    fn destination(prefix: &Ipv4Prefix) -> Route {
        Route::new(IpAddr::V4(prefix.addr()), prefix.prefix_len())
    }
}

fn ifindex(name: &str) -> anyhow::Result<u32> {
    netdev::get_interfaces()
        .into_iter()
        .find(|itf| itf.name == name)
        .map(|itf| itf.index)
        .ok_or_else(|| anyhow!("No interface named {name}"))
}

/// The kernel answers ESRCH when the route to delete does not exist
fn is_absent(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(3)
}

impl KernelRoutes<IPV4System> for NetRouteKernel {
    fn add(
        &mut self,
        prefix: &Ipv4Prefix,
        next_hop: &Ipv4Addr,
        itf: Option<&String>,
    ) -> anyhow::Result<()> {
        let mut route = Self::destination(prefix).with_gateway(IpAddr::V4(*next_hop));
        if let Some(name) = itf {
            route = route.with_ifindex(ifindex(name)?);
        }

        // netlink has no replace through this handle, clear whatever is there first
        if let Err(err) = self.runtime.block_on(self.handle.delete(&Self::destination(prefix))) {
            if !is_absent(&err) {
                debug!("Clearing {prefix} before install failed: {err}");
            }
        }
        self.runtime
            .block_on(self.handle.add(&route))
            .with_context(|| format!("Failed to add route {prefix} via {next_hop}"))
    }

    fn remove(&mut self, prefix: &Ipv4Prefix) -> anyhow::Result<()> {
        match self.runtime.block_on(self.handle.delete(&Self::destination(prefix))) {
            Ok(()) => Ok(()),
            Err(err) if is_absent(&err) => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to remove route {prefix}")),
        }
    }
}
