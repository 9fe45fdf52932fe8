//! Client location lookup.
//!
//! The intake boundary derives `requests.location` from the client address
//! through a [`GeoLocator`]. The default [`NoLocation`] leaves it null; a
//! deployment with a GeoIP database plugs in its own implementation.

use std::collections::HashMap;
use std::net::IpAddr;

/// Resolves a client address to a short location code (e.g. `"GB"`).
pub trait GeoLocator: Send + Sync {
    fn locate(&self, ip: IpAddr) -> Option<String>;
}

/// Locator that never resolves a location.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocation;

impl GeoLocator for NoLocation {
    fn locate(&self, _ip: IpAddr) -> Option<String> {
        None
    }
}

/// Locator backed by a fixed address-to-code table.
///
/// Useful for private deployments where every client sits behind a known
/// set of egress addresses.
#[derive(Debug, Default, Clone)]
pub struct StaticLocator {
    table: HashMap<IpAddr, String>,
}

impl StaticLocator {
    pub fn new(table: HashMap<IpAddr, String>) -> Self {
        Self { table }
    }
}

impl GeoLocator for StaticLocator {
    fn locate(&self, ip: IpAddr) -> Option<String> {
        self.table.get(&ip).cloned()
    }
}
