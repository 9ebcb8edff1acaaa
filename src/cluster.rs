// src/cluster.rs

//! Sources of cluster node addresses for the `getRandomNodeIP` and
//! `getNodeIPWithIndex` template helpers.

use anyhow::{bail, Result};
use rand::seq::SliceRandom;

/// Lookup of the external addresses of the cluster's nodes.
pub trait NodeAddresses: Send + Sync {
    fn external_addresses(&self) -> Result<Vec<String>>;
}

/// Addresses listed in the `[cluster]` section of the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticNodeAddresses {
    addresses: Vec<String>,
}

impl StaticNodeAddresses {
    pub fn new(addresses: Vec<String>) -> Self {
        Self { addresses }
    }
}

impl NodeAddresses for StaticNodeAddresses {
    fn external_addresses(&self) -> Result<Vec<String>> {
        Ok(self.addresses.clone())
    }
}

fn non_empty(source: &dyn NodeAddresses) -> Result<Vec<String>> {
    let addresses = source.external_addresses()?;
    if addresses.is_empty() {
        bail!("no external node address found");
    }
    Ok(addresses)
}

/// A uniformly random external node address.
pub fn random_node_address(source: &dyn NodeAddresses) -> Result<String> {
    let addresses = non_empty(source)?;
    let mut rng = rand::thread_rng();
    // `non_empty` guarantees `choose` has something to pick.
    Ok(addresses.choose(&mut rng).cloned().unwrap_or_default())
}

/// The external node address at `index`, wrapping around the address list.
pub fn node_address_at(source: &dyn NodeAddresses, index: i64) -> Result<String> {
    let addresses = non_empty(source)?;
    let len = addresses.len() as i64;
    let slot = index.rem_euclid(len) as usize;
    Ok(addresses[slot].clone())
}
