//! Known nodes of the network

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Peer {
    pub host: String,
}

impl Peer {
    pub fn new(host: impl Into<String>) -> Self {
        Peer { host: host.into() }
    }

    pub fn matches(&self, host: &str) -> bool {
        self.host == host
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.host)
    }
}

/// What a node reports about itself on its status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    pub latest_block_hash: String,
    pub latest_block_number: u64,
    pub known_peers: Vec<Peer>,
}

/// Set of peers keyed by host.
#[derive(Debug, Default)]
pub struct PeerSet {
    set: RwLock<BTreeSet<Peer>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the peer was not known before.
    pub fn add(&self, peer: Peer) -> bool {
        self.set.write().insert(peer)
    }

    pub fn remove(&self, peer: &Peer) {
        self.set.write().remove(peer);
    }

    /// Peers ordered by host, leaving out `exclude_host`.
    pub fn copy(&self, exclude_host: &str) -> Vec<Peer> {
        self.set
            .read()
            .iter()
            .filter(|peer| !peer.matches(exclude_host))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.set.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let peers = PeerSet::new();
        assert!(peers.add(Peer::new("0.0.0.0:9180")));
        assert!(!peers.add(Peer::new("0.0.0.0:9180")));
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn test_copy_excludes_self_and_orders() {
        let peers = PeerSet::new();
        peers.add(Peer::new("c:1"));
        peers.add(Peer::new("a:1"));
        peers.add(Peer::new("self:1"));

        let copy = peers.copy("self:1");
        assert_eq!(copy, vec![Peer::new("a:1"), Peer::new("c:1")]);

        peers.remove(&Peer::new("a:1"));
        assert_eq!(peers.copy("").len(), 2);
    }
}
