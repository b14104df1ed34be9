//! Connected-node identity record.
//!
//! A `Node` is created by the registry on successful login and destroyed
//! on disconnect or removal. Its display name may carry a disambiguation
//! suffix; the real name is recovered with [`crate::identity::real_name`].

use std::net::SocketAddr;
use std::time::SystemTime;
use uuid::Uuid;

/// Unique identifier assigned to a node for its lifetime in the registry.
pub type NodeId = Uuid;

/// A registered, currently-connected participant in the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Stable unique id for this connection
    pub id: NodeId,

    /// Display name, possibly carrying a " (n)" disambiguation suffix
    pub name: String,

    /// The remote network address of the node
    pub remote_addr: SocketAddr,

    /// Hashed MAC address reported at login
    pub hashed_mac: String,

    /// When this node was admitted
    pub connected_at: SystemTime,
}

impl Node {
    /// Creates a node record for a freshly admitted connection.
    pub fn new(name: String, remote_addr: SocketAddr, hashed_mac: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            remote_addr,
            hashed_mac,
            connected_at: SystemTime::now(),
        }
    }
}
