//! Node registry: the authoritative set of connected nodes.
//!
//! This module is the single source of truth for "who is here". Admission
//! delegates to the login validator, display names are made collision-free
//! before a node is registered, and delivery failures are folded back into
//! the node set as implicit disconnects.

pub mod node;
pub mod transport;

pub use node::{Node, NodeId};
pub use transport::NodeTransport;

use crate::identity;
use crate::login::{ConnectionAttempt, LoginValidator, LoginVerdict, RejectReason};
use crate::moderation::BanStore;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A node together with its outbound transport.
struct NodeEntry {
    node: Node,
    transport: Arc<dyn NodeTransport>,
}

/// Central registry for all connected nodes.
///
/// The node map is the one piece of state guarded by the registry's lock;
/// admission (name assignment + insert) happens under a single write guard
/// so a snapshot never observes a half-admitted node. Ban tables live in
/// the [`BanStore`] under their own locks.
pub struct NodeRegistry {
    /// Map of node ID to registered node and transport
    nodes: Arc<RwLock<HashMap<NodeId, NodeEntry>>>,

    /// Whether new login attempts are currently admitted
    accepting_connections: AtomicBool,

    /// Gatekeeper for incoming attempts
    validator: LoginValidator,

    /// Ban tables, shared with the moderation surface
    ban_store: Arc<BanStore>,

    /// Real name -> hashed MAC, retained after disconnect for moderation lookups
    macs: DashMap<String, String>,
}

impl NodeRegistry {
    /// Creates a registry that admits connections through the given validator.
    pub fn new(validator: LoginValidator, ban_store: Arc<BanStore>) -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
            accepting_connections: AtomicBool::new(true),
            validator,
            ban_store,
            macs: DashMap::new(),
        }
    }

    /// Toggles whether new login attempts are admitted.
    ///
    /// Existing connections are unaffected.
    pub fn set_accepting_connections(&self, accept: bool) {
        self.accepting_connections.store(accept, Ordering::SeqCst);
        info!(accepting = accept, "Connection gate updated");
    }

    /// Returns whether new connections are currently accepted.
    pub fn accepting_connections(&self) -> bool {
        self.accepting_connections.load(Ordering::SeqCst)
    }

    /// Validates and admits a connection attempt.
    ///
    /// On acceptance a collision-free display name is assigned, the node is
    /// registered, and the node record is returned. On rejection the
    /// transport is closed and no node is created.
    ///
    /// # Arguments
    ///
    /// * `transport` - Outbound half of the new connection
    /// * `remote_addr` - Peer address
    /// * `attempt` - Login material presented by the client
    pub async fn admit(
        &self,
        transport: Arc<dyn NodeTransport>,
        remote_addr: SocketAddr,
        attempt: ConnectionAttempt,
    ) -> Result<Node, RejectReason> {
        let accepting = self.accepting_connections();
        let name = match self.validator.validate(&attempt, accepting).await {
            LoginVerdict::Accepted { name } => name,
            LoginVerdict::Rejected(reason) => {
                warn!(ip = %attempt.ip, name = %attempt.name, %reason, "🚫 Connection rejected");
                transport.close(&reason.to_string()).await;
                return Err(reason);
            }
        };

        // Name assignment and insertion happen under one write guard so a
        // concurrent snapshot never sees a colliding or half-admitted node.
        let mut nodes = self.nodes.write().await;
        let existing: HashSet<String> = nodes.values().map(|e| e.node.name.clone()).collect();
        let assigned = identity::disambiguate(&name, &existing);
        let node = Node::new(assigned, remote_addr, attempt.hashed_mac.clone());
        self.macs
            .insert(identity::real_name(&node.name).to_string(), attempt.hashed_mac);
        nodes.insert(node.id, NodeEntry {
            node: node.clone(),
            transport,
        });
        drop(nodes);

        info!(name = %node.name, addr = %remote_addr, "🔗 Node admitted");
        Ok(node)
    }

    /// Removes a node and closes its transport.
    ///
    /// Removing an already-absent node is a no-op.
    pub async fn remove(&self, node_id: NodeId) {
        let entry = self.nodes.write().await.remove(&node_id);
        if let Some(entry) = entry {
            entry.transport.close("removed from server").await;
            info!(name = %entry.node.name, "❌ Node removed");
        }
    }

    /// Delivers a message to every currently-registered node.
    ///
    /// A node whose transport has died is removed implicitly; no error is
    /// surfaced for a race with disconnect.
    pub async fn broadcast(&self, message: &[u8]) {
        let targets: Vec<(NodeId, Arc<dyn NodeTransport>)> = {
            let nodes = self.nodes.read().await;
            nodes
                .iter()
                .map(|(id, e)| (*id, e.transport.clone()))
                .collect()
        };

        for (id, transport) in targets {
            if let Err(e) = transport.deliver(message).await {
                warn!(node_id = %id, error = %e, "Delivery failed, dropping node");
                self.remove(id).await;
            }
        }
    }

    /// Delivers a message to one node.
    ///
    /// A missing or concurrently-removed node simply does not receive the
    /// message; a dead transport triggers an implicit remove.
    pub async fn send(&self, node_id: NodeId, message: &[u8]) {
        let transport = {
            let nodes = self.nodes.read().await;
            nodes.get(&node_id).map(|e| e.transport.clone())
        };
        if let Some(transport) = transport {
            if let Err(e) = transport.deliver(message).await {
                warn!(node_id = %node_id, error = %e, "Delivery failed, dropping node");
                self.remove(node_id).await;
            }
        }
    }

    /// Returns a point-in-time snapshot of the registered nodes.
    ///
    /// The snapshot is not kept current across concurrent admits/removals.
    pub async fn list_nodes(&self) -> Vec<Node> {
        let nodes = self.nodes.read().await;
        nodes.values().map(|e| e.node.clone()).collect()
    }

    /// Returns the number of registered nodes.
    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// Returns the hashed MAC address recorded for a display name, if known.
    ///
    /// The name may carry a disambiguation suffix; lookup uses the real name.
    pub fn player_mac(&self, name: &str) -> Option<String> {
        self.macs
            .get(identity::real_name(name))
            .map(|mac| mac.clone())
    }

    /// Records an IP ban and disconnects any matching connected nodes.
    pub async fn notify_ip_ban(&self, ip: &str, expiry: Option<SystemTime>) {
        self.ban_store.ban_ip(ip, expiry).await;
        let matching: Vec<NodeId> = {
            let nodes = self.nodes.read().await;
            nodes
                .values()
                .filter(|e| e.node.remote_addr.ip().to_string() == ip)
                .map(|e| e.node.id)
                .collect()
        };
        for id in matching {
            self.remove(id).await;
        }
    }

    /// Records a hashed-MAC ban and disconnects any matching connected nodes.
    pub async fn notify_mac_ban(&self, hashed_mac: &str, expiry: Option<SystemTime>) {
        self.ban_store.ban_mac(hashed_mac, expiry).await;
        let matching: Vec<NodeId> = {
            let nodes = self.nodes.read().await;
            nodes
                .values()
                .filter(|e| e.node.hashed_mac == hashed_mac)
                .map(|e| e.node.id)
                .collect()
        };
        for id in matching {
            self.remove(id).await;
        }
    }

    /// Shared ban store, exposed for the outward moderation surface.
    pub fn ban_store(&self) -> Arc<BanStore> {
        self.ban_store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::transport::testing::RecordingTransport;
    use super::*;
    use crate::login::SharedPasswordVerifier;
    use std::time::Duration;

    fn registry() -> Arc<NodeRegistry> {
        let bans = Arc::new(BanStore::new());
        let validator = LoginValidator::new(
            bans.clone(),
            Arc::new(SharedPasswordVerifier::default()),
        );
        Arc::new(NodeRegistry::new(validator, bans))
    }

    fn attempt(name: &str, ip: &str) -> ConnectionAttempt {
        ConnectionAttempt {
            name: name.to_string(),
            credentials: String::new(),
            ip: ip.to_string(),
            hashed_mac: format!("$1$MH${name}"),
        }
    }

    fn addr(ip: &str, port: u16) -> SocketAddr {
        format!("{ip}:{port}").parse().unwrap()
    }

    #[tokio::test]
    async fn admit_registers_node_with_requested_name() {
        let registry = registry();
        let node = registry
            .admit(
                RecordingTransport::new(),
                addr("127.0.0.1", 40001),
                attempt("Alice", "127.0.0.1"),
            )
            .await
            .unwrap();

        assert_eq!(node.name, "Alice");
        assert_eq!(registry.node_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_logins_get_suffixed_names() {
        let registry = registry();
        for expected in ["Alice", "Alice (1)", "Alice (2)"] {
            let node = registry
                .admit(
                    RecordingTransport::new(),
                    addr("127.0.0.1", 40002),
                    attempt("Alice", "127.0.0.1"),
                )
                .await
                .unwrap();
            assert_eq!(node.name, expected);
        }
    }

    #[tokio::test]
    async fn banned_ip_is_rejected_and_no_node_created() {
        let registry = registry();
        registry
            .ban_store()
            .ban_ip(
                "203.0.113.5",
                Some(SystemTime::now() + Duration::from_secs(3600)),
            )
            .await;

        let transport = RecordingTransport::new();
        let result = registry
            .admit(
                transport.clone(),
                addr("203.0.113.5", 40003),
                attempt("Mallory", "203.0.113.5"),
            )
            .await;

        assert_eq!(result.unwrap_err(), RejectReason::IpBanned);
        assert_eq!(registry.node_count().await, 0);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn closed_registry_rejects_new_logins_only() {
        let registry = registry();
        let node = registry
            .admit(
                RecordingTransport::new(),
                addr("127.0.0.1", 40004),
                attempt("Alice", "127.0.0.1"),
            )
            .await
            .unwrap();

        registry.set_accepting_connections(false);
        let result = registry
            .admit(
                RecordingTransport::new(),
                addr("127.0.0.1", 40005),
                attempt("Bob", "127.0.0.1"),
            )
            .await;

        assert_eq!(result.unwrap_err(), RejectReason::NotAcceptingConnections);
        // The existing node is unaffected.
        assert!(registry.list_nodes().await.iter().any(|n| n.id == node.id));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = registry();
        let node = registry
            .admit(
                RecordingTransport::new(),
                addr("127.0.0.1", 40006),
                attempt("Alice", "127.0.0.1"),
            )
            .await
            .unwrap();

        registry.remove(node.id).await;
        registry.remove(node.id).await;
        assert_eq!(registry.node_count().await, 0);
    }

    #[tokio::test]
    async fn dead_transport_becomes_implicit_remove_on_broadcast() {
        let registry = registry();
        let healthy = RecordingTransport::new();
        let dying = RecordingTransport::new();

        registry
            .admit(healthy.clone(), addr("127.0.0.1", 40007), attempt("Alice", "127.0.0.1"))
            .await
            .unwrap();
        registry
            .admit(dying.clone(), addr("127.0.0.1", 40008), attempt("Bob", "127.0.0.1"))
            .await
            .unwrap();

        dying.mark_dead();
        registry.broadcast(b"round started").await;

        assert_eq!(healthy.delivered_count().await, 1);
        assert_eq!(registry.node_count().await, 1);
    }

    #[tokio::test]
    async fn mac_lookup_uses_real_name() {
        let registry = registry();
        registry
            .admit(RecordingTransport::new(), addr("127.0.0.1", 40009), attempt("Alice", "127.0.0.1"))
            .await
            .unwrap();
        let second = registry
            .admit(RecordingTransport::new(), addr("127.0.0.1", 40010), attempt("Alice", "127.0.0.1"))
            .await
            .unwrap();

        assert_eq!(second.name, "Alice (1)");
        assert_eq!(
            registry.player_mac(&second.name),
            Some("$1$MH$Alice".to_string())
        );
        assert_eq!(registry.player_mac("Nobody"), None);
    }

    #[tokio::test]
    async fn mac_ban_notification_disconnects_offender() {
        let registry = registry();
        let transport = RecordingTransport::new();
        let node = registry
            .admit(transport.clone(), addr("127.0.0.1", 40011), attempt("Mallory", "127.0.0.1"))
            .await
            .unwrap();

        registry.notify_mac_ban(&node.hashed_mac, None).await;

        assert_eq!(registry.node_count().await, 0);
        assert!(transport.is_closed());
        assert!(registry.ban_store().is_mac_banned(&node.hashed_mac).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn snapshot_is_consistent_under_concurrent_admit_and_remove() {
        let registry = registry();
        let existing = registry
            .admit(RecordingTransport::new(), addr("127.0.0.1", 40012), attempt("Old", "127.0.0.1"))
            .await
            .unwrap();

        let admit_registry = registry.clone();
        let admit = tokio::spawn(async move {
            admit_registry
                .admit(RecordingTransport::new(), addr("127.0.0.1", 40013), attempt("New", "127.0.0.1"))
                .await
                .unwrap()
        });
        let remove_registry = registry.clone();
        let remove = tokio::spawn(async move {
            remove_registry.remove(existing.id).await;
        });

        let new_node = admit.await.unwrap();
        remove.await.unwrap();

        // Both operations fully completed before this snapshot: it must
        // contain the admitted node and not the removed one.
        let snapshot = registry.list_nodes().await;
        assert!(snapshot.iter().any(|n| n.id == new_node.id));
        assert!(!snapshot.iter().any(|n| n.id == existing.id));
    }
}
