//! Ban storage for IP addresses and hashed MAC addresses.
//!
//! Bans are consulted synchronously on every connection attempt, so lookups
//! are plain keyed map reads. An absent expiry means a permanent ban.
//! Expired records are pruned lazily when a lookup touches them; they are
//! never resurrected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Store of active mini-bans keyed by subject string.
///
/// IP bans and hashed-MAC bans live in independent tables guarded by
/// independent locks, so recording a MAC ban never blocks an IP lookup
/// on the admission path.
#[derive(Debug, Default)]
pub struct BanStore {
    /// IP address -> optional expiry (None = permanent)
    ip_bans: Arc<RwLock<HashMap<String, Option<SystemTime>>>>,

    /// Hashed MAC address -> optional expiry (None = permanent)
    mac_bans: Arc<RwLock<HashMap<String, Option<SystemTime>>>>,
}

impl BanStore {
    /// Creates an empty ban store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an IP ban. Re-banning the same subject replaces the expiry.
    ///
    /// Blank subjects are rejected without mutating state.
    ///
    /// # Arguments
    ///
    /// * `ip` - The IP address to ban
    /// * `expiry` - When the ban lapses, or `None` for a permanent ban
    pub async fn ban_ip(&self, ip: &str, expiry: Option<SystemTime>) {
        if ip.trim().is_empty() {
            warn!("Ignoring IP ban with empty subject");
            return;
        }
        self.ip_bans.write().await.insert(ip.to_string(), expiry);
        info!(ip = %ip, permanent = expiry.is_none(), "🔨 IP banned");
    }

    /// Records a hashed-MAC ban. Re-banning the same subject replaces the expiry.
    ///
    /// Blank subjects are rejected without mutating state.
    pub async fn ban_mac(&self, hashed_mac: &str, expiry: Option<SystemTime>) {
        if hashed_mac.trim().is_empty() {
            warn!("Ignoring MAC ban with empty subject");
            return;
        }
        self.mac_bans
            .write()
            .await
            .insert(hashed_mac.to_string(), expiry);
        info!(mac = %hashed_mac, permanent = expiry.is_none(), "🔨 MAC banned");
    }

    /// Returns true if an active ban exists for the IP address.
    pub async fn is_ip_banned(&self, ip: &str) -> bool {
        Self::check(&self.ip_bans, ip).await
    }

    /// Returns true if an active ban exists for the hashed MAC address.
    pub async fn is_mac_banned(&self, hashed_mac: &str) -> bool {
        Self::check(&self.mac_bans, hashed_mac).await
    }

    /// Checks one table for an active ban, pruning the record if it has expired.
    async fn check(table: &RwLock<HashMap<String, Option<SystemTime>>>, subject: &str) -> bool {
        let now = SystemTime::now();
        let expired = {
            let bans = table.read().await;
            match bans.get(subject) {
                None => return false,
                Some(None) => return true,
                Some(Some(expiry)) if now < *expiry => return true,
                Some(Some(_)) => true,
            }
        };
        if expired {
            // Lazy prune; re-check in case the entry was replaced concurrently.
            let mut bans = table.write().await;
            if let Some(Some(expiry)) = bans.get(subject) {
                if now >= *expiry {
                    bans.remove(subject);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn ip_ban_active_until_expiry() {
        let store = BanStore::new();
        let ip = "203.0.113.7";

        store
            .ban_ip(ip, Some(SystemTime::now() + Duration::from_secs(3600)))
            .await;
        assert!(store.is_ip_banned(ip).await);
        assert!(!store.is_ip_banned("203.0.113.8").await);
    }

    #[tokio::test]
    async fn expired_ip_ban_is_inert() {
        let store = BanStore::new();
        let ip = "203.0.113.9";

        store
            .ban_ip(ip, Some(SystemTime::now() - Duration::from_secs(1)))
            .await;
        assert!(!store.is_ip_banned(ip).await);
        // The expired record was pruned, not resurrected
        assert!(!store.is_ip_banned(ip).await);
    }

    #[tokio::test]
    async fn permanent_mac_ban() {
        let store = BanStore::new();
        store.ban_mac("$1$AA$abcdef", None).await;
        assert!(store.is_mac_banned("$1$AA$abcdef").await);
    }

    #[tokio::test]
    async fn reban_replaces_expiry() {
        let store = BanStore::new();
        let ip = "198.51.100.4";

        store
            .ban_ip(ip, Some(SystemTime::now() - Duration::from_secs(1)))
            .await;
        store
            .ban_ip(ip, Some(SystemTime::now() + Duration::from_secs(60)))
            .await;
        assert!(store.is_ip_banned(ip).await);
    }

    #[tokio::test]
    async fn empty_subject_is_rejected() {
        let store = BanStore::new();
        store.ban_ip("", None).await;
        store.ban_mac("  ", None).await;
        assert!(!store.is_ip_banned("").await);
        assert!(!store.is_mac_banned("  ").await);
    }
}
