//! Login validation for incoming connection attempts.
//!
//! Every connection attempt passes through [`LoginValidator::validate`]
//! before a node is admitted. Checks run in a fixed order and the first
//! failing check short-circuits, which keeps the rejection logs and
//! metrics deterministic.

use crate::moderation::BanStore;
use async_trait::async_trait;
use std::sync::Arc;

/// An incoming connection attempt, as presented by the transport layer.
#[derive(Debug, Clone)]
pub struct ConnectionAttempt {
    /// Requested display name
    pub name: String,
    /// Opaque credential material (password or challenge response)
    pub credentials: String,
    /// Remote IP address as a string
    pub ip: String,
    /// Hashed MAC address reported by the client
    pub hashed_mac: String,
}

/// Why a connection attempt was rejected.
///
/// Variants are listed in the order they are checked; the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The attempt carried no usable name or credential material
    MalformedCredentials,
    /// The remote IP address is currently banned
    IpBanned,
    /// The reported hashed MAC address is currently banned
    MacBanned,
    /// Credentials did not verify against the configured strategy
    CredentialMismatch,
    /// The registry is not currently accepting new connections
    NotAcceptingConnections,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            RejectReason::MalformedCredentials => "malformed credentials",
            RejectReason::IpBanned => "your IP address is banned",
            RejectReason::MacBanned => "your MAC address is banned",
            RejectReason::CredentialMismatch => "invalid credentials",
            RejectReason::NotAcceptingConnections => "the server is not accepting connections",
        };
        f.write_str(msg)
    }
}

/// Outcome of validating a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginVerdict {
    /// Attempt accepted; carries the validated (pre-disambiguation) name
    Accepted { name: String },
    /// Attempt rejected; the caller closes the transport
    Rejected(RejectReason),
}

/// Strategy for verifying credential material.
///
/// The account service backing this check is an external collaborator;
/// tests substitute a fixed-outcome implementation.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Returns true if `credentials` verify for `name`.
    async fn verify(&self, name: &str, credentials: &str) -> bool;
}

/// Verifier backed by an optional shared server password.
///
/// With no password configured every well-formed attempt verifies, which
/// is the normal mode for an unattended automated host.
#[derive(Debug, Default)]
pub struct SharedPasswordVerifier {
    password: Option<String>,
}

impl SharedPasswordVerifier {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

#[async_trait]
impl CredentialVerifier for SharedPasswordVerifier {
    async fn verify(&self, _name: &str, credentials: &str) -> bool {
        match &self.password {
            Some(expected) => credentials == expected,
            None => true,
        }
    }
}

/// Validates connection attempts against bans and a credential strategy.
pub struct LoginValidator {
    ban_store: Arc<BanStore>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl LoginValidator {
    /// Creates a validator consulting the given ban store and verifier.
    pub fn new(ban_store: Arc<BanStore>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            ban_store,
            verifier,
        }
    }

    /// Validates a connection attempt.
    ///
    /// Checks run in order: malformed credentials, IP ban, MAC ban,
    /// credential mismatch, registry closed. The first failing check
    /// short-circuits; later checks are not evaluated.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The incoming connection attempt
    /// * `accepting_connections` - Whether the registry currently admits new nodes
    pub async fn validate(
        &self,
        attempt: &ConnectionAttempt,
        accepting_connections: bool,
    ) -> LoginVerdict {
        let name = attempt.name.trim();
        if name.is_empty() || name.chars().any(char::is_control) {
            return LoginVerdict::Rejected(RejectReason::MalformedCredentials);
        }
        if self.ban_store.is_ip_banned(&attempt.ip).await {
            return LoginVerdict::Rejected(RejectReason::IpBanned);
        }
        if self.ban_store.is_mac_banned(&attempt.hashed_mac).await {
            return LoginVerdict::Rejected(RejectReason::MacBanned);
        }
        if !self.verifier.verify(name, &attempt.credentials).await {
            return LoginVerdict::Rejected(RejectReason::CredentialMismatch);
        }
        if !accepting_connections {
            return LoginVerdict::Rejected(RejectReason::NotAcceptingConnections);
        }
        LoginVerdict::Accepted {
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn attempt(name: &str) -> ConnectionAttempt {
        ConnectionAttempt {
            name: name.to_string(),
            credentials: String::new(),
            ip: "203.0.113.1".to_string(),
            hashed_mac: "$1$MH$hashedmac".to_string(),
        }
    }

    fn open_validator() -> LoginValidator {
        LoginValidator::new(
            Arc::new(BanStore::new()),
            Arc::new(SharedPasswordVerifier::default()),
        )
    }

    #[tokio::test]
    async fn accepts_well_formed_attempt() {
        let verdict = open_validator().validate(&attempt("Alice"), true).await;
        assert_eq!(
            verdict,
            LoginVerdict::Accepted {
                name: "Alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn rejects_blank_name_as_malformed() {
        let verdict = open_validator().validate(&attempt("   "), true).await;
        assert_eq!(
            verdict,
            LoginVerdict::Rejected(RejectReason::MalformedCredentials)
        );
    }

    #[tokio::test]
    async fn banned_ip_short_circuits_before_credential_check() {
        let bans = Arc::new(BanStore::new());
        bans.ban_ip(
            "203.0.113.1",
            Some(SystemTime::now() + Duration::from_secs(3600)),
        )
        .await;
        // Password verifier would also fail, but the ban is checked first.
        let validator = LoginValidator::new(
            bans,
            Arc::new(SharedPasswordVerifier::new(Some("secret".to_string()))),
        );

        let verdict = validator.validate(&attempt("Alice"), true).await;
        assert_eq!(verdict, LoginVerdict::Rejected(RejectReason::IpBanned));
    }

    #[tokio::test]
    async fn banned_mac_is_rejected() {
        let bans = Arc::new(BanStore::new());
        bans.ban_mac("$1$MH$hashedmac", None).await;
        let validator =
            LoginValidator::new(bans, Arc::new(SharedPasswordVerifier::default()));

        let verdict = validator.validate(&attempt("Alice"), true).await;
        assert_eq!(verdict, LoginVerdict::Rejected(RejectReason::MacBanned));
    }

    #[tokio::test]
    async fn wrong_password_is_a_credential_mismatch() {
        let validator = LoginValidator::new(
            Arc::new(BanStore::new()),
            Arc::new(SharedPasswordVerifier::new(Some("secret".to_string()))),
        );

        let verdict = validator.validate(&attempt("Alice"), true).await;
        assert_eq!(
            verdict,
            LoginVerdict::Rejected(RejectReason::CredentialMismatch)
        );
    }

    #[tokio::test]
    async fn closed_registry_is_checked_last() {
        let verdict = open_validator().validate(&attempt("Alice"), false).await;
        assert_eq!(
            verdict,
            LoginVerdict::Rejected(RejectReason::NotAcceptingConnections)
        );
    }
}
