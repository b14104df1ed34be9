//! Chat moderation: participant descriptors, temporary mutes, word filtering.
//!
//! A [`ChatParticipant`] is derived once from an authenticated identity
//! record when a transport session attaches, and is immutable for the
//! session's lifetime. Mutes expire implicitly; there is no unmute record.

use crate::identity;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Identifier of a transport session carrying chat traffic.
pub type SessionId = Uuid;

/// Role carried by an authenticated identity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Moderator,
    Player,
    Anonymous,
}

/// Authenticated identity record, as produced by the account service.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    /// Display name, possibly carrying a disambiguation suffix
    pub username: String,
    /// Role assigned by the account service
    pub role: UserRole,
    /// Opaque chat identifier
    pub chat_id: Uuid,
}

/// Descriptor of one chat participant, fixed for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatParticipant {
    /// Real username, disambiguation suffix stripped
    pub username: String,
    /// True iff the identity's role is Admin or Moderator
    pub moderator: bool,
    /// Opaque chat identifier carried over from the identity record
    pub chat_id: Uuid,
}

/// Builds a participant descriptor from an identity record.
///
/// Pure construction: the moderator flag is derived from the role, the
/// username is reduced to its real (pre-suffix) form.
pub fn participant_from_identity(record: &IdentityRecord) -> ChatParticipant {
    ChatParticipant {
        username: identity::real_name(&record.username).to_string(),
        moderator: matches!(record.role, UserRole::Admin | UserRole::Moderator),
        chat_id: record.chat_id,
    }
}

/// Renders the remaining mute duration for display.
///
/// Whole minutes when at least 60 seconds remain, whole seconds otherwise,
/// singular forms for exactly one unit. Consumers display this string
/// verbatim, so the format is contractual.
pub fn format_remaining(now: SystemTime, expiry: SystemTime) -> String {
    let remaining = expiry.duration_since(now).unwrap_or_default();
    let secs = remaining.as_secs();
    if secs >= 60 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else if secs == 1 {
        "1 second".to_string()
    } else {
        format!("{secs} seconds")
    }
}

/// Tracks attached chat sessions and active mutes.
///
/// The word list is owned by the moderation tooling; this engine only
/// evaluates against whatever list it is handed.
pub struct ChatModerationEngine {
    /// Session -> participant derived at attach time
    participants: RwLock<HashMap<SessionId, ChatParticipant>>,

    /// Chat id -> mute expiry; expired entries are pruned lazily on lookup
    mutes: RwLock<HashMap<Uuid, SystemTime>>,

    /// Externally-maintained disallowed word list
    word_list: Arc<RwLock<Vec<String>>>,
}

impl ChatModerationEngine {
    /// Creates an engine evaluating against the given word list.
    pub fn new(word_list: Arc<RwLock<Vec<String>>>) -> Self {
        Self {
            participants: RwLock::new(HashMap::new()),
            mutes: RwLock::new(HashMap::new()),
            word_list,
        }
    }

    /// Attaches a transport session, deriving its participant descriptor.
    pub async fn attach(&self, session: SessionId, record: &IdentityRecord) -> ChatParticipant {
        let participant = participant_from_identity(record);
        self.participants
            .write()
            .await
            .insert(session, participant.clone());
        participant
    }

    /// Detaches a session, destroying its participant descriptor.
    pub async fn detach(&self, session: SessionId) {
        self.participants.write().await.remove(&session);
    }

    /// Returns the participant attached under the given session, if any.
    pub async fn participant(&self, session: SessionId) -> Option<ChatParticipant> {
        self.participants.read().await.get(&session).cloned()
    }

    /// Mutes a participant for the given duration.
    ///
    /// Replaces any prior mute for the same participant.
    pub async fn mute(&self, participant: &ChatParticipant, duration: Duration) {
        let expiry = SystemTime::now() + duration;
        self.mutes.write().await.insert(participant.chat_id, expiry);
        info!(username = %participant.username, ?duration, "🔇 Participant muted");
    }

    /// Returns true iff the participant is muted at `now`.
    ///
    /// Expired mutes are pruned when a lookup touches them.
    pub async fn is_muted(&self, participant: &ChatParticipant, now: SystemTime) -> bool {
        {
            let mutes = self.mutes.read().await;
            match mutes.get(&participant.chat_id) {
                None => return false,
                Some(expiry) if *expiry > now => return true,
                Some(_) => {}
            }
        }
        self.prune_expired(participant.chat_id, now).await;
        false
    }

    /// Returns the mute expiry for a participant, if an active mute exists.
    pub async fn mute_expiry(&self, participant: &ChatParticipant) -> Option<SystemTime> {
        let now = SystemTime::now();
        {
            let mutes = self.mutes.read().await;
            match mutes.get(&participant.chat_id) {
                None => return None,
                Some(expiry) if *expiry > now => return Some(*expiry),
                Some(_) => {}
            }
        }
        self.prune_expired(participant.chat_id, now).await;
        None
    }

    /// Drops a mute that has expired as of `now`.
    async fn prune_expired(&self, chat_id: Uuid, now: SystemTime) {
        // Lazy prune; re-check in case the mute was replaced concurrently.
        let mut mutes = self.mutes.write().await;
        if let Some(expiry) = mutes.get(&chat_id) {
            if *expiry <= now {
                mutes.remove(&chat_id);
            }
        }
    }

    /// Returns true if the text contains any disallowed word.
    ///
    /// Case-insensitive containment; an empty word list disallows nothing.
    pub async fn contains_disallowed(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        let words = self.word_list.read().await;
        words
            .iter()
            .any(|word| !word.is_empty() && lowered.contains(&word.to_lowercase()))
    }
}
