//! Moderation subsystem: IP and hashed-MAC bans with time-based expiry.

pub mod ban_store;

pub use ban_store::BanStore;
