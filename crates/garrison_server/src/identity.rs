//! Display-name disambiguation and real-name recovery.
//!
//! When the same user logs in more than once, the registry assigns a
//! `" (n)"` suffix so every connected node carries a unique display name.
//! The real (pre-suffix) name is recovered by truncating at the first
//! space character.

use std::collections::HashSet;

/// Returns a display name that does not collide with any name in `existing`.
///
/// If `candidate` is free it is returned unchanged. Otherwise the smallest
/// positive `n` is found such that `"<candidate> (n)"` is not taken.
///
/// # Arguments
///
/// * `candidate` - The requested display name
/// * `existing` - Names currently registered
pub fn disambiguate(candidate: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(candidate) {
        return candidate.to_string();
    }
    let mut n = 1u32;
    loop {
        let assigned = format!("{candidate} ({n})");
        if !existing.contains(&assigned) {
            return assigned;
        }
        n += 1;
    }
}

/// Recovers the real username from a possibly-suffixed display name.
///
/// Node display names may carry a `" (n)"` suffix when the same user is
/// logged in multiple times. Stripping at the first space yields the
/// original name. This is lossy when a real name itself contains a space;
/// that truncation is the documented contract and must not be "fixed"
/// here without changing every caller that relies on it.
pub fn real_name(assigned: &str) -> &str {
    match assigned.find(' ') {
        Some(idx) => &assigned[..idx],
        None => assigned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn disambiguate_returns_candidate_when_free() {
        assert_eq!(disambiguate("Alice", &names(&["Bob"])), "Alice");
        assert_eq!(disambiguate("Alice", &HashSet::new()), "Alice");
    }

    #[test]
    fn disambiguate_appends_smallest_free_suffix() {
        assert_eq!(disambiguate("Alice", &names(&["Alice"])), "Alice (1)");
        assert_eq!(
            disambiguate("Alice", &names(&["Alice", "Alice (1)"])),
            "Alice (2)"
        );
        // A hole in the suffix sequence is reused
        assert_eq!(
            disambiguate("Alice", &names(&["Alice", "Alice (2)"])),
            "Alice (1)"
        );
    }

    #[test]
    fn disambiguate_never_returns_existing_name() {
        let existing = names(&["Bot01", "Bot01 (1)", "Bot01 (2)", "Bot01 (3)"]);
        let assigned = disambiguate("Bot01", &existing);
        assert!(!existing.contains(&assigned));
    }

    #[test]
    fn real_name_round_trips_through_disambiguation() {
        let existing = names(&["Carol", "Carol (1)"]);
        let assigned = disambiguate("Carol", &existing);
        assert_eq!(real_name(&assigned), "Carol");
        assert_eq!(real_name("Carol"), "Carol");
    }

    #[test]
    fn real_name_truncates_at_first_space() {
        // Pins the documented lossy behavior for names containing a space.
        assert_eq!(real_name("Grand Admiral"), "Grand");
        assert_eq!(real_name("Alice (1)"), "Alice");
        assert_eq!(real_name("NoSpace"), "NoSpace");
    }
}
