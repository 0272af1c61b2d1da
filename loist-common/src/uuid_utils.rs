//! UUID helpers shared by the RPC and HTTP surfaces.
//!
//! `get_audio_metadata`, `/embed/{id}` and `/oembed` all accept an id from
//! an untrusted caller and must reject anything that is not a canonical
//! lowercase 8-4-4-4-12 UUID, rather than relying on `Uuid::parse_str`'s more
//! permissive grammar (it also accepts uppercase hex, braces, and the
//! hyphen-less 32 character form).

use uuid::Uuid;

/// Generate a fresh v4 track identifier.
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a string as a canonical lowercase UUID.
///
/// Returns `None` for anything that is not exactly the 36-character
/// `8-4-4-4-12` lowercase hex form, even if `Uuid::parse_str` would accept
/// it (uppercase, braced, or compact hex).
pub fn parse_canonical(s: &str) -> Option<Uuid> {
    if s.len() != 36 || !s.bytes().all(|b| b.is_ascii_hexdigit() || b == b'-') {
        return None;
    }
    if s.as_bytes()[8] != b'-' || s.as_bytes()[13] != b'-' || s.as_bytes()[18] != b'-' || s.as_bytes()[23] != b'-' {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_uppercase()) {
        return None;
    }
    Uuid::parse_str(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_lowercase() {
        assert!(parse_canonical("550e8400-e29b-41d4-a716-446655440000").is_some());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(parse_canonical("550E8400-E29B-41D4-A716-446655440000").is_none());
    }

    #[test]
    fn rejects_hyphen_less() {
        assert!(parse_canonical("550e8400e29b41d4a716446655440000").is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_canonical("invalid-id").is_none());
    }
}
