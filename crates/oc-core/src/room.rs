//! Shared room types: short-code generation and per-room idle policy
//! (spec.md §3, §4.C, §4.D). The live registry/reaper itself lives in
//! `oc-server::room_manager` — this crate only owns the pure, I/O-free
//! parts: the code alphabet and the timing constants.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const ROOM_CODE_LEN: usize = 4;
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A room self-terminates after this long without activity (spec.md §4.C).
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// The reaper sweeps the registry at this cadence (spec.md §4.D).
pub const REAP_INTERVAL: Duration = Duration::from_secs(2);
/// Deliberate pause between "question selected" and "question displayed"
/// in Only Connect (spec.md §5).
pub const SELECTION_PAUSE: Duration = Duration::from_millis(500);

/// Draw a random 4 uppercase ASCII letter code. Collision retry against the
/// live registry is the caller's responsibility (spec.md §4.D).
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Short codes are case-insensitive on lookup (spec.md §6); callers should
/// upcase before indexing into the registry.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.chars().all(|c| c.is_ascii_uppercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOptions {
    pub scoring: bool,
    pub audience: bool,
    pub teams: u8,
}

impl Default for RoomOptions {
    fn default() -> Self {
        RoomOptions {
            scoring: true,
            audience: false,
            teams: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(is_valid_room_code(&code), "{code} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(!is_valid_room_code("ab"));
        assert!(!is_valid_room_code("abcd"));
        assert!(!is_valid_room_code("ABCDE"));
        assert!(!is_valid_room_code("AB1D"));
    }
}
