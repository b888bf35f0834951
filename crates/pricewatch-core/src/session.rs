use std::fmt;

use serde::{Deserialize, Serialize};

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 7;

/// Opaque identifier scoping wake-ups to one process lifetime.
///
/// Formatted as `<epoch-ms>_<7 base36 chars>`; never contains `:` so it can be
/// embedded as the first segment of a wake-up name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh id for this process lifetime.
    pub fn generate() -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[fastrand::usize(..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self(format!("{}_{}", crate::models::now_ms(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate the id for this process and compare it with the last persisted one.
    pub fn detect(saved: Option<&SessionId>) -> SessionStart {
        let current = Self::generate();
        let is_new = saved != Some(&current);
        SessionStart { current, is_new }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Result of session detection at process start.
#[derive(Debug, Clone)]
pub struct SessionStart {
    pub current: SessionId,
    /// The process restarted since the last persisted session.
    pub is_new: bool,
}
