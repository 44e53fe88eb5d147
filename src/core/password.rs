//! Session Password (§4.7)
//!
//! Generated lazily on first read, memoized for the run, and passed in-band
//! to both producer and consumer pipelines. Deliberately has no `Display`
//! or `Debug` impl that exposes the value — logging code can only assert
//! its presence, never its contents.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::OnceLock;

const PASSWORD_LEN: usize = 32;

pub struct SessionPassword {
    value: OnceLock<String>,
}

impl SessionPassword {
    pub fn new() -> Self {
        Self {
            value: OnceLock::new(),
        }
    }

    /// Return the memoized password, generating it on first use.
    pub fn get(&self) -> &str {
        self.value.get_or_init(|| {
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(PASSWORD_LEN)
                .map(char::from)
                .collect()
        })
    }

    /// Whether the password has been generated yet, for logging ("password:
    /// <set>") without ever touching the value itself.
    pub fn is_set(&self) -> bool {
        self.value.get().is_some()
    }
}

impl Default for SessionPassword {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPassword")
            .field("set", &self.is_set())
            .finish()
    }
}
