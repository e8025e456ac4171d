use std::collections::HashMap;

pub const SESSION_KEY: &str = "postcode-gallery.auth";
pub const SESSION_OK: &str = "ok";
pub const INCORRECT_PASSWORD: &str = "Incorrect password";

/// Session-scoped key/value store. Lives as long as the process, so the
/// unlocked flag never survives a restart.
#[derive(Debug, Default)]
pub struct SessionStore {
    values: HashMap<String, String>,
}

impl SessionStore {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Locked,
    Unlocked,
}

/// Password screen in front of the gallery.
#[derive(Debug)]
pub struct AuthGate {
    secret: String,
    state: GateState,
    input: String,
    error: Option<&'static str>,
    store: SessionStore,
}

impl AuthGate {
    pub fn new(secret: String, store: SessionStore) -> Self {
        let state = if store.get(SESSION_KEY) == Some(SESSION_OK) {
            GateState::Unlocked
        } else {
            GateState::Locked
        };
        Self {
            secret,
            state,
            input: String::new(),
            error: None,
            store,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    #[cfg(test)]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn push_char(&mut self, c: char) {
        if !c.is_control() {
            self.input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    /// Check the typed password. Retries are unlimited.
    pub fn submit(&mut self) -> bool {
        let attempt = std::mem::take(&mut self.input);
        if attempt == self.secret {
            self.store.set(SESSION_KEY, SESSION_OK);
            self.state = GateState::Unlocked;
            self.error = None;
            log::info!("gallery unlocked");
            true
        } else {
            self.error = Some(INCORRECT_PASSWORD);
            log::debug!("password rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(gate: &mut AuthGate, s: &str) {
        for c in s.chars() {
            gate.push_char(c);
        }
    }

    #[test]
    fn correct_secret_unlocks_and_persists() {
        let mut gate = AuthGate::new("Hunter2".into(), SessionStore::default());
        assert!(!gate.is_unlocked());
        type_str(&mut gate, "Hunter2");
        assert!(gate.submit());
        assert!(gate.is_unlocked());
        assert_eq!(gate.error(), None);
        assert_eq!(gate.store().get(SESSION_KEY), Some("ok"));
    }

    #[test]
    fn wrong_secret_shows_error_and_allows_retry() {
        let mut gate = AuthGate::new("Hunter2".into(), SessionStore::default());
        type_str(&mut gate, "hunter2");
        assert!(!gate.submit());
        assert_eq!(gate.error(), Some("Incorrect password"));
        assert!(!gate.is_unlocked());
        assert_eq!(gate.input(), "");

        for _ in 0..10 {
            type_str(&mut gate, "nope");
            assert!(!gate.submit());
        }
        type_str(&mut gate, "Hunter22");
        gate.backspace();
        assert!(gate.submit());
        assert_eq!(gate.error(), None);
    }

    #[test]
    fn existing_session_skips_gate() {
        let mut store = SessionStore::default();
        store.set(SESSION_KEY, SESSION_OK);
        assert!(AuthGate::new("x".into(), store).is_unlocked());

        let mut store = SessionStore::default();
        store.set(SESSION_KEY, "maybe");
        assert!(!AuthGate::new("x".into(), store).is_unlocked());
    }

    #[test]
    fn control_characters_are_ignored() {
        let mut gate = AuthGate::new("ab".into(), SessionStore::default());
        type_str(&mut gate, "a\u{8}\rb");
        assert_eq!(gate.input(), "ab");
    }
}
