//! Interactive value collection for templated commands. A session walks
//! `Collecting → Ready → {Dispatched | Cancelled}`; no partial command ever
//! leaves a session.

use std::collections::HashMap;

use log::warn;

use crate::command::CommandError;
use crate::template::{self, PlaceholderSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Collecting,
    Ready,
    Dispatched,
    Cancelled,
}

#[derive(Debug)]
pub struct InteractiveSession {
    specs: Vec<PlaceholderSpec>,
    pending: Vec<String>,
    values: HashMap<String, String>,
    template: String,
    state: SessionState,
}

impl InteractiveSession {
    /// Builds a session for `template` with the declared specs. Every marker
    /// in the template must have a spec; a spec without a marker is accepted
    /// but logged, since its value would be collected and then unused.
    pub fn new(specs: Vec<PlaceholderSpec>, template: String) -> Result<Self, CommandError> {
        let markers = template::extract_placeholders(&template)?;
        for i in 1..specs.len() {
            if specs[..i].iter().any(|s| s.name == specs[i].name) {
                return Err(CommandError::Parse(format!(
                    "duplicate placeholder declaration {:?}",
                    specs[i].name
                )));
            }
        }
        for marker in &markers {
            if !specs.iter().any(|s| &s.name == marker) {
                return Err(CommandError::UnknownPlaceholder(marker.clone()));
            }
        }
        for spec in &specs {
            if !markers.contains(&spec.name) {
                warn!("placeholder {:?} is declared but never used", spec.name);
            }
        }
        let pending = specs.iter().map(|s| s.name.clone()).collect::<Vec<_>>();
        let mut session = Self {
            specs,
            pending,
            values: HashMap::new(),
            template,
            state: SessionState::Collecting,
        };
        session.settle();
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Name and prompt text of the next unfilled placeholder, in declaration
    /// order.
    pub fn current_prompt(&self) -> Option<(&str, &str)> {
        let name = self.pending.first()?;
        let spec = self.specs.iter().find(|s| &s.name == name)?;
        Some((&spec.name, &spec.prompt))
    }

    /// Submits a value for the next pending placeholder.
    pub fn submit_current(&mut self, value: &str) -> Result<(), CommandError> {
        let name = self
            .pending
            .first()
            .cloned()
            .ok_or_else(|| CommandError::Validation("no value is being collected".into()))?;
        self.submit(&name, value)
    }

    /// Submits a value for a named placeholder; callers may fill placeholders
    /// out of declaration order. A rejected value leaves the session in
    /// `Collecting` with the placeholder still pending.
    pub fn submit(&mut self, name: &str, value: &str) -> Result<(), CommandError> {
        if self.state != SessionState::Collecting {
            return Err(CommandError::Validation(
                "session is no longer collecting values".into(),
            ));
        }
        let spec = self
            .specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| CommandError::UnknownPlaceholder(name.to_string()))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(CommandError::Validation(format!(
                "a value for {name:?} is required"
            )));
        }
        if let Some(validator) = spec.validator {
            validator(value).map_err(CommandError::Validation)?;
        }
        self.values.insert(name.to_string(), value.to_string());
        self.pending.retain(|n| n != name);
        self.settle();
        Ok(())
    }

    fn settle(&mut self) {
        if self.state == SessionState::Collecting && self.pending.is_empty() {
            self.state = SessionState::Ready;
        }
    }

    /// Performs the substitution and hands out the completed command exactly
    /// once; the session transitions to `Dispatched`.
    pub fn take_command(&mut self) -> Result<String, CommandError> {
        if self.state != SessionState::Ready {
            return Err(CommandError::Validation(
                "session has unfilled placeholders".into(),
            ));
        }
        let line = template::substitute(&self.template, &self.values)?;
        self.state = SessionState::Dispatched;
        Ok(line)
    }

    /// Aborts collection; collected values are discarded. Terminal.
    pub fn cancel(&mut self) {
        if self.state == SessionState::Collecting {
            self.state = SessionState::Cancelled;
            self.values.clear();
            self.pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(pairs: &[(&str, &str)]) -> Vec<PlaceholderSpec> {
        pairs
            .iter()
            .map(|(name, prompt)| PlaceholderSpec::new(*name, *prompt))
            .collect()
    }

    #[test]
    fn ready_iff_all_placeholders_accepted_in_any_order() {
        let mut session = InteractiveSession::new(
            specs(&[("src", "Source"), ("dest", "Destination")]),
            "mv {src} {dest}".into(),
        )
        .unwrap();
        assert_eq!(session.state(), SessionState::Collecting);
        session.submit("dest", "/archive").unwrap();
        assert_eq!(session.state(), SessionState::Collecting);
        session.submit("src", "/tmp/x").unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.take_command().unwrap(), "mv /tmp/x /archive");
        assert_eq!(session.state(), SessionState::Dispatched);
    }

    #[test]
    fn undeclared_marker_fails_at_construction() {
        let err =
            InteractiveSession::new(specs(&[("dest", "Destination")]), "mv {unknown}".into())
                .unwrap_err();
        assert!(matches!(err, CommandError::UnknownPlaceholder(name) if name == "unknown"));
    }

    #[test]
    fn empty_value_keeps_session_collecting_and_reprompts() {
        let mut session =
            InteractiveSession::new(specs(&[("dest", "Destination")]), "mv {dest}".into()).unwrap();
        assert!(session.submit_current("   ").is_err());
        assert_eq!(session.state(), SessionState::Collecting);
        assert_eq!(session.current_prompt(), Some(("dest", "Destination")));
        session.submit_current("/archive").unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn validator_rejection_keeps_placeholder_pending() {
        fn digits_only(value: &str) -> Result<(), String> {
            if value.chars().all(|c| c.is_ascii_digit()) {
                Ok(())
            } else {
                Err("expected a number".into())
            }
        }
        let mut spec = PlaceholderSpec::new("limit", "Limit");
        spec.validator = Some(digits_only);
        let mut session = InteractiveSession::new(vec![spec], "limit {limit}".into()).unwrap();
        assert!(matches!(
            session.submit("limit", "fast"),
            Err(CommandError::Validation(_))
        ));
        assert_eq!(session.state(), SessionState::Collecting);
        session.submit("limit", "100").unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn cancel_discards_values_and_is_terminal() {
        let mut session = InteractiveSession::new(
            specs(&[("src", "Source"), ("dest", "Destination")]),
            "mv {src} {dest}".into(),
        )
        .unwrap();
        session.submit("src", "/tmp/x").unwrap();
        session.cancel();
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(session.submit("dest", "/archive").is_err());
        assert!(session.take_command().is_err());
    }

    #[test]
    fn session_with_no_placeholders_is_ready_immediately() {
        let mut session = InteractiveSession::new(Vec::new(), "refresh".into()).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.take_command().unwrap(), "refresh");
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let err = InteractiveSession::new(
            specs(&[("dest", "One"), ("dest", "Two")]),
            "mv {dest}".into(),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::Parse(_)));
    }
}
