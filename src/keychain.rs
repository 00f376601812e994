//! Multi-key sequences ("keychains") mapped to command strings, scoped by
//! view context. Each context holds a trie over key identifiers and at most
//! one pending partial match; an idle timeout silently resets the chain.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::warn;

use crate::model::ViewContext;

/// Outcome of feeding one keypress into a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Press {
    /// The key advanced a chain; more keys are expected.
    Pending,
    /// A full sequence matched; dispatch this command string.
    Dispatch(String),
    /// The key matched nothing. Any pending chain was aborted and the key is
    /// not reinterpreted as the start of a new chain.
    NoMatch,
}

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    command: Option<String>,
}

#[derive(Debug)]
struct PendingChain {
    path: Vec<String>,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct ContextMap {
    root: Node,
    pending: Option<PendingChain>,
}

#[derive(Debug)]
pub struct Keychain {
    timeout: Duration,
    contexts: HashMap<ViewContext, ContextMap>,
}

impl Keychain {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            contexts: HashMap::new(),
        }
    }

    /// Binds an ordered key sequence to a command string within a context.
    /// A binding that collides with a prefix or extension of an existing one
    /// replaces along its path; the later registration wins.
    pub fn register(&mut self, context: ViewContext, keys: &[&str], command: impl Into<String>) {
        assert!(!keys.is_empty(), "key sequence must not be empty");
        let mut node = &mut self.contexts.entry(context).or_default().root;
        for key in keys {
            if node.command.is_some() {
                warn!(
                    "keychain binding {:?} in {} shadows a shorter binding",
                    keys.join(" "),
                    context.label()
                );
                node.command = None;
            }
            node = node.children.entry((*key).to_string()).or_default();
        }
        if !node.children.is_empty() {
            warn!(
                "keychain binding {:?} in {} shadows longer bindings",
                keys.join(" "),
                context.label()
            );
            node.children.clear();
        }
        node.command = Some(command.into());
    }

    /// Feeds a keypress into the context's pending chain (starting one at the
    /// root if none exists). `now` drives the idle timeout.
    pub fn press(&mut self, context: ViewContext, key: &str, now: Instant) -> Press {
        let Some(map) = self.contexts.get_mut(&context) else {
            return Press::NoMatch;
        };

        // An expired chain is dropped silently before the key is interpreted,
        // so this key starts fresh from the root.
        if map
            .pending
            .as_ref()
            .is_some_and(|chain| now >= chain.deadline)
        {
            map.pending = None;
        }

        let mut path = map
            .pending
            .take()
            .map(|chain| chain.path)
            .unwrap_or_default();

        let mut node = &map.root;
        for step in &path {
            match node.children.get(step) {
                Some(child) => node = child,
                None => return Press::NoMatch,
            }
        }
        match node.children.get(key) {
            None => Press::NoMatch,
            Some(child) => {
                if let Some(command) = &child.command {
                    Press::Dispatch(command.clone())
                } else {
                    path.push(key.to_string());
                    map.pending = Some(PendingChain {
                        path,
                        deadline: now + self.timeout,
                    });
                    Press::Pending
                }
            }
        }
    }

    /// Drops pending chains whose idle deadline has passed. Returns true if
    /// any chain was dropped, so the caller can clear its pending-keys
    /// indicator. Not an error; a timeout is a silent reset.
    pub fn expire(&mut self, now: Instant) -> bool {
        let mut dropped = false;
        for map in self.contexts.values_mut() {
            if map
                .pending
                .as_ref()
                .is_some_and(|chain| now >= chain.deadline)
            {
                map.pending = None;
                dropped = true;
            }
        }
        dropped
    }

    /// The partial sequence currently collected in a context, for display.
    pub fn pending_keys(&self, context: ViewContext) -> Option<String> {
        self.contexts
            .get(&context)?
            .pending
            .as_ref()
            .map(|chain| chain.path.join(" "))
    }

    /// Drops the pending chain of one context (explicit abort key).
    pub fn abort(&mut self, context: ViewContext) {
        if let Some(map) = self.contexts.get_mut(&context) {
            map.pending = None;
        }
    }

    /// All registered bindings, for the help overlay.
    pub fn bindings(&self) -> Vec<(ViewContext, String, String)> {
        let mut out = Vec::new();
        for (context, map) in &self.contexts {
            collect(&map.root, &mut Vec::new(), *context, &mut out);
        }
        out.sort_by(|a, b| (a.0.label(), &a.1).cmp(&(b.0.label(), &b.1)));
        out
    }
}

fn collect(
    node: &Node,
    path: &mut Vec<String>,
    context: ViewContext,
    out: &mut Vec<(ViewContext, String, String)>,
) {
    if let Some(command) = &node.command {
        out.push((context, path.join(" "), command.clone()));
    }
    for (key, child) in &node.children {
        path.push(key.clone());
        collect(child, path, context, out);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: ViewContext = ViewContext::Torrents;

    fn chain() -> Keychain {
        let mut chain = Keychain::new(Duration::from_secs(2));
        chain.register(CTX, &["g", "g"], "focus first");
        chain.register(CTX, &["g", "t"], "tab torrents");
        chain.register(CTX, &["q"], "quit");
        chain.register(ViewContext::Peers, &["g", "g"], "focus first");
        chain
    }

    #[test]
    fn full_sequence_dispatches_and_resets() {
        let mut chain = chain();
        let t = Instant::now();
        assert_eq!(chain.press(CTX, "g", t), Press::Pending);
        assert_eq!(
            chain.press(CTX, "g", t),
            Press::Dispatch("focus first".into())
        );
        assert_eq!(chain.pending_keys(CTX), None);
    }

    #[test]
    fn single_key_binding_dispatches_immediately() {
        let mut chain = chain();
        assert_eq!(
            chain.press(CTX, "q", Instant::now()),
            Press::Dispatch("quit".into())
        );
    }

    #[test]
    fn failing_key_aborts_without_restarting_a_chain() {
        let mut chain = chain();
        let t = Instant::now();
        assert_eq!(chain.press(CTX, "g", t), Press::Pending);
        // 'q' is bound at the root but must not dispatch here.
        assert_eq!(chain.press(CTX, "q", t), Press::NoMatch);
        assert_eq!(chain.pending_keys(CTX), None);
        assert_eq!(chain.press(CTX, "q", t), Press::Dispatch("quit".into()));
    }

    #[test]
    fn idle_timeout_resets_then_a_fresh_sequence_dispatches() {
        let mut chain = chain();
        let t0 = Instant::now();
        assert_eq!(chain.press(CTX, "g", t0), Press::Pending);
        let late = t0 + Duration::from_secs(3);
        assert!(chain.expire(late));
        assert_eq!(chain.pending_keys(CTX), None);
        assert_eq!(chain.press(CTX, "g", late), Press::Pending);
        assert_eq!(
            chain.press(CTX, "t", late),
            Press::Dispatch("tab torrents".into())
        );
    }

    #[test]
    fn key_arriving_past_deadline_starts_a_fresh_chain() {
        let mut chain = chain();
        let t0 = Instant::now();
        assert_eq!(chain.press(CTX, "g", t0), Press::Pending);
        // No tick fired in between; the press itself notices the expiry.
        let late = t0 + Duration::from_secs(3);
        assert_eq!(chain.press(CTX, "g", late), Press::Pending);
        assert_eq!(chain.pending_keys(CTX).as_deref(), Some("g"));
    }

    #[test]
    fn each_keypress_reschedules_the_timeout() {
        let mut chain = Keychain::new(Duration::from_secs(2));
        chain.register(CTX, &["a", "b", "c"], "deep");
        let t0 = Instant::now();
        assert_eq!(chain.press(CTX, "a", t0), Press::Pending);
        let t1 = t0 + Duration::from_millis(1500);
        assert_eq!(chain.press(CTX, "b", t1), Press::Pending);
        // t0 + 2s has passed but the deadline moved with the second key.
        assert!(!chain.expire(t0 + Duration::from_secs(2)));
        assert_eq!(
            chain.press(CTX, "c", t1 + Duration::from_secs(1)),
            Press::Dispatch("deep".into())
        );
    }

    #[test]
    fn contexts_are_independent() {
        let mut chain = chain();
        let t = Instant::now();
        assert_eq!(chain.press(CTX, "g", t), Press::Pending);
        assert_eq!(chain.press(ViewContext::Peers, "g", t), Press::Pending);
        chain.abort(CTX);
        assert_eq!(chain.pending_keys(CTX), None);
        assert_eq!(chain.pending_keys(ViewContext::Peers).as_deref(), Some("g"));
    }

    #[test]
    fn later_registration_wins_on_prefix_collision() {
        let mut chain = Keychain::new(Duration::from_secs(2));
        chain.register(CTX, &["d", "d"], "remove");
        chain.register(CTX, &["d"], "noop");
        assert_eq!(
            chain.press(CTX, "d", Instant::now()),
            Press::Dispatch("noop".into())
        );
    }
}
