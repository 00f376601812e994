//! Command registry: maps names and aliases to handlers, tokenizes command
//! lines, and builds interactive sessions for the `interactive` family.
//! Handlers mutate the view models through an explicit [`Views`] context; no
//! handler touches global state.

use thiserror::Error;

use crate::list::{FilterPredicate, ListModel, SortDirection};
use crate::model::{
    Entry, FileItem, PeerItem, Snapshot, TorrentItem, TrackerItem, ViewContext,
};
use crate::prompt::InteractiveSession;
use crate::template::PlaceholderSpec;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0} is not supported in the {1} view")]
    Unsupported(&'static str, &'static str),
    #[error("cancelled")]
    Cancelled,
}

/// What a successful dispatch asks the caller to do next.
#[derive(Debug)]
pub enum Outcome {
    /// Handler finished; show the message on the status line if present.
    Done(Option<String>),
    /// An interactive command wants values; drive the session, then dispatch
    /// the completed line.
    NeedsInput(InteractiveSession),
    /// Hand this to the RPC worker; its result re-enters as a loop event.
    Rpc(RpcAction),
    /// Open the help overlay.
    Help,
    /// Leave the event loop.
    Quit,
}

/// Backend work queued by handlers. Mirrors what the RPC worker can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcAction {
    Refresh,
    AddMagnet(String),
    Remove { ids: Vec<i64>, delete_data: bool },
    Resume { ids: Vec<i64> },
    Pause { ids: Vec<i64> },
    Announce { ids: Vec<i64> },
    SetFilePriority {
        torrent_id: i64,
        indices: Vec<i64>,
        priority: i64,
    },
}

/// The explicit dispatch context: one list model per view plus the focused
/// view. Owned by the event loop and passed into every dispatch call.
pub struct Views {
    pub torrents: ListModel<TorrentItem>,
    pub peers: ListModel<PeerItem>,
    pub trackers: ListModel<TrackerItem>,
    pub files: ListModel<FileItem>,
    pub active: ViewContext,
}

impl Default for Views {
    fn default() -> Self {
        Self::new()
    }
}

impl Views {
    pub fn new() -> Self {
        Self {
            torrents: ListModel::new(),
            peers: ListModel::new(),
            trackers: ListModel::new(),
            files: ListModel::new(),
            active: ViewContext::Torrents,
        }
    }

    /// Distributes a backend snapshot across the four view models. Marks and
    /// focus survive per id; the peer/tracker/file lists are flattened over
    /// all torrents.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        let mut peers = Vec::new();
        let mut trackers = Vec::new();
        let mut files = Vec::new();
        for torrent in &snapshot.torrents {
            peers.extend(torrent.peers.iter().cloned());
            trackers.extend(torrent.trackers.iter().cloned());
            files.extend(torrent.files.iter().cloned());
        }
        self.torrents.replace_items(snapshot.torrents.clone());
        self.peers.replace_items(peers);
        self.trackers.replace_items(trackers);
        self.files.replace_items(files);
    }

    /// Torrent ids a backend command acts on: the marked set when non-empty,
    /// otherwise the focused torrent.
    pub fn target_torrents(&self) -> Vec<i64> {
        let marked = self.torrents.marked_ids();
        if !marked.is_empty() {
            return marked;
        }
        self.torrents.focused_id().into_iter().collect()
    }
}

/// Runs `$body` with `$m` bound to the active view's list model. The body is
/// type-checked once per view, so only `Entry`-generic operations fit here.
macro_rules! with_active {
    ($views:expr, $m:ident => $body:expr) => {
        match $views.active {
            ViewContext::Torrents => {
                let $m = &mut $views.torrents;
                $body
            }
            ViewContext::Peers => {
                let $m = &mut $views.peers;
                $body
            }
            ViewContext::Trackers => {
                let $m = &mut $views.trackers;
                $body
            }
            ViewContext::Files => {
                let $m = &mut $views.files;
                $body
            }
        }
    };
}

type Handler = fn(&mut Views, &[String]) -> Result<Outcome, CommandError>;

pub struct CommandDef {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub description: &'static str,
    handler: Handler,
}

pub struct CommandRegistry {
    commands: Vec<CommandDef>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: builtin_commands(),
        }
    }

    pub fn commands(&self) -> &[CommandDef] {
        &self.commands
    }

    fn resolve(&self, name: &str) -> Option<&CommandDef> {
        self.commands
            .iter()
            .find(|def| def.name == name || def.aliases.contains(&name))
    }

    /// Tokenizes the line, resolves the leading token and invokes its
    /// handler. Errors are returned as values; nothing here terminates the
    /// event loop.
    pub fn dispatch(&self, line: &str, views: &mut Views) -> Result<Outcome, CommandError> {
        let tokens = tokenize(line)?;
        let Some((name, args)) = tokens.split_first() else {
            return Ok(Outcome::Done(None));
        };
        let def = self
            .resolve(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.clone()))?;
        (def.handler)(views, args)
    }
}

/// Whitespace tokenizer honouring double quotes, so prompts and filter
/// values may contain spaces.
pub fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_quotes {
        return Err(CommandError::Parse(format!(
            "unterminated quote in {line:?}"
        )));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn builtin_commands() -> Vec<CommandDef> {
    vec![
        CommandDef {
            name: "sort",
            aliases: &["s"],
            usage: "sort <field> [asc|desc] | sort reset",
            description: "Make a field the primary sort key",
            handler: cmd_sort,
        },
        CommandDef {
            name: "filter",
            aliases: &["f"],
            usage: "filter <field><op><value> | filter rm <index> | filter clear",
            description: "Add, remove or clear filter predicates",
            handler: cmd_filter,
        },
        CommandDef {
            name: "mark",
            aliases: &[],
            usage: "mark [all|toggle|where <expr>]",
            description: "Mark the focused item, all items, or a match set",
            handler: cmd_mark,
        },
        CommandDef {
            name: "unmark",
            aliases: &[],
            usage: "unmark [all|where <expr>]",
            description: "Unmark the focused item, all items, or a match set",
            handler: cmd_unmark,
        },
        CommandDef {
            name: "tab",
            aliases: &["view"],
            usage: "tab <torrents|peers|trackers|files>",
            description: "Switch the focused view",
            handler: cmd_tab,
        },
        CommandDef {
            name: "focus",
            aliases: &[],
            usage: "focus <next|prev|first|last> [count]",
            description: "Move the focus within the visible list",
            handler: cmd_focus,
        },
        CommandDef {
            name: "add",
            aliases: &[],
            usage: "add <magnet-or-url>",
            description: "Queue a magnet link or torrent URL",
            handler: cmd_add,
        },
        CommandDef {
            name: "pause",
            aliases: &["stop"],
            usage: "pause",
            description: "Pause the marked or focused torrents",
            handler: cmd_pause,
        },
        CommandDef {
            name: "resume",
            aliases: &["start"],
            usage: "resume",
            description: "Resume the marked or focused torrents",
            handler: cmd_resume,
        },
        CommandDef {
            name: "remove",
            aliases: &["rm"],
            usage: "remove [--delete]",
            description: "Remove the marked or focused torrents",
            handler: cmd_remove,
        },
        CommandDef {
            name: "announce",
            aliases: &["an"],
            usage: "announce",
            description: "Re-announce the marked or focused torrents to their trackers",
            handler: cmd_announce,
        },
        CommandDef {
            name: "priority",
            aliases: &["prio"],
            usage: "priority <low|normal|high>",
            description: "Set the download priority of the marked or focused files",
            handler: cmd_priority,
        },
        CommandDef {
            name: "refresh",
            aliases: &[],
            usage: "refresh",
            description: "Fetch a fresh snapshot from the daemon",
            handler: cmd_refresh,
        },
        CommandDef {
            name: "interactive",
            aliases: &["ask"],
            usage: "interactive name:prompt [name:prompt ...] -- <template>",
            description: "Collect values for {name} placeholders, then run the template",
            handler: cmd_interactive,
        },
        CommandDef {
            name: "help",
            aliases: &["?"],
            usage: "help",
            description: "Show key bindings and commands",
            handler: |_, _| Ok(Outcome::Help),
        },
        CommandDef {
            name: "quit",
            aliases: &["q", "exit"],
            usage: "quit",
            description: "Quit",
            handler: |_, _| Ok(Outcome::Quit),
        },
    ]
}

fn cmd_sort(views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    match args {
        [] => Err(CommandError::Parse("sort needs a field name".into())),
        [reset] if reset == "reset" => {
            with_active!(views, m => m.clear_sort());
            Ok(Outcome::Done(Some("sort order reset".into())))
        }
        [field] => {
            with_active!(views, m => m.set_sort(field, SortDirection::Ascending))?;
            Ok(Outcome::Done(Some(format!("sorting by {field}"))))
        }
        [field, dir] => {
            let direction = SortDirection::parse(dir)?;
            with_active!(views, m => m.set_sort(field, direction))?;
            Ok(Outcome::Done(Some(format!("sorting by {field} {dir}"))))
        }
        _ => Err(CommandError::Parse(
            "sort takes a field and an optional direction".into(),
        )),
    }
}

fn cmd_filter(views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    match args {
        [] => Err(CommandError::Parse("filter needs an expression".into())),
        [clear] if clear == "clear" => {
            with_active!(views, m => m.clear_filters());
            Ok(Outcome::Done(Some("filters cleared".into())))
        }
        [rm, index] if rm == "rm" => {
            let index: usize = index
                .parse()
                .map_err(|_| CommandError::Parse(format!("bad filter index {index:?}")))?;
            with_active!(views, m => m.remove_filter(index))?;
            Ok(Outcome::Done(Some(format!("removed filter {index}"))))
        }
        [expr] => {
            let described = with_active!(views, m => {
                let predicate = parse_predicate(views.active, expr)?;
                let described = predicate.describe();
                m.add_filter(predicate);
                described
            });
            Ok(Outcome::Done(Some(format!("filtering on {described}"))))
        }
        _ => Err(CommandError::Parse(
            "filter takes one expression (quote values with spaces)".into(),
        )),
    }
}

fn parse_predicate(context: ViewContext, expr: &str) -> Result<FilterPredicate, CommandError> {
    match context {
        ViewContext::Torrents => FilterPredicate::parse(expr, TorrentItem::FIELDS),
        ViewContext::Peers => FilterPredicate::parse(expr, PeerItem::FIELDS),
        ViewContext::Trackers => FilterPredicate::parse(expr, TrackerItem::FIELDS),
        ViewContext::Files => FilterPredicate::parse(expr, FileItem::FIELDS),
    }
}

fn cmd_mark(views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    match args {
        [] => with_active!(views, m => {
            match m.focused_id() {
                Some(id) => {
                    m.mark(&[id]);
                    Ok(Outcome::Done(None))
                }
                None => Err(CommandError::Validation("nothing is focused".into())),
            }
        }),
        [all] if all == "all" => {
            with_active!(views, m => m.mark_all());
            Ok(Outcome::Done(None))
        }
        [toggle] if toggle == "toggle" => with_active!(views, m => {
            match m.focused_id() {
                Some(id) => {
                    m.toggle_mark(id);
                    Ok(Outcome::Done(None))
                }
                None => Err(CommandError::Validation("nothing is focused".into())),
            }
        }),
        [kw, expr] if kw == "where" => {
            let count = with_active!(views, m => {
                let predicate = parse_predicate(views.active, expr)?;
                m.mark_where(&predicate);
                m.marked_count()
            });
            Ok(Outcome::Done(Some(format!("{count} marked"))))
        }
        _ => Err(CommandError::Parse("usage: mark [all|toggle|where <expr>]".into())),
    }
}

fn cmd_unmark(views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    match args {
        [] => with_active!(views, m => {
            match m.focused_id() {
                Some(id) => {
                    m.unmark(&[id]);
                    Ok(Outcome::Done(None))
                }
                None => Err(CommandError::Validation("nothing is focused".into())),
            }
        }),
        [all] if all == "all" => {
            with_active!(views, m => m.clear_marks());
            Ok(Outcome::Done(None))
        }
        [kw, expr] if kw == "where" => {
            with_active!(views, m => {
                let predicate = parse_predicate(views.active, expr)?;
                m.unmark_where(&predicate);
            });
            Ok(Outcome::Done(None))
        }
        _ => Err(CommandError::Parse("usage: unmark [all|where <expr>]".into())),
    }
}

fn cmd_tab(views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    let [name] = args else {
        return Err(CommandError::Parse(
            "tab needs a view name (torrents, peers, trackers, files)".into(),
        ));
    };
    let context = ViewContext::parse(name)
        .ok_or_else(|| CommandError::Validation(format!("unknown view {name:?}")))?;
    views.active = context;
    Ok(Outcome::Done(None))
}

fn cmd_focus(views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    let (motion, count) = match args {
        [motion] => (motion.as_str(), 1isize),
        [motion, count] => {
            let count: isize = count
                .parse()
                .map_err(|_| CommandError::Parse(format!("bad count {count:?}")))?;
            (motion.as_str(), count)
        }
        _ => {
            return Err(CommandError::Parse(
                "usage: focus <next|prev|first|last> [count]".into(),
            ))
        }
    };
    with_active!(views, m => {
        match motion {
            "next" => m.focus_delta(count),
            "prev" => m.focus_delta(-count),
            "first" => m.focus_first(),
            "last" => m.focus_last(),
            other => {
                return Err(CommandError::Validation(format!(
                    "unknown focus motion {other:?}"
                )))
            }
        }
    });
    Ok(Outcome::Done(None))
}

fn cmd_add(_views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    let [magnet] = args else {
        return Err(CommandError::Parse("add needs a magnet link or URL".into()));
    };
    let magnet = magnet.trim();
    if magnet.is_empty() {
        return Err(CommandError::Validation("magnet link is empty".into()));
    }
    Ok(Outcome::Rpc(RpcAction::AddMagnet(magnet.to_string())))
}

fn target_ids(views: &Views, what: &'static str) -> Result<Vec<i64>, CommandError> {
    let ids = views.target_torrents();
    if ids.is_empty() {
        return Err(CommandError::Validation(format!(
            "{what}: no torrent is marked or focused"
        )));
    }
    Ok(ids)
}

fn cmd_pause(views: &mut Views, _args: &[String]) -> Result<Outcome, CommandError> {
    let ids = target_ids(views, "pause")?;
    Ok(Outcome::Rpc(RpcAction::Pause { ids }))
}

fn cmd_resume(views: &mut Views, _args: &[String]) -> Result<Outcome, CommandError> {
    let ids = target_ids(views, "resume")?;
    Ok(Outcome::Rpc(RpcAction::Resume { ids }))
}

fn cmd_remove(views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    let delete_data = match args {
        [] => false,
        [flag] if flag == "--delete" => true,
        _ => return Err(CommandError::Parse("usage: remove [--delete]".into())),
    };
    let ids = target_ids(views, "remove")?;
    Ok(Outcome::Rpc(RpcAction::Remove { ids, delete_data }))
}

fn cmd_announce(views: &mut Views, _args: &[String]) -> Result<Outcome, CommandError> {
    let ids = target_ids(views, "announce")?;
    Ok(Outcome::Rpc(RpcAction::Announce { ids }))
}

fn cmd_priority(views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    if views.active != ViewContext::Files {
        return Err(CommandError::Unsupported("priority", views.active.label()));
    }
    let [level] = args else {
        return Err(CommandError::Parse("usage: priority <low|normal|high>".into()));
    };
    let priority = match level.as_str() {
        "low" => -1,
        "normal" => 0,
        "high" => 1,
        other => {
            return Err(CommandError::Validation(format!(
                "priority must be low, normal or high, not {other:?}"
            )))
        }
    };
    let marked = views.files.marked_ids();
    let targets: Vec<i64> = if marked.is_empty() {
        views.files.focused_id().into_iter().collect()
    } else {
        marked
    };
    if targets.is_empty() {
        return Err(CommandError::Validation(
            "priority: no file is marked or focused".into(),
        ));
    }
    // All targets must belong to one torrent; the RPC sets priorities per
    // torrent and a mixed selection would partially apply.
    let torrent_id = file_torrent_id(views, targets[0])?;
    let mut indices = Vec::with_capacity(targets.len());
    for id in &targets {
        if file_torrent_id(views, *id)? != torrent_id {
            return Err(CommandError::Validation(
                "marked files span multiple torrents; narrow the selection".into(),
            ));
        }
        indices.push(id & 0xF_FFFF);
    }
    Ok(Outcome::Rpc(RpcAction::SetFilePriority {
        torrent_id,
        indices,
        priority,
    }))
}

fn file_torrent_id(views: &Views, file_id: i64) -> Result<i64, CommandError> {
    views
        .files
        .items()
        .iter()
        .find(|f| f.file_id == file_id)
        .map(|f| f.torrent_id)
        .ok_or_else(|| CommandError::Validation("file disappeared from the snapshot".into()))
}

fn cmd_refresh(_views: &mut Views, _args: &[String]) -> Result<Outcome, CommandError> {
    Ok(Outcome::Rpc(RpcAction::Refresh))
}

/// `interactive name1:prompt1 [name2:prompt2 ...] -- <template>`: builds the
/// placeholder specs and a collecting session; execution is deferred until
/// the session reaches `Ready`.
fn cmd_interactive(_views: &mut Views, args: &[String]) -> Result<Outcome, CommandError> {
    let separator = args.iter().position(|t| t == "--").ok_or_else(|| {
        CommandError::Parse("interactive needs a -- separator before the template".into())
    })?;
    let (pairs, rest) = args.split_at(separator);
    let template_tokens = &rest[1..];
    if pairs.is_empty() {
        return Err(CommandError::Parse(
            "interactive needs at least one name:prompt pair".into(),
        ));
    }
    if template_tokens.is_empty() {
        return Err(CommandError::Parse("interactive needs a template".into()));
    }
    let mut specs = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let (name, prompt) = pair.split_once(':').ok_or_else(|| {
            CommandError::Parse(format!("expected name:prompt, got {pair:?}"))
        })?;
        if name.is_empty() || prompt.is_empty() {
            return Err(CommandError::Parse(format!(
                "expected name:prompt, got {pair:?}"
            )));
        }
        specs.push(PlaceholderSpec::new(name, prompt));
    }
    let template = template_tokens.join(" ");
    let session = InteractiveSession::new(specs, template)?;
    Ok(Outcome::NeedsInput(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample_torrent;
    use crate::prompt::SessionState;

    fn views() -> Views {
        let mut views = Views::new();
        views.torrents.replace_items(vec![
            sample_torrent(1, "beta", 200),
            sample_torrent(2, "alpha", 100),
        ]);
        views
    }

    fn registry() -> CommandRegistry {
        CommandRegistry::new()
    }

    #[test]
    fn tokenizer_honours_quotes() {
        assert_eq!(
            tokenize(r#"interactive dest:"Destination dir" -- mv {dest}"#).unwrap(),
            vec![
                "interactive",
                "dest:Destination dir",
                "--",
                "mv",
                "{dest}"
            ]
        );
        assert!(matches!(
            tokenize(r#"add "unterminated"#),
            Err(CommandError::Parse(_))
        ));
    }

    #[test]
    fn unknown_command_is_reported_by_name() {
        let err = registry()
            .dispatch("frobnicate now", &mut views())
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownCommand(name) if name == "frobnicate"));
    }

    #[test]
    fn empty_line_is_a_no_op() {
        assert!(matches!(
            registry().dispatch("   ", &mut views()).unwrap(),
            Outcome::Done(None)
        ));
    }

    #[test]
    fn aliases_resolve_to_the_same_handler() {
        let mut views = views();
        let registry = registry();
        registry.dispatch("s name", &mut views).unwrap();
        assert_eq!(views.torrents.sort_stack()[0].field, "name");
        assert!(matches!(
            registry.dispatch("q", &mut views).unwrap(),
            Outcome::Quit
        ));
    }

    #[test]
    fn sort_and_filter_mutate_only_the_active_view() {
        let mut views = views();
        let registry = registry();
        registry.dispatch("sort size desc", &mut views).unwrap();
        registry.dispatch("filter name~alpha", &mut views).unwrap();
        assert_eq!(views.torrents.filters().len(), 1);
        assert!(views.peers.filters().is_empty());
        registry.dispatch("tab peers", &mut views).unwrap();
        assert_eq!(views.active, ViewContext::Peers);
        // Peer view has no "size" field.
        assert!(matches!(
            registry.dispatch("sort size", &mut views),
            Err(CommandError::Validation(_))
        ));
    }

    #[test]
    fn bad_sort_field_leaves_the_stack_untouched() {
        let mut views = views();
        let registry = registry();
        registry.dispatch("sort name", &mut views).unwrap();
        let _ = registry.dispatch("sort bogus", &mut views);
        assert_eq!(views.torrents.sort_stack().len(), 1);
    }

    #[test]
    fn rpc_commands_target_marked_then_focused() {
        let mut views = views();
        let registry = registry();
        registry.dispatch("focus first", &mut views).unwrap();
        match registry.dispatch("pause", &mut views).unwrap() {
            Outcome::Rpc(RpcAction::Pause { ids }) => assert_eq!(ids.len(), 1),
            other => panic!("expected pause action, got {other:?}"),
        }
        registry.dispatch("mark all", &mut views).unwrap();
        match registry.dispatch("resume", &mut views).unwrap() {
            Outcome::Rpc(RpcAction::Resume { ids }) => assert_eq!(ids, vec![1, 2]),
            other => panic!("expected resume action, got {other:?}"),
        }
        match registry.dispatch("remove --delete", &mut views).unwrap() {
            Outcome::Rpc(RpcAction::Remove { delete_data, .. }) => assert!(delete_data),
            other => panic!("expected remove action, got {other:?}"),
        }
    }

    #[test]
    fn priority_outside_the_files_view_is_unsupported() {
        let mut views = views();
        let err = registry()
            .dispatch("priority high", &mut views)
            .unwrap_err();
        assert!(matches!(err, CommandError::Unsupported("priority", _)));
    }

    #[test]
    fn interactive_builds_a_collecting_session() {
        let mut views = views();
        let outcome = registry()
            .dispatch(
                r#"interactive dest:"Destination" -- mv {dest}"#,
                &mut views,
            )
            .unwrap();
        let Outcome::NeedsInput(session) = outcome else {
            panic!("expected a session");
        };
        assert_eq!(session.state(), SessionState::Collecting);
        assert_eq!(session.current_prompt(), Some(("dest", "Destination")));
    }

    #[test]
    fn interactive_rejects_malformed_invocations() {
        let mut views = views();
        let registry = registry();
        assert!(matches!(
            registry.dispatch("interactive mv {dest}", &mut views),
            Err(CommandError::Parse(_))
        ));
        assert!(matches!(
            registry.dispatch("interactive dest -- mv {dest}", &mut views),
            Err(CommandError::Parse(_))
        ));
        assert!(matches!(
            registry.dispatch("interactive dest:Where -- mv {other}", &mut views),
            Err(CommandError::UnknownPlaceholder(_))
        ));
    }
}
