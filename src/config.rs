use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use dirs::config_dir;
use log::LevelFilter;
use serde::Deserialize;

use crate::model::ViewContext;
use crate::rates::Smoothing;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub poll_interval: Duration,
    pub log_level: LevelFilter,
    pub keychain_timeout: Duration,
    pub smoothing: Smoothing,
    pub bindings: Vec<KeyBinding>,
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub verify_ssl: bool,
    pub user_agent: String,
    pub url: Option<String>,
}

impl RpcConfig {
    pub fn endpoint(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let mut path = self.path.clone();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, path)
    }
}

/// One keychain binding: an ordered key sequence and the command it runs,
/// scoped to a view.
#[derive(Debug, Clone)]
pub struct KeyBinding {
    pub context: ViewContext,
    pub keys: Vec<String>,
    pub command: String,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Torrent daemon terminal dashboard", long_about = None)]
pub struct Cli {
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub path: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub timeout: Option<f64>,
    #[arg(long)]
    pub poll_interval: Option<f64>,
    /// Seconds before a partially entered key sequence is abandoned.
    #[arg(long)]
    pub keychain_timeout: Option<f64>,
    #[arg(long, action = ArgAction::SetTrue)]
    pub tls: bool,
    #[arg(long = "no-tls", action = ArgAction::SetTrue)]
    pub no_tls: bool,
    #[arg(long)]
    pub insecure: bool,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    rpc: Option<FileRpcConfig>,
    poll_interval: Option<f64>,
    log_level: Option<String>,
    keychain_timeout: Option<f64>,
    rates: Option<FileRatesConfig>,
    /// `[keys.<view>]` tables: `"g g" = "focus first"`.
    #[serde(default)]
    keys: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct FileRpcConfig {
    url: Option<String>,
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<f64>,
    tls: Option<bool>,
    verify_ssl: Option<bool>,
    user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileRatesConfig {
    alpha: Option<f64>,
    half_life: Option<f64>,
}

pub fn build_config(cli: &Cli) -> Result<AppConfig> {
    let file_config = load_file_config(cli.config.as_deref())?;
    let rpc_file = file_config.as_ref().and_then(|cfg| cfg.rpc.as_ref());

    let url = cli
        .url
        .clone()
        .or_else(|| env::var("TORTERM_URL").ok())
        .or_else(|| rpc_file.and_then(|cfg| cfg.url.clone()));

    let host = cli
        .host
        .clone()
        .or_else(|| env::var("TORTERM_HOST").ok())
        .or_else(|| rpc_file.and_then(|cfg| cfg.host.clone()))
        .unwrap_or_else(|| "localhost".to_string());

    let port = cli
        .port
        .or_else(|| env_var_parse("TORTERM_PORT"))
        .or_else(|| rpc_file.and_then(|cfg| cfg.port))
        .unwrap_or(9091);

    let path = cli
        .path
        .clone()
        .or_else(|| env::var("TORTERM_RPC_PATH").ok())
        .or_else(|| rpc_file.and_then(|cfg| cfg.path.clone()))
        .unwrap_or_else(|| "/transmission/rpc".to_string());

    let username = cli
        .username
        .clone()
        .or_else(|| env::var("TORTERM_USERNAME").ok())
        .or_else(|| rpc_file.and_then(|cfg| cfg.username.clone()));

    let password = cli
        .password
        .clone()
        .or_else(|| env::var("TORTERM_PASSWORD").ok())
        .or_else(|| rpc_file.and_then(|cfg| cfg.password.clone()));

    let timeout_secs = cli
        .timeout
        .or_else(|| env_float("TORTERM_TIMEOUT"))
        .or_else(|| rpc_file.and_then(|cfg| cfg.timeout))
        .unwrap_or(10.0);

    if timeout_secs <= 0.0 {
        anyhow::bail!("timeout must be positive");
    }

    let poll_secs = cli
        .poll_interval
        .or_else(|| env_float("TORTERM_POLL_INTERVAL"))
        .or_else(|| file_config.as_ref().and_then(|cfg| cfg.poll_interval))
        .unwrap_or(3.0);

    if poll_secs < 0.0 {
        anyhow::bail!("poll interval cannot be negative");
    }

    let keychain_secs = cli
        .keychain_timeout
        .or_else(|| env_float("TORTERM_KEYCHAIN_TIMEOUT"))
        .or_else(|| file_config.as_ref().and_then(|cfg| cfg.keychain_timeout))
        .unwrap_or(2.0);

    if keychain_secs <= 0.0 {
        anyhow::bail!("keychain timeout must be positive");
    }

    let smoothing = build_smoothing(file_config.as_ref().and_then(|cfg| cfg.rates.as_ref()))?;

    let tls_flag = if cli.tls {
        Some(true)
    } else if cli.no_tls {
        Some(false)
    } else {
        None
    };

    let tls_env = env_bool("TORTERM_TLS");
    let use_tls = tls_flag
        .or(tls_env)
        .or_else(|| rpc_file.and_then(|cfg| cfg.tls))
        .unwrap_or(false);

    let verify_env = env_bool("TORTERM_VERIFY_SSL");
    let mut verify_ssl = rpc_file.and_then(|cfg| cfg.verify_ssl).unwrap_or(true);
    if let Some(value) = verify_env {
        verify_ssl = value;
    }
    if cli.insecure {
        verify_ssl = false;
    }

    let scheme = rpc_file
        .and_then(|cfg| cfg.scheme.clone())
        .unwrap_or_else(|| if use_tls { "https" } else { "http" }.to_string());

    let user_agent = env::var("TORTERM_USER_AGENT")
        .ok()
        .or_else(|| rpc_file.and_then(|cfg| cfg.user_agent.clone()))
        .unwrap_or_else(|| "torterm".to_string());

    let log_level_str = cli
        .log_level
        .clone()
        .or_else(|| env::var("TORTERM_LOG_LEVEL").ok())
        .or_else(|| file_config.as_ref().and_then(|cfg| cfg.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let log_level = LevelFilter::from_str(&log_level_str).unwrap_or(LevelFilter::Info);

    let mut bindings = default_bindings();
    if let Some(cfg) = &file_config {
        bindings.extend(file_bindings(&cfg.keys)?);
    }

    Ok(AppConfig {
        rpc: RpcConfig {
            scheme,
            host,
            port,
            path,
            username,
            password,
            timeout: Duration::from_secs_f64(timeout_secs),
            verify_ssl,
            user_agent,
            url,
        },
        poll_interval: Duration::from_secs_f64(poll_secs.max(0.0)),
        log_level,
        keychain_timeout: Duration::from_secs_f64(keychain_secs),
        smoothing,
        bindings,
    })
}

fn build_smoothing(rates: Option<&FileRatesConfig>) -> Result<Smoothing> {
    match rates {
        Some(FileRatesConfig {
            alpha: Some(_),
            half_life: Some(_),
        }) => anyhow::bail!("rates config must set either alpha or half_life, not both"),
        Some(FileRatesConfig {
            alpha: Some(alpha), ..
        }) => {
            if *alpha <= 0.0 || *alpha > 1.0 {
                anyhow::bail!("rates.alpha must be in (0, 1]");
            }
            Ok(Smoothing::Alpha(*alpha))
        }
        Some(FileRatesConfig {
            half_life: Some(half_life),
            ..
        }) => {
            if *half_life <= 0.0 {
                anyhow::bail!("rates.half_life must be positive");
            }
            Ok(Smoothing::HalfLife(Duration::from_secs_f64(*half_life)))
        }
        _ => Ok(Smoothing::HalfLife(Duration::from_secs(5))),
    }
}

/// Built-in bindings, registered before the config file's so user bindings
/// win on collision.
pub fn default_bindings() -> Vec<KeyBinding> {
    let mut bindings = Vec::new();
    let shared: &[(&str, &str)] = &[
        ("j", "focus next"),
        ("k", "focus prev"),
        ("down", "focus next"),
        ("up", "focus prev"),
        ("ctrl-d", "focus next 5"),
        ("ctrl-u", "focus prev 5"),
        ("g g", "focus first"),
        ("G", "focus last"),
        ("1", "tab torrents"),
        ("2", "tab peers"),
        ("3", "tab trackers"),
        ("4", "tab files"),
        ("m", "mark toggle"),
        ("M", "mark all"),
        ("u", "unmark"),
        ("U", "unmark all"),
        ("F", "filter clear"),
        ("/", r#"interactive expr:"Filter expression" -- filter {expr}"#),
        ("o", r#"interactive field:"Sort by field" -- sort {field}"#),
        ("R", "refresh"),
        ("?", "help"),
        ("q", "quit"),
    ];
    for context in ViewContext::ALL {
        for (keys, command) in shared {
            bindings.push(binding(context, keys, command));
        }
    }
    for (keys, command) in [
        ("p", "pause"),
        ("r", "resume"),
        ("d d", "remove"),
        ("D", "remove --delete"),
        ("a", r#"interactive magnet:"Magnet link or URL" -- add {magnet}"#),
        ("A", "announce"),
    ] {
        bindings.push(binding(ViewContext::Torrents, keys, command));
    }
    for (keys, command) in [
        ("p h", "priority high"),
        ("p n", "priority normal"),
        ("p l", "priority low"),
    ] {
        bindings.push(binding(ViewContext::Files, keys, command));
    }
    bindings
}

fn binding(context: ViewContext, keys: &str, command: &str) -> KeyBinding {
    KeyBinding {
        context,
        keys: keys.split_whitespace().map(str::to_string).collect(),
        command: command.to_string(),
    }
}

fn file_bindings(
    tables: &HashMap<String, HashMap<String, String>>,
) -> Result<Vec<KeyBinding>> {
    let mut bindings = Vec::new();
    for (view, table) in tables {
        let context = ViewContext::parse(view)
            .with_context(|| format!("unknown view {view:?} in [keys] config"))?;
        for (keys, command) in table {
            let keys: Vec<String> = keys.split_whitespace().map(str::to_string).collect();
            if keys.is_empty() {
                anyhow::bail!("empty key sequence bound to {command:?}");
            }
            bindings.push(KeyBinding {
                context,
                keys,
                command: command.clone(),
            });
        }
    }
    Ok(bindings)
}

fn load_file_config(path: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = path {
        return read_file_config(path);
    }

    if let Ok(env_path) = env::var("TORTERM_CONFIG") {
        return read_file_config(Path::new(&env_path));
    }

    if let Some(dir) = config_dir() {
        let modern_path = dir.join("torterm").join("config.toml");
        if let Some(cfg) = read_file_config(&modern_path)? {
            return Ok(Some(cfg));
        }

        let legacy_path = dir.join("torterm.toml");
        return read_file_config(&legacy_path);
    }

    Ok(None)
}

fn read_file_config(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let parsed: FileConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(Some(parsed))
}

fn env_var_parse<T>(name: &str) -> Option<T>
where
    T: FromStr,
{
    env::var(name).ok().and_then(|value| value.parse().ok())
}

fn env_float(name: &str) -> Option<f64> {
    env_var_parse(name)
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .and_then(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_tables_parse_into_bindings() {
        let parsed: FileConfig = toml::from_str(
            r#"
            keychain_timeout = 1.5

            [rates]
            alpha = 0.4

            [keys.torrents]
            "g t" = "focus first"
            "x" = "remove --delete"
            "#,
        )
        .unwrap();
        let bindings = file_bindings(&parsed.keys).unwrap();
        assert_eq!(bindings.len(), 2);
        let chained = bindings
            .iter()
            .find(|b| b.keys == vec!["g".to_string(), "t".to_string()])
            .unwrap();
        assert_eq!(chained.context, ViewContext::Torrents);
        assert_eq!(chained.command, "focus first");
        assert_eq!(parsed.keychain_timeout, Some(1.5));
    }

    #[test]
    fn unknown_view_in_key_table_is_rejected() {
        let parsed: FileConfig = toml::from_str(
            r#"
            [keys.sideways]
            "q" = "quit"
            "#,
        )
        .unwrap();
        assert!(file_bindings(&parsed.keys).is_err());
    }

    #[test]
    fn smoothing_requires_exactly_one_mode() {
        assert!(build_smoothing(Some(&FileRatesConfig {
            alpha: Some(0.5),
            half_life: Some(2.0),
        }))
        .is_err());
        assert!(build_smoothing(Some(&FileRatesConfig {
            alpha: Some(1.5),
            half_life: None,
        }))
        .is_err());
        assert!(matches!(
            build_smoothing(None).unwrap(),
            Smoothing::HalfLife(_)
        ));
    }

    #[test]
    fn default_bindings_cover_every_view() {
        let bindings = default_bindings();
        for context in ViewContext::ALL {
            assert!(bindings.iter().any(|b| b.context == context));
        }
        // The torrent view keeps its two-stage delete chain.
        assert!(bindings
            .iter()
            .any(|b| b.context == ViewContext::Torrents && b.keys == vec!["d", "d"]));
    }
}
