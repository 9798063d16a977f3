//! Invocation configuration.
//!
//! Command-line overrides, `ZENDESK_*` environment variables, the JSON config
//! file and built-in defaults are merged once into a [`ResolvedConfig`] that is
//! then passed by reference to every component.

pub mod file;
pub mod queues;

pub use queues::{
    ContractValidation, QueueAlias, QueueSelection, normalize_agent_path, resolve_queue_input,
    validate_contract,
};

use crate::paths::to_abs_path;
use crate::text::is_agent_path;
use crate::{Error, Result};
use file::Layers;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Map;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CDP_URL: &str = "http://127.0.0.1:9223";
pub const DEFAULT_PROFILE_DIR: &str = "./output/zendesk/chrome-profile";
pub const DEFAULT_START_PATH: &str = "/agent/filters";
pub const DEFAULT_UI_WAIT_MS: u64 = 1200;
pub const DEFAULT_STORE_ROOT: &str = "./output/zendesk";
pub const DEFAULT_PORT_SPAN: u64 = 10;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 120;

lazy_static! {
    static ref SCHEME: Regex = Regex::new(r"(?i)^https?://").unwrap();
}

/// Values given explicitly on the command line. `None` defers to lower layers.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub cdp_url: Option<String>,
    pub domain: Option<String>,
    pub start_path: Option<String>,
    pub profile_dir: Option<String>,
    pub store_root: Option<String>,
    pub ui_wait_ms: Option<u64>,
    pub cdp_port_span: Option<u64>,
    pub cache_ttl: Option<u64>,
    pub no_launch: Option<bool>,
    pub allow_shared_cdp: Option<bool>,
    pub no_auto_port: Option<bool>,
    pub foreground: Option<bool>,
    pub no_store: Option<bool>,
    pub no_cache: Option<bool>,
    pub cache_only: Option<bool>,
    pub json: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub cdp_url: String,
    /// Bare host, e.g. `acme.zendesk.com`. Empty when unknown.
    pub domain: String,
    pub start_path: String,
    /// `https://<domain><start_path>`, empty without a domain.
    pub start_url: String,
    pub profile_dir: PathBuf,
    pub store_root: PathBuf,
    pub ui_wait: Duration,
    pub no_launch: bool,
    pub allow_shared_cdp: bool,
    pub auto_port: bool,
    pub cdp_port_span: u16,
    pub background: bool,
    pub store: bool,
    pub cache: bool,
    pub cache_only: bool,
    pub cache_ttl: u64,
    pub json: bool,
    pub default_queue: String,
    pub queues: BTreeMap<String, QueueAlias>,
    pub config_path: Option<PathBuf>,
    pub repo_root: PathBuf,
    pub validation: ContractValidation,
}

/// Strip scheme, path and trailing slashes: `https://acme.zendesk.com/` → `acme.zendesk.com`.
pub fn normalize_domain(raw: &str) -> String {
    let stripped = SCHEME.replace(raw.trim(), "");
    let stripped = stripped.trim_end_matches('/');
    stripped.split('/').next().unwrap_or_default().to_string()
}

impl ResolvedConfig {
    /// Merge all layers. `env` holds the process environment (only `ZENDESK_*` keys are read).
    pub fn load(overrides: &Overrides, env: &HashMap<String, String>, cwd: &Path) -> Result<Self> {
        let config_path = file::discover(overrides.config_path.as_deref(), cwd);
        let (file_values, repo_root) = match &config_path {
            Some(path) => {
                let dir = path.parent().unwrap_or(cwd);
                (file::read(path)?, file::find_repo_root(dir))
            }
            None => (Map::new(), file::find_repo_root(cwd)),
        };
        tracing::debug!(
            "Config file: {}",
            config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );

        let queues = queues::parse_queues(file_values.get("queues"));
        let validation = validate_contract(&file_values, &queues);
        let layers = Layers {
            env,
            file: &file_values,
        };

        let domain = normalize_domain(&layers.string(
            overrides.domain.as_deref(),
            "ZENDESK_DOMAIN",
            "domain",
            "",
        ));
        let start_path = normalize_agent_path(
            &layers.string(
                overrides.start_path.as_deref(),
                "ZENDESK_START_PATH",
                "startPath",
                DEFAULT_START_PATH,
            ),
            DEFAULT_START_PATH,
        );
        if !is_agent_path(&start_path) {
            return Err(Error::Config(format!(
                "Invalid startPath \"{}\". startPath must begin with \"/agent/\".",
                start_path
            )));
        }
        let start_url = if domain.is_empty() {
            String::new()
        } else {
            format!("https://{}{}", domain, start_path)
        };

        let profile_dir = layers.string(
            overrides.profile_dir.as_deref(),
            "ZENDESK_PROFILE_DIR",
            "profileDir",
            DEFAULT_PROFILE_DIR,
        );
        let store_root = layers.string(
            overrides.store_root.as_deref(),
            "ZENDESK_STORE_ROOT",
            "storeRoot",
            DEFAULT_STORE_ROOT,
        );
        let span = layers.number(
            overrides.cdp_port_span,
            "ZENDESK_CDP_PORT_SPAN",
            "cdpPortSpan",
            DEFAULT_PORT_SPAN,
        );

        Ok(Self {
            cdp_url: layers.string(
                overrides.cdp_url.as_deref(),
                "ZENDESK_CDP_URL",
                "cdpUrl",
                DEFAULT_CDP_URL,
            ),
            domain,
            start_path,
            start_url,
            profile_dir: to_abs_path(&profile_dir, &repo_root),
            store_root: to_abs_path(&store_root, &repo_root),
            ui_wait: Duration::from_millis(layers.number(
                overrides.ui_wait_ms,
                "ZENDESK_UI_WAIT_MS",
                "uiWaitMs",
                DEFAULT_UI_WAIT_MS,
            )),
            no_launch: layers.flag(overrides.no_launch, "ZENDESK_NO_LAUNCH", "noLaunch", false),
            allow_shared_cdp: layers.flag(
                overrides.allow_shared_cdp,
                "ZENDESK_ALLOW_SHARED_CDP",
                "allowSharedCdp",
                false,
            ),
            auto_port: !layers.flag(
                overrides.no_auto_port,
                "ZENDESK_NO_AUTO_PORT",
                "noAutoPort",
                false,
            ),
            cdp_port_span: span.min(u64::from(u16::MAX)) as u16,
            background: !layers.flag(
                overrides.foreground,
                "ZENDESK_FOREGROUND",
                "foreground",
                false,
            ),
            store: !layers.flag(overrides.no_store, "ZENDESK_NO_STORE", "noStore", false),
            cache: !layers.flag(overrides.no_cache, "ZENDESK_NO_CACHE", "noCache", false),
            cache_only: layers.flag(
                overrides.cache_only,
                "ZENDESK_CACHE_ONLY",
                "cacheOnly",
                false,
            ),
            cache_ttl: layers.number(
                overrides.cache_ttl,
                "ZENDESK_CACHE_TTL",
                "cacheTtl",
                DEFAULT_CACHE_TTL_SECS,
            ),
            json: layers.flag(overrides.json, "ZENDESK_JSON", "json", false),
            default_queue: layers.string(None, "ZENDESK_DEFAULT_QUEUE", "defaultQueue", ""),
            queues,
            config_path,
            repo_root,
            validation,
        })
    }

    /// Origin of the agent application, or empty when no domain is configured.
    pub fn base_url(&self) -> String {
        if self.domain.is_empty() {
            String::new()
        } else {
            format!("https://{}", self.domain)
        }
    }

    pub fn resolve_queue(&self, raw: Option<&str>) -> QueueSelection {
        resolve_queue_input(raw, &self.default_queue, &self.queues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "domain": "https://acme.zendesk.com/",
        "startPath": "/agent/filters/123",
        "defaultQueue": "support-open",
        "queues": { "support-open": { "path": "/agent/filters/123", "team": "support" } },
        "profileDir": "./profiles/chrome",
        "uiWaitMs": 800,
        "noStore": true
    }"#;

    fn repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("zendesk.config.json"), CONFIG).unwrap();
        dir
    }

    #[test]
    fn test_load_from_discovered_file() {
        let dir = repo();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();

        let config = ResolvedConfig::load(&Overrides::default(), &HashMap::new(), &nested).unwrap();

        assert_eq!(config.domain, "acme.zendesk.com");
        assert_eq!(config.start_url, "https://acme.zendesk.com/agent/filters/123");
        assert_eq!(config.profile_dir, dir.path().join("profiles/chrome"));
        assert_eq!(config.store_root, dir.path().join("output/zendesk"));
        assert_eq!(config.ui_wait, Duration::from_millis(800));
        assert_eq!(config.cdp_url, DEFAULT_CDP_URL);
        assert_eq!(config.cdp_port_span, 10);
        assert_eq!(config.cache_ttl, 120);
        assert!(!config.store);
        assert!(config.cache);
        assert!(config.background);
        assert!(config.auto_port);
        assert!(config.validation.ok);
    }

    #[test]
    fn test_cli_beats_env_beats_file() {
        let dir = repo();
        let env = HashMap::from([
            ("ZENDESK_UI_WAIT_MS".to_string(), "300".to_string()),
            ("ZENDESK_DOMAIN".to_string(), "other.zendesk.com".to_string()),
            ("ZENDESK_NO_STORE".to_string(), "0".to_string()),
        ]);
        let overrides = Overrides {
            domain: Some("cli.zendesk.com".to_string()),
            no_auto_port: Some(true),
            ..Overrides::default()
        };

        let config = ResolvedConfig::load(&overrides, &env, dir.path()).unwrap();
        assert_eq!(config.domain, "cli.zendesk.com");
        assert_eq!(config.ui_wait, Duration::from_millis(300));
        assert!(config.store);
        assert!(!config.auto_port);
    }

    #[test]
    fn test_default_queue_scenario() {
        let dir = repo();
        let config = ResolvedConfig::load(&Overrides::default(), &HashMap::new(), dir.path()).unwrap();

        let selection = config.resolve_queue(None);
        assert_eq!(selection.alias.as_deref(), Some("support-open"));
        assert_eq!(selection.path.as_deref(), Some("/agent/filters/123"));
        assert_eq!(selection.team.as_deref(), Some("support"));
    }

    #[test]
    fn test_invalid_start_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = Overrides {
            start_path: Some("/home".to_string()),
            ..Overrides::default()
        };
        let err = ResolvedConfig::load(&overrides, &HashMap::new(), dir.path()).unwrap_err();
        assert!(err.to_string().contains("startPath must begin with \"/agent/\""));
    }

    #[test]
    fn test_no_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResolvedConfig::load(&Overrides::default(), &HashMap::new(), dir.path()).unwrap();

        assert!(config.config_path.is_none());
        assert_eq!(config.start_url, "");
        assert_eq!(config.start_path, DEFAULT_START_PATH);
        assert!(!config.validation.ok);
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("HTTPS://acme.zendesk.com/agent/"), "acme.zendesk.com");
        assert_eq!(normalize_domain("acme.zendesk.com"), "acme.zendesk.com");
        assert_eq!(normalize_domain(""), "");
    }
}
