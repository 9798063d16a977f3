use anyhow::Result;
use clap::Args;
use std::collections::HashMap;
use std::path::PathBuf;
use zagent_core::ResolvedConfig;
use zagent_core::config::Overrides;

pub mod commands;
pub mod output;
pub mod runtime;

const DEFAULT_LOG: &str = "zagent=info";
const VERBOSE_LOG: &str = "zagent=debug,zagent_cli=debug,zagent_core=debug,zagent_browser=debug";

/// Log filter directives. A non-empty `RUST_LOG` wins over `--verbose`.
pub fn log_directives(verbose: bool, rust_log: Option<&str>) -> String {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => directives.to_string(),
        None if verbose => VERBOSE_LOG.to_string(),
        None => DEFAULT_LOG.to_string(),
    }
}

/// Options shared by every command. Unset values defer to `ZENDESK_*`
/// environment variables, then the config file, then defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to zendesk.config.json
    #[arg(long, global = true, env = "ZENDESK_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Zendesk domain, e.g. acme.zendesk.com
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// Chrome remote debugging URL
    #[arg(long, global = true, value_name = "URL")]
    pub cdp_url: Option<String>,

    /// Chrome user-data-dir for auto-launch
    #[arg(long, global = true, value_name = "PATH")]
    pub profile_dir: Option<String>,

    /// Agent path to open when no agent tab exists (must begin with /agent/)
    #[arg(long, global = true, value_name = "PATH")]
    pub start_path: Option<String>,

    /// Base UI settle time in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub ui_wait_ms: Option<u64>,

    /// Do not auto-launch Chrome when CDP is unavailable
    #[arg(long, global = true)]
    pub no_launch: bool,

    /// Use the CDP endpoint even if another Chrome profile owns it
    #[arg(long, global = true)]
    pub allow_shared_cdp: bool,

    /// Do not scan nearby ports for an owned Chrome or a free launch port
    #[arg(long, global = true)]
    pub no_auto_port: bool,

    /// How many ports above the CDP port to scan
    #[arg(long, global = true, value_name = "N")]
    pub cdp_port_span: Option<u64>,

    /// Bring the Zendesk tab to the front
    #[arg(long, global = true)]
    pub foreground: bool,

    /// Directory for stored snapshots
    #[arg(long, global = true, value_name = "PATH")]
    pub store_root: Option<String>,

    /// Do not store result snapshots
    #[arg(long, global = true)]
    pub no_store: bool,

    /// Do not read cached ticket snapshots
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Only answer ticket reads from the cache
    #[arg(long, global = true)]
    pub cache_only: bool,

    /// Max age in seconds of a cached ticket (0 = never stale)
    #[arg(long = "cache-ttl", global = true, value_name = "SECONDS")]
    pub cache_ttl: Option<u64>,

    /// Print JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Also write the JSON output to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn overrides(&self) -> Overrides {
        let flag = |set: bool| set.then_some(true);
        Overrides {
            config_path: self.config.clone(),
            cdp_url: self.cdp_url.clone(),
            domain: self.domain.clone(),
            start_path: self.start_path.clone(),
            profile_dir: self.profile_dir.clone(),
            store_root: self.store_root.clone(),
            ui_wait_ms: self.ui_wait_ms,
            cdp_port_span: self.cdp_port_span,
            cache_ttl: self.cache_ttl,
            no_launch: flag(self.no_launch),
            allow_shared_cdp: flag(self.allow_shared_cdp),
            no_auto_port: flag(self.no_auto_port),
            foreground: flag(self.foreground),
            no_store: flag(self.no_store),
            no_cache: flag(self.no_cache),
            cache_only: flag(self.cache_only),
            json: flag(self.json),
        }
    }

    /// Merge CLI, environment and config file into one configuration.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("ZENDESK_"))
            .collect();
        let cwd = std::env::current_dir()?;
        Ok(ResolvedConfig::load(&self.overrides(), &env, &cwd)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_overrides_verbose() {
        assert_eq!(log_directives(true, Some("zagent_browser=trace")), "zagent_browser=trace");
        assert_eq!(log_directives(false, Some("warn")), "warn");
    }

    #[test]
    fn test_log_defaults_without_rust_log() {
        assert_eq!(log_directives(false, None), "zagent=info");
        assert_eq!(log_directives(false, Some("  ")), "zagent=info");
        assert!(log_directives(true, None).contains("zagent_browser=debug"));
    }

    #[test]
    fn test_unset_flags_defer_to_lower_layers() {
        let overrides = GlobalArgs::default().overrides();
        assert_eq!(overrides.no_launch, None);
        assert_eq!(overrides.json, None);
        assert_eq!(overrides.cdp_port_span, None);
    }

    #[test]
    fn test_set_flags_override() {
        let args = GlobalArgs {
            no_launch: true,
            no_auto_port: true,
            cache_ttl: Some(0),
            ..GlobalArgs::default()
        };
        let overrides = args.overrides();
        assert_eq!(overrides.no_launch, Some(true));
        assert_eq!(overrides.no_auto_port, Some(true));
        assert_eq!(overrides.cache_ttl, Some(0));
    }
}
