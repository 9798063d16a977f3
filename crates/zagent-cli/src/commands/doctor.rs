use crate::GlobalArgs;
use crate::commands::auth::signed_in_user;
use crate::output::emit;
use crate::runtime::{block_on, cdp_reachable, with_agent_browser};
use anyhow::Result;
use serde::Serialize;
use zagent_browser::{Endpoint, SystemInspector, check_ownership};
use zagent_core::ResolvedConfig;

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    ok: bool,
    command: &'static str,
    checks: Vec<Check>,
}

/// Checks that need no browser.
pub fn static_checks(config: &ResolvedConfig) -> Vec<Check> {
    let profile_dir = config.profile_dir.display().to_string();
    vec![
        Check::new(
            "config-file",
            config.config_path.is_some(),
            config
                .config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "No zendesk.config.json or zendesk.json found".to_string()),
        ),
        Check::new(
            "config-contract",
            config.validation.ok,
            if config.validation.ok {
                "valid".to_string()
            } else {
                config.validation.issues.join("; ")
            },
        ),
        Check::new(
            "profile-dir",
            !profile_dir.is_empty(),
            if profile_dir.is_empty() {
                "No profileDir resolved".to_string()
            } else {
                profile_dir
            },
        ),
    ]
}

fn ownership_check(config: &ResolvedConfig) -> Option<Check> {
    let endpoint = Endpoint::parse(&config.cdp_url).ok()?;
    let claim = check_ownership(
        &SystemInspector,
        &endpoint,
        &config.profile_dir.to_string_lossy(),
    );
    let detail = if claim.matches {
        format!("pid={}", claim.pid.as_deref().unwrap_or("unknown"))
    } else {
        format!(
            "expected={} actual={}",
            claim.expected_profile_dir.as_deref().unwrap_or("unknown"),
            claim.actual_profile_dir.as_deref().unwrap_or("unknown")
        )
    };
    Some(Check::new("cdp-profile-ownership", claim.matches, detail))
}

/// `doctor`: environment diagnostics.
pub fn execute(globals: &GlobalArgs) -> Result<()> {
    let config = globals.resolve()?;
    let mut checks = static_checks(&config);

    let browser_checks = block_on(async {
        let mut checks = Vec::new();
        let reachable = cdp_reachable(&config).await;
        checks.push(Check::new("cdp", reachable, config.cdp_url.clone()));

        if reachable && !config.allow_shared_cdp {
            checks.extend(ownership_check(&config));
        }

        let auth = if config.domain.is_empty() {
            Check::new("zendesk-auth", false, "Missing domain")
        } else if !reachable {
            Check::new("zendesk-auth", false, "Skipped because CDP is unreachable")
        } else {
            let outcome = with_agent_browser(&config, |agent| async move {
                Ok(signed_in_user(&agent.page, &agent.ctx).await)
            })
            .await;
            match outcome {
                Ok(Some(user)) => Check::new(
                    "zendesk-auth",
                    true,
                    user.email
                        .clone()
                        .or_else(|| user.name.clone())
                        .or_else(|| user.id.clone())
                        .unwrap_or_default(),
                ),
                Ok(None) => Check::new("zendesk-auth", false, "Not logged into Zendesk"),
                Err(e) => Check::new("zendesk-auth", false, e.to_string()),
            }
        };
        checks.push(auth);
        checks
    })?;
    checks.extend(browser_checks);

    let report = Report {
        ok: checks.iter().all(|c| c.ok),
        command: "doctor",
        checks,
    };
    emit(&config, globals.out.as_deref(), &report)
}
