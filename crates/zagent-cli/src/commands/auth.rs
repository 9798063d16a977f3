use crate::GlobalArgs;
use crate::output::emit;
use crate::runtime::{block_on, cdp_reachable, with_agent_browser};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use zagent_core::model::Identity;
use zagent_core::retrieve;
use zagent_core::{AgentPage, RetrievalContext};

const LOGIN_POLL: Duration = Duration::from_secs(2);
const MIN_LOGIN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize)]
struct CdpStatus {
    url: String,
    reachable: bool,
}

#[derive(Debug, Serialize)]
struct ConfigStatus {
    path: Option<PathBuf>,
    ok: bool,
    issues: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
struct AuthStatus {
    checked: bool,
    authenticated: bool,
    user: Option<Identity>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthCheck {
    ok: bool,
    command: &'static str,
    cdp: CdpStatus,
    config: ConfigStatus,
    auth: AuthStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthLogin {
    ok: bool,
    command: &'static str,
    launched_chrome: bool,
    cdp_url: String,
    start_url: String,
    page_url: Option<String>,
    authenticated: bool,
    user: Option<Identity>,
    timeout_seconds: u64,
}

/// The signed-in agent, only when they have an id.
pub(crate) async fn signed_in_user<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
) -> Option<Identity> {
    match retrieve::current_user(page, ctx).await {
        Ok(found) => found.into_entity().filter(|user| user.id.is_some()),
        Err(e) => {
            tracing::debug!("Identity lookup failed: {}", e);
            None
        }
    }
}

/// `auth check`: reports problems in the payload instead of failing.
pub fn check(globals: &GlobalArgs) -> Result<()> {
    let config = globals.resolve()?;

    let (reachable, auth) = block_on(async {
        let reachable = cdp_reachable(&config).await;
        let auth = if config.domain.is_empty() {
            AuthStatus {
                error: Some("Missing domain. Set domain in config or pass --domain.".to_string()),
                ..AuthStatus::default()
            }
        } else if !reachable {
            AuthStatus {
                error: Some("CDP endpoint is unreachable.".to_string()),
                ..AuthStatus::default()
            }
        } else {
            let outcome = with_agent_browser(&config, |agent| async move {
                Ok(signed_in_user(&agent.page, &agent.ctx).await)
            })
            .await;
            match outcome {
                Ok(user) => AuthStatus {
                    checked: true,
                    authenticated: user.is_some(),
                    user,
                    error: None,
                },
                Err(e) => AuthStatus {
                    checked: true,
                    error: Some(e.to_string()),
                    ..AuthStatus::default()
                },
            }
        };
        (reachable, auth)
    })?;

    let config_ok = config.config_path.is_some() && config.validation.ok;
    let result = AuthCheck {
        ok: reachable && config_ok && auth.authenticated,
        command: "auth-check",
        cdp: CdpStatus {
            url: config.cdp_url.clone(),
            reachable,
        },
        config: ConfigStatus {
            path: config.config_path.clone(),
            ok: config_ok,
            issues: config.validation.issues.clone(),
        },
        auth,
    };
    emit(&config, globals.out.as_deref(), &result)
}

/// `auth login`: open Zendesk and wait for the agent to sign in.
pub fn login(globals: &GlobalArgs, timeout_secs: u64) -> Result<()> {
    let config = globals.resolve()?;
    let timeout_secs = timeout_secs.max(MIN_LOGIN_TIMEOUT_SECS);

    let spinner = if config.json {
        ProgressBar::hidden()
    } else {
        println!(
            "Waiting up to {}s for Zendesk login at {}",
            timeout_secs, config.start_url
        );
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Waiting for sign-in");
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    };

    let start_url = config.start_url.clone();
    let result = block_on(with_agent_browser(&config, |agent| {
        let spinner = spinner.clone();
        async move {
            agent.page.goto(&start_url).await?;

            let deadline = Instant::now() + Duration::from_secs(timeout_secs);
            let mut user = signed_in_user(&agent.page, &agent.ctx).await;
            while user.is_none() && Instant::now() < deadline {
                tokio::time::sleep(LOGIN_POLL).await;
                user = signed_in_user(&agent.page, &agent.ctx).await;
            }
            spinner.finish_and_clear();

            Ok(AuthLogin {
                ok: user.is_some(),
                command: "auth-login",
                launched_chrome: agent.meta.launched_chrome,
                cdp_url: agent.meta.cdp_url,
                start_url,
                page_url: agent.page.url().await.ok(),
                authenticated: user.is_some(),
                user,
                timeout_seconds: timeout_secs,
            })
        }
    }))?;
    spinner.finish_and_clear();

    emit(&config, globals.out.as_deref(), &result?)
}
