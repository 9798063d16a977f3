use anyhow::{Result, bail};
use std::future::Future;
use zagent_browser::{
    CdpPage, CdpSession, ChromeLauncher, ControlChannel, Endpoint, EndpointProbe, HttpProbe,
    LaunchPolicy, SessionAcquirer, SystemInspector, bind,
};
use zagent_core::assemble::SessionMeta;
use zagent_core::{AgentPage, ResolvedConfig, RetrievalContext};

/// Everything a command needs to run one retrieval against the agent tab.
pub struct BoundAgent {
    pub page: CdpPage,
    pub ctx: RetrievalContext,
    pub meta: SessionMeta,
}

/// Run `fut` on a fresh multi-threaded runtime.
pub fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(fut))
}

/// Whether the configured CDP URL answers `/json/version`.
pub async fn cdp_reachable(config: &ResolvedConfig) -> bool {
    let Ok(endpoint) = Endpoint::parse(&config.cdp_url) else {
        return false;
    };
    match HttpProbe::new() {
        Ok(probe) => probe.reachable(&endpoint).await,
        Err(_) => false,
    }
}

/// Run `work` against `channel`, then close it whether or not `work` succeeded.
pub async fn with_session<S, T>(mut channel: S, work: impl AsyncFnOnce(&S) -> Result<T>) -> Result<T>
where
    S: ControlChannel,
{
    let result = work(&channel).await;
    channel.close();
    result
}

/// Open a session, bind the agent tab, run `op`, and release the session.
///
/// The session is released on every exit path; a Chrome we launched keeps
/// running.
pub async fn with_agent_browser<T, F, Fut>(config: &ResolvedConfig, op: F) -> Result<T>
where
    F: FnOnce(BoundAgent) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if config.domain.is_empty() {
        bail!(
            "Zendesk domain is required. Set `domain` in zendesk config, `ZENDESK_DOMAIN`, or pass `--domain`."
        );
    }

    let probe = HttpProbe::new()?;
    let launcher = ChromeLauncher::default();
    let acquirer = SessionAcquirer::new(&probe, &SystemInspector, &launcher);
    let preferred = Endpoint::parse(&config.cdp_url)?;
    let acquired = acquirer
        .acquire(
            &preferred,
            &config.profile_dir,
            &LaunchPolicy::from_config(config),
        )
        .await?;

    let meta = SessionMeta {
        launched_chrome: acquired.launched,
        cdp_url: acquired.endpoint.to_string(),
    };
    let session = CdpSession::connect(acquired).await?;
    with_session(session, async |session: &CdpSession| {
        let page: CdpPage = bind(session, &config.start_url, config.background).await?;
        page.prepare_interaction(config.ui_wait).await;
        let ctx = RetrievalContext::new(config.base_url(), config.ui_wait);
        op(BoundAgent { page, ctx, meta }).await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChannel {
        closes: Arc<AtomicUsize>,
    }

    impl ControlChannel for CountingChannel {
        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn channel() -> (CountingChannel, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        (
            CountingChannel {
                closes: closes.clone(),
            },
            closes,
        )
    }

    #[tokio::test]
    async fn test_channel_closed_once_when_work_fails() {
        let (channel, closes) = channel();

        let result: Result<()> =
            with_session(channel, async |_: &CountingChannel| Err(anyhow!("bind failed"))).await;

        assert_eq!(result.unwrap_err().to_string(), "bind failed");
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channel_closed_once_on_success() {
        let (channel, closes) = channel();

        let value = with_session(channel, async |c: &CountingChannel| {
            // still open while the work runs
            assert_eq!(c.closes.load(Ordering::SeqCst), 0);
            Ok(42)
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_domain_fails_before_any_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResolvedConfig::load(
            &zagent_core::config::Overrides::default(),
            &std::collections::HashMap::new(),
            dir.path(),
        )
        .unwrap();

        let err = with_agent_browser(&config, |_agent| async { Ok(()) })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Zendesk domain is required."));
    }
}
