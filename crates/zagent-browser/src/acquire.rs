//! Picks exactly one debugging endpoint for an invocation.
//!
//! Reuses a reachable endpoint we own (or any, when sharing is allowed),
//! scans a small port range for one of ours, and otherwise launches a
//! detached Chrome and waits for it to come up.

use crate::endpoint::{Endpoint, EndpointProbe, LOCAL_HOST};
use crate::launcher::BrowserLauncher;
use crate::ownership::{OwnershipClaim, ProcessInspector, check_ownership};
use crate::{Error, Result};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use zagent_core::ResolvedConfig;

pub const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPolicy {
    /// Skip the ownership check on the preferred endpoint.
    pub allow_shared: bool,
    pub auto_port: bool,
    pub port_span: u16,
    pub launch_if_absent: bool,
    pub launch_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LaunchPolicy {
    fn default() -> Self {
        Self {
            allow_shared: false,
            auto_port: true,
            port_span: 10,
            launch_if_absent: true,
            launch_timeout: LAUNCH_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl LaunchPolicy {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            allow_shared: config.allow_shared_cdp,
            auto_port: config.auto_port,
            port_span: config.cdp_port_span,
            launch_if_absent: !config.no_launch,
            ..Self::default()
        }
    }
}

/// The endpoint an invocation will drive.
#[derive(Debug, Clone)]
pub struct AcquiredEndpoint {
    pub endpoint: Endpoint,
    /// WebSocket address from `/json/version`.
    pub control_channel: String,
    pub launched: bool,
}

pub struct SessionAcquirer<'a> {
    probe: &'a dyn EndpointProbe,
    inspector: &'a dyn ProcessInspector,
    launcher: &'a dyn BrowserLauncher,
}

impl<'a> SessionAcquirer<'a> {
    pub fn new(
        probe: &'a dyn EndpointProbe,
        inspector: &'a dyn ProcessInspector,
        launcher: &'a dyn BrowserLauncher,
    ) -> Self {
        Self {
            probe,
            inspector,
            launcher,
        }
    }

    pub async fn acquire(
        &self,
        preferred: &Endpoint,
        profile_dir: &Path,
        policy: &LaunchPolicy,
    ) -> Result<AcquiredEndpoint> {
        let expected = profile_dir.to_string_lossy().to_string();

        match self.probe.resolve_control_channel(preferred).await {
            Ok(control_channel) => {
                self.reuse_or_fallback(preferred, control_channel, &expected, profile_dir, policy)
                    .await
            }
            Err(Error::Connection(reason)) => {
                tracing::debug!("Preferred endpoint unavailable: {}", reason);
                self.when_unreachable(preferred, &expected, profile_dir, policy)
                    .await
            }
            Err(other) => Err(other),
        }
    }

    async fn reuse_or_fallback(
        &self,
        preferred: &Endpoint,
        control_channel: String,
        expected: &str,
        profile_dir: &Path,
        policy: &LaunchPolicy,
    ) -> Result<AcquiredEndpoint> {
        if policy.allow_shared {
            tracing::debug!("Reusing {} without ownership check", preferred);
            return Ok(reused(preferred.clone(), control_channel));
        }

        let claim = check_ownership(self.inspector, preferred, expected);
        if claim.matches {
            tracing::debug!("Reusing owned endpoint {}", preferred);
            return Ok(reused(preferred.clone(), control_channel));
        }

        tracing::warn!(
            "{} belongs to pid={} with user-data-dir={}",
            preferred,
            claim.pid.as_deref().unwrap_or("unknown"),
            claim.actual_profile_dir.as_deref().unwrap_or("unknown")
        );

        if policy.auto_port {
            if let Some(found) = self.find_owned(preferred, expected, policy.port_span).await {
                return Ok(found);
            }
            if policy.launch_if_absent {
                let port = self.free_port(preferred, policy.port_span)?;
                return self
                    .launch_and_wait(&preferred.with_port(port), profile_dir, policy)
                    .await;
            }
        }

        Err(in_use_error(preferred, &claim, expected))
    }

    async fn when_unreachable(
        &self,
        preferred: &Endpoint,
        expected: &str,
        profile_dir: &Path,
        policy: &LaunchPolicy,
    ) -> Result<AcquiredEndpoint> {
        if !policy.launch_if_absent {
            if policy.auto_port {
                if let Some(found) = self.find_owned(preferred, expected, policy.port_span).await {
                    return Ok(found);
                }
            }
            return Err(Error::session(format!(
                "CDP endpoint is not reachable at {} and --no-launch is set.",
                preferred
            )));
        }

        let port = if policy.auto_port {
            self.free_port(preferred, policy.port_span)?
        } else {
            preferred.port
        };
        self.launch_and_wait(&preferred.with_port(port), profile_dir, policy)
            .await
    }

    /// Ascending scan of `[port, port + span]`; first reachable and owned wins.
    async fn find_owned(
        &self,
        preferred: &Endpoint,
        expected: &str,
        span: u16,
    ) -> Option<AcquiredEndpoint> {
        for port in port_range(preferred.port, span) {
            let candidate = preferred.with_port(port);
            let control_channel = match self.probe.resolve_control_channel(&candidate).await {
                Ok(ws) => ws,
                Err(_) => continue,
            };
            if check_ownership(self.inspector, &candidate, expected).matches {
                tracing::info!("Using owned CDP endpoint {}", candidate);
                return Some(reused(candidate, control_channel));
            }
        }
        None
    }

    fn free_port(&self, preferred: &Endpoint, span: u16) -> Result<u16> {
        port_range(preferred.port, span)
            .find(|port| self.probe.port_is_free(*port))
            .ok_or_else(|| {
                Error::session(format!(
                    "No free CDP port in {}-{} on {}.",
                    preferred.port,
                    preferred.port.saturating_add(span),
                    LOCAL_HOST
                ))
            })
    }

    async fn launch_and_wait(
        &self,
        target: &Endpoint,
        profile_dir: &Path,
        policy: &LaunchPolicy,
    ) -> Result<AcquiredEndpoint> {
        self.launcher.launch(profile_dir, target.port)?;

        let deadline = Instant::now() + policy.launch_timeout;
        while Instant::now() < deadline {
            if let Ok(control_channel) = self.probe.resolve_control_channel(target).await {
                return Ok(AcquiredEndpoint {
                    endpoint: target.clone(),
                    control_channel,
                    launched: true,
                });
            }
            tokio::time::sleep(policy.poll_interval).await;
        }

        Err(Error::session(format!(
            "CDP endpoint did not come up at {}",
            target
        )))
    }
}

fn port_range(start: u16, span: u16) -> std::ops::RangeInclusive<u16> {
    start..=start.saturating_add(span)
}

fn reused(endpoint: Endpoint, control_channel: String) -> AcquiredEndpoint {
    AcquiredEndpoint {
        endpoint,
        control_channel,
        launched: false,
    }
}

fn in_use_error(endpoint: &Endpoint, claim: &OwnershipClaim, expected: &str) -> Error {
    Error::Session {
        message: format!(
            "CDP endpoint {} is already in use by Chrome pid={} with user-data-dir={}. Expected {}. \
             Stop that Chrome instance, use a different --cdp-url, pass --allow-shared-cdp, \
             or keep auto port fallback enabled.",
            endpoint,
            claim.pid.as_deref().unwrap_or("unknown"),
            claim.actual_profile_dir.as_deref().unwrap_or("unknown"),
            expected
        ),
        pid: claim.pid.clone(),
        actual_profile_dir: claim.actual_profile_dir.clone(),
        expected_profile_dir: Some(expected.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::DetachedBrowser;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    const OURS: &str = "/tmp/zagent-acquire-test/profile";

    #[derive(Default)]
    struct World {
        /// Ports answering `/json/version`.
        reachable: HashSet<u16>,
        /// Ports with something bound but not necessarily answering.
        bound: HashSet<u16>,
        /// port -> user-data-dir of the listener
        owners: HashMap<u16, String>,
        probed: Vec<u16>,
        launched: Vec<u16>,
        /// Launched Chrome comes up after this many probes (None: never).
        up_after: Option<usize>,
        pending: Option<(u16, usize)>,
    }

    #[derive(Clone, Default)]
    struct Fakes(Arc<Mutex<World>>);

    impl Fakes {
        fn with(setup: impl FnOnce(&mut World)) -> Self {
            let fakes = Self::default();
            setup(&mut fakes.0.lock().unwrap());
            fakes
        }

        fn world(&self) -> std::sync::MutexGuard<'_, World> {
            self.0.lock().unwrap()
        }
    }

    #[async_trait]
    impl EndpointProbe for Fakes {
        async fn resolve_control_channel(&self, endpoint: &Endpoint) -> Result<String> {
            let mut world = self.world();
            world.probed.push(endpoint.port);
            if let Some((port, remaining)) = world.pending {
                if port == endpoint.port {
                    if remaining == 0 {
                        world.reachable.insert(port);
                        world.pending = None;
                    } else {
                        world.pending = Some((port, remaining - 1));
                    }
                }
            }
            if world.reachable.contains(&endpoint.port) {
                Ok(format!("ws://{}:{}/devtools/browser/abc", endpoint.host, endpoint.port))
            } else {
                Err(Error::Connection(format!("{} refused", endpoint)))
            }
        }

        fn port_is_free(&self, port: u16) -> bool {
            let world = self.world();
            !world.reachable.contains(&port) && !world.bound.contains(&port)
        }
    }

    impl ProcessInspector for Fakes {
        fn listener_pid(&self, port: u16) -> Option<String> {
            let world = self.world();
            if world.reachable.contains(&port) || world.bound.contains(&port) {
                Some(format!("{}", 10_000 + port as u32))
            } else {
                None
            }
        }

        fn command_line(&self, pid: &str) -> Option<String> {
            let port = pid.parse::<u32>().ok()? - 10_000;
            let world = self.world();
            let dir = world.owners.get(&(port as u16))?;
            Some(format!("chrome --remote-debugging-port={} --user-data-dir={}", port, dir))
        }
    }

    impl BrowserLauncher for Fakes {
        fn launch(&self, profile_dir: &Path, port: u16) -> Result<DetachedBrowser> {
            let mut world = self.world();
            world.launched.push(port);
            world.owners.insert(port, profile_dir.display().to_string());
            if let Some(after) = world.up_after {
                world.pending = Some((port, after));
            }
            Ok(DetachedBrowser { pid: 4242 })
        }
    }

    fn fast_policy() -> LaunchPolicy {
        LaunchPolicy {
            launch_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
            ..LaunchPolicy::default()
        }
    }

    async fn run(fakes: &Fakes, policy: &LaunchPolicy) -> Result<AcquiredEndpoint> {
        let preferred = Endpoint::parse("http://127.0.0.1:9223").unwrap();
        SessionAcquirer::new(fakes, fakes, fakes)
            .acquire(&preferred, Path::new(OURS), policy)
            .await
    }

    #[tokio::test]
    async fn test_reuses_owned_preferred_endpoint() {
        let fakes = Fakes::with(|w| {
            w.reachable.insert(9223);
            w.owners.insert(9223, OURS.to_string());
        });

        let acquired = run(&fakes, &fast_policy()).await.unwrap();
        assert_eq!(acquired.endpoint.port, 9223);
        assert!(!acquired.launched);
        assert_eq!(acquired.control_channel, "ws://127.0.0.1:9223/devtools/browser/abc");
        assert!(fakes.world().launched.is_empty());
    }

    #[tokio::test]
    async fn test_allow_shared_skips_ownership() {
        let fakes = Fakes::with(|w| {
            w.reachable.insert(9223);
            w.owners.insert(9223, "/home/someone/chrome".to_string());
        });
        let policy = LaunchPolicy {
            allow_shared: true,
            ..fast_policy()
        };

        let acquired = run(&fakes, &policy).await.unwrap();
        assert_eq!(acquired.endpoint.port, 9223);
        assert!(!acquired.launched);
    }

    #[tokio::test]
    async fn test_scan_is_ascending_and_stops_at_first_owned() {
        let fakes = Fakes::with(|w| {
            w.reachable.extend([9223, 9225, 9227, 9229]);
            w.owners.insert(9223, "/home/someone/chrome".to_string());
            w.owners.insert(9227, OURS.to_string());
            w.owners.insert(9229, OURS.to_string());
        });

        let acquired = run(&fakes, &fast_policy()).await.unwrap();
        assert_eq!(acquired.endpoint.port, 9227);
        assert!(!acquired.launched);

        // first probe is the preferred endpoint, then the scan from the start
        let probed = fakes.world().probed.clone();
        assert_eq!(probed, vec![9223, 9223, 9224, 9225, 9226, 9227]);
    }

    #[tokio::test]
    async fn test_unowned_without_auto_port_reports_owner() {
        let fakes = Fakes::with(|w| {
            w.reachable.insert(9223);
            w.owners.insert(9223, "/home/someone/chrome".to_string());
        });
        let policy = LaunchPolicy {
            auto_port: false,
            ..fast_policy()
        };

        match run(&fakes, &policy).await {
            Err(Error::Session {
                message,
                pid,
                actual_profile_dir,
                expected_profile_dir,
            }) => {
                assert!(message.starts_with("CDP endpoint http://127.0.0.1:9223 is already in use"));
                assert!(message.contains("--allow-shared-cdp"));
                assert_eq!(pid.as_deref(), Some("19223"));
                assert_eq!(actual_profile_dir.as_deref(), Some("/home/someone/chrome"));
                assert_eq!(expected_profile_dir.as_deref(), Some(OURS));
            }
            other => panic!("expected session error, got {:?}", other),
        }
        assert!(fakes.world().launched.is_empty());
    }

    #[tokio::test]
    async fn test_unowned_launches_on_free_port_in_range() {
        let fakes = Fakes::with(|w| {
            w.reachable.insert(9223);
            w.bound.insert(9224);
            w.owners.insert(9223, "/home/someone/chrome".to_string());
            w.up_after = Some(2);
        });

        let acquired = run(&fakes, &fast_policy()).await.unwrap();
        assert_eq!(acquired.endpoint.port, 9225);
        assert!(acquired.launched);
        assert_eq!(fakes.world().launched, vec![9225]);
    }

    #[tokio::test]
    async fn test_unowned_with_no_launch_fails() {
        let fakes = Fakes::with(|w| {
            w.reachable.insert(9223);
            w.owners.insert(9223, "/home/someone/chrome".to_string());
        });
        let policy = LaunchPolicy {
            launch_if_absent: false,
            ..fast_policy()
        };

        let err = run(&fakes, &policy).await.unwrap_err();
        assert!(err.to_string().contains("already in use by Chrome pid=19223"));
    }

    #[tokio::test]
    async fn test_unreachable_with_no_launch_uses_owned_neighbour() {
        let fakes = Fakes::with(|w| {
            w.reachable.insert(9226);
            w.owners.insert(9226, OURS.to_string());
        });
        let policy = LaunchPolicy {
            launch_if_absent: false,
            ..fast_policy()
        };

        let acquired = run(&fakes, &policy).await.unwrap();
        assert_eq!(acquired.endpoint.port, 9226);
        assert!(!acquired.launched);
    }

    #[tokio::test]
    async fn test_unreachable_with_no_launch_fails() {
        let fakes = Fakes::default();
        let policy = LaunchPolicy {
            launch_if_absent: false,
            ..fast_policy()
        };

        let err = run(&fakes, &policy).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "CDP endpoint is not reachable at http://127.0.0.1:9223 and --no-launch is set."
        );
    }

    #[tokio::test]
    async fn test_unreachable_launches_on_preferred_port_without_auto_port() {
        let fakes = Fakes::with(|w| {
            w.up_after = Some(0);
        });
        let policy = LaunchPolicy {
            auto_port: false,
            ..fast_policy()
        };

        let acquired = run(&fakes, &policy).await.unwrap();
        assert_eq!(acquired.endpoint.to_string(), "http://127.0.0.1:9223");
        assert!(acquired.launched);
        assert_eq!(fakes.world().owners.get(&9223).map(String::as_str), Some(OURS));
    }

    #[tokio::test]
    async fn test_launch_timeout() {
        let fakes = Fakes::default();

        let err = run(&fakes, &fast_policy()).await.unwrap_err();
        assert_eq!(err.to_string(), "CDP endpoint did not come up at http://127.0.0.1:9223");
        assert_eq!(fakes.world().launched, vec![9223]);
    }

    #[tokio::test]
    async fn test_no_free_port_in_range() {
        let fakes = Fakes::with(|w| {
            w.bound.extend(9223..=9225);
        });
        let policy = LaunchPolicy {
            port_span: 2,
            ..fast_policy()
        };

        let err = run(&fakes, &policy).await.unwrap_err();
        assert!(matches!(err, Error::Session { .. }));
        assert!(err.to_string().contains("9223-9225 on 127.0.0.1"));
    }

    #[test]
    fn test_port_range_saturates() {
        assert_eq!(port_range(65530, 10).count(), 6);
        assert_eq!(port_range(9223, 0).collect::<Vec<_>>(), vec![9223]);
    }
}
