//! Decide whether a debugging port belongs to the Chrome we launch.
//!
//! The listener's command line is inspected for its `--user-data-dir` and
//! compared with the expected profile directory.

use crate::endpoint::Endpoint;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::process::Command;
use zagent_core::paths::canonical_or_absolute;

lazy_static! {
    static ref USER_DATA_DIR: Regex =
        Regex::new(r#"--user-data-dir=(?:"([^"]+)"|'([^']+)'|(\S+))"#).unwrap();
}

/// OS-level process lookups.
pub trait ProcessInspector: Send + Sync {
    /// Pid of the process listening on `port`.
    fn listener_pid(&self, port: u16) -> Option<String>;

    /// Full command line of `pid`.
    fn command_line(&self, pid: &str) -> Option<String>;
}

/// `lsof` and `ps` based inspector.
pub struct SystemInspector;

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

impl ProcessInspector for SystemInspector {
    fn listener_pid(&self, port: u16) -> Option<String> {
        let port_arg = format!("-iTCP:{}", port);
        let raw = run("lsof", &["-n", "-P", &port_arg, "-sTCP:LISTEN", "-t"])?;
        raw.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }

    fn command_line(&self, pid: &str) -> Option<String> {
        run("ps", &["-p", pid, "-o", "command="])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipClaim {
    pub port: u16,
    pub pid: Option<String>,
    pub actual_profile_dir: Option<String>,
    pub expected_profile_dir: Option<String>,
    pub matches: bool,
}

/// The `--user-data-dir` value from a command line, quoted or bare.
pub fn extract_user_data_dir(command_line: &str) -> Option<String> {
    let caps = USER_DATA_DIR.captures(command_line)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string())
}

/// Pure comparison of a listener's command line with the expected profile.
pub fn evaluate(command_line: Option<&str>, expected: &str) -> (Option<String>, bool) {
    let actual = command_line.and_then(extract_user_data_dir);
    let expected_path = canonical_or_absolute(expected);
    let matches = match &actual {
        Some(actual) => {
            let actual_path = canonical_or_absolute(actual);
            !expected_path.as_os_str().is_empty()
                && !actual_path.as_os_str().is_empty()
                && expected_path == actual_path
        }
        None => false,
    };
    (actual, matches)
}

/// Check who owns `endpoint`. A missing listener or profile argument is a
/// non-match, not an error.
pub fn check_ownership(
    inspector: &dyn ProcessInspector,
    endpoint: &Endpoint,
    expected_profile_dir: &str,
) -> OwnershipClaim {
    let pid = inspector.listener_pid(endpoint.port);
    let command_line = pid.as_deref().and_then(|pid| inspector.command_line(pid));
    let (actual, matches) = evaluate(command_line.as_deref(), expected_profile_dir);

    let expected = expected_profile_dir.trim();
    let claim = OwnershipClaim {
        port: endpoint.port,
        pid,
        actual_profile_dir: actual,
        expected_profile_dir: if expected.is_empty() {
            None
        } else {
            Some(expected.to_string())
        },
        matches,
    };
    tracing::debug!(
        "Ownership of port {}: pid={:?} profile={:?} matches={}",
        claim.port,
        claim.pid,
        claim.actual_profile_dir,
        claim.matches
    );
    claim
}
