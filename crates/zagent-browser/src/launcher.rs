use crate::chrome_finder::ChromeFinder;
use crate::profile::ProfileDir;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A Chrome we started but do not own.
///
/// Only the pid is kept. The process is never waited on or killed so it
/// can be reused by later invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachedBrowser {
    pub pid: u32,
}

/// Starts a browser bound to a profile directory and debugging port.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, profile_dir: &Path, port: u16) -> Result<DetachedBrowser>;
}

/// Launches a local Chrome binary in its own process group.
pub struct ChromeLauncher {
    finder: ChromeFinder,
}

impl ChromeLauncher {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self {
            finder: ChromeFinder::new(chrome_path),
        }
    }

    fn build_args(profile_dir: &Path, port: u16) -> Vec<String> {
        vec![
            format!("--user-data-dir={}", profile_dir.display()),
            format!("--remote-debugging-port={}", port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-search-engine-choice-screen".to_string(),
        ]
    }
}

impl Default for ChromeLauncher {
    fn default() -> Self {
        Self::new(None)
    }
}

impl BrowserLauncher for ChromeLauncher {
    fn launch(&self, profile_dir: &Path, port: u16) -> Result<DetachedBrowser> {
        let chrome_path = self.finder.find()?;
        ProfileDir::new(profile_dir).ensure()?;

        let mut cmd = Command::new(&chrome_path);
        cmd.args(Self::build_args(profile_dir, port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group so terminal signals aimed at us do not reach Chrome.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

        let child = cmd
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch Chrome: {}", e)))?;
        let pid = child.id();
        // Dropping the handle neither waits nor kills.
        drop(child);

        tracing::info!(
            "Launched Chrome pid={} on port {} with profile {}",
            pid,
            port,
            profile_dir.display()
        );
        Ok(DetachedBrowser { pid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let args = ChromeLauncher::build_args(Path::new("/tmp/profile"), 9224);

        assert_eq!(args[0], "--user-data-dir=/tmp/profile");
        assert!(args.contains(&"--remote-debugging-port=9224".to_string()));
        assert!(args.contains(&"--no-first-run".to_string()));
        assert!(args.contains(&"--no-default-browser-check".to_string()));
        assert!(args.contains(&"--disable-search-engine-choice-screen".to_string()));
    }

    #[test]
    fn test_launch_fails_cleanly_without_chrome() {
        let temp_dir = tempfile::tempdir().unwrap();
        let launcher = ChromeLauncher::new(Some(PathBuf::from("/nonexistent/chrome")));

        let err = launcher
            .launch(&temp_dir.path().join("profile"), 9224)
            .unwrap_err();
        assert!(matches!(err, Error::Browser(_)));
    }
}
