//! Background check for a newer release
//!
//! Runs on its own thread while fuzzing proceeds and is joined only at
//! process exit. Every failure is swallowed.

use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::Value;

const RELEASES_URL: &str = "https://crates.io/api/v1/crates/contractfuzz";
const TIMEOUT: Duration = Duration::from_secs(3);

/// Handle to a running (or skipped) version check
#[derive(Debug)]
pub struct VersionCheck {
    handle: Option<JoinHandle<Option<String>>>,
}

impl VersionCheck {
    /// Start the check unless `enabled` is false.
    #[must_use]
    pub fn spawn(enabled: bool, current: &str) -> Self {
        if !enabled {
            return Self { handle: None };
        }
        Self::spawn_from(RELEASES_URL, current)
    }

    fn spawn_from(url: &str, current: &str) -> Self {
        let url = url.to_string();
        let current = current.to_string();
        let handle = std::thread::Builder::new()
            .name("version-check".into())
            .spawn(move || {
                let latest = fetch_latest(&url)?;
                tracing::debug!("Current version {current}, latest {latest}");
                is_newer(&latest, &current).then_some(latest)
            });
        match handle {
            Ok(handle) => Self {
                handle: Some(handle),
            },
            Err(e) => {
                tracing::debug!("Version check not started: {e}");
                Self { handle: None }
            }
        }
    }

    /// Join the check; `Some(version)` when a newer release exists.
    #[must_use]
    pub fn finish(self) -> Option<String> {
        self.handle?.join().ok().flatten()
    }
}

fn fetch_latest(url: &str) -> Option<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(TIMEOUT)
        .user_agent(concat!("contractfuzz/", env!("CARGO_PKG_VERSION")))
        .build()
        .ok()?;
    let body: Value = match client.get(url).send().and_then(|r| r.error_for_status()) {
        Ok(resp) => resp.json().ok()?,
        Err(e) => {
            tracing::debug!("Version check failed: {e}");
            return None;
        }
    };
    body.pointer("/crate/max_stable_version")
        .or_else(|| body.pointer("/crate/max_version"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Numeric `major.minor.patch` comparison; pre-release suffixes are ignored.
fn is_newer(candidate: &str, current: &str) -> bool {
    fn parts(v: &str) -> Vec<u64> {
        v.trim_start_matches('v')
            .split(['.', '-', '+'])
            .take(3)
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    }
    parts(candidate) > parts(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_versions() {
        assert!(is_newer("0.2.0", "0.1.9"));
        assert!(is_newer("1.0.0", "0.9.9"));
        assert!(is_newer("v0.1.10", "0.1.9"));
        assert!(!is_newer("0.1.0", "0.1.0"));
        assert!(!is_newer("0.1.0-rc1", "0.1.0"));
        assert!(!is_newer("0.0.9", "0.1.0"));
    }

    #[test]
    fn disabled_check_yields_nothing() {
        assert_eq!(VersionCheck::spawn(false, "0.1.0").finish(), None);
    }

    #[test]
    fn unreachable_server_is_swallowed() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let check = VersionCheck::spawn_from(&format!("http://127.0.0.1:{port}/"), "0.1.0");
        assert_eq!(check.finish(), None);
    }
}
