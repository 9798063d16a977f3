use glob::Pattern;

/// Any Zendesk tenant.
pub const ZENDESK_HOSTS: &str = "*.zendesk.com";

/// Host a tab must be on to be bound.
#[derive(Debug, Clone)]
pub enum HostPattern {
    /// Exact hostname (case-insensitive)
    Exact(String),
    /// Glob such as `*.zendesk.com`
    Glob(Pattern),
}

impl HostPattern {
    /// The start URL's own host when it is a Zendesk host, else any tenant.
    pub fn for_start_url(start_url: Option<&str>) -> Self {
        let host = start_url
            .and_then(|raw| url::Url::parse(raw).ok())
            .and_then(|url| url.host_str().map(str::to_lowercase));
        match host {
            Some(host) if host == "zendesk.com" || host.ends_with(".zendesk.com") => {
                HostPattern::Exact(host)
            }
            _ => HostPattern::any_zendesk(),
        }
    }

    pub fn any_zendesk() -> Self {
        match Pattern::new(ZENDESK_HOSTS) {
            Ok(glob) => HostPattern::Glob(glob),
            Err(_) => HostPattern::Exact("zendesk.com".to_string()),
        }
    }

    pub fn matches(&self, hostname: &str) -> bool {
        let hostname = hostname.to_lowercase();
        match self {
            HostPattern::Exact(expected) => &hostname == expected,
            HostPattern::Glob(pattern) => pattern.matches(&hostname),
        }
    }

    /// Host check for a full URL. Unparseable URLs never match.
    pub fn matches_url(&self, raw: &str) -> bool {
        url::Url::parse(raw)
            .ok()
            .and_then(|url| url.host_str().map(|host| self.matches(host)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let pattern = HostPattern::for_start_url(Some("https://Acme.Zendesk.com/agent/filters"));
        assert!(pattern.matches("acme.zendesk.com"));
        assert!(pattern.matches("ACME.ZENDESK.COM"));
        assert!(!pattern.matches("other.zendesk.com"));
    }

    #[test]
    fn test_any_zendesk_glob() {
        let pattern = HostPattern::any_zendesk();
        assert!(pattern.matches("acme.zendesk.com"));
        assert!(pattern.matches("support-eu.zendesk.com"));
        assert!(!pattern.matches("zendesk.com.evil.net"));
        assert!(!pattern.matches("example.com"));
    }

    #[test]
    fn test_for_start_url() {
        let pattern = HostPattern::for_start_url(Some("https://acme.zendesk.com/agent/filters"));
        assert!(pattern.matches_url("https://acme.zendesk.com/agent/tickets/1"));
        assert!(!pattern.matches_url("https://other.zendesk.com/agent/tickets/1"));

        let pattern = HostPattern::for_start_url(Some("https://support.acme.io/agent"));
        assert!(pattern.matches_url("https://other.zendesk.com/agent"));

        let pattern = HostPattern::for_start_url(None);
        assert!(pattern.matches_url("https://acme.zendesk.com/"));
        assert!(!pattern.matches_url("about:blank"));
    }
}
