//! URL policy applied before any outbound request.
//!
//! Only the literal form of the host is inspected. A name that resolves to a
//! private address at connect time passes; no DNS lookup happens here.

use crate::config::service_config::SsrfPolicy;
use crate::domain::model::SafeUrl;
use crate::utils::error::{DocError, Result, SsrfRejection};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use url::{Host, Url};

#[derive(Debug, Clone)]
pub struct SsrfGuard {
    policy: Arc<SsrfPolicy>,
}

impl SsrfGuard {
    pub fn new(policy: Arc<SsrfPolicy>) -> Self {
        let mut policy = Arc::unwrap_or_clone(policy);
        policy.normalize();
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn validate(&self, url_str: &str) -> Result<SafeUrl> {
        self.check(url_str).map_err(|reason| {
            tracing::warn!("🚫 Rejected image URL: {}", reason);
            DocError::SsrfRejected { reason }
        })
    }

    fn check(&self, url_str: &str) -> std::result::Result<SafeUrl, SsrfRejection> {
        let url = Url::parse(url_str.trim())
            .map_err(|e| SsrfRejection::InvalidUrl(e.to_string()))?;

        let scheme = url.scheme();
        if !self.policy.allowed_schemes.iter().any(|s| s == scheme) {
            return Err(SsrfRejection::SchemeNotAllowed(scheme.to_string()));
        }

        let host = url.host().ok_or(SsrfRejection::EmptyHost)?;
        let host_name = match &host {
            Host::Domain(d) => d.trim_end_matches('.').to_ascii_lowercase(),
            Host::Ipv4(ip) => ip.to_string(),
            Host::Ipv6(ip) => ip.to_string(),
        };
        if host_name.is_empty() {
            return Err(SsrfRejection::EmptyHost);
        }

        if let Some(allowlist) = &self.policy.host_allowlist {
            if !allowlist.iter().any(|allowed| host_matches(&host_name, allowed)) {
                return Err(SsrfRejection::HostNotAllowlisted(host_name));
            }
        }

        if host_matches(&host_name, "localhost") {
            return Err(SsrfRejection::Localhost);
        }

        match host {
            Host::Ipv4(ip) => self.check_ipv4(ip)?,
            Host::Ipv6(ip) => {
                if let Some(mapped) = ip.to_ipv4_mapped() {
                    self.check_ipv4(mapped)?;
                } else if is_blocked_ipv6(&ip) {
                    return Err(SsrfRejection::PrivateAddress(ip.into()));
                }
            }
            Host::Domain(_) => {}
        }

        Ok(SafeUrl(url))
    }

    fn check_ipv4(&self, ip: Ipv4Addr) -> std::result::Result<(), SsrfRejection> {
        if self
            .policy
            .private_range_blocklist
            .iter()
            .any(|range| range.contains(ip))
        {
            return Err(SsrfRejection::PrivateAddress(ip.into()));
        }
        Ok(())
    }
}

/// `host` equals `entry` or is one of its subdomains.
fn host_matches(host: &str, entry: &str) -> bool {
    host == entry
        || host
            .strip_suffix(entry)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Loopback, link-local (fe80::/10) and unique-local (fc00::/7).
fn is_blocked_ipv6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback() || (first & 0xffc0) == 0xfe80 || (first & 0xfe00) == 0xfc00
}
