use crate::utils::error::{DocError, Result};
use crate::utils::validation::{
    validate_host_entry, validate_non_empty_string, validate_positive_number, validate_range,
    validate_scheme, Validate,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_MAX_FETCH_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_UNPACKED_BYTES: usize = 200 * 1024 * 1024;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 15_000;
pub const MAX_FETCH_TIMEOUT_MS: u64 = 600_000;
pub const DEFAULT_PLACEHOLDER_MARKER: &str = "{{obraz}}";

/// Process-wide settings. Built once at start-up, then shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub limits: Limits,
    pub ssrf: SsrfPolicy,
    pub placeholder_marker: String,
    pub stamp: StampBounds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_upload_bytes: usize,
    pub max_fetch_bytes: usize,
    /// Total decompressed size a document container may expand to.
    pub max_unpacked_bytes: usize,
    pub fetch_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrfPolicy {
    pub allowed_schemes: Vec<String>,
    pub host_allowlist: Option<Vec<String>>,
    #[serde(skip)]
    pub private_range_blocklist: Vec<Ipv4Range>,
}

/// An IPv4 CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Range {
    pub network: Ipv4Addr,
    pub prefix: u8,
}

impl Ipv4Range {
    pub const fn new(network: Ipv4Addr, prefix: u8) -> Self {
        Self { network, prefix }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        if self.prefix == 0 {
            return true;
        }
        let mask = u32::MAX << (32 - u32::from(self.prefix.min(32)));
        (u32::from(addr) & mask) == (u32::from(self.network) & mask)
    }
}

pub const DEFAULT_PRIVATE_RANGES: [Ipv4Range; 7] = [
    Ipv4Range::new(Ipv4Addr::new(127, 0, 0, 0), 8),   // loopback
    Ipv4Range::new(Ipv4Addr::new(0, 0, 0, 0), 8),     // this network
    Ipv4Range::new(Ipv4Addr::new(169, 254, 0, 0), 16), // link-local
    Ipv4Range::new(Ipv4Addr::new(100, 64, 0, 0), 10), // shared address space
    Ipv4Range::new(Ipv4Addr::new(10, 0, 0, 0), 8),
    Ipv4Range::new(Ipv4Addr::new(172, 16, 0, 0), 12),
    Ipv4Range::new(Ipv4Addr::new(192, 168, 0, 0), 16),
];

/// Box a stamp must fit in, and its distance from the page edges (PDF points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampBounds {
    pub max_width: f64,
    pub max_height: f64,
    pub margin: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            ssrf: SsrfPolicy::default(),
            placeholder_marker: DEFAULT_PLACEHOLDER_MARKER.to_string(),
            stamp: StampBounds::default(),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_fetch_bytes: DEFAULT_MAX_FETCH_BYTES,
            max_unpacked_bytes: DEFAULT_MAX_UNPACKED_BYTES,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl Default for SsrfPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            host_allowlist: None,
            private_range_blocklist: DEFAULT_PRIVATE_RANGES.to_vec(),
        }
    }
}

impl SsrfPolicy {
    pub fn with_allowlist<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            host_allowlist: Some(
                hosts
                    .into_iter()
                    .map(|host| normalize_host_entry(&host.into()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Puts schemes and allowlist entries into the form the guard compares against.
    pub fn normalize(&mut self) {
        for scheme in &mut self.allowed_schemes {
            *scheme = scheme.trim().to_ascii_lowercase();
        }
        if let Some(hosts) = &mut self.host_allowlist {
            for host in hosts.iter_mut() {
                *host = normalize_host_entry(host);
            }
        }
    }
}

/// Lowercase, no trailing dot; IPv6 literals lose their brackets and take
/// the compressed form `Ipv6Addr` prints.
pub fn normalize_host_entry(entry: &str) -> String {
    let host = entry.trim().trim_end_matches('.');
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    match bare.parse::<Ipv6Addr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => host.to_ascii_lowercase(),
    }
}

impl Default for StampBounds {
    fn default() -> Self {
        Self {
            max_width: 260.0,
            max_height: 160.0,
            margin: 36.0,
        }
    }
}

impl ServiceConfig {
    /// Defaults, then the optional TOML file, then `DOCSTAMP_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DocError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| DocError::ConfigError {
                message: format!("TOML parsing error: {}", e),
            })?;
        config.normalize();
        Ok(config)
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| DocError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_number::<usize>("DOCSTAMP_MAX_UPLOAD_BYTES")? {
            self.limits.max_upload_bytes = v;
        }
        if let Some(v) = env_number::<usize>("DOCSTAMP_MAX_FETCH_BYTES")? {
            self.limits.max_fetch_bytes = v;
        }
        if let Some(v) = env_number::<usize>("DOCSTAMP_MAX_UNPACKED_BYTES")? {
            self.limits.max_unpacked_bytes = v;
        }
        if let Some(v) = env_number::<u64>("DOCSTAMP_FETCH_TIMEOUT_MS")? {
            self.limits.fetch_timeout_ms = v;
        }
        if let Ok(list) = env::var("DOCSTAMP_HOST_ALLOWLIST") {
            let hosts: Vec<String> = list
                .split(',')
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect();
            self.ssrf.host_allowlist = if hosts.is_empty() { None } else { Some(hosts) };
        }
        if let Ok(marker) = env::var("DOCSTAMP_PLACEHOLDER_MARKER") {
            self.placeholder_marker = marker;
        }
        Ok(())
    }

    /// Lower-cases scheme and host entries so the guard can compare them directly.
    fn normalize(&mut self) {
        self.ssrf.normalize();
        if self.ssrf.private_range_blocklist.is_empty() {
            self.ssrf.private_range_blocklist = DEFAULT_PRIVATE_RANGES.to_vec();
        }
    }

    pub fn allowlist_configured(&self) -> bool {
        self.ssrf.host_allowlist.is_some()
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DocError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: "Expected a non-negative integer".to_string(),
            }),
        Err(_) => Ok(None),
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("limits.max_upload_bytes", self.limits.max_upload_bytes, 1)?;
        validate_positive_number("limits.max_fetch_bytes", self.limits.max_fetch_bytes, 1)?;
        validate_positive_number(
            "limits.max_unpacked_bytes",
            self.limits.max_unpacked_bytes,
            1,
        )?;
        validate_range(
            "limits.fetch_timeout_ms",
            self.limits.fetch_timeout_ms,
            1,
            MAX_FETCH_TIMEOUT_MS,
        )?;

        if self.ssrf.allowed_schemes.is_empty() {
            return Err(DocError::MissingConfigError {
                field: "ssrf.allowed_schemes".to_string(),
            });
        }
        for scheme in &self.ssrf.allowed_schemes {
            validate_scheme("ssrf.allowed_schemes", scheme)?;
        }
        if let Some(hosts) = &self.ssrf.host_allowlist {
            for host in hosts {
                validate_host_entry("ssrf.host_allowlist", host)?;
            }
        }

        validate_non_empty_string("placeholder_marker", &self.placeholder_marker)?;

        for (field, value) in [
            ("stamp.max_width", self.stamp.max_width),
            ("stamp.max_height", self.stamp.max_height),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(DocError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "Must be a positive number of points".to_string(),
                });
            }
        }
        if !(self.stamp.margin.is_finite() && self.stamp.margin >= 0.0) {
            return Err(DocError::InvalidConfigValueError {
                field: "stamp.margin".to_string(),
                value: self.stamp.margin.to_string(),
                reason: "Must be zero or a positive number of points".to_string(),
            });
        }

        tracing::debug!("✅ Service configuration validation passed");
        Ok(())
    }
}
