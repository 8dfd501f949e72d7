//! # Proxy Module
//!
//! Resolves the proxy configuration that applies to a request's host.
//!
//! ## Configuration
//!
//! The registry is built once from either a single proxy URL, applied to
//! every host and protocol:
//!
//! ```json
//! "http://proxy.local:8080"
//! ```
//!
//! or a map from host (or the `*` wildcard) to a URL or a structured record:
//!
//! ```json
//! {
//!     "example.com": "http://proxy-a:8080",
//!     "*": { "http": "http://proxy-b:8080", "no": ["internal.example.com"] }
//! }
//! ```
//!
//! Anything else is rejected at load time.
//!
//! ## Resolution
//!
//! [`Proxy::options_for`] tries an exact host match, then the wildcard entry,
//! and otherwise yields empty options. Requests without a host always get
//! empty options. The `no` list of the matched options is returned verbatim;
//! callers that assign proxies decide whether the requesting host is
//! excluded via [`ProxyOptions::excludes`].

use crate::error::SpiderError;
use crate::request::Request;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, trace};
use url::Url;

/// Registry key matching every host without an exact entry.
pub const WILDCARD: &str = "*";

/// Proxy settings for one host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ProxyOptions {
    http: Option<String>,
    https: Option<String>,
    excluded_domains: Vec<String>,
}

impl ProxyOptions {
    pub fn new(http: Option<String>, https: Option<String>, excluded_domains: Vec<String>) -> Self {
        ProxyOptions {
            http,
            https,
            excluded_domains,
        }
    }

    /// Uses the same proxy for HTTP and HTTPS with no exclusions.
    pub fn all_protocols(url: impl Into<String>) -> Self {
        let url = url.into();
        ProxyOptions {
            http: Some(url.clone()),
            https: Some(url),
            excluded_domains: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none() && self.excluded_domains.is_empty()
    }

    pub fn http(&self) -> Option<&str> {
        self.http.as_deref()
    }

    pub fn https(&self) -> Option<&str> {
        self.https.as_deref()
    }

    pub fn excluded_domains(&self) -> &[String] {
        &self.excluded_domains
    }

    /// Whether `host` is listed in the exclusion set.
    ///
    /// An entry matches the domain itself and its subdomains; a leading dot
    /// is ignored and `*` matches every host.
    pub fn excludes(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.excluded_domains.iter().any(|entry| {
            let entry = entry.trim_start_matches('.').to_ascii_lowercase();
            entry == WILDCARD
                || host == entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// A structured per-host record of the configuration input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyRecord {
    #[serde(default)]
    pub http: Option<String>,
    #[serde(default)]
    pub https: Option<String>,
    #[serde(default)]
    pub no: Vec<String>,
}

/// One entry of a per-host configuration map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProxyEntry {
    Url(String),
    Record(ProxyRecord),
}

/// Proxy configuration input.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProxyConfig {
    /// One proxy URL for all hosts and protocols.
    Single(String),
    /// Host (or `*`) to proxy entry.
    PerHost(HashMap<String, ProxyEntry>),
}

/// Immutable host to [`ProxyOptions`] registry.
#[derive(Debug, Clone, Default)]
pub struct Proxy {
    entries: HashMap<String, ProxyOptions>,
}

impl Proxy {
    pub fn new(entries: HashMap<String, ProxyOptions>) -> Self {
        Proxy { entries }
    }

    /// Builds the registry from a parsed configuration, validating every URL.
    pub fn load_configuration(config: ProxyConfig) -> Result<Self, SpiderError> {
        let entries = match config {
            ProxyConfig::Single(url) => {
                validate_proxy_url(WILDCARD, &url)?;
                HashMap::from([(WILDCARD.to_string(), ProxyOptions::all_protocols(url))])
            }
            ProxyConfig::PerHost(hosts) => {
                let mut entries = HashMap::with_capacity(hosts.len());
                for (host, entry) in hosts {
                    let options = match entry {
                        ProxyEntry::Url(url) => {
                            validate_proxy_url(&host, &url)?;
                            ProxyOptions::all_protocols(url)
                        }
                        ProxyEntry::Record(record) => {
                            for url in record.http.iter().chain(record.https.iter()) {
                                validate_proxy_url(&host, url)?;
                            }
                            ProxyOptions::new(record.http, record.https, record.no)
                        }
                    };
                    entries.insert(host.to_ascii_lowercase(), options);
                }
                entries
            }
        };
        debug!("Loaded proxy configuration for {} host entries", entries.len());
        Ok(Proxy { entries })
    }

    /// Parses configuration from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, SpiderError> {
        let config: ProxyConfig = serde_json::from_value(value).map_err(|e| {
            SpiderError::ConfigurationError(format!("Unrecognized proxy configuration: {}", e))
        })?;
        Self::load_configuration(config)
    }

    pub fn from_json_str(input: &str) -> Result<Self, SpiderError> {
        let value: Value = serde_json::from_str(input).map_err(|e| {
            SpiderError::ConfigurationError(format!("Invalid proxy configuration JSON: {}", e))
        })?;
        Self::from_value(value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves the options for a request: exact host, then wildcard, then empty.
    pub fn options_for(&self, request: &Request) -> ProxyOptions {
        let Some(host) = request.host() else {
            trace!("Request without host, no proxy: {}", request.url);
            return ProxyOptions::empty();
        };

        self.entries
            .get(host)
            .or_else(|| self.entries.get(WILDCARD))
            .cloned()
            .unwrap_or_default()
    }
}

fn validate_proxy_url(host: &str, url: &str) -> Result<(), SpiderError> {
    Url::parse(url).map(|_| ()).map_err(|e| {
        SpiderError::ConfigurationError(format!(
            "Invalid proxy URL '{}' for host '{}': {}",
            url, host, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(url: &str) -> Request {
        Request::new(Url::parse(url).unwrap())
    }

    #[test]
    fn test_all_protocols() {
        let options = ProxyOptions::all_protocols("http://p");
        assert_eq!(options.http(), Some("http://p"));
        assert_eq!(options.https(), Some("http://p"));
        assert!(options.excluded_domains().is_empty());
        assert!(!options.is_empty());
        assert!(ProxyOptions::empty().is_empty());
    }

    #[test]
    fn test_equality_compares_exclusion_order() {
        let a = ProxyOptions::new(None, None, vec!["a.com".into(), "b.com".into()]);
        let b = ProxyOptions::new(None, None, vec!["b.com".into(), "a.com".into()]);
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_resolution_order() {
        let p1 = ProxyOptions::all_protocols("http://p1:8080");
        let p2 = ProxyOptions::all_protocols("http://p2:8080");
        let proxy = Proxy::new(HashMap::from([
            ("a.com".to_string(), p1.clone()),
            (WILDCARD.to_string(), p2.clone()),
        ]));

        assert_eq!(proxy.options_for(&request("https://a.com/x")), p1);
        assert_eq!(proxy.options_for(&request("https://b.com/x")), p2);
        assert!(proxy.options_for(&request("data:text/plain,x")).is_empty());
    }

    #[test]
    fn test_empty_registry_resolves_empty() {
        let proxy = Proxy::default();
        assert!(proxy.options_for(&request("https://a.com")).is_empty());
    }

    #[test]
    fn test_from_json_str_rejects_unknown_record_fields() {
        let result = Proxy::from_json_str(r#"{"a.com": {"http": "http://p:1", "socks": "x"}}"#);
        assert!(matches!(result, Err(SpiderError::ConfigurationError(_))));

        let proxy = Proxy::from_json_str(r#""http://p:1""#).unwrap();
        assert!(!proxy.is_empty());
    }

    #[test]
    fn test_from_json_str_reports_syntax_errors_as_configuration() {
        for input in ["{\"a.com\": ", "not json", ""] {
            let result = Proxy::from_json_str(input);
            assert!(
                matches!(result, Err(SpiderError::ConfigurationError(_))),
                "{:?} gave {:?}",
                input,
                result.err()
            );
        }
    }

    #[test]
    fn test_host_keys_match_case_insensitively() {
        let proxy = Proxy::from_value(json!({
            "Example.COM": "http://a:1",
            "*": "http://b:2"
        }))
        .unwrap();

        assert_eq!(
            proxy.options_for(&request("https://example.com/page")),
            ProxyOptions::all_protocols("http://a:1")
        );
        assert_eq!(
            proxy.options_for(&request("https://EXAMPLE.com/page")),
            ProxyOptions::all_protocols("http://a:1")
        );
    }

    #[test]
    fn test_load_single_url() {
        let proxy = Proxy::from_value(json!("http://proxy.local:3128")).unwrap();
        assert_eq!(
            proxy.options_for(&request("https://anything.org")),
            ProxyOptions::all_protocols("http://proxy.local:3128")
        );
    }

    #[test]
    fn test_load_per_host_map() {
        let proxy = Proxy::from_value(json!({
            "example.com": "http://a:1",
            "*": { "https": "http://b:2", "no": ["internal.net"] }
        }))
        .unwrap();

        assert_eq!(
            proxy.options_for(&request("http://example.com")),
            ProxyOptions::all_protocols("http://a:1")
        );
        assert_eq!(
            proxy.options_for(&request("http://other.com")),
            ProxyOptions::new(None, Some("http://b:2".into()), vec!["internal.net".into()])
        );
    }

    #[test]
    fn test_rejects_malformed_configuration() {
        assert!(matches!(
            Proxy::from_value(json!(42)),
            Err(SpiderError::ConfigurationError(_))
        ));
        assert!(matches!(
            Proxy::from_value(json!({ "a.com": { "htp": "http://x" } })),
            Err(SpiderError::ConfigurationError(_))
        ));
        assert!(matches!(
            Proxy::from_value(json!({ "a.com": "not a url" })),
            Err(SpiderError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_excludes() {
        let options = ProxyOptions::new(
            Some("http://p".into()),
            None,
            vec![".internal.net".into(), "Example.com".into()],
        );
        assert!(options.excludes("internal.net"));
        assert!(options.excludes("api.internal.net"));
        assert!(options.excludes("example.com"));
        assert!(!options.excludes("notexample.com"));
        assert!(!options.excludes("other.org"));
    }
}
