//! URL safety validation for SSRF protection.
//!
//! [`NetworkGuard`] checks an outbound target before any request is made:
//! the scheme must be HTTP(S), the host must not be a metadata or
//! `localhost`-style name or a blocked domain, and every address the host
//! resolves to must be public. DNS lookups happen on every call and a
//! failed or empty lookup is a rejection.
//!
//! Address classification is a pure function over the ordered tables
//! [`BLOCKED_IPV4_RANGES`] and [`BLOCKED_IPV6_RANGES`].

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use std::sync::{Arc, LazyLock};

use clawgate_types::ToolError;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use tracing::{debug, warn};
use url::{Host, Url};

pub use clawgate_types::security::UrlPolicy;

/// Why an address range is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Unspecified,
    Loopback,
    Private,
    SharedAddress,
    LinkLocal,
    UniqueLocal,
    /// Cloud instance metadata service. Blocked even when private ranges
    /// are allowed.
    Metadata,
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unspecified => "unspecified",
            Self::Loopback => "loopback",
            Self::Private => "private",
            Self::SharedAddress => "shared address space",
            Self::LinkLocal => "link-local",
            Self::UniqueLocal => "unique-local",
            Self::Metadata => "cloud metadata",
        })
    }
}

/// A blocked network and its classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRule {
    pub net: IpNet,
    pub class: AddressClass,
}

/// Blocked IPv4 ranges, most specific first.
pub const BLOCKED_IPV4_RANGES: &[(&str, AddressClass)] = &[
    ("169.254.169.254/32", AddressClass::Metadata),
    ("0.0.0.0/8", AddressClass::Unspecified),
    ("10.0.0.0/8", AddressClass::Private),
    ("100.64.0.0/10", AddressClass::SharedAddress),
    ("127.0.0.0/8", AddressClass::Loopback),
    ("169.254.0.0/16", AddressClass::LinkLocal),
    ("172.16.0.0/12", AddressClass::Private),
    ("192.168.0.0/16", AddressClass::Private),
];

/// Blocked IPv6 ranges, most specific first.
pub const BLOCKED_IPV6_RANGES: &[(&str, AddressClass)] = &[
    ("fd00:ec2::254/128", AddressClass::Metadata),
    ("::/128", AddressClass::Unspecified),
    ("::1/128", AddressClass::Loopback),
    ("fe80::/10", AddressClass::LinkLocal),
    ("fc00::/7", AddressClass::UniqueLocal),
];

/// Cloud metadata service hostnames that must always be blocked.
const METADATA_HOSTS: &[&str] = &[
    "169.254.169.254",
    "metadata.google.internal",
    "metadata.internal",
];

/// Names that resolve to the local machine without DNS.
const LOCAL_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
];

static IPV4_RULES: LazyLock<Vec<(Ipv4Net, AddressClass)>> = LazyLock::new(|| {
    BLOCKED_IPV4_RANGES
        .iter()
        .filter_map(|(cidr, class)| cidr.parse::<Ipv4Net>().ok().map(|net| (net, *class)))
        .collect()
});

static IPV6_RULES: LazyLock<Vec<(Ipv6Net, AddressClass)>> = LazyLock::new(|| {
    BLOCKED_IPV6_RANGES
        .iter()
        .filter_map(|(cidr, class)| cidr.parse::<Ipv6Net>().ok().map(|net| (net, *class)))
        .collect()
});

/// Errors returned by URL safety validation.
#[derive(Debug, thiserror::Error)]
pub enum UrlSafetyError {
    /// The URL could not be parsed or is structurally invalid.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Only `http` and `https` may be fetched.
    #[error("unsupported scheme '{scheme}' (only http and https are allowed)")]
    UnsupportedScheme { scheme: String },

    /// The URL targets a cloud metadata endpoint.
    #[error("blocked cloud metadata endpoint: {host}")]
    MetadataEndpoint { host: String },

    /// The host is a name for the local machine.
    #[error("blocked local hostname: {host}")]
    LocalHostname { host: String },

    /// The host is or resolves to an address in a blocked range.
    #[error("blocked {class} address {ip} ({range}) for host {host}")]
    BlockedAddress {
        ip: IpAddr,
        host: String,
        range: IpNet,
        class: AddressClass,
    },

    /// The URL targets an explicitly blocked domain.
    #[error("blocked domain: {host}")]
    BlockedDomain { host: String },

    /// DNS resolution failed for the host.
    #[error("failed to resolve host '{host}': {reason}")]
    ResolutionFailed { host: String, reason: String },

    /// DNS returned no addresses.
    #[error("host '{host}' resolved to no addresses")]
    NoAddresses { host: String },
}

impl From<UrlSafetyError> for ToolError {
    fn from(err: UrlSafetyError) -> Self {
        let target = match &err {
            UrlSafetyError::InvalidUrl { url, .. } => url.clone(),
            UrlSafetyError::UnsupportedScheme { scheme } => format!("{scheme}:"),
            UrlSafetyError::MetadataEndpoint { host }
            | UrlSafetyError::LocalHostname { host }
            | UrlSafetyError::BlockedAddress { host, .. }
            | UrlSafetyError::BlockedDomain { host }
            | UrlSafetyError::ResolutionFailed { host, .. }
            | UrlSafetyError::NoAddresses { host } => host.clone(),
        };
        ToolError::NetworkDenied {
            target,
            reason: err.to_string(),
        }
    }
}

/// Find the blocked range containing `ip`, if any.
///
/// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are checked against the
/// IPv4 table.
pub fn classify_ip(ip: IpAddr) -> Option<AddressRule> {
    match ip {
        IpAddr::V4(v4) => classify_ipv4(v4),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return classify_ipv4(mapped);
            }
            classify_ipv6(v6)
        }
    }
}

fn classify_ipv4(ip: Ipv4Addr) -> Option<AddressRule> {
    IPV4_RULES
        .iter()
        .find(|(net, _)| net.contains(&ip))
        .map(|(net, class)| AddressRule {
            net: IpNet::V4(*net),
            class: *class,
        })
}

fn classify_ipv6(ip: Ipv6Addr) -> Option<AddressRule> {
    IPV6_RULES
        .iter()
        .find(|(net, _)| net.contains(&ip))
        .map(|(net, class)| AddressRule {
            net: IpNet::V6(*net),
            class: *class,
        })
}

/// Check whether an IP address belongs to a blocked range.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    classify_ip(ip).is_some()
}

/// Prefix scheme-less input with `https://`. Input that already names a
/// scheme (`mailto:`, `javascript:`) is kept so the scheme check sees it.
pub fn normalize_target(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.contains("://") || has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Whether `input` starts with `scheme:` as opposed to `host:port`.
fn has_scheme(input: &str) -> bool {
    let Some((scheme, rest)) = input.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return false;
    }
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let is_port = digits > 0
        && matches!(rest.as_bytes().get(digits), None | Some(b'/' | b'?' | b'#'));
    !is_port
}

/// Resolve a redirect `Location` against the URL that produced it.
pub fn resolve_redirect(base: &Url, location: &str) -> Result<Url, UrlSafetyError> {
    base.join(location.trim())
        .map_err(|e| UrlSafetyError::InvalidUrl {
            url: location.to_string(),
            reason: e.to_string(),
        })
}

/// Host name lookup, injectable so tests can fake DNS answers.
pub trait Resolver: Send + Sync {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo`). Blocking.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>> {
        Ok((host, port).to_socket_addrs()?.map(|a| a.ip()).collect())
    }
}

/// A URL that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedUrl {
    pub url: Url,
    pub host: String,
    /// Addresses the host resolved to at validation time. Empty when the
    /// checks were bypassed (policy disabled or allowed domain).
    pub addresses: Vec<IpAddr>,
}

/// Validates outbound destinations against a [`UrlPolicy`].
#[derive(Clone)]
pub struct NetworkGuard {
    policy: UrlPolicy,
    resolver: Arc<dyn Resolver>,
}

impl fmt::Debug for NetworkGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkGuard")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for NetworkGuard {
    fn default() -> Self {
        Self::new(UrlPolicy::default())
    }
}

impl NetworkGuard {
    /// Guard using the system resolver.
    pub fn new(policy: UrlPolicy) -> Self {
        Self::with_resolver(policy, Arc::new(SystemResolver))
    }

    pub fn with_resolver(policy: UrlPolicy, resolver: Arc<dyn Resolver>) -> Self {
        Self { policy, resolver }
    }

    pub fn policy(&self) -> &UrlPolicy {
        &self.policy
    }

    /// Validate a URL or bare host. Blocking when the host needs DNS; use
    /// [`NetworkGuard::validate_async`] from async code.
    ///
    /// # Examples
    ///
    /// ```
    /// use clawgate_tools::url_safety::NetworkGuard;
    ///
    /// let guard = NetworkGuard::default();
    /// assert!(guard.validate("http://169.254.169.254/latest/").is_err());
    /// assert!(guard.validate("ftp://example.com/").is_err());
    /// ```
    pub fn validate(&self, input: &str) -> Result<ApprovedUrl, UrlSafetyError> {
        let target = normalize_target(input);
        let url = Url::parse(&target).map_err(|e| UrlSafetyError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                warn!(url = %input, scheme = other, "unsupported scheme rejected");
                return Err(UrlSafetyError::UnsupportedScheme {
                    scheme: other.to_string(),
                });
            }
        }

        let host = url.host().ok_or_else(|| UrlSafetyError::InvalidUrl {
            url: input.to_string(),
            reason: "URL has no host".to_string(),
        })?;
        let host_name = match &host {
            Host::Domain(d) => d.trim_end_matches('.').to_ascii_lowercase(),
            Host::Ipv4(ip) => ip.to_string(),
            Host::Ipv6(ip) => ip.to_string(),
        };

        if !self.policy.enabled {
            return Ok(ApprovedUrl {
                url,
                host: host_name,
                addresses: Vec::new(),
            });
        }

        // Allowed domains bypass all other checks.
        if self.policy.allowed_domains.contains(&host_name) {
            debug!(host = %host_name, "allowed domain, skipping checks");
            return Ok(ApprovedUrl {
                url,
                host: host_name,
                addresses: Vec::new(),
            });
        }

        let result = self.check_host(host, &host_name, url.port_or_known_default());
        match result {
            Ok(addresses) => {
                debug!(host = %host_name, ?addresses, "url approved");
                Ok(ApprovedUrl {
                    url,
                    host: host_name,
                    addresses,
                })
            }
            Err(err) => {
                warn!(url = %input, error = %err, "url denied");
                Err(err)
            }
        }
    }

    /// [`NetworkGuard::validate`] on the blocking thread pool.
    pub async fn validate_async(&self, input: &str) -> Result<ApprovedUrl, UrlSafetyError> {
        let guard = self.clone();
        let owned = input.to_string();
        tokio::task::spawn_blocking(move || guard.validate(&owned))
            .await
            .map_err(|e| UrlSafetyError::ResolutionFailed {
                host: input.to_string(),
                reason: format!("resolver task failed: {e}"),
            })?
    }

    fn check_host(
        &self,
        host: Host<&str>,
        host_name: &str,
        port: Option<u16>,
    ) -> Result<Vec<IpAddr>, UrlSafetyError> {
        if is_blocked_domain(host_name, &self.policy.blocked_domains) {
            return Err(UrlSafetyError::BlockedDomain {
                host: host_name.to_string(),
            });
        }

        if METADATA_HOSTS.contains(&host_name) {
            return Err(UrlSafetyError::MetadataEndpoint {
                host: host_name.to_string(),
            });
        }

        let addresses = match host {
            Host::Ipv4(ip) => vec![IpAddr::V4(ip)],
            Host::Ipv6(ip) => vec![IpAddr::V6(ip)],
            Host::Domain(_) => {
                if is_local_hostname(host_name) {
                    return Err(UrlSafetyError::LocalHostname {
                        host: host_name.to_string(),
                    });
                }
                let addrs = self
                    .resolver
                    .resolve(host_name, port.unwrap_or(443))
                    .map_err(|e| UrlSafetyError::ResolutionFailed {
                        host: host_name.to_string(),
                        reason: e.to_string(),
                    })?;
                if addrs.is_empty() {
                    return Err(UrlSafetyError::NoAddresses {
                        host: host_name.to_string(),
                    });
                }
                addrs
            }
        };

        for ip in &addresses {
            if let Some(rule) = classify_ip(*ip) {
                if self.policy.allow_private && rule.class != AddressClass::Metadata {
                    continue;
                }
                return Err(UrlSafetyError::BlockedAddress {
                    ip: *ip,
                    host: host_name.to_string(),
                    range: rule.net,
                    class: rule.class,
                });
            }
        }

        Ok(addresses)
    }
}

/// `host` equals a blocked domain or is a subdomain of one.
fn is_blocked_domain(host: &str, blocked: &HashSet<String>) -> bool {
    blocked.iter().any(|domain| {
        host == domain
            || host
                .strip_suffix(domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

fn is_local_hostname(host: &str) -> bool {
    LOCAL_HOSTNAMES.contains(&host) || host.ends_with(".localhost")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Resolver answering from a fixed table; unknown hosts fail.
    struct StaticResolver {
        answers: HashMap<String, Vec<IpAddr>>,
    }

    impl StaticResolver {
        fn new(entries: &[(&str, &[&str])]) -> Arc<Self> {
            let answers = entries
                .iter()
                .map(|(host, ips)| {
                    let ips = ips.iter().map(|ip| ip.parse().unwrap()).collect();
                    (host.to_string(), ips)
                })
                .collect();
            Arc::new(Self { answers })
        }
    }

    impl Resolver for StaticResolver {
        fn resolve(&self, host: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
            self.answers.get(host).cloned().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such host: {host}"))
            })
        }
    }

    fn guard() -> NetworkGuard {
        guard_with(UrlPolicy::default())
    }

    fn guard_with(policy: UrlPolicy) -> NetworkGuard {
        NetworkGuard::with_resolver(
            policy,
            StaticResolver::new(&[
                ("example.com", &["93.184.216.34"]),
                ("dual.example", &["93.184.216.34", "2606:2800:220:1::1"]),
                ("intranet.example", &["10.1.2.3"]),
                ("mixed.example", &["93.184.216.34", "192.168.0.10"]),
                ("rebind.example", &["127.0.0.1"]),
                ("cgnat.example", &["100.64.0.7"]),
                ("meta.example", &["169.254.169.254"]),
                ("empty.example", &[]),
            ]),
        )
    }

    fn blocked_class(err: UrlSafetyError) -> AddressClass {
        match err {
            UrlSafetyError::BlockedAddress { class, .. } => class,
            other => panic!("expected BlockedAddress, got {other:?}"),
        }
    }

    // --- Public targets ---

    #[test]
    fn public_host_approved_with_addresses() {
        let approved = guard().validate("https://example.com/path?q=1").unwrap();
        assert_eq!(approved.host, "example.com");
        assert_eq!(approved.addresses, vec!["93.184.216.34".parse::<IpAddr>().unwrap()]);
        assert_eq!(approved.url.path(), "/path");
    }

    #[test]
    fn bare_host_becomes_https() {
        let approved = guard().validate("example.com").unwrap();
        assert_eq!(approved.url.scheme(), "https");
        assert_eq!(normalize_target("  example.com/a "), "https://example.com/a");
        assert_eq!(normalize_target("example.com:8443/x"), "https://example.com:8443/x");
        assert_eq!(normalize_target("localhost:3000"), "https://localhost:3000");
    }

    #[test]
    fn scheme_without_slashes_not_rewritten() {
        for url in ["mailto:user@public.example", "javascript:alert(1)", "data:text/html,hi"] {
            assert_eq!(normalize_target(url), url);
            let err = guard().validate(url).unwrap_err();
            assert!(
                matches!(err, UrlSafetyError::UnsupportedScheme { .. }),
                "{url}: {err:?}"
            );
        }
    }

    #[test]
    fn dual_stack_public_approved() {
        assert_eq!(guard().validate("http://dual.example").unwrap().addresses.len(), 2);
    }

    // --- Scheme ---

    #[test]
    fn non_http_schemes_rejected() {
        for url in ["ftp://example.com/", "file:///etc/passwd", "gopher://example.com"] {
            let err = guard().validate(url).unwrap_err();
            assert!(
                matches!(err, UrlSafetyError::UnsupportedScheme { .. }),
                "{url}: {err:?}"
            );
        }
    }

    // --- IP literals ---

    #[test]
    fn private_literals_rejected() {
        for (url, class) in [
            ("http://10.0.0.1", AddressClass::Private),
            ("http://172.16.0.1", AddressClass::Private),
            ("http://192.168.1.1", AddressClass::Private),
            ("http://127.0.0.2:8080", AddressClass::Loopback),
            ("http://169.254.1.1", AddressClass::LinkLocal),
            ("http://0.0.0.0", AddressClass::Unspecified),
        ] {
            assert_eq!(blocked_class(guard().validate(url).unwrap_err()), class, "{url}");
        }
    }

    #[test]
    fn ipv6_literals_rejected() {
        for (url, class) in [
            ("http://[::1]/", AddressClass::Loopback),
            ("http://[::]/", AddressClass::Unspecified),
            ("http://[fe80::1]/", AddressClass::LinkLocal),
            ("http://[fd00::1]/", AddressClass::UniqueLocal),
        ] {
            assert_eq!(blocked_class(guard().validate(url).unwrap_err()), class, "{url}");
        }
    }

    #[test]
    fn ipv4_mapped_ipv6_checked_against_ipv4_table() {
        let err = guard().validate("http://[::ffff:10.0.0.1]/").unwrap_err();
        assert_eq!(blocked_class(err), AddressClass::Private);
        assert!(!is_blocked_ip("::ffff:8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn obfuscated_ipv4_literal_rejected() {
        // The URL parser normalizes hex / shortened forms to 127.0.0.1.
        let err = guard().validate("http://0x7f.1/").unwrap_err();
        assert_eq!(blocked_class(err), AddressClass::Loopback);
    }

    #[test]
    fn public_literal_approved() {
        assert!(guard().validate("http://8.8.8.8/").is_ok());
    }

    // --- Names ---

    #[test]
    fn metadata_hosts_rejected() {
        for url in [
            "http://169.254.169.254/latest/meta-data/",
            "http://metadata.google.internal/",
            "http://METADATA.internal./",
        ] {
            let err = guard().validate(url).unwrap_err();
            assert!(matches!(err, UrlSafetyError::MetadataEndpoint { .. }), "{url}: {err:?}");
        }
    }

    #[test]
    fn localhost_names_rejected_without_dns() {
        for url in ["http://localhost:3000", "http://api.localhost/", "http://ip6-localhost/"] {
            let err = guard().validate(url).unwrap_err();
            assert!(matches!(err, UrlSafetyError::LocalHostname { .. }), "{url}: {err:?}");
        }
    }

    #[test]
    fn hosts_resolving_to_private_ranges_rejected() {
        for (url, class) in [
            ("http://intranet.example", AddressClass::Private),
            ("http://rebind.example", AddressClass::Loopback),
            ("http://cgnat.example", AddressClass::SharedAddress),
        ] {
            assert_eq!(blocked_class(guard().validate(url).unwrap_err()), class, "{url}");
        }
    }

    #[test]
    fn any_private_answer_rejects() {
        let err = guard().validate("http://mixed.example").unwrap_err();
        match err {
            UrlSafetyError::BlockedAddress { ip, range, .. } => {
                assert_eq!(ip, "192.168.0.10".parse::<IpAddr>().unwrap());
                assert_eq!(range, "192.168.0.0/16".parse::<IpNet>().unwrap());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resolution_failure_fails_closed() {
        let err = guard().validate("http://unknown.example").unwrap_err();
        assert!(matches!(err, UrlSafetyError::ResolutionFailed { .. }));
        let err = guard().validate("http://empty.example").unwrap_err();
        assert!(matches!(err, UrlSafetyError::NoAddresses { .. }));
    }

    #[test]
    fn invalid_url_rejected() {
        let err = guard().validate("http://").unwrap_err();
        assert!(matches!(err, UrlSafetyError::InvalidUrl { .. }));
    }

    // --- Policy knobs ---

    #[test]
    fn blocked_domain_and_subdomains() {
        let policy = UrlPolicy::new(
            true,
            false,
            HashSet::new(),
            HashSet::from(["example.com".to_string()]),
        );
        let g = guard_with(policy);
        for url in ["https://example.com", "https://www.example.com"] {
            let err = g.validate(url).unwrap_err();
            assert!(matches!(err, UrlSafetyError::BlockedDomain { .. }), "{url}");
        }
        // Suffix without a dot boundary is a different domain.
        let blocked = HashSet::from(["example.com".to_string()]);
        assert!(!is_blocked_domain("notexample.com", &blocked));
    }

    #[test]
    fn allowed_domain_bypasses_checks() {
        let policy = UrlPolicy::new(
            true,
            false,
            HashSet::from(["intranet.example".to_string()]),
            HashSet::new(),
        );
        let approved = guard_with(policy).validate("http://intranet.example/api").unwrap();
        assert!(approved.addresses.is_empty());
    }

    #[test]
    fn allow_private_still_blocks_metadata() {
        let policy = UrlPolicy::new(true, true, HashSet::new(), HashSet::new());
        let g = guard_with(policy);
        assert!(g.validate("http://10.0.0.1/api").is_ok());
        assert!(g.validate("http://intranet.example").is_ok());
        let err = g.validate("http://meta.example").unwrap_err();
        assert_eq!(blocked_class(err), AddressClass::Metadata);
    }

    #[test]
    fn disabled_policy_allows_everything_but_scheme_check() {
        let g = guard_with(UrlPolicy::permissive());
        assert!(g.validate("http://127.0.0.1").is_ok());
        assert!(g.validate("ftp://127.0.0.1").is_err());
    }

    // --- Redirects ---

    #[test]
    fn redirect_resolution() {
        let base = Url::parse("https://example.com/a/b").unwrap();
        assert_eq!(resolve_redirect(&base, "/c").unwrap().as_str(), "https://example.com/c");
        assert_eq!(
            resolve_redirect(&base, "http://127.0.0.1/").unwrap().as_str(),
            "http://127.0.0.1/"
        );
    }

    // --- Tool error conversion ---

    #[test]
    fn converts_to_network_denied() {
        let err: ToolError = guard().validate("http://10.0.0.1").unwrap_err().into();
        assert_eq!(err.kind(), clawgate_types::ErrorKind::NetworkDenied);
        assert!(err.to_string().contains("10.0.0.0/8"));
    }

    #[tokio::test]
    async fn validate_async_matches_sync() {
        let g = guard();
        assert!(g.validate_async("https://example.com").await.is_ok());
        assert!(g.validate_async("http://rebind.example").await.is_err());
    }
}
