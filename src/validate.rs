//! Per-address classification and order-preserving batch validation.
//!
//! What counts as valid is decided by a [`ValidationPolicy`] chosen when the
//! [`Validator`] is built. [`ShallowPolicy`] is the default and only requires exactly one
//! `@`. [`StrictPolicy`] adds a format regex, a disposable-domain list and an optional
//! domain lookup; it is never selected unless a caller asks for it.

use crate::cache::ExpiringCache;
use crate::config::{DOMAIN_CACHE_TTL, DOMAIN_LOOKUP_PORT, MAX_VALIDATION_WORKERS};
use crate::models::{ClassifiedEntry, Source};
use crate::normalize::normalize;
use crate::pool::parallel_map;
use memchr::memchr_iter;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

pub const REASON_EMPTY: &str = "Email cannot be empty";
pub const REASON_AT_COUNT: &str = "Email must contain exactly one @ symbol";
pub const REASON_FORMAT: &str = "Email format is invalid";
pub const REASON_DOMAIN: &str = "Email domain does not resolve";

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_\x60{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

static DISPOSABLE_DOMAINS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "mailinator.com",
        "tempmail.com",
        "temp-mail.org",
        "guerrillamail.com",
        "10minutemail.com",
        "yopmail.com",
        "sharklasers.com",
        "throwawaymail.com",
        "dispostable.com",
        "mailnesia.com",
        "mailcatch.com",
        "trashmail.com",
        "getnada.com",
        "temp-mail.ru",
        "fakeinbox.com",
        "tempinbox.com",
        "emailfake.com",
    ]
    .into_iter()
    .collect()
});

pub fn is_disposable_domain(domain: &str) -> bool {
    DISPOSABLE_DOMAINS.contains(domain.to_ascii_lowercase().as_str())
}

/// Outcome of a policy check on a trimmed, non-empty address
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    pub is_valid: bool,
    pub is_disposable: bool,
    pub reason: Option<String>,
}

impl Verdict {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }

    pub fn invalid(reason: &str) -> Self {
        Self {
            is_valid: false,
            is_disposable: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Decides validity of a single trimmed address. Must be total.
pub trait ValidationPolicy: Send + Sync {
    fn check(&self, email: &str) -> Verdict;
}

impl<F> ValidationPolicy for F
where
    F: Fn(&str) -> Verdict + Send + Sync,
{
    fn check(&self, email: &str) -> Verdict {
        self(email)
    }
}

fn at_count(email: &str) -> usize {
    memchr_iter(b'@', email.as_bytes()).count()
}

/// Valid iff the address is non-empty and has exactly one `@`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShallowPolicy;

impl ValidationPolicy for ShallowPolicy {
    fn check(&self, email: &str) -> Verdict {
        if email.is_empty() {
            return Verdict::invalid(REASON_EMPTY);
        }
        if at_count(email) != 1 {
            return Verdict::invalid(REASON_AT_COUNT);
        }
        Verdict::valid()
    }
}

/// Answers whether a mail domain exists
pub trait DomainCheck: Send + Sync {
    fn domain_exists(&self, domain: &str) -> bool;
}

/// Asks the system resolver for the domain's addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverDomainCheck;

impl DomainCheck for ResolverDomainCheck {
    fn domain_exists(&self, domain: &str) -> bool {
        match (domain, DOMAIN_LOOKUP_PORT).to_socket_addrs() {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                debug!(domain, error = %e, "Domain lookup failed");
                false
            }
        }
    }
}

/// Memoizes another [`DomainCheck`] in an [`ExpiringCache`].
pub struct CachedDomainCheck<C> {
    inner: C,
    cache: Arc<ExpiringCache<bool>>,
}

impl<C: DomainCheck> CachedDomainCheck<C> {
    pub fn new(inner: C) -> Self {
        Self::with_cache(inner, Arc::new(ExpiringCache::new()))
    }

    /// Shares `cache` with other checks, so results survive across validators.
    pub fn with_cache(inner: C, cache: Arc<ExpiringCache<bool>>) -> Self {
        Self { inner, cache }
    }
}

impl<C: DomainCheck> DomainCheck for CachedDomainCheck<C> {
    fn domain_exists(&self, domain: &str) -> bool {
        let key = domain.to_ascii_lowercase();
        if let Some(exists) = self.cache.get(&key) {
            trace!(domain, "Domain check cache hit");
            return exists;
        }
        let exists = self.inner.domain_exists(&key);
        self.cache.set(key, exists, DOMAIN_CACHE_TTL);
        exists
    }
}

/// Shallow checks, then format regex, disposable flag and an optional domain lookup.
///
/// Disposable addresses stay valid; the flag is informational.
#[derive(Default)]
pub struct StrictPolicy {
    domain_check: Option<Box<dyn DomainCheck>>,
}

impl StrictPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain_check(mut self, check: impl DomainCheck + 'static) -> Self {
        self.domain_check = Some(Box::new(check));
        self
    }
}

impl ValidationPolicy for StrictPolicy {
    fn check(&self, email: &str) -> Verdict {
        let shallow = ShallowPolicy.check(email);
        if !shallow.is_valid {
            return shallow;
        }
        if !EMAIL_REGEX.is_match(email) {
            return Verdict::invalid(REASON_FORMAT);
        }

        let domain = email.rsplit('@').next().unwrap_or_default();
        let is_disposable = is_disposable_domain(domain);
        if is_disposable {
            debug!(email, domain, "Disposable domain");
        }

        if let Some(check) = &self.domain_check {
            if !check.domain_exists(domain) {
                return Verdict {
                    is_disposable,
                    ..Verdict::invalid(REASON_DOMAIN)
                };
            }
        }

        Verdict {
            is_valid: true,
            is_disposable,
            reason: None,
        }
    }
}

/// Classifies addresses under one [`ValidationPolicy`].
#[derive(Clone)]
pub struct Validator {
    policy: Arc<dyn ValidationPolicy>,
    max_workers: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ShallowPolicy)
    }
}

impl Validator {
    pub fn new(policy: impl ValidationPolicy + 'static) -> Self {
        Self {
            policy: Arc::new(policy),
            max_workers: MAX_VALIDATION_WORKERS,
        }
    }

    pub fn strict() -> Self {
        Self::new(StrictPolicy::new())
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Classifies one address. `original` keeps the input untouched; the policy sees it
    /// trimmed, and the key is computed even when the address is invalid.
    pub fn validate(&self, address: impl Into<String>, source: Source) -> ClassifiedEntry {
        let original = address.into();
        let normalized_key = normalize(&original);
        let verdict = self.policy.check(original.trim());

        ClassifiedEntry {
            original,
            source,
            normalized_key,
            is_valid: verdict.is_valid,
            is_disposable: verdict.is_disposable,
            invalid_reason: verdict.reason,
        }
    }

    /// Classifies every address in parallel. Output index `i` always describes input `i`.
    pub fn validate_batch(&self, addresses: Vec<String>, source: Source) -> Vec<ClassifiedEntry> {
        let start = Instant::now();
        let total = addresses.len();
        info!(count = total, source = %source, "Validating addresses");

        let entries = parallel_map(addresses, self.max_workers, |address| {
            self.validate(address, source)
        });

        let valid = entries.iter().filter(|e| e.is_valid).count();
        let disposable = entries.iter().filter(|e| e.is_disposable).count();
        info!(
            source = %source,
            valid,
            total,
            disposable,
            duration_secs = start.elapsed().as_secs_f64(),
            "Batch validation complete"
        );

        entries
    }
}
