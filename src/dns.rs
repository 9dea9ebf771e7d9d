//! DNS lookup capability consumed by the SPF engine.
//!
//! The engine is agnostic to where answers come from: anything that can
//! resolve TXT, address, and MX queries works. [`HickoryResolver`] is the
//! production implementation; [`MockResolver`] serves tests and is exported
//! so downstream crates can script DNS answers as well.

use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    #[error("NXDOMAIN: domain does not exist")]
    NxDomain,
    #[error("no records of the requested type")]
    NoRecords,
    #[error("SERVFAIL: server failure")]
    ServFail,
    #[error("timeout")]
    Timeout,
    #[error("DNS error: {0}")]
    Other(String),
}

/// DNS resolver trait for abstracting DNS lookups.
pub trait DnsResolver: Clone + Send + Sync + 'static {
    /// TXT record values for `domain`.
    fn query_txt(&self, domain: &str)
        -> impl Future<Output = Result<Vec<String>, DnsError>> + Send;

    /// Combined A/AAAA addresses for `domain`.
    fn query_ip(&self, domain: &str)
        -> impl Future<Output = Result<Vec<IpAddr>, DnsError>> + Send;

    /// MX records for `domain` as `(preference, exchange host)` pairs,
    /// lowest preference first.
    fn query_mx(&self, domain: &str)
        -> impl Future<Output = Result<Vec<(u16, String)>, DnsError>> + Send;
}

/// Hickory DNS resolver implementation.
#[derive(Clone)]
pub struct HickoryResolver {
    resolver: TokioResolver,
}

impl HickoryResolver {
    pub fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let resolver = TokioResolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build();
        Ok(Self { resolver })
    }

    pub fn with_config(
        config: ResolverConfig,
        opts: ResolverOpts,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();
        Ok(Self { resolver })
    }

    fn classify_error(e: &hickory_resolver::ResolveError) -> DnsError {
        let msg = e.to_string().to_lowercase();
        if msg.contains("nxdomain") {
            DnsError::NxDomain
        } else if msg.contains("no record") {
            DnsError::NoRecords
        } else if msg.contains("timeout") {
            DnsError::Timeout
        } else if msg.contains("servfail") {
            DnsError::ServFail
        } else {
            DnsError::Other(e.to_string())
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new().expect("Failed to create default HickoryResolver")
    }
}

impl DnsResolver for HickoryResolver {
    async fn query_txt(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        match self.resolver.txt_lookup(domain).await {
            Ok(lookup) => Ok(lookup.iter().map(|txt| txt.to_string()).collect()),
            Err(e) => Err(Self::classify_error(&e)),
        }
    }

    async fn query_ip(&self, domain: &str) -> Result<Vec<IpAddr>, DnsError> {
        match self.resolver.lookup_ip(domain).await {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(e) => Err(Self::classify_error(&e)),
        }
    }

    async fn query_mx(&self, domain: &str) -> Result<Vec<(u16, String)>, DnsError> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => {
                let mut records: Vec<(u16, String)> = lookup
                    .iter()
                    .map(|mx| {
                        (
                            mx.preference(),
                            mx.exchange().to_string().trim_end_matches('.').to_string(),
                        )
                    })
                    .collect();
                records.sort_by_key(|(pref, _)| *pref);
                Ok(records)
            }
            Err(e) => Err(Self::classify_error(&e)),
        }
    }
}

/// Mock DNS resolver for testing.
///
/// Unregistered domains answer with empty record sets; use
/// [`set_nxdomain`](MockResolver::set_nxdomain) to make a name fail
/// outright. TXT queries are counted so tests can observe caching.
#[derive(Clone, Default)]
pub struct MockResolver {
    txt_records: Arc<Mutex<HashMap<String, Vec<String>>>>,
    ip_records: Arc<Mutex<HashMap<String, Vec<IpAddr>>>>,
    mx_records: Arc<Mutex<HashMap<String, Vec<(u16, String)>>>>,
    nxdomain: Arc<Mutex<Vec<String>>>,
    txt_queries: Arc<Mutex<usize>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_txt(&self, domain: &str, records: Vec<String>) {
        self.txt_records
            .lock()
            .unwrap()
            .insert(domain.to_lowercase(), records);
    }

    pub fn add_ip(&self, domain: &str, addrs: Vec<IpAddr>) {
        self.ip_records
            .lock()
            .unwrap()
            .insert(domain.to_lowercase(), addrs);
    }

    pub fn add_mx(&self, domain: &str, records: Vec<(u16, String)>) {
        self.mx_records
            .lock()
            .unwrap()
            .insert(domain.to_lowercase(), records);
    }

    pub fn set_nxdomain(&self, domain: &str) {
        self.nxdomain.lock().unwrap().push(domain.to_lowercase());
    }

    /// Number of TXT queries answered so far.
    pub fn txt_queries(&self) -> usize {
        *self.txt_queries.lock().unwrap()
    }

    fn check_nxdomain(&self, domain: &str) -> Result<(), DnsError> {
        if self.nxdomain.lock().unwrap().contains(&domain.to_lowercase()) {
            return Err(DnsError::NxDomain);
        }
        Ok(())
    }
}

impl DnsResolver for MockResolver {
    async fn query_txt(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        *self.txt_queries.lock().unwrap() += 1;
        self.check_nxdomain(domain)?;
        Ok(self
            .txt_records
            .lock()
            .unwrap()
            .get(&domain.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn query_ip(&self, domain: &str) -> Result<Vec<IpAddr>, DnsError> {
        self.check_nxdomain(domain)?;
        Ok(self
            .ip_records
            .lock()
            .unwrap()
            .get(&domain.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn query_mx(&self, domain: &str) -> Result<Vec<(u16, String)>, DnsError> {
        self.check_nxdomain(domain)?;
        Ok(self
            .mx_records
            .lock()
            .unwrap()
            .get(&domain.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}
