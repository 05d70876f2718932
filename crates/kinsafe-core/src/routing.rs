use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapters::build_adapter;
use crate::cache::{CacheMode, ResponseCache};
use crate::config::ProviderCredentials;
use crate::data_source::{DataSource, FetchRequest, Payload, RequestKind, SourceError};
use crate::degraded::{synthesize, DegradedNotice, DegradedReason};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::provider_policy::ProviderPolicy;
use crate::reachability::{AlwaysOnline, NetworkReachability};
use crate::throttling::{RateGate, RateLimiter};
use crate::ProviderId;

/// Where a resolved payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cache,
    Live,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedProvider {
    pub provider: ProviderId,
    pub reason: String,
}

/// Diagnostics attached to every fetch result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionMeta {
    pub origin: Origin,
    pub selected_provider: Option<ProviderId>,
    /// Providers actually invoked, in order.
    pub source_chain: Vec<ProviderId>,
    pub skipped: Vec<SkippedProvider>,
    /// `"{Provider}: {message}"` for every failed attempt.
    pub errors: Vec<String>,
    pub degraded: Option<DegradedNotice>,
    pub fingerprint: String,
    pub latency_ms: u64,
}

/// A payload plus the metadata describing how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub data: T,
    pub meta: ResolutionMeta,
}

impl<T> Resolved<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            data: f(self.data),
            meta: self.meta,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.meta.origin == Origin::Degraded
    }
}

/// Cache value: the normalized payload and the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload {
    pub payload: Payload,
    pub provider: ProviderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fixed provider priority per request kind.
pub fn default_priority(kind: RequestKind) -> &'static [ProviderId] {
    use ProviderId::*;

    match kind {
        RequestKind::CurrentConditions => &[OpenWeatherMap, WeatherApi, Nws, OpenMeteo],
        RequestKind::Forecast => &[OpenWeatherMap, WeatherApi, OpenMeteo],
        RequestKind::WeatherAlerts => &[Nws, WeatherApi],
        RequestKind::Earthquakes => &[Usgs, Emsc],
        RequestKind::Wildfires => &[Eonet],
        RequestKind::SevereWeather => &[Nws],
        RequestKind::CivilUnrest => &[Gdelt],
        RequestKind::Traffic => &[TomTom],
    }
}

#[derive(Debug, Default)]
struct Attempts {
    source_chain: Vec<ProviderId>,
    skipped: Vec<SkippedProvider>,
    errors: Vec<String>,
}

/// Tries providers in priority order behind a shared cache and rate gate.
///
/// `fetch` never fails for provider reasons: when no provider can serve a
/// request the result is a clearly marked degraded placeholder that is not
/// cached.
pub struct FallbackOrchestrator {
    sources: HashMap<ProviderId, Arc<dyn DataSource>>,
    chains: HashMap<RequestKind, Vec<ProviderId>>,
    ttls: HashMap<RequestKind, Duration>,
    timeouts: HashMap<ProviderId, Duration>,
    cache: ResponseCache<CachedPayload>,
    rate_gate: Arc<dyn RateGate>,
    reachability: Arc<dyn NetworkReachability>,
}

impl FallbackOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Registered providers, in id order.
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers = self.sources.keys().copied().collect::<Vec<_>>();
        providers.sort();
        providers
    }

    /// Effective chain for `kind` after unconfigured providers were removed.
    pub fn provider_chain(&self, kind: RequestKind) -> &[ProviderId] {
        self.chains
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn ttl_for(&self, kind: RequestKind) -> Duration {
        self.ttls
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_ttl())
    }

    pub fn cache(&self) -> &ResponseCache<CachedPayload> {
        &self.cache
    }

    /// Builder override if one was set, otherwise the source's own policy.
    pub fn timeout_for(&self, source: &dyn DataSource) -> Duration {
        self.timeouts
            .get(&source.id())
            .copied()
            .unwrap_or(source.policy().timeout)
    }

    pub async fn fetch(&self, request: &FetchRequest) -> Resolved<Payload> {
        let started = Instant::now();
        let kind = request.kind;
        let fingerprint = request.fingerprint();
        let cache_mode = request.options.cache_mode;

        if cache_mode == CacheMode::Use {
            if let Some(cached) = self.cache.get(&fingerprint).await {
                debug!(%kind, %fingerprint, provider = %cached.provider, "cache hit");
                return Resolved {
                    data: cached.payload,
                    meta: ResolutionMeta {
                        origin: Origin::Cache,
                        selected_provider: Some(cached.provider),
                        source_chain: Vec::new(),
                        skipped: Vec::new(),
                        errors: Vec::new(),
                        degraded: None,
                        fingerprint,
                        latency_ms: elapsed_ms(started),
                    },
                };
            }
            debug!(%kind, %fingerprint, "cache miss");
        }

        let mut attempts = Attempts::default();
        if !self.reachability.is_online() {
            return self.degrade(request, fingerprint, DegradedReason::Offline, attempts, started);
        }

        let chain = self.provider_chain(kind);
        for &provider in chain {
            let Some(source) = self.sources.get(&provider) else {
                continue;
            };

            if !self.rate_gate.try_acquire(provider) {
                debug!(%kind, %provider, "provider skipped, rate budget exhausted");
                attempts.skipped.push(SkippedProvider {
                    provider,
                    reason: String::from("rate limit budget exhausted for this window"),
                });
                continue;
            }

            attempts.source_chain.push(provider);
            match invoke(source.as_ref(), request, self.timeout_for(source.as_ref())).await {
                Ok(payload) => {
                    if cache_mode != CacheMode::Bypass {
                        self.cache
                            .put(
                                fingerprint.clone(),
                                CachedPayload {
                                    payload: payload.clone(),
                                    provider,
                                },
                                self.ttl_for(kind),
                            )
                            .await;
                    }

                    let latency_ms = elapsed_ms(started);
                    info!(%kind, %provider, latency_ms, failed_attempts = attempts.errors.len(), "live fetch succeeded");
                    return Resolved {
                        data: payload,
                        meta: ResolutionMeta {
                            origin: Origin::Live,
                            selected_provider: Some(provider),
                            source_chain: attempts.source_chain,
                            skipped: attempts.skipped,
                            errors: attempts.errors,
                            degraded: None,
                            fingerprint,
                            latency_ms,
                        },
                    };
                }
                Err(error) => {
                    warn!(%kind, %provider, code = error.code(), error = error.message(), "provider attempt failed");
                    attempts
                        .errors
                        .push(format!("{}: {}", provider.display_name(), error.message()));
                }
            }
        }

        let reason = if chain.is_empty() {
            DegradedReason::NoProviders
        } else if attempts.source_chain.is_empty() && !attempts.skipped.is_empty() {
            DegradedReason::RateLimited
        } else {
            DegradedReason::Exhausted
        };
        self.degrade(request, fingerprint, reason, attempts, started)
    }

    fn degrade(
        &self,
        request: &FetchRequest,
        fingerprint: String,
        reason: DegradedReason,
        attempts: Attempts,
        started: Instant,
    ) -> Resolved<Payload> {
        let notice = DegradedNotice::new(request.kind, reason, &attempts.errors);
        warn!(kind = %request.kind, reason = reason.as_str(), message = %notice.message, "returning degraded result");

        Resolved {
            data: synthesize(request, &notice),
            meta: ResolutionMeta {
                origin: Origin::Degraded,
                selected_provider: None,
                source_chain: attempts.source_chain,
                skipped: attempts.skipped,
                errors: attempts.errors,
                degraded: Some(notice),
                fingerprint,
                latency_ms: elapsed_ms(started),
            },
        }
    }

    /// One probe per registered provider, run concurrently. Bypasses the
    /// cache, the rate gate and fallback.
    pub async fn health_check(&self) -> BTreeMap<ProviderId, ProviderHealth> {
        let probes = self.providers().into_iter().filter_map(|provider| {
            let source = self.sources.get(&provider)?;
            let timeout = self.timeout_for(source.as_ref());
            Some(async move { (provider, probe(source.as_ref(), timeout).await) })
        });

        join_all(probes).await.into_iter().collect()
    }
}

async fn invoke(
    source: &dyn DataSource,
    request: &FetchRequest,
    timeout: Duration,
) -> Result<Payload, SourceError> {
    let payload = tokio::time::timeout(timeout, source.fetch(request))
        .await
        .map_err(|_| SourceError::timeout(format!("no response within {} ms", timeout.as_millis())))??;

    if !payload.satisfies(request.kind) {
        return Err(SourceError::malformed(format!(
            "returned a '{}' payload for a {} request",
            payload.shape(),
            request.kind
        )));
    }
    Ok(payload)
}

async fn probe(source: &dyn DataSource, timeout: Duration) -> ProviderHealth {
    let started = Instant::now();
    let outcome = tokio::time::timeout(timeout, source.probe())
        .await
        .unwrap_or_else(|_| {
            Err(SourceError::timeout(format!(
                "no response within {} ms",
                timeout.as_millis()
            )))
        });

    match outcome {
        Ok(()) => ProviderHealth {
            status: HealthStatus::Up,
            response_time_ms: elapsed_ms(started),
            error: None,
        },
        Err(error) => ProviderHealth {
            status: HealthStatus::Down,
            response_time_ms: elapsed_ms(started),
            error: Some(error.message().to_owned()),
        },
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Builds a [`FallbackOrchestrator`] from credentials and overrides.
///
/// Stock adapters are created for every provider whose key requirement is
/// met. Providers that need a key and have none are left out of every chain.
///
/// # Example
///
/// ```rust,ignore
/// use kinsafe_core::{OrchestratorBuilder, ProviderId};
///
/// let orchestrator = OrchestratorBuilder::from_env()
///     .with_rate_budget(ProviderId::Gdelt, 5)
///     .build();
/// ```
pub struct OrchestratorBuilder {
    credentials: ProviderCredentials,
    http_client: Option<Arc<dyn HttpClient>>,
    policies: BTreeMap<ProviderId, ProviderPolicy>,
    excluded: BTreeSet<ProviderId>,
    include_stock_sources: bool,
    sources: Vec<Arc<dyn DataSource>>,
    priorities: HashMap<RequestKind, Vec<ProviderId>>,
    ttls: HashMap<RequestKind, Duration>,
    timeouts: HashMap<ProviderId, Duration>,
    rate_gate: Option<Arc<dyn RateGate>>,
    reachability: Arc<dyn NetworkReachability>,
    cache: Option<ResponseCache<CachedPayload>>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            credentials: ProviderCredentials::default(),
            http_client: None,
            policies: BTreeMap::new(),
            excluded: BTreeSet::new(),
            include_stock_sources: true,
            sources: Vec::new(),
            priorities: HashMap::new(),
            ttls: HashMap::new(),
            timeouts: HashMap::new(),
            rate_gate: None,
            reachability: Arc::new(AlwaysOnline),
            cache: None,
        }
    }

    /// Reads provider keys and the NWS user agent from the environment.
    pub fn from_env() -> Self {
        Self::new().with_credentials(ProviderCredentials::from_env())
    }

    pub fn with_credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    fn policy_mut(&mut self, provider: ProviderId) -> &mut ProviderPolicy {
        self.policies
            .entry(provider)
            .or_insert_with(|| ProviderPolicy::default_for(provider))
    }

    pub fn with_base_url(mut self, provider: ProviderId, base_url: impl Into<String>) -> Self {
        let policy = self.policy_mut(provider).clone().with_base_url(base_url);
        self.policies.insert(provider, policy);
        self
    }

    pub fn with_rate_budget(mut self, provider: ProviderId, requests_per_minute: u32) -> Self {
        self.policy_mut(provider).requests_per_minute = requests_per_minute;
        self
    }

    /// Overrides the attempt timeout for `provider`, stock or custom.
    pub fn with_timeout(mut self, provider: ProviderId, timeout: Duration) -> Self {
        self.policy_mut(provider).timeout = timeout;
        self.timeouts.insert(provider, timeout);
        self
    }

    pub fn with_cache_ttl(mut self, kind: RequestKind, ttl: Duration) -> Self {
        self.ttls.insert(kind, ttl);
        self
    }

    /// Replaces the provider order for one request kind.
    pub fn with_priority(mut self, kind: RequestKind, chain: Vec<ProviderId>) -> Self {
        self.priorities.insert(kind, chain);
        self
    }

    pub fn without_provider(mut self, provider: ProviderId) -> Self {
        self.excluded.insert(provider);
        self
    }

    /// Registers a custom source. It replaces any stock adapter with the same
    /// id.
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Only sources added through [`Self::with_source`] are registered.
    pub fn without_stock_sources(mut self) -> Self {
        self.include_stock_sources = false;
        self
    }

    pub fn with_rate_limiter(mut self, rate_gate: Arc<dyn RateGate>) -> Self {
        self.rate_gate = Some(rate_gate);
        self
    }

    pub fn with_reachability(mut self, reachability: Arc<dyn NetworkReachability>) -> Self {
        self.reachability = reachability;
        self
    }

    /// Shares an existing cache, e.g. one pre-populated by a test.
    pub fn with_cache(mut self, cache: ResponseCache<CachedPayload>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> FallbackOrchestrator {
        let mut sources: HashMap<ProviderId, Arc<dyn DataSource>> = HashMap::new();

        if self.include_stock_sources {
            let http_client = self
                .http_client
                .clone()
                .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
            for provider in ProviderId::ALL {
                if self.excluded.contains(&provider) {
                    continue;
                }
                let policy = self
                    .policies
                    .get(&provider)
                    .cloned()
                    .unwrap_or_else(|| ProviderPolicy::default_for(provider));
                match build_adapter(provider, Arc::clone(&http_client), policy, &self.credentials) {
                    Some(adapter) => {
                        sources.insert(provider, adapter);
                    }
                    None => debug!(%provider, "provider disabled, no api key configured"),
                }
            }
        }

        for source in self.sources {
            if !self.excluded.contains(&source.id()) {
                sources.insert(source.id(), source);
            }
        }

        let chains = RequestKind::ALL
            .into_iter()
            .map(|kind| {
                let preferred = self
                    .priorities
                    .get(&kind)
                    .map_or(default_priority(kind), Vec::as_slice);
                (kind, plan_chain(kind, preferred, &sources))
            })
            .collect();

        let rate_gate = match self.rate_gate {
            Some(rate_gate) => rate_gate,
            None => {
                let limiter = sources.values().fold(RateLimiter::new(), |limiter, source| {
                    let budget = self
                        .policies
                        .get(&source.id())
                        .map_or(source.policy().requests_per_minute, |policy| {
                            policy.requests_per_minute
                        });
                    limiter.with_budget(source.id(), budget)
                });
                Arc::new(limiter) as Arc<dyn RateGate>
            }
        };

        FallbackOrchestrator {
            sources,
            chains,
            ttls: self.ttls,
            timeouts: self.timeouts,
            cache: self.cache.unwrap_or_default(),
            rate_gate,
            reachability: self.reachability,
        }
    }
}

/// Preferred providers first (deduplicated, registered and capable), then any
/// other registered provider that serves `kind`, in id order.
fn plan_chain(
    kind: RequestKind,
    preferred: &[ProviderId],
    sources: &HashMap<ProviderId, Arc<dyn DataSource>>,
) -> Vec<ProviderId> {
    let serves = |provider: &ProviderId| {
        sources
            .get(provider)
            .is_some_and(|source| source.capabilities().supports(kind))
    };

    let mut seen = HashSet::new();
    let mut chain = preferred
        .iter()
        .copied()
        .filter(|provider| serves(provider) && seen.insert(*provider))
        .collect::<Vec<_>>();

    let mut extras = sources
        .keys()
        .copied()
        .filter(|provider| serves(provider) && !seen.contains(provider))
        .collect::<Vec<_>>();
    extras.sort();
    chain.extend(extras);
    chain
}
