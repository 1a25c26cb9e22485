//! Ordered provider fallback with a per-provider retry budget.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::http::build_client;
use super::{Geocoder, Provider, ProviderKind};
use crate::config::GeocodingConfig;
use crate::models::LatLng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Calls allowed per provider, at least one
    pub attempts: u32,
    /// Pause before retrying a provider after a transient failure
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, retry_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            retry_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Outcome of resolving one address
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found {
        location: LatLng,
        provider: String,
        label: Option<String>,
        /// Requests made across all providers
        attempts: u32,
    },
    NotFound {
        attempts: u32,
    },
}

impl Resolution {
    pub fn location(&self) -> Option<LatLng> {
        match self {
            Resolution::Found { location, .. } => Some(*location),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Resolution::Found { attempts, .. } | Resolution::NotFound { attempts } => *attempts,
        }
    }
}

/// Providers tried in order for each address
pub struct ProviderChain<G = Provider> {
    providers: Vec<G>,
    policy: RetryPolicy,
}

impl ProviderChain<Provider> {
    /// Build the configured providers around one shared HTTP client
    pub fn from_config(config: &GeocodingConfig) -> Result<Self> {
        let client = build_client(&config.user_agent, config.timeout())?;

        let mut providers = Vec::with_capacity(config.providers.len());
        for name in &config.providers {
            let kind: ProviderKind = name.parse().map_err(anyhow::Error::msg)?;
            if kind == ProviderKind::Google && config.google_api_key().is_none() {
                warn!("Google provider enabled without an API key; it will be skipped");
            }
            providers.push(Provider::from_config(kind, config, client.clone()));
        }

        let chain = Self::new(providers, config.retry_policy());
        info!(
            "Geocoding with [{}], {} attempt(s) per provider",
            chain.provider_names().join(", "),
            chain.policy.attempts
        );
        Ok(chain)
    }
}

impl<G: Geocoder> ProviderChain<G> {
    pub fn new(providers: Vec<G>, policy: RetryPolicy) -> Self {
        Self { providers, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve an address, falling back across providers.
    ///
    /// A provider that answers "no match" or fails permanently is left for
    /// the next one; transient failures are retried against the same
    /// provider up to `policy.attempts` calls.
    pub async fn resolve(&self, address: &str) -> Resolution {
        let mut calls = 0u32;
        let max = self.policy.attempts;

        for provider in &self.providers {
            for attempt in 1..=max {
                calls += 1;
                match provider.geocode(address).await {
                    Ok(Some(hit)) => {
                        debug!(
                            "{} resolved '{}' to ({}, {})",
                            provider.name(),
                            address,
                            hit.location.lat,
                            hit.location.lon
                        );
                        return Resolution::Found {
                            location: hit.location,
                            provider: provider.name().to_string(),
                            label: hit.label,
                            attempts: calls,
                        };
                    }
                    Ok(None) => {
                        warn!("{}: no match for '{}'", provider.name(), address);
                        break;
                    }
                    Err(e) if e.is_transient() => {
                        warn!(
                            "{}: {} for '{}' (attempt {}/{})",
                            provider.name(),
                            e,
                            address,
                            attempt,
                            max
                        );
                        if attempt < max {
                            tokio::time::sleep(self.policy.retry_delay).await;
                        }
                    }
                    Err(e) => {
                        warn!("{}: {} for '{}'", provider.name(), e, address);
                        break;
                    }
                }
            }
        }

        warn!("Could not find coordinates for '{}'", address);
        Resolution::NotFound { attempts: calls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoder::{ArcGis, GeocodeError, GeocodeHit, Google, Nominatim};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Reply = Result<Option<GeocodeHit>, GeocodeError>;

    /// Provider answering from a script, then "no match" forever
    struct Scripted {
        name: &'static str,
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, replies: Vec<Reply>) -> Self {
            Self {
                name,
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Geocoder for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn geocode(&self, _address: &str) -> Reply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn hit(lat: f64, lon: f64) -> Reply {
        Ok(Some(GeocodeHit {
            location: LatLng::new(lat, lon),
            label: None,
        }))
    }

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let chain = ProviderChain::new(
            vec![Scripted::new("a", vec![hit(1.0, 2.0)]), Scripted::new("b", vec![])],
            fast(3),
        );
        let res = chain.resolve("x").await;
        assert_eq!(res.location(), Some(LatLng::new(1.0, 2.0)));
        assert_eq!(res.attempts(), 1);
        assert_eq!(chain.providers[1].calls(), 0);
    }

    #[tokio::test]
    async fn test_no_match_falls_through_without_retry() {
        let chain = ProviderChain::new(
            vec![
                Scripted::new("osm", vec![Ok(None)]),
                Scripted::new("arcgis", vec![hit(-23.9, -46.3)]),
            ],
            fast(3),
        );
        match chain.resolve("Rua A").await {
            Resolution::Found {
                provider, attempts, ..
            } => {
                assert_eq!(provider, "arcgis");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(chain.providers[0].calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let chain = ProviderChain::new(
            vec![Scripted::new(
                "osm",
                vec![Err(GeocodeError::Timeout), Err(GeocodeError::Unavailable("503".into())), hit(5.0, 6.0)],
            )],
            fast(3),
        );
        let res = chain.resolve("x").await;
        assert_eq!(res.location(), Some(LatLng::new(5.0, 6.0)));
        assert_eq!(res.attempts(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_is_per_provider() {
        let chain = ProviderChain::new(
            vec![
                Scripted::new(
                    "osm",
                    vec![Err(GeocodeError::Timeout), Err(GeocodeError::Timeout), hit(0.0, 0.0)],
                ),
                Scripted::new("arcgis", vec![hit(7.0, 8.0)]),
            ],
            fast(2),
        );
        let res = chain.resolve("x").await;
        assert_eq!(res.location(), Some(LatLng::new(7.0, 8.0)));
        assert_eq!(chain.providers[0].calls(), 2);
        assert_eq!(res.attempts(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_skips_provider() {
        let chain = ProviderChain::new(
            vec![
                Scripted::new("google", vec![Err(GeocodeError::MissingApiKey("google"))]),
                Scripted::new("osm", vec![Ok(None)]),
            ],
            fast(3),
        );
        assert_eq!(chain.resolve("x").await, Resolution::NotFound { attempts: 2 });
        assert_eq!(chain.providers[0].calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_not_found() {
        let chain: ProviderChain<Scripted> = ProviderChain::new(vec![], fast(3));
        assert_eq!(chain.resolve("x").await, Resolution::NotFound { attempts: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_only_between_attempts() {
        let delay = Duration::from_secs(2);
        let chain = ProviderChain::new(
            vec![Scripted::new(
                "osm",
                vec![
                    Err(GeocodeError::Timeout),
                    Err(GeocodeError::Timeout),
                    Err(GeocodeError::Timeout),
                ],
            )],
            RetryPolicy::new(3, delay),
        );

        let start = tokio::time::Instant::now();
        assert_eq!(chain.resolve("x").await, Resolution::NotFound { attempts: 3 });
        assert_eq!(start.elapsed(), delay * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_delay_on_fallthrough() {
        let chain = ProviderChain::new(
            vec![
                Scripted::new("osm", vec![Ok(None)]),
                Scripted::new("arcgis", vec![Err(GeocodeError::Timeout), hit(1.0, 1.0)]),
            ],
            RetryPolicy::new(3, Duration::from_secs(2)),
        );

        let start = tokio::time::Instant::now();
        assert_eq!(chain.resolve("x").await.attempts(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn test_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }

    mod http {
        use super::*;
        use axum::extract::State;
        use axum::http::StatusCode;
        use axum::response::{IntoResponse, Json, Response};
        use axum::routing::get;
        use axum::Router;
        use serde_json::json;

        async fn nominatim_empty() -> Json<serde_json::Value> {
            Json(json!([]))
        }

        /// Fails with 503 on the first call, answers afterwards
        async fn arcgis_flaky(State(hits): State<Arc<AtomicUsize>>) -> Response {
            if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
            Json(json!({
                "candidates": [
                    {"address": "Rua A, Guarujá", "location": {"x": -46.25, "y": -23.99}, "score": 100}
                ]
            }))
            .into_response()
        }

        async fn slow() -> Json<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!([]))
        }

        async fn serve(hits: Arc<AtomicUsize>) -> String {
            let app = Router::new()
                .route("/osm/search", get(nominatim_empty))
                .route("/slow/search", get(slow))
                .route("/arcgis/findAddressCandidates", get(arcgis_flaky))
                .with_state(hits);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{}", addr)
        }

        #[tokio::test]
        async fn test_fallback_over_http() {
            let hits = Arc::new(AtomicUsize::new(0));
            let base = serve(hits.clone()).await;
            let client = build_client("geobatch-test", Duration::from_secs(5)).unwrap();

            let chain = ProviderChain::new(
                vec![
                    Provider::Google(Google::new(client.clone(), format!("{}/google", base), None)),
                    Provider::Nominatim(Nominatim::new(client.clone(), format!("{}/osm", base))),
                    Provider::ArcGis(ArcGis::new(client, format!("{}/arcgis", base))),
                ],
                fast(3),
            );

            match chain.resolve("Rua A, Guarujá, SP, Brazil").await {
                Resolution::Found {
                    location,
                    provider,
                    label,
                    attempts,
                } => {
                    assert_eq!(location, LatLng::new(-23.99, -46.25));
                    assert_eq!(provider, "arcgis");
                    assert_eq!(label.as_deref(), Some("Rua A, Guarujá"));
                    // google (no key) + osm (no match) + arcgis 503 + arcgis ok
                    assert_eq!(attempts, 4);
                }
                other => panic!("unexpected {:?}", other),
            }
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn test_timeouts_exhaust_budget() {
            let base = serve(Arc::new(AtomicUsize::new(0))).await;
            let client = build_client("geobatch-test", Duration::from_millis(200)).unwrap();

            let chain = ProviderChain::new(
                vec![Provider::Nominatim(Nominatim::new(client, format!("{}/slow", base)))],
                fast(2),
            );
            assert_eq!(
                chain.resolve("anywhere").await,
                Resolution::NotFound { attempts: 2 }
            );
        }
    }
}
