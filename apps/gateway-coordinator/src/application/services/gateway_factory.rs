//! Broker gateway factory.
//!
//! Owns the constructor registry, per-broker settings and the instance
//! cache. One instance per broker type is shared until its settings change
//! or a caller explicitly asks for a fresh one.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::application::ports::{BrokerError, BrokerGateway, BrokerType, HealthReport};

/// Retry policy for idempotent gateway reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Backoff multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl RetrySettings {
    /// First backoff.
    #[must_use]
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Backoff ceiling.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    100
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

const fn default_multiplier() -> f64 {
    2.0
}

/// Settings a gateway is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Base URL of the gateway service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout for ordinary requests, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Added to a profile's timeout for connect and test calls.
    #[serde(default = "default_connect_timeout_buffer_secs")]
    pub connect_timeout_buffer_secs: u64,
    /// Timeout for status and health calls, in seconds.
    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,
    /// Retry policy for idempotent reads.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl GatewaySettings {
    /// Settings pointing at a base URL, defaults otherwise.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Ordinary request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect/test timeout for a profile timeout.
    #[must_use]
    pub const fn connect_timeout(&self, profile_timeout_secs: u32) -> Duration {
        Duration::from_secs(profile_timeout_secs as u64 + self.connect_timeout_buffer_secs)
    }

    /// Status/health timeout.
    #[must_use]
    pub const fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_buffer_secs: default_connect_timeout_buffer_secs(),
            status_timeout_secs: default_status_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_buffer_secs() -> u64 {
    10
}

const fn default_status_timeout_secs() -> u64 {
    5
}

/// Builds a gateway from its settings.
pub type GatewayConstructor =
    Arc<dyn Fn(&GatewaySettings) -> Result<Arc<dyn BrokerGateway>, BrokerError> + Send + Sync>;

/// Resolves broker types to gateway instances.
#[derive(Default)]
pub struct BrokerGatewayFactory {
    constructors: RwLock<HashMap<BrokerType, GatewayConstructor>>,
    settings: RwLock<HashMap<BrokerType, GatewaySettings>>,
    cache: RwLock<HashMap<BrokerType, Arc<dyn BrokerGateway>>>,
}

impl std::fmt::Debug for BrokerGatewayFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerGatewayFactory")
            .field("implemented", &self.implemented_types())
            .field("cached", &self.cache.read().keys().copied().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl BrokerGatewayFactory {
    /// Create a factory with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor for a broker type, replacing any previous
    /// one and evicting its cached instance.
    pub fn register(&self, broker: BrokerType, constructor: GatewayConstructor) {
        self.constructors.write().insert(broker, constructor);
        self.invalidate(broker);
    }

    /// Replace a broker's settings and evict its cached instance.
    pub fn configure(&self, broker: BrokerType, settings: GatewaySettings) {
        self.settings.write().insert(broker, settings);
        self.invalidate(broker);
        tracing::info!(broker = %broker, "Broker gateway reconfigured");
    }

    /// Current settings for a broker.
    #[must_use]
    pub fn settings(&self, broker: BrokerType) -> GatewaySettings {
        self.settings.read().get(&broker).cloned().unwrap_or_default()
    }

    /// Drop the cached instance for a broker.
    pub fn invalidate(&self, broker: BrokerType) {
        self.cache.write().remove(&broker);
    }

    /// Broker types with a registered constructor, sorted.
    #[must_use]
    pub fn implemented_types(&self) -> Vec<BrokerType> {
        let mut types: Vec<_> = self.constructors.read().keys().copied().collect();
        types.sort();
        types
    }

    /// Whether a constructor is registered for the broker.
    #[must_use]
    pub fn is_implemented(&self, broker: BrokerType) -> bool {
        self.constructors.read().contains_key(&broker)
    }

    /// The shared instance for a broker, constructing it on first use.
    pub fn get(&self, broker: BrokerType) -> Result<Arc<dyn BrokerGateway>, BrokerError> {
        if let Some(gateway) = self.cache.read().get(&broker) {
            return Ok(Arc::clone(gateway));
        }

        let mut cache = self.cache.write();
        // another caller may have built it between the two locks
        if let Some(gateway) = cache.get(&broker) {
            return Ok(Arc::clone(gateway));
        }
        let gateway = self.construct(broker)?;
        cache.insert(broker, Arc::clone(&gateway));
        tracing::debug!(broker = %broker, "Broker gateway instance created");
        Ok(gateway)
    }

    /// Resolve a broker token, then [`Self::get`].
    pub fn get_by_token(&self, token: &str) -> Result<Arc<dyn BrokerGateway>, BrokerError> {
        self.get(token.parse()?)
    }

    /// A new, uncached instance.
    pub fn create_fresh(&self, broker: BrokerType) -> Result<Arc<dyn BrokerGateway>, BrokerError> {
        self.construct(broker)
    }

    /// Health of every implemented broker, checked concurrently.
    ///
    /// A broker that cannot be constructed or whose check fails is reported
    /// unhealthy; it never prevents the others from being checked.
    pub async fn health_check_all(&self) -> BTreeMap<BrokerType, HealthReport> {
        let checks = self.implemented_types().into_iter().map(|broker| {
            let gateway = self.get(broker);
            async move {
                let report = match gateway {
                    Ok(gateway) => match gateway.health_check().await {
                        Ok(report) => report,
                        Err(e) => {
                            tracing::warn!(broker = %broker, error = %e, "Broker health check failed");
                            HealthReport::unhealthy(e.to_string())
                        }
                    },
                    Err(e) => HealthReport::unhealthy(e.to_string()),
                };
                (broker, report)
            }
        });

        futures::future::join_all(checks).await.into_iter().collect()
    }

    fn construct(&self, broker: BrokerType) -> Result<Arc<dyn BrokerGateway>, BrokerError> {
        let constructor = self
            .constructors
            .read()
            .get(&broker)
            .cloned()
            .ok_or(BrokerError::NotImplemented { broker })?;
        let settings = self.settings(broker);
        constructor(&settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        AccountSummary, BrokerOrder, BrokerOrderRequest, BrokerPosition, ConnectionStatus,
        ConnectionTestResult, ContractDetails, GatewayConnectionConfig, HistoricalBar,
        HistoricalDataRequest, Quote,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGateway {
        base_url: String,
        healthy: bool,
    }

    #[async_trait]
    impl BrokerGateway for StubGateway {
        fn broker_type(&self) -> BrokerType {
            BrokerType::Ibkr
        }

        async fn connect(
            &self,
            _config: &GatewayConnectionConfig,
        ) -> Result<ConnectionStatus, BrokerError> {
            Ok(ConnectionStatus::disconnected())
        }

        async fn disconnect(&self) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn connection_status(&self) -> Result<ConnectionStatus, BrokerError> {
            Ok(ConnectionStatus::disconnected())
        }

        async fn test_connection(
            &self,
            _config: &GatewayConnectionConfig,
        ) -> Result<ConnectionTestResult, BrokerError> {
            unimplemented!()
        }

        async fn health_check(&self) -> Result<HealthReport, BrokerError> {
            if self.healthy {
                Ok(HealthReport {
                    healthy: true,
                    details: json!({ "base_url": self.base_url }),
                })
            } else {
                Err(BrokerError::Connection {
                    message: "refused".to_string(),
                })
            }
        }

        async fn account_summary(&self) -> Result<AccountSummary, BrokerError> {
            unimplemented!()
        }

        async fn positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
            unimplemented!()
        }

        async fn orders(&self) -> Result<Vec<BrokerOrder>, BrokerError> {
            unimplemented!()
        }

        async fn place_order(
            &self,
            _request: &BrokerOrderRequest,
        ) -> Result<BrokerOrder, BrokerError> {
            unimplemented!()
        }

        async fn cancel_order(&self, _broker_order_id: &str) -> Result<bool, BrokerError> {
            unimplemented!()
        }

        async fn order_status(
            &self,
            _broker_order_id: &str,
        ) -> Result<Option<BrokerOrder>, BrokerError> {
            unimplemented!()
        }

        async fn search_contracts(
            &self,
            _symbol: &str,
        ) -> Result<Vec<ContractDetails>, BrokerError> {
            unimplemented!()
        }

        async fn historical_data(
            &self,
            _request: &HistoricalDataRequest,
        ) -> Result<Vec<HistoricalBar>, BrokerError> {
            unimplemented!()
        }

        async fn quote(&self, _symbol: &str) -> Result<Quote, BrokerError> {
            unimplemented!()
        }
    }

    fn counting_constructor(counter: Arc<AtomicUsize>, healthy: bool) -> GatewayConstructor {
        Arc::new(
            move |settings: &GatewaySettings| -> Result<Arc<dyn BrokerGateway>, BrokerError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(StubGateway {
                    base_url: settings.base_url.clone(),
                    healthy,
                }))
            },
        )
    }

    #[test]
    fn get_returns_cached_instance() {
        let built = Arc::new(AtomicUsize::new(0));
        let factory = BrokerGatewayFactory::new();
        factory.register(BrokerType::Ibkr, counting_constructor(Arc::clone(&built), true));

        let a = factory.get(BrokerType::Ibkr).unwrap();
        let b = factory.get(BrokerType::Ibkr).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn create_fresh_bypasses_cache() {
        let built = Arc::new(AtomicUsize::new(0));
        let factory = BrokerGatewayFactory::new();
        factory.register(BrokerType::Ibkr, counting_constructor(Arc::clone(&built), true));

        let cached = factory.get(BrokerType::Ibkr).unwrap();
        let fresh = factory.create_fresh(BrokerType::Ibkr).unwrap();
        assert!(!Arc::ptr_eq(&cached, &fresh));
        assert!(Arc::ptr_eq(&cached, &factory.get(BrokerType::Ibkr).unwrap()));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn configure_evicts_cached_instance() {
        let built = Arc::new(AtomicUsize::new(0));
        let factory = BrokerGatewayFactory::new();
        factory.register(BrokerType::Ibkr, counting_constructor(Arc::clone(&built), true));

        let before = factory.get(BrokerType::Ibkr).unwrap();
        factory.configure(
            BrokerType::Ibkr,
            GatewaySettings::with_base_url("http://gateway:9000"),
        );
        let after = factory.get(BrokerType::Ibkr).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(factory.settings(BrokerType::Ibkr).base_url, "http://gateway:9000");
    }

    #[test]
    fn known_but_unregistered_broker_is_not_implemented() {
        let factory = BrokerGatewayFactory::new();
        let Err(err) = factory.get(BrokerType::Schwab) else {
            panic!("expected NotImplemented");
        };
        assert_eq!(
            err,
            BrokerError::NotImplemented {
                broker: BrokerType::Schwab
            }
        );
    }

    #[test]
    fn unknown_token_is_unknown_broker() {
        let factory = BrokerGatewayFactory::new();
        let Err(err) = factory.get_by_token("etrade") else {
            panic!("expected UnknownBroker");
        };
        assert!(matches!(err, BrokerError::UnknownBroker { .. }));
    }

    #[tokio::test]
    async fn health_check_all_isolates_failures() {
        let factory = BrokerGatewayFactory::new();
        factory.register(
            BrokerType::Ibkr,
            counting_constructor(Arc::new(AtomicUsize::new(0)), true),
        );
        factory.register(
            BrokerType::Alpaca,
            counting_constructor(Arc::new(AtomicUsize::new(0)), false),
        );

        let reports = factory.health_check_all().await;
        assert_eq!(reports.len(), 2);
        assert!(reports[&BrokerType::Ibkr].healthy);
        assert!(!reports[&BrokerType::Alpaca].healthy);
        assert!(!reports.contains_key(&BrokerType::Schwab));
    }

    #[test]
    fn connect_timeout_adds_buffer() {
        let settings = GatewaySettings::default();
        assert_eq!(settings.connect_timeout(30), Duration::from_secs(40));
        assert_eq!(settings.status_timeout(), Duration::from_secs(5));
    }
}
