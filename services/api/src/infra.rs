use loan_desk::config::{AppConfig, StorageConfig};
use loan_desk::error::AppError;
use loan_desk::workflows::origination::{
    ApplicationStatus, ApplicationStore, DecisionPolicy, FileStorage, LoanProduct, MemoryStorage,
    NavigationTarget, Navigator, OriginationService, StorageBackend, StorageError,
    WeightedRandomPolicy,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type DeskService = OriginationService<ConfiguredStorage, TracingNavigator>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Storage chosen by `APP_STORAGE_DIR`: files when set, process memory otherwise.
#[derive(Debug, Clone)]
pub(crate) enum ConfiguredStorage {
    Memory(MemoryStorage),
    File(FileStorage),
}

impl ConfiguredStorage {
    pub(crate) fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        match &config.directory {
            Some(directory) => Ok(Self::File(FileStorage::open(directory)?)),
            None => Ok(Self::Memory(MemoryStorage::new())),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            ConfiguredStorage::Memory(_) => "in-memory".to_string(),
            ConfiguredStorage::File(storage) => storage.root().display().to_string(),
        }
    }
}

impl StorageBackend for ConfiguredStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            ConfiguredStorage::Memory(storage) => storage.get(key),
            ConfiguredStorage::File(storage) => storage.get(key),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            ConfiguredStorage::Memory(storage) => storage.set(key, value),
            ConfiguredStorage::File(storage) => storage.set(key, value),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self {
            ConfiguredStorage::Memory(storage) => storage.remove(key),
            ConfiguredStorage::File(storage) => storage.remove(key),
        }
    }
}

/// Headless navigator: there is no UI to route, so requests become log lines.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, target: NavigationTarget) {
        info!(
            application_id = %target.application_id(),
            path = %target.path(),
            "status page update"
        );
    }
}

pub(crate) fn build_service(
    config: &AppConfig,
) -> Result<(Arc<DeskService>, Arc<ConfiguredStorage>), AppError> {
    let storage = Arc::new(ConfiguredStorage::from_config(&config.storage)?);
    let policy: Arc<dyn DecisionPolicy> =
        Arc::new(WeightedRandomPolicy::from_config(&config.simulation));
    let service = OriginationService::new(
        Arc::new(ApplicationStore::new(storage.clone())),
        Arc::new(TracingNavigator),
        policy,
        &config.simulation,
    );
    Ok((Arc::new(service), storage))
}

pub(crate) fn parse_product(raw: &str) -> Result<LoanProduct, String> {
    LoanProduct::parse(raw)
        .ok_or_else(|| format!("unknown product '{raw}' (expected mortgage or autoloan)"))
}

pub(crate) fn parse_status(raw: &str) -> Result<ApplicationStatus, String> {
    ApplicationStatus::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = ApplicationStatus::ALL
            .iter()
            .map(|status| status.label())
            .collect();
        format!("unknown status '{raw}' (expected one of {})", known.join(", "))
    })
}
