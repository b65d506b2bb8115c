use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tea_quote::config::AppConfig;
use tea_quote::error::AppError;
use tea_quote::pricing::{ModelBundle, PredictionService};
use tea_quote::telemetry::{self, LogSink};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Load config, install logging, and load the model bundle.
///
/// A bundle that fails to load aborts the command before any lot is quoted.
pub(crate) fn bootstrap(
    manifest_override: Option<PathBuf>,
    sink: LogSink,
) -> Result<(AppConfig, Arc<PredictionService>), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(path) = manifest_override {
        config.artifacts.manifest_path = path;
    }

    telemetry::init(&config.telemetry, sink)?;
    let service = load_service(&config.artifacts.manifest_path)?;
    Ok((config, service))
}

pub(crate) fn load_service(manifest: &Path) -> Result<Arc<PredictionService>, AppError> {
    let bundle = ModelBundle::load(manifest)?;
    Ok(Arc::new(PredictionService::new(bundle)))
}

/// Treat blank CSV cells as absent values.
pub(crate) fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tea_quote::pricing::{
        BundleInfo, CategoryVocabulary, LinearPriceModel, ModelBundle, PredictionService,
    };

    /// Small linear bundle: ABC/BP1 on 05/06/2023 with 10 x 20kg prices at 254.00.
    pub(crate) fn service() -> Arc<PredictionService> {
        let vocabulary =
            CategoryVocabulary::new(["ABC", "DEF"], ["BOP", "BP1", "PF1"]).expect("vocabulary");
        let model = LinearPriceModel::new(
            vec![0.5, 0.25, 0.0, 1.0, 2.0, 100.0, 60.0, 10.0, 30.0, 50.0],
            80.0,
        );
        let info = BundleInfo {
            version: "fixture".to_string(),
            trained_on: NaiveDate::from_ymd_opt(2023, 6, 1).expect("valid date"),
            feature_count: 10,
        };
        let bundle = ModelBundle::from_parts(info, vocabulary, Arc::new(model)).expect("bundle");
        Arc::new(PredictionService::new(bundle))
    }
}
