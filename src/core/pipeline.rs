use crate::adapters::tables::{
    self, Column, CONDITIONS_FILE, ENRICHED_CONDITIONS_FILE, ENRICHED_CONDITION_COLUMNS,
    RAW_CONDITION_COLUMNS, RESULTS_FILE, RESULT_COLUMNS, TIMED_RESULTS_FILE,
};
use crate::core::discovery::Discoverer;
use crate::core::fetcher::Fetcher;
use crate::core::filter::EventFilter;
use crate::core::seasonal_best::SeasonalBestEnricher;
use crate::core::tfm::apply_estimated_tfm;
use crate::core::weather::WeatherEnricher;
use crate::domain::model::{
    ConditionRecord, EnrichedCondition, FetchReport, LoadSummary, ResultRecord, TransformOutput,
};
use crate::domain::ports::{
    ConfigProvider, Pipeline, ResultsApi, SkaterApi, Storage, TableStore, WeatherApi,
};
use crate::utils::error::{EtlError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// ISU results and conditions: discover, fetch, filter, enrich with weather,
/// estimate TFM, optionally add previous-season bests, load.
///
/// Every phase writes its output as `;`-delimited CSV through `storage`, so a
/// later run can start from any phase using the files of the previous one.
pub struct IsuPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    results_api: Arc<dyn ResultsApi>,
    store: Box<dyn TableStore>,
    filter: EventFilter,
    enricher: Mutex<WeatherEnricher>,
    seasonal_best: Option<Mutex<SeasonalBestEnricher>>,
}

impl<S: Storage, C: ConfigProvider> IsuPipeline<S, C> {
    pub fn new(
        storage: S,
        config: C,
        results_api: Arc<dyn ResultsApi>,
        weather_api: Arc<dyn WeatherApi>,
        store: Box<dyn TableStore>,
    ) -> Self {
        let filter = EventFilter::new(config.excluded_formats());
        let enricher = Mutex::new(WeatherEnricher::new(weather_api, config.weather()));
        Self {
            storage,
            config,
            results_api,
            store,
            filter,
            enricher,
            seasonal_best: None,
        }
    }

    /// 啟用前一季最佳成績查詢（在 TFM 之後執行）
    pub fn with_seasonal_best(mut self, api: Arc<dyn SkaterApi>) -> Self {
        let enricher = SeasonalBestEnricher::new(api, self.config.seasonal_best());
        self.seasonal_best = Some(Mutex::new(enricher));
        self
    }

    async fn write_table<T: Serialize>(&self, file: &str, columns: &[Column], rows: &[T]) -> Result<()> {
        let data = tables::to_csv(columns, rows)?;
        self.storage.write_file(file, &data).await?;
        tracing::info!("📝 Wrote {} rows to {}", rows.len(), file);
        Ok(())
    }

    async fn read_table<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let data = self.storage.read_file(file).await?;
        let rows = tables::from_csv(&data)?;
        tracing::info!("📂 Read {} rows from {}", rows.len(), file);
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for IsuPipeline<S, C> {
    async fn extract(&self) -> Result<FetchReport> {
        let refs = Discoverer::new(self.results_api.clone(), self.config.discovery())
            .discover()
            .await?;
        if refs.is_empty() {
            // 空的結果會把資料庫清空，當作錯誤處理
            return Err(EtlError::ProcessingError {
                message: "no competitions discovered".to_string(),
            });
        }
        let total = refs.len();

        let mut report = Fetcher::new(self.results_api.clone(), self.config.fetch())
            .fetch(refs)
            .await;
        if report.skipped.len() == total {
            return Err(EtlError::ProcessingError {
                message: format!("all {} competitions failed to fetch", total),
            });
        }

        report.results = self.filter.apply(report.results);
        report.conditions = self.filter.apply(report.conditions);

        self.write_table(RESULTS_FILE, RESULT_COLUMNS, &report.results).await?;
        self.write_table(CONDITIONS_FILE, RAW_CONDITION_COLUMNS, &report.conditions)
            .await?;
        Ok(report)
    }

    async fn transform(&self, data: FetchReport) -> Result<TransformOutput> {
        let FetchReport {
            mut results,
            conditions,
            skipped,
        } = data;

        let enriched = self.enricher.lock().await.enrich(conditions).await;
        apply_estimated_tfm(&mut results);

        let mut failures = skipped;
        failures.extend(enriched.unresolved);
        if let Some(seasonal_best) = &self.seasonal_best {
            let report = seasonal_best.lock().await.enrich(&mut results).await;
            failures.extend(report.failures);
        }

        self.write_table(TIMED_RESULTS_FILE, RESULT_COLUMNS, &results).await?;
        self.write_table(
            ENRICHED_CONDITIONS_FILE,
            ENRICHED_CONDITION_COLUMNS,
            &enriched.conditions,
        )
        .await?;

        Ok(TransformOutput {
            results,
            conditions: enriched.conditions,
            failures,
        })
    }

    async fn load(&self, result: TransformOutput) -> Result<LoadSummary> {
        let results_rows = self.store.replace_results(&result.results).await?;
        let conditions_rows = self.store.replace_conditions(&result.conditions).await?;

        Ok(LoadSummary {
            destination: self.store.describe(),
            results_rows,
            conditions_rows,
            failures: result.failures,
        })
    }

    async fn read_extracted(&self) -> Result<FetchReport> {
        let results: Vec<ResultRecord> = self.read_table(RESULTS_FILE).await?;
        let conditions: Vec<ConditionRecord> = self.read_table(CONDITIONS_FILE).await?;
        Ok(FetchReport {
            results: self.filter.apply(results),
            conditions: self.filter.apply(conditions),
            skipped: Vec::new(),
        })
    }

    async fn read_transformed(&self) -> Result<TransformOutput> {
        let results: Vec<ResultRecord> = self.read_table(TIMED_RESULTS_FILE).await?;
        let conditions: Vec<EnrichedCondition> = self.read_table(ENRICHED_CONDITIONS_FILE).await?;
        Ok(TransformOutput {
            results,
            conditions: conditions.into_iter().map(EnrichedCondition::normalized).collect(),
            failures: Vec::new(),
        })
    }
}
