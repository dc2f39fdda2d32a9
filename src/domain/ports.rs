use crate::config::options::{
    DiscoveryOptions, FetchOptions, SeasonalBestOptions, WeatherOptions,
};
use crate::domain::model::{
    EnrichedCondition, FetchReport, LoadSummary, ResultRecord, TransformOutput, WeatherObservation,
    WeatherQuery,
};
use crate::domain::payload::{
    EventDetail, IndexPage, RaceDetail, RaceSummary, RawResult, SeasonEntry, SkaterCandidate,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn results_api(&self) -> &str;
    fn weather_api(&self) -> &str;
    fn output_path(&self) -> &str;
    fn database_path(&self) -> String;
    fn excluded_formats(&self) -> &[String];
    fn discovery(&self) -> DiscoveryOptions;
    fn fetch(&self) -> FetchOptions;
    fn weather(&self) -> WeatherOptions;
    fn seasonal_best(&self) -> SeasonalBestOptions;
}

/// Read-only access to the ISU results API.
#[async_trait]
pub trait ResultsApi: Send + Sync {
    async fn events_page(&self, page: u32) -> Result<IndexPage>;
    async fn event(&self, event_id: &str) -> Result<EventDetail>;
    async fn races(&self, event_id: &str) -> Result<Vec<RaceSummary>>;
    async fn race_detail(&self, event_id: &str, schedule_number: u32) -> Result<RaceDetail>;
    async fn race_results(&self, event_id: &str, schedule_number: u32) -> Result<Vec<RawResult>>;
}

/// Hourly historical weather for one venue and date range.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn hourly(&self, query: &WeatherQuery) -> Result<Vec<WeatherObservation>>;
}

/// Skater directory and season bests of SpeedSkatingResults.com.
#[async_trait]
pub trait SkaterApi: Send + Sync {
    /// Skaters whose family name starts with `family_name`, for one country
    async fn lookup(&self, family_name: &str, country: &str) -> Result<Vec<SkaterCandidate>>;
    async fn season_bests(&self, skater_id: &str, season: i32) -> Result<Vec<SeasonEntry>>;
}

/// Destination of the finished tables; each call replaces the table wholesale.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn replace_results(&self, rows: &[ResultRecord]) -> Result<u64>;
    async fn replace_conditions(&self, rows: &[EnrichedCondition]) -> Result<u64>;
    fn describe(&self) -> String;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<FetchReport>;
    async fn transform(&self, data: FetchReport) -> Result<TransformOutput>;
    async fn load(&self, result: TransformOutput) -> Result<LoadSummary>;

    /// 從中繼 CSV 重新載入 extract 的輸出，用於從 enrich 階段重跑
    async fn read_extracted(&self) -> Result<FetchReport>;

    /// 從中繼 CSV 重新載入 transform 的輸出，用於只重跑 load
    async fn read_transformed(&self) -> Result<TransformOutput>;
}
