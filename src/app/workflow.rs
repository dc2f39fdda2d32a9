//! Wiring shared by the binaries: concrete adapters, Ctrl-C, reporting, exit codes.

use crate::adapters::isu::IsuClient;
use crate::adapters::open_meteo::OpenMeteoClient;
use crate::adapters::speed_skating::SpeedSkatingResultsClient;
use crate::adapters::sqlite::SqliteStore;
use crate::adapters::storage::LocalStorage;
use crate::core::etl::{CancelFlag, EtlEngine, ResumePoint};
use crate::core::pipeline::IsuPipeline;
use crate::domain::model::LoadSummary;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ErrorSeverity, EtlError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// 使用者中斷（慣例 128 + SIGINT）
pub const EXIT_CANCELLED: i32 = 130;
/// `--strict` 且有被略過的項目
pub const EXIT_PARTIAL: i32 = 2;

/// Builds the production pipeline: ISU + Open-Meteo over HTTP (plus
/// SpeedSkatingResults.com when seasonal bests are on), CSV files under the
/// output path, SQLite at the configured database path.
pub async fn build_pipeline<C: ConfigProvider>(config: C) -> Result<IsuPipeline<LocalStorage, C>> {
    let fetch = config.fetch();
    let weather = config.weather();
    let seasonal_best = config.seasonal_best();

    let results_api = Arc::new(IsuClient::new(
        config.results_api(),
        Duration::from_secs(fetch.request_timeout_secs),
    )?);
    let weather_api = Arc::new(OpenMeteoClient::new(
        config.weather_api(),
        Duration::from_secs(weather.request_timeout_secs),
    )?);
    let store = SqliteStore::open(Path::new(&config.database_path())).await?;
    let storage = LocalStorage::new(config.output_path());

    let pipeline = IsuPipeline::new(storage, config, results_api, weather_api, Box::new(store));
    if !seasonal_best.enabled {
        return Ok(pipeline);
    }

    tracing::info!("🏅 Seasonal bests from {}", seasonal_best.api_url);
    let skater_api = Arc::new(SpeedSkatingResultsClient::new(
        &seasonal_best.api_url,
        Duration::from_secs(seasonal_best.request_timeout_secs),
    )?);
    Ok(pipeline.with_seasonal_best(skater_api))
}

/// Cancels the returned flag on the first Ctrl-C; the run stops at the next phase boundary.
pub fn cancel_on_ctrl_c() -> CancelFlag {
    let flag = CancelFlag::new();
    let handle = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupt received, stopping after the current phase");
            handle.cancel();
        }
    });
    flag
}

pub async fn run<C: ConfigProvider>(
    config: C,
    from: ResumePoint,
    monitor: bool,
    cancel: CancelFlag,
) -> Result<LoadSummary> {
    let pipeline = build_pipeline(config).await?;
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor).with_cancel_flag(cancel);
    engine.run_from(from).await
}

pub fn exit_code_for(e: &EtlError) -> i32 {
    if matches!(e, EtlError::CancelledError { .. }) {
        return EXIT_CANCELLED;
    }
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 重試錯誤
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

/// Logs and prints a failed run, returns the exit code.
pub fn report_failure(e: &EtlError) -> i32 {
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    exit_code_for(e)
}

/// Prints the run report, returns the exit code.
pub fn report_success(summary: &LoadSummary, strict: bool) -> i32 {
    tracing::info!("✅ ETL process completed successfully!");
    println!("✅ ETL process completed successfully!");
    println!(
        "💾 {} results, {} conditions -> {}",
        summary.results_rows, summary.conditions_rows, summary.destination
    );

    if summary.failures.is_empty() {
        return 0;
    }

    println!("⚠️ {} items were skipped:", summary.failures.len());
    for failure in &summary.failures {
        println!("  - {}", failure);
    }
    if strict {
        EXIT_PARTIAL
    } else {
        0
    }
}
