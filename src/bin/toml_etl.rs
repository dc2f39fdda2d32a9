use anyhow::Context;
use clap::Parser;
use isu_etl::app::workflow;
use isu_etl::config::toml_config::TomlConfig;
use isu_etl::core::etl::ResumePoint;
use isu_etl::domain::ports::ConfigProvider;
use isu_etl::utils::{logger, validation::Validate};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "isu-etl driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "isu-etl.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the output directory from config
    #[arg(long)]
    output_path: Option<String>,

    #[arg(long, value_enum, default_value_t = ResumePoint::Extract)]
    from_stage: ResumePoint,

    /// Exit non-zero when any competition or weather group failed
    #[arg(long)]
    strict: bool,

    /// Dry run - show the effective configuration without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 載入 TOML 配置（日誌格式由配置決定，所以先載入）
    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    logger::init_logger(args.verbose, config.monitoring.log_json);
    tracing::info!("🚀 Starting TOML-based isu-etl");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 應用命令列覆蓋設定
    if let Some(output_path) = &args.output_path {
        config.load.output_path = output_path.clone();
        tracing::info!("🔧 Output path overridden to: {}", output_path);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        return Ok(());
    }

    let monitor = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let cancel = workflow::cancel_on_ctrl_c();
    let exit_code = match workflow::run(config, args.from_stage, monitor, cancel).await {
        Ok(summary) => workflow::report_success(&summary, args.strict),
        Err(e) => workflow::report_failure(&e),
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    let fetch = config.fetch();
    let weather = config.weather();
    let discovery = config.discovery();

    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name, config.pipeline.version
    );
    println!("  Results API: {}", config.results_api());
    println!("  Weather API: {}", config.weather_api());
    println!("  Output: {}", config.output_path());
    println!("  Database: {}", config.database_path());
    println!(
        "  Discovery: from page {}, stop after {} empty pages",
        discovery.start_page, discovery.empty_pages_to_stop
    );
    println!("  Concurrent Requests: {}", fetch.concurrency);
    println!(
        "  Weather: {} decimals, {}ms between queries, {} attempts",
        weather.coordinate_decimals, weather.request_delay_ms, weather.retry.max_attempts
    );
    let seasonal_best = config.seasonal_best();
    if seasonal_best.enabled {
        println!("  Seasonal bests: {}", seasonal_best.api_url);
    }
    if !config.excluded_formats().is_empty() {
        println!("  Extra exclusions: {}", config.excluded_formats().join(", "));
    }
    println!("  Start from: {}", args.from_stage);

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
}
