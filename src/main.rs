use clap::Parser;
use isu_etl::app::workflow;
use isu_etl::utils::{logger, validation::Validate};
use isu_etl::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.log_json);

    tracing::info!("Starting isu-etl CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let from = config.from_stage;
    let strict = config.strict;
    let monitor = config.monitor;
    let cancel = workflow::cancel_on_ctrl_c();

    let exit_code = match workflow::run(config, from, monitor, cancel).await {
        Ok(summary) => workflow::report_success(&summary, strict),
        Err(e) => workflow::report_failure(&e),
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
