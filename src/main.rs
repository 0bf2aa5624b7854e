use census_etl::core::Pipeline;
use census_etl::utils::{logger, validation::Validate};
use census_etl::{
    AcsPipeline, BoundaryPipeline, Cli, Command, EtlConfig, EtlEngine, EtlError,
    JsonExportPipeline, Result, WktPipeline,
};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // a missing .env is fine
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if let Err(e) = run(&cli).await {
        std::process::exit(report(&e));
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let mut config = EtlConfig::load(cli.config.as_deref())?;
    if let Some(root) = &cli.project_root {
        config = config.with_project_root(root);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        return Err(e);
    }
    if cli.verbose {
        tracing::debug!("Resolved config: {:?}", config);
    }

    let config = Arc::new(config);
    match cli.command {
        Command::Plan => {
            println!("{}", census_etl::app::render_plan(&config)?);
            return Ok(());
        }
        Command::Boundaries => run_stage(BoundaryPipeline::new(config)).await?,
        Command::Acs => run_stage(AcsPipeline::new(config)).await?,
        Command::Wkt => run_stage(WktPipeline::new(config)).await?,
        Command::Export => run_stage(JsonExportPipeline::new(config)).await?,
        Command::All => {
            tracing::info!("🎬 Running all stages for {}", config.region.name);
            run_stage(BoundaryPipeline::new(config.clone())).await?;
            run_stage(AcsPipeline::new(config.clone())).await?;
            run_stage(WktPipeline::new(config.clone())).await?;
            run_stage(JsonExportPipeline::new(config)).await?;
        }
    }
    Ok(())
}

async fn run_stage<P: Pipeline>(pipeline: P) -> Result<()> {
    let output_path = EtlEngine::new(pipeline).run().await?;
    println!("📁 Output saved to: {}", output_path);
    Ok(())
}

/// Logs and prints the failure, returns the exit code.
fn report(e: &EtlError) -> i32 {
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        eprintln!("   caused by: {}", cause);
        source = cause.source();
    }
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    e.exit_code()
}
