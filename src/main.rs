use clap::Parser;
use plan_enroll::config::session_config::SessionConfig;
use plan_enroll::utils::error::ErrorSeverity;
use plan_enroll::utils::{logger, validation::Validate};
use plan_enroll::{CliConfig, LocalStorage, SessionReport, SessionRunner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting plan-enroll");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        eprintln!("{}", e.user_friendly_message());
        eprintln!("Suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let session = match SessionConfig::from_file(&config.config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to load session file '{}': {}", config.config, e);
            eprintln!("Suggestion: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    let storage = LocalStorage::new(config.resolved_base_dir());
    let runner = SessionRunner::new(storage, session);

    let result = if config.dry_run {
        tracing::info!("Dry run: loading and executing without writing exports");
        dry_run(&runner).await
    } else {
        runner.run().await
    };

    match result {
        Ok(report) => {
            println!(
                "Plan {}: {} requests accepted, {} rejected",
                report.plan_id,
                report.accepted(),
                report.rejected()
            );
            for outcome in report.outcomes.iter().filter(|outcome| !outcome.accepted) {
                println!("  #{} {} {}: {}", outcome.index, outcome.action, outcome.target, outcome.message);
            }
            if config.dry_run {
                print!("{}", report.rosters_csv);
            }
        }
        Err(e) => {
            tracing::error!(
                "Session failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("{}", e.user_friendly_message());
            eprintln!("Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn dry_run(runner: &SessionRunner<LocalStorage>) -> plan_enroll::Result<SessionReport> {
    runner.config().validate()?;
    let inputs = runner.load_inputs().await?;
    runner.execute(&inputs)
}
