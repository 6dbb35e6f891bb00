//! relay - run one statement through db-relay and print the envelope.

mod cli;

use anyhow::Context;
use cli::Cli;
use db_relay::config::Config;
use db_relay::db;
use db_relay::{logging, MessagePolicy, QueryExecutor, Status};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    match run(&cli).await {
        Ok(Status::Success) => {}
        Ok(Status::Failure) => std::process::exit(1),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(2);
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<Status> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let database = cli.database_config(&config)?;
    info!("Database: {}", database.display_string());

    let provider = db::connect(&database)
        .await
        .context("could not open the connection pool")?;
    info!("Connected to {} pool", provider.backend().as_str());

    let executor = if cli.generic_messages {
        QueryExecutor::with_policy(MessagePolicy::Generic)
    } else {
        QueryExecutor::from_config(&config.executor)
    };
    let params = cli.parsed_params();

    let envelope = if cli.callback {
        let mut delivered = None;
        executor
            .execute_with_callback(&provider, &cli.statement, &params, |envelope| {
                delivered = Some(envelope)
            })
            .await;
        delivered.context("completion callback was not invoked")?
    } else {
        executor
            .execute_with_future(&provider, &cli.statement, &params)
            .await
            .unwrap_or_else(|failure| failure)
    };

    provider.close().await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(envelope.status())
}
