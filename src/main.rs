use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

use bookstore_api::api_docs::ApiDoc;
use bookstore_api::config::Config;
use bookstore_api::seed::SuperuserOutcome;
use bookstore_api::{db, seed, server};

#[derive(Parser, Debug)]
#[command(name = "bookstore-api")]
#[command(about = "Bookstore catalog REST API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Poll the database until it accepts connections before starting
        #[arg(long)]
        wait_for_db: bool,
    },
    /// Load the demo catalog; safe to run repeatedly
    Seed,
    /// Create a staff superuser unless the username is taken
    CreateSuperuser {
        #[arg(long, env = "SUPERUSER_USERNAME")]
        username: String,
        #[arg(long, env = "SUPERUSER_EMAIL", default_value = "")]
        email: String,
        #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Block until the database accepts connections
    WaitForDb {
        /// Give up after this many attempts
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Print the OpenAPI document as JSON
    Openapi,
}

fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("bookstore_api={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

async fn run(command: Command, config: Config) -> Result<(), String> {
    match command {
        Command::Serve { wait_for_db } => {
            if wait_for_db {
                db::wait_for_db(&config.database_url, None)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            let conn = db::init_db(&config.database_url)
                .await
                .map_err(|e| format!("Failed to initialize database: {}", e))?;

            if env_flag("SEED_DEMO") {
                tracing::info!("Seeding demo data...");
                if let Err(e) = seed::seed_demo_data(&conn).await {
                    tracing::error!("Failed to seed data: {}", e);
                }
            }

            server::serve(config, conn)
                .await
                .map_err(|e| format!("Server error: {}", e))
        }
        Command::Seed => {
            let conn = db::init_db(&config.database_url)
                .await
                .map_err(|e| format!("Failed to initialize database: {}", e))?;
            seed::seed_demo_data(&conn)
                .await
                .map(|_| ())
                .map_err(|e| format!("Failed to seed data: {}", e))
        }
        Command::CreateSuperuser {
            username,
            email,
            password,
        } => {
            let conn = db::init_db(&config.database_url)
                .await
                .map_err(|e| format!("Failed to initialize database: {}", e))?;
            match seed::ensure_superuser(&conn, &username, &email, &password).await {
                Ok(SuperuserOutcome::Created) => {
                    println!("Superuser '{}' created", username);
                    Ok(())
                }
                Ok(SuperuserOutcome::AlreadyExists) => {
                    println!("Superuser '{}' already exists - skipping", username);
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            }
        }
        Command::WaitForDb { max_attempts } => {
            db::wait_for_db(&config.database_url, max_attempts)
                .await
                .map_err(|e| format!("Database never became available: {}", e))
        }
        Command::Openapi => {
            let json = ApiDoc::openapi()
                .to_pretty_json()
                .map_err(|e| e.to_string())?;
            println!("{}", json);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!("Loaded configuration: {:?}", config);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start the async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.unwrap_or(Command::Serve { wait_for_db: false });
    match runtime.block_on(run(command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
