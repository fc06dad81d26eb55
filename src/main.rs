use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

use warden::identity::TokenDirectory;
use warden::restapi::engine::ResourceEngine;
use warden::restapi::hashing::{hash_password, verify_password};
use warden::restapi::validation::Validator;
use warden::restapi::ApiState;
use warden::settings::{Backend, Settings};
use warden::storage::{ConfigRepository, MemoryRepository, SqlRepository};
use warden::{bootstrap, web};

#[derive(Parser, Debug)]
#[command(
    name = "warden",
    version,
    about = "Management plane for security configuration"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an Argon2id hash for use in seed files
    Hash {
        #[arg(short, long)]
        password: String,
    },
    /// Check a plaintext password against a stored hash
    Verify {
        #[arg(long)]
        hash: String,
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Command::Hash { password }) => {
            let hash = hash_password(password)?;
            println!("{hash}");
            return Ok(());
        }
        Some(Command::Verify { hash, password }) => {
            if !verify_password(hash, password) {
                return Err(miette::miette!("password does not match the given hash"));
            }
            println!("ok");
            return Ok(());
        }
        None => {}
    }

    // load settings
    let settings = Settings::load(&cli.config)?;
    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        backend = ?settings.database.backend,
        "Loaded configuration"
    );

    // init storage
    let repository: Arc<dyn ConfigRepository> = match settings.database.backend {
        Backend::Sql => Arc::new(SqlRepository::connect(&settings.database.url).await?),
        Backend::Memory => Arc::new(MemoryRepository::new()),
    };

    let validator = Validator::new(settings.password_policy()?);
    bootstrap::initialize_store(
        repository.as_ref(),
        settings.bootstrap.seed_file.as_deref(),
        &validator,
    )
    .await?;

    let engine = ResourceEngine::new(
        repository,
        settings.protection_policy()?,
        validator,
        settings.engine_options(),
    );
    let state = Arc::new(ApiState {
        engine,
        identity: TokenDirectory::new(&settings.auth.tokens),
    });

    web::serve(&settings, state).await?;
    Ok(())
}
