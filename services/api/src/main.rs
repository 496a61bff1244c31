use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::info;

use recipe_api::{
    AppState,
    config::{MediaBackend, Settings, StoreBackend},
    create_router,
    repositories::{MemoryStore, PgStore, Store, postgres::MIGRATOR},
    services::{AccountService, PasswordService},
    storage,
    validation::{normalize_email, validate_email, validate_password},
};
use recipe_common::{database, telemetry};

#[derive(Parser)]
#[command(name = "recipe-api", version, about = "Recipe REST API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Create a staff superuser account
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;

    telemetry::init_tracing(&settings.log.filter)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::Migrate => {
            connect_postgres(&settings).await?;
            info!("Migrations applied");
            Ok(())
        }
        Command::CreateSuperuser { email, password } => {
            create_superuser(settings, &email, &password).await
        }
    }
}

/// Connect to PostgreSQL and bring the schema up to date
async fn connect_postgres(settings: &Settings) -> Result<PgStore> {
    let pool = database::init_pool(&settings.database).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        bail!("Failed to connect to database");
    }

    database::run_migrations(&pool, &MIGRATOR).await?;

    Ok(PgStore::new(pool))
}

async fn build_store(settings: &Settings) -> Result<Arc<dyn Store>> {
    match settings.store.backend {
        StoreBackend::Postgres => Ok(Arc::new(connect_postgres(settings).await?)),
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn serve(settings: Settings) -> Result<()> {
    info!("Starting API service");

    let store = build_store(&settings).await?;
    let images = storage::from_settings(&settings.media).await?;
    let passwords = PasswordService::new(&settings.auth.password)?;

    let state = AppState::new(store, images, passwords, &settings.media)?;

    let mut app = create_router(state);
    if settings.media.backend == MediaBackend::Local {
        app = app.nest_service(
            &settings.media.public_url,
            ServeDir::new(&settings.media.root),
        );
    }

    let address = settings.server.address();
    let listener = TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn create_superuser(settings: Settings, email: &str, password: &str) -> Result<()> {
    if let Err(message) = validate_email(email.trim()) {
        bail!("email: {}", message);
    }
    if let Err(message) = validate_password(password) {
        bail!("password: {}", message);
    }

    let store = build_store(&settings).await?;
    let passwords = PasswordService::new(&settings.auth.password)?;
    let accounts = AccountService::new(store, passwords)?;

    let user = accounts
        .create_superuser(email, password)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to create superuser {}: {:?}",
                normalize_email(email.trim()),
                e
            )
        })?;

    info!("Created superuser {} (id {})", user.email, user.id);

    Ok(())
}
