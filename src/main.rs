use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use poem::{Server, listener::TcpListener};
use tracing_subscriber::EnvFilter;

use messaging::{
    application::{
        services::{delivery::DeliveryClient, result_cache::ResultCache},
        usecases::{process_messages::ProcessOutcome, seed_messages::SeedMessagesUseCase},
    },
    config::Config,
    domain::repositories::MessageRepository,
    infrastructure::{
        cache::{in_memory::InMemoryResultCache, redis::RedisResultCache},
        messaging::webhook::WebhookClient,
        repositories::{
            in_memory::InMemoryMessageRepository,
            postgres::{self, PostgresMessageRepository},
        },
    },
    pipeline::{Pipeline, PipelineConfig},
    presentation::http::build_app,
};

#[derive(Parser, Debug)]
#[command(name = "messaging")]
#[command(about = "Rate-limited outbound message dispatch service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the read API, the dispatch queue and the periodic trigger
    Serve {
        /// Bind address (overrides HOST)
        #[arg(long)]
        host: Option<String>,
        /// HTTP port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Queue one batch of unsent messages and wait until it is delivered
    Process,
    /// Apply database migrations
    Migrate,
    /// Insert sample unsent messages
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::try_parse()?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Command::Process => process(config).await,
        Command::Migrate => migrate(config).await,
        Command::Seed => seed(config).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "messaging=info,poem=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_pipeline(&config).await?);
    let server_url = config.server_url();

    let trigger = {
        let pipeline = pipeline.clone();
        let every = config.trigger_interval;
        tokio::spawn(async move { pipeline.run_periodic(every).await })
    };

    let app = build_app(pipeline.api_state(), &server_url);
    tracing::info!(url = %server_url, "starting server");

    let result = Server::new(TcpListener::bind(format!("{}:{}", config.host, config.port)))
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
            },
            Some(Duration::from_secs(10)),
        )
        .await;

    trigger.abort();
    pipeline.queue.shutdown().await;
    result.map_err(anyhow::Error::from)
}

async fn process(config: Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config).await?;

    match pipeline.processor.execute().await? {
        ProcessOutcome::NothingToDo => {
            tracing::info!("nothing to do");
        }
        ProcessOutcome::Queued { queued, duplicates } => {
            tracing::info!(queued = queued.len(), duplicates = duplicates.len(), "messages queued");
            pipeline.queue.wait_idle().await;
            let stats = pipeline.queue.stats();
            tracing::info!(
                sent = stats.sent,
                already_sent = stats.already_sent,
                retried = stats.retried,
                failed = stats.failed,
                "processing finished"
            );
        }
    }

    pipeline.queue.shutdown().await;
    Ok(())
}

async fn migrate(config: Config) -> anyhow::Result<()> {
    let Some(url) = config.database_url.as_deref() else {
        anyhow::bail!("DATABASE_URL is required to run migrations");
    };
    let pool = postgres::connect(url, config.database_max_connections).await?;
    postgres::migrate(&pool).await?;
    tracing::info!("migrations applied");
    Ok(())
}

async fn seed(config: Config) -> anyhow::Result<()> {
    let repo = build_repository(&config).await?;
    let created = SeedMessagesUseCase::new(repo)
        .execute(SeedMessagesUseCase::samples())
        .await?;
    tracing::info!(count = created.len(), "sample messages created");
    Ok(())
}

async fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let repo = build_repository(config).await?;
    let cache = build_cache(config).await;
    let client: Arc<dyn DeliveryClient> = Arc::new(WebhookClient::new(config.webhook.clone())?);

    Ok(Pipeline::new(repo, client, cache, PipelineConfig::from(config)))
}

async fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn MessageRepository>> {
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = postgres::connect(url, config.database_max_connections).await?;
            let repo: Arc<dyn MessageRepository> = PostgresMessageRepository::new(pool);
            Ok(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory message store");
            Ok(Arc::new(InMemoryMessageRepository::new()))
        }
    }
}

async fn build_cache(config: &Config) -> Arc<dyn ResultCache> {
    let Some(url) = config.redis_url.as_deref() else {
        return Arc::new(InMemoryResultCache::new());
    };
    // the cache is best-effort, so an unreachable redis only degrades it
    match RedisResultCache::connect(url).await {
        Ok(cache) => Arc::new(cache) as Arc<dyn ResultCache>,
        Err(err) => {
            tracing::warn!(error = %err, "redis unavailable, using in-memory result cache");
            Arc::new(InMemoryResultCache::new())
        }
    }
}
