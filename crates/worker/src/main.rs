use std::sync::Arc;

use anyhow::{bail, Context};
use scenegraph_core::pipeline_spec::YamlSpecCodec;
use scenegraph_db::{GraphStore, LegacyCaseSource, PgGraphStore};
use scenegraph_engine::{CopyEngine, EngineConfig, Migrator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: scenegraph-worker migrate <project_id>... | copy <space_id>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenegraph_worker=debug,scenegraph_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next().context(USAGE)?;
    let ids = args
        .map(|a| a.parse::<i64>().with_context(|| format!("invalid id '{a}'")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if ids.is_empty() {
        bail!(USAGE);
    }

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
        .unwrap_or_else(|_| "20".into())
        .parse()
        .context("DATABASE_MAX_CONNECTIONS must be a number")?;

    let pool = scenegraph_db::create_pool(&database_url, max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    scenegraph_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    scenegraph_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let config = EngineConfig::from_env()?;
    let store = Arc::new(PgGraphStore::new(pool));

    match command.as_str() {
        "migrate" => {
            let graph_store: Arc<dyn GraphStore> = store.clone();
            let cases: Arc<dyn LegacyCaseSource> = store;
            let migrator = Migrator::new(graph_store, cases, Arc::new(YamlSpecCodec), config);
            for project_id in ids {
                let report = migrator
                    .migrate_project(project_id)
                    .await
                    .with_context(|| format!("migration of project {project_id} failed"))?;
                tracing::info!(
                    project_id,
                    space_id = report.space.id,
                    scenes = report.scenes,
                    forced = ?report.forced,
                    dropped = ?report.dropped,
                    "Project migrated",
                );
            }
        }
        "copy" => {
            let engine = CopyEngine::new(store, config);
            for space_id in ids {
                let handle = engine.copy_space(space_id, true).await?;
                let mut progress = handle.progress.clone();
                let watcher = tokio::spawn(async move {
                    while progress.changed().await.is_ok() {
                        let p = *progress.borrow_and_update();
                        tracing::debug!(
                            phase = %p.phase,
                            done = p.done,
                            total = p.total,
                            "Copy progress",
                        );
                    }
                });
                let report = handle.wait().await?;
                watcher.abort();
                tracing::info!(
                    space_id,
                    destination = report.destination_space_id,
                    status = %report.status,
                    unresolved = report.unresolved.len(),
                    "Copy complete",
                );
            }
        }
        other => bail!("unknown command '{other}'; {USAGE}"),
    }

    Ok(())
}
