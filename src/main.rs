use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use component_finder::ComponentFinder;
use component_finder::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting component catalog refresh");

    let config = AppConfig::from_env()?;
    let finder = ComponentFinder::new(&config).await?;

    // Run once immediately; without a schedule its outcome is the exit status
    let initial = finder.refresh().await;

    let Some(schedule) = config.refresh_cron else {
        initial?;
        return Ok(());
    };

    if let Err(e) = initial {
        error!("Error during initial refresh: {:#}", e);
    }

    let mut sched = JobScheduler::new().await?;

    let job_finder = finder.clone();
    sched
        .add(Job::new_async(schedule.as_str(), move |_uuid, _l| {
            let finder = job_finder.clone();
            Box::pin(async move {
                if let Err(e) = finder.refresh().await {
                    error!("Error refreshing components: {:#}", e);
                }
            })
        })?)
        .await?;

    info!("Scheduler started - refreshing on '{}'", schedule);
    sched.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    sched.shutdown().await.ok();

    Ok(())
}
