use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};

use crate::config::CronConfig;
use crate::db::ledger::Ledger;
use crate::errors::AppResult;
use crate::services::batch::{run_batch, JobGuard};
use crate::services::settlement;

type StepFn<L> = Arc<dyn Fn(Arc<L>, usize, i64) -> BoxFuture<'static, AppResult<i64>> + Send + Sync>;

struct JobSpec<L> {
    name: &'static str,
    offset_ms: u64,
    batch_size: usize,
    step: StepFn<L>,
}

/// Spawn the four settlement jobs on their recurring schedule.
///
/// Jobs tick independently and may overlap each other; each job's own
/// `JobGuard` keeps it from overlapping itself within this process. A job
/// error ends that invocation and is logged; the next tick starts over.
pub fn spawn_settlement_jobs<L>(ledger: Arc<L>, cron: &CronConfig) -> Vec<JoinHandle<()>>
where
    L: Ledger + 'static,
{
    let jobs: Vec<JobSpec<L>> = vec![
        JobSpec {
            name: "finish_items",
            offset_ms: 0,
            batch_size: cron.finish_batch_size,
            step: Arc::new(|l, batch, cursor| {
                Box::pin(async move { settlement::finish_items_step(&*l, batch, cursor).await })
            }),
        },
        JobSpec {
            name: "pick_winner",
            offset_ms: 250,
            batch_size: cron.pick_winner_batch_size,
            step: Arc::new(|l, batch, cursor| {
                Box::pin(async move { settlement::pick_winner_step(&*l, batch, cursor).await })
            }),
        },
        JobSpec {
            name: "refund_losers",
            offset_ms: 500,
            batch_size: cron.refund_batch_size,
            step: Arc::new(|l, batch, cursor| {
                Box::pin(async move { settlement::refund_step(&*l, batch, cursor).await })
            }),
        },
        JobSpec {
            name: "pay_sellers",
            offset_ms: 550,
            // The pay job runs on the refund job's batch size.
            batch_size: cron.refund_batch_size,
            step: Arc::new(|l, batch, cursor| {
                Box::pin(async move { settlement::pay_step(&*l, batch, cursor).await })
            }),
        },
    ];

    jobs.into_iter()
        .map(|spec| spawn_job(Arc::clone(&ledger), cron.interval_secs, spec))
        .collect()
}

fn spawn_job<L>(ledger: Arc<L>, interval_secs: u64, spec: JobSpec<L>) -> JoinHandle<()>
where
    L: Ledger + 'static,
{
    let guard = JobGuard::new(spec.name);

    tokio::spawn(async move {
        let first_tick = Instant::now() + Duration::from_millis(spec.offset_ms);
        let mut ticker = interval_at(first_tick, Duration::from_secs(interval_secs));

        tracing::info!(
            job = spec.name,
            interval_secs,
            batch_size = spec.batch_size,
            "settlement job scheduled"
        );

        loop {
            ticker.tick().await;

            let Some(permit) = guard.try_acquire() else {
                tracing::debug!(job = spec.name, "previous run still going, skipping trigger");
                continue;
            };

            let ledger = Arc::clone(&ledger);
            let step = Arc::clone(&spec.step);
            let name = spec.name;
            let batch_size = spec.batch_size;

            tokio::spawn(async move {
                let started = Instant::now();
                let res = run_batch(|cursor| step(Arc::clone(&ledger), batch_size, cursor)).await;
                match res {
                    Ok(()) => tracing::debug!(
                        job = name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "batch drain complete"
                    ),
                    Err(err) => tracing::error!(job = name, error = %err.chain(), "settlement job failed"),
                }
                drop(permit);
            });
        }
    })
}
