use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use cutils_workflow::{PoolConfig, TaskGroup, TaskHandle, TaskState};

use crate::{commands::load_pool_config, utils::format_duration};

pub struct RunArgs {
    pub jobs: usize,
    pub sleep_ms: u64,
    pub jitter_ms: u64,
    pub fail_every: usize,
    pub timeout_ms: u64,
    pub threads: Option<usize>,
    pub config: Option<String>,
}

/// Per-state job counts of a finished batch.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = match args.threads {
        Some(threads) => PoolConfig::fixed(threads),
        None => load_pool_config(args.config.as_deref())?,
    };
    let mut group = TaskGroup::with_config(config).with_context(|| "Failed to create thread pool")?;

    for index in 0..args.jobs {
        let jitter = if args.jitter_ms > 0 {
            fastrand::u64(0..=args.jitter_ms)
        } else {
            0
        };
        let sleep = Duration::from_millis(args.sleep_ms + jitter);
        let fail = args.fail_every > 0 && (index + 1) % args.fail_every == 0;
        group.try_add(move || {
            std::thread::sleep(sleep);
            if fail {
                Err(format!("job {index} failed on purpose"))
            } else {
                Ok(index)
            }
        });
    }

    let start = Instant::now();
    let mut batch = None;
    group
        .apply_with_timeout(Duration::from_millis(args.timeout_ms))
        .execute()
        .on_complete(|outcome| {
            outcome.on_failure(|e| log::error!("batch failed: {e}"));
            batch = Some(outcome.get());
        })
        .close();
    let elapsed = start.elapsed();

    let handles = batch
        .context("Batch produced no outcome")?
        .context("Batch failed to run")?;
    for (index, handle) in handles.iter().enumerate() {
        println!("job {index:>4}: {}", describe(handle));
    }
    let summary = summarize(&handles);
    println!(
        "{} jobs in {}: {} succeeded, {} failed, {} cancelled",
        handles.len(),
        format_duration(elapsed),
        summary.succeeded,
        summary.failed,
        summary.cancelled
    );
    Ok(())
}

pub fn summarize<T>(handles: &[TaskHandle<T>]) -> Summary {
    let mut summary = Summary::default();
    for handle in handles {
        match handle.state() {
            TaskState::Succeeded => summary.succeeded += 1,
            TaskState::Failed => summary.failed += 1,
            TaskState::Cancelled | TaskState::Pending => summary.cancelled += 1,
        }
    }
    summary
}

fn describe(handle: &TaskHandle<usize>) -> String {
    match (handle.state(), handle.value(), handle.error()) {
        (TaskState::Succeeded, Some(value), _) => format!("ok ({value})"),
        (TaskState::Failed, _, Some(e)) => format!("failed: {e}"),
        (TaskState::Cancelled, _, _) => "cancelled".to_string(),
        (state, _, _) => format!("{state:?}"),
    }
}
