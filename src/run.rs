//! Wires pool, dispatcher and monitor together for one batch

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::GenError;
use crate::monitor::ProgressMonitor;
use crate::paths::PathPlanner;
use crate::pool::WorkerPool;
use crate::producer::{Logo, ProducerOptions};
use crate::report::{Outcome, RunSummary};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Generate every image in `config.range`.
///
/// Returns an error only for problems detected before any request is
/// submitted. Per-image failures end up in the summary.
pub async fn run(config: &Config, token: CancellationToken) -> Result<RunSummary, GenError> {
    let started_at = Utc::now();

    let logo = match &config.logo {
        Some(path) => {
            let logo = Logo::load(path, config.size, config.logo_percent)?;
            info!(path = %path.display(), size = logo.size(), "Logo loaded");
            Some(logo)
        }
        None => None,
    };

    let options = Arc::new(ProducerOptions {
        size: config.size,
        quality: config.quality,
        logo,
    });

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::start(
        config.worker_count,
        config.queue_size,
        options,
        events_tx,
        token.clone(),
    )?;
    info!(workers = pool.worker_count(), queue_size = config.queue_size, "Worker pool initialized");

    let dispatcher = Dispatcher::new(
        config.range,
        config.template.clone(),
        PathPlanner::new(&config.out_dir, config.shard_width),
    );
    let submitter = pool.submitter();
    let dispatch_token = token.clone();
    let dispatch = tokio::spawn(async move {
        if let Err(e) = dispatcher.dispatch(&submitter).await {
            // Only reachable once the run is being torn down
            error!(error = %e, "Dispatch stopped early");
            dispatch_token.cancel();
        }
    });

    let monitor = ProgressMonitor::new(
        config.range.len(),
        config.progress_interval,
        config.stall_intervals,
    );
    let (outcome, progress) = monitor.watch(&mut events_rx, &token).await;

    let drain = outcome == Outcome::Completed;
    if !drain {
        token.cancel();
    }
    if let Err(e) = dispatch.await {
        error!(error = %e, "Dispatcher task failed");
    }
    pool.shutdown(drain).await;

    let summary = RunSummary {
        started_at,
        finished_at: Utc::now(),
        range: config.range,
        total: progress.total,
        completed: progress.completed,
        failed: progress.failed,
        outcome,
        failures: progress.failures,
    };

    if outcome == Outcome::Completed {
        info!(
            start = config.range.start,
            end = config.range.end,
            completed = summary.completed,
            failed = summary.failed,
            "gen end"
        );
    } else {
        error!(
            outcome = ?outcome,
            completed = summary.completed,
            failed = summary.failed,
            total = summary.total,
            "gen incomplete"
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RangeSpec;
    use crate::producer::decode_qr_file;
    use crate::template::Template;
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn config(out_dir: &Path, start: u64, end: u64, workers: usize) -> Config {
        Config {
            template: Template::parse("ID-%06d").unwrap(),
            logo: None,
            logo_percent: 15,
            size: 64,
            range: RangeSpec::new(start, end).unwrap(),
            worker_count: workers,
            queue_size: 10,
            out_dir: out_dir.to_path_buf(),
            quality: 90,
            shard_width: 500,
            progress_interval: Duration::from_secs(10),
            stall_intervals: 0,
            report: None,
        }
    }

    fn files_under(root: &Path) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();
        for shard in std::fs::read_dir(root).unwrap() {
            let shard = shard.unwrap().path();
            for file in std::fs::read_dir(&shard).unwrap() {
                let file = file.unwrap().path();
                files.insert(file.strip_prefix(root).unwrap().to_path_buf());
            }
        }
        files
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_small_batch_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(&config(dir.path(), 0, 3, 2), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(summary.completed, 3);
        assert!(summary.is_success());

        let expected: BTreeSet<PathBuf> = (1..=3)
            .map(|n| PathBuf::from(format!("output_1_500/qrcode_{n}.jpg")))
            .collect();
        assert_eq!(files_under(dir.path()), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_empty_range() {
        let dir = tempfile::tempdir().unwrap();
        let summary = tokio::time::timeout(
            Duration::from_secs(10),
            run(&config(dir.path(), 5, 5, 2), CancellationToken::new()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(summary.total, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_output_independent_of_worker_count() {
        let one = tempfile::tempdir().unwrap();
        let many = tempfile::tempdir().unwrap();

        let mut cfg = config(one.path(), 495, 530, 1);
        cfg.size = 160;
        run(&cfg, CancellationToken::new()).await.unwrap();
        cfg.out_dir = many.path().to_path_buf();
        cfg.worker_count = 16;
        run(&cfg, CancellationToken::new()).await.unwrap();

        let files = files_under(one.path());
        assert_eq!(files.len(), 35);
        assert_eq!(files, files_under(many.path()));
        assert!(files.contains(&PathBuf::from("output_1_500/qrcode_500.jpg")));
        assert!(files.contains(&PathBuf::from("output_501_1000/qrcode_501.jpg")));

        for (file, text) in [
            ("output_1_500/qrcode_500.jpg", "ID-000500"),
            ("output_501_1000/qrcode_501.jpg", "ID-000501"),
        ] {
            assert_eq!(decode_qr_file(&one.path().join(file)), vec![text.to_string()]);
            assert_eq!(decode_qr_file(&many.path().join(file)), vec![text.to_string()]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rerun_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), 0, 4, 2);

        run(&cfg, CancellationToken::new()).await.unwrap();
        run(&cfg, CancellationToken::new()).await.unwrap();

        assert_eq!(files_under(dir.path()).len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_do_not_hang_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 0, 3, 2);
        cfg.template = Template::parse(&format!("{}%d", "x".repeat(3000))).unwrap();

        let summary = tokio::time::timeout(
            Duration::from_secs(30),
            run(&cfg, CancellationToken::new()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.failures.len(), 3);
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_missing_logo_fails_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 0, 3, 2);
        cfg.logo = Some(dir.path().join("missing.png"));

        let result = run(&cfg, CancellationToken::new()).await;
        assert!(matches!(result, Err(GenError::LogoError { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelled_run_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let summary = run(&config(dir.path(), 0, 100, 2), token).await.unwrap();
        assert_eq!(summary.outcome, Outcome::Aborted);
        assert!(summary.completed < 100);
    }
}
