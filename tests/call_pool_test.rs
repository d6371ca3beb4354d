//! Integration tests for the in-process pool variant.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use showerpool::error::Error;
use showerpool::model::WorkItem;
use showerpool::pool::{CallLauncher, PoolConfig, WorkPool};
use showerpool::source::Source;
use uuid::Uuid;

fn fast_config(capacity: usize) -> PoolConfig {
    PoolConfig {
        capacity,
        log_dir: None,
        poll_interval: Duration::from_millis(10),
    }
}

fn numbered(n: u32) -> Source<u32> {
    Source::new(move || (0..n).map(|i| WorkItem::new(format!("item{i}"), i)))
}

#[tokio::test]
async fn every_argument_is_called_once() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let launcher = CallLauncher::new(move |n: u32| {
        let sink = Arc::clone(&sink);
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            sink.lock().unwrap().push(n);
            Ok::<_, Error>(())
        }
    });

    let mut pool = WorkPool::new(launcher, numbered(10), fast_config(3)).unwrap();
    let summary = pool.run().await.unwrap();

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, (0..10).collect::<Vec<u32>>());
    assert_eq!(summary.admitted, 10);
    assert_eq!(summary.reaped, 10);
    assert_eq!(summary.unsuccessful, 0);
}

#[tokio::test]
async fn calls_in_flight_stay_within_capacity() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (c, p) = (Arc::clone(&current), Arc::clone(&peak));
    let launcher = CallLauncher::new(move |_n: u32| {
        let (current, peak) = (Arc::clone(&c), Arc::clone(&p));
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, Error>(())
        }
    });

    let mut pool = WorkPool::new(launcher, numbered(12), fast_config(4)).unwrap();
    pool.run().await.unwrap();

    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=4).contains(&peak), "peak was {peak}");
    assert_eq!(current.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn blocking_calls_still_run_side_by_side() {
    let launcher = CallLauncher::new(|_n: u32| async {
        std::thread::sleep(Duration::from_millis(300));
        Ok::<_, Error>(())
    });

    let mut pool = WorkPool::new(launcher, numbered(3), fast_config(3)).unwrap();
    let start = Instant::now();
    let summary = pool.run().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.reaped, 3);
    assert_eq!(summary.unsuccessful, 0);
    assert!(
        elapsed < Duration::from_millis(750),
        "three 300ms calls at capacity 3 took {elapsed:?}"
    );
}

#[tokio::test]
async fn errors_and_panics_stay_inside_their_task() {
    let launcher = CallLauncher::new(|n: u32| async move {
        match n {
            1 => Err(Error::Other("stage exploded".to_string())),
            2 => panic!("callable panicked on {n}"),
            _ => Ok(()),
        }
    });

    let mut pool = WorkPool::new(launcher, numbered(5), fast_config(2)).unwrap();
    let summary = pool.run().await.unwrap();

    assert_eq!(summary.admitted, 5);
    assert_eq!(summary.reaped, 5);
    assert_eq!(summary.unsuccessful, 2);
}

#[tokio::test]
async fn reaped_call_reports_its_error() {
    let launcher = CallLauncher::new(|_: ()| async {
        Err::<(), _>(Error::Other("bad input file".to_string()))
    });
    let mut pool = WorkPool::new(launcher, Source::empty(), fast_config(1)).unwrap();

    pool.admit_keyed("only", ()).unwrap();
    let report = pool.reap("only").await.unwrap();

    assert!(!report.outcome.success);
    assert_eq!(report.outcome.exit_code, None);
    assert_eq!(report.outcome.error.as_deref(), Some("bad input file"));
}

#[tokio::test]
async fn in_process_tasks_write_no_logs() {
    let dir: PathBuf = std::env::temp_dir()
        .join("showerpool-test")
        .join(Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).unwrap();

    let launcher = CallLauncher::new(|_n: u32| async { Ok::<_, Error>(()) });
    let config = PoolConfig {
        log_dir: Some(dir.clone()),
        ..fast_config(2)
    };
    let mut pool = WorkPool::new(launcher, numbered(3), config).unwrap();
    pool.run().await.unwrap();

    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
}
