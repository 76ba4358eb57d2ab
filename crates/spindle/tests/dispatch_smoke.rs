//! End-to-end checks: submissions travel through the queue, the wheel, and
//! the worker loop, and come out as executed jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use spindle::{Config, DispatchConfig, Dispatcher, LoggingConfig};

fn test_config() -> Config {
    Config {
        dispatch: DispatchConfig {
            workers: 1,
            max_park_ms: 5,
        },
        logging: LoggingConfig::default(),
    }
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    check()
}

#[test]
fn deferred_jobs_fire() {
    let mut dispatcher = Dispatcher::start(test_config()).expect("start");
    let handle = dispatcher.handle();
    let counter = Arc::new(AtomicUsize::new(0));

    for delay_ms in [0u64, 5, 20] {
        let ticks = Arc::clone(&counter);
        handle
            .defer(Duration::from_millis(delay_ms), move || {
                ticks.fetch_add(1, Ordering::SeqCst);
            })
            .expect("defer");
    }
    // Long overdue: runs on the next worker iteration.
    let ticks = Arc::clone(&counter);
    handle
        .defer_at(0, move || {
            ticks.fetch_add(1, Ordering::SeqCst);
        })
        .expect("defer_at");

    // The fired counter is aggregated after the jobs run, so wait on it
    // rather than on the jobs' own side effects.
    assert!(wait_until(Duration::from_secs(10), || {
        counter.load(Ordering::SeqCst) == 4 && dispatcher.metrics().fired == 4
    }));

    let metrics = dispatcher.metrics();
    assert_eq!(metrics.submitted, 4);
    assert_eq!(metrics.fired, 4);
    dispatcher.shutdown();
}

#[test]
fn jobs_can_chain_further_work() {
    let mut dispatcher = Dispatcher::start(test_config()).expect("start");
    let handle = dispatcher.handle();
    let done = Arc::new(AtomicBool::new(false));

    let chain = handle.clone();
    let flag = Arc::clone(&done);
    handle
        .defer(Duration::ZERO, move || {
            let flag = Arc::clone(&flag);
            chain
                .defer(Duration::from_millis(1), move || {
                    flag.store(true, Ordering::SeqCst);
                })
                .expect("chained defer");
        })
        .expect("defer");

    assert!(wait_until(Duration::from_secs(10), || {
        done.load(Ordering::SeqCst)
    }));
    dispatcher.shutdown();
}

#[test]
fn shutdown_discards_pending_work() {
    let mut dispatcher = Dispatcher::start(test_config()).expect("start");
    let handle = dispatcher.handle();
    let ran = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&ran);
    handle
        .defer(Duration::from_secs(3600), move || {
            flag.store(true, Ordering::SeqCst);
        })
        .expect("defer");
    assert_eq!(dispatcher.pending(), 1);

    dispatcher.shutdown();
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(dispatcher.metrics().discarded_on_shutdown, 1);
}

#[test]
fn many_producers_one_wheel() {
    let mut dispatcher = Dispatcher::start(test_config()).expect("start");
    let counter = Arc::new(AtomicUsize::new(0));
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 50;

    let mut producers = Vec::new();
    for _ in 0..PRODUCERS {
        let handle = dispatcher.handle();
        let ticks = Arc::clone(&counter);
        producers.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                let ticks = Arc::clone(&ticks);
                handle
                    .defer(Duration::from_millis((i % 10) as u64), move || {
                        ticks.fetch_add(1, Ordering::SeqCst);
                    })
                    .expect("defer");
            }
        }));
    }
    for producer in producers {
        producer.join().expect("producer thread");
    }

    assert!(wait_until(Duration::from_secs(20), || {
        counter.load(Ordering::SeqCst) == PRODUCERS * PER_PRODUCER
    }));
    assert_eq!(
        dispatcher.metrics().submitted,
        (PRODUCERS * PER_PRODUCER) as u64
    );
    dispatcher.shutdown();
}
