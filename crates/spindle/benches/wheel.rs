use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use spindle::{Entry, HORIZON_NS, TimerWheel};

// Fixed anchor so bucket distribution is stable across runs.
const T0: i64 = 1_735_689_600_000_000_000;
const ENTRIES: i64 = 1_000;

fn populated_wheel() -> TimerWheel<i64, i64> {
    let mut wheel = TimerWheel::new(T0);
    for i in 0..ENTRIES {
        // Spread deadlines over the whole horizon to touch every ring.
        let deadline = T0 + 1 + (i * (HORIZON_NS / ENTRIES)) % HORIZON_NS;
        wheel.schedule(Entry::new(deadline, i, deadline, || {}));
    }
    wheel
}

fn bench_schedule(c: &mut Criterion) {
    c.bench_function("schedule_1k", |b| {
        b.iter_batched(
            || TimerWheel::<i64, i64>::new(T0),
            |mut wheel| {
                for i in 0..ENTRIES {
                    let deadline = T0 + 1 + (i * 1_000_003) % HORIZON_NS;
                    wheel.schedule(Entry::new(deadline, i, deadline, || {}));
                }
                black_box(wheel.len())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_advance_drain(c: &mut Criterion) {
    c.bench_function("advance_drain_1k", |b| {
        b.iter_batched(
            populated_wheel,
            |mut wheel| {
                let fired = wheel.advance(T0 + 2 * HORIZON_NS);
                black_box(fired)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_expiration_delay(c: &mut Criterion) {
    let wheel = populated_wheel();
    c.bench_function("expiration_delay", |b| {
        b.iter(|| black_box(wheel.expiration_delay()))
    });
}

criterion_group!(benches, bench_schedule, bench_advance_drain, bench_expiration_delay);
criterion_main!(benches);
