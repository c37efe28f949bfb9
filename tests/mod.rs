use std::{sync::Arc, time::Duration};

use itertools::Itertools;
use parking_lot::Mutex;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tokio::time::{sleep, Instant};

use call_limiter::{debounce, throttle};

const WAIT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct Execution {
    at: Instant,
    args: usize,
}

#[derive(Debug, Default, Clone)]
struct Executions(Arc<Mutex<Vec<Execution>>>);

impl Executions {
    fn callable(&self) -> impl Fn((), usize) + Send + Sync + 'static {
        let executions = self.0.clone();
        move |_: (), args: usize| {
            executions.lock().push(Execution {
                at: Instant::now(),
                args,
            })
        }
    }

    fn take(&self) -> Vec<Execution> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// A client making calls with random gaps between them.
struct Client {
    rng: SmallRng,
}

impl Client {
    fn new() -> Self {
        let seed = rand::random();
        println!("Seed: {seed}");

        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Gaps uniformly distributed between zero and `max`.
    fn steady(&mut self, calls: usize, max: u64) -> Vec<Duration> {
        (0..calls)
            .map(|_| Duration::from_millis(self.rng.gen_range(0..=max)))
            .collect()
    }

    /// Mostly short gaps, with occasional pauses longer than [WAIT].
    ///
    /// No gap is exactly [WAIT] long, so it's always clear which burst a call belongs to.
    fn bursty(&mut self, calls: usize) -> Vec<Duration> {
        (0..calls)
            .map(|i| {
                let ms = if i == 0 {
                    0
                } else if self.rng.gen_bool(0.2) {
                    self.rng.gen_range(110..=300)
                } else {
                    self.rng.gen_range(0..=90)
                };
                Duration::from_millis(ms)
            })
            .collect()
    }
}

/// Make one call per gap, returning when each call was made.
async fn run(gaps: &[Duration], mut call: impl FnMut(usize)) -> Vec<Instant> {
    let mut times = Vec::with_capacity(gaps.len());
    for (n, gap) in gaps.iter().enumerate() {
        sleep(*gap).await;
        times.push(Instant::now());
        call(n);
    }
    sleep(WAIT * 3).await;
    times
}

/// The indices of the first and last calls of each burst.
fn bursts(gaps: &[Duration]) -> Vec<(usize, usize)> {
    let mut bursts = vec![];
    let mut first = 0;
    for (n, gap) in gaps.iter().enumerate().skip(1) {
        if *gap > WAIT {
            bursts.push((first, n - 1));
            first = n;
        }
    }
    bursts.push((first, gaps.len() - 1));
    bursts
}

#[tokio::test(start_paused = true)]
async fn throttle_random_schedule() {
    let executions = Executions::default();
    let throttled = throttle(executions.callable(), WAIT).unwrap();

    let gaps = Client::new().steady(300, 150);
    let calls = run(&gaps, |n| throttled.call((), n).unwrap()).await;

    let executions = executions.take();
    assert!(!executions.is_empty());

    for (a, b) in executions.iter().tuple_windows() {
        assert!(
            b.at.duration_since(a.at) >= WAIT,
            "executions too close: {a:?}, {b:?}"
        );
        assert!(a.args < b.args, "each call runs at most once, in order");
    }

    for execution in &executions {
        let n = execution.args;
        assert!(calls[n] <= execution.at);
        // A later call made before this execution would have replaced its args. Calls on the same
        // tick can go either way.
        if let Some(next) = calls.get(n + 1) {
            assert!(*next >= execution.at, "stale args in {execution:?}");
        }
    }

    assert_eq!(
        executions.last().map(|e| e.args),
        Some(gaps.len() - 1),
        "last call is never dropped"
    );
    assert!(!throttled.state().is_armed());
}

#[tokio::test(start_paused = true)]
async fn debounce_trailing_random_schedule() {
    let executions = Executions::default();
    let debounced = debounce(executions.callable(), WAIT, false).unwrap();

    let gaps = Client::new().bursty(200);
    let calls = run(&gaps, |n| debounced.call((), n).unwrap()).await;

    let executions = executions.take();
    let expected = bursts(&gaps)
        .into_iter()
        .map(|(_, last)| last)
        .collect_vec();

    assert_eq!(executions.iter().map(|e| e.args).collect_vec(), expected);
    for execution in &executions {
        assert_eq!(execution.at.duration_since(calls[execution.args]), WAIT);
    }
}

#[tokio::test(start_paused = true)]
async fn debounce_leading_random_schedule() {
    let executions = Executions::default();
    let debounced = debounce(executions.callable(), WAIT, true).unwrap();

    let gaps = Client::new().bursty(200);
    let calls = run(&gaps, |n| debounced.call((), n).unwrap()).await;

    let executions = executions.take();
    let expected = bursts(&gaps)
        .into_iter()
        .map(|(first, _)| first)
        .collect_vec();

    assert_eq!(executions.iter().map(|e| e.args).collect_vec(), expected);
    for execution in &executions {
        assert_eq!(execution.at, calls[execution.args], "runs synchronously");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_interval() {
    let executions = Executions::default();
    let throttled = throttle(executions.callable(), Duration::from_secs(1)).unwrap();

    let callers = (0..8)
        .map(|task| {
            let throttled = throttled.clone();
            tokio::spawn(async move {
                for n in 0..10 {
                    throttled.call((), task * 10 + n).unwrap();
                }
            })
        })
        .collect_vec();
    for caller in callers {
        caller.await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(
        executions.take().len(),
        2,
        "one leading and one trailing execution"
    );
}
