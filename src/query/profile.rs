use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of pipeline profiling counters.
///
/// Profiling is enabled via the `ROWPIPE_PROFILE` environment variable and
/// tracks time spent compiling plans, driving sources, and evaluating filter
/// predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryProfileSnapshot {
    /// Total nanoseconds spent compiling plans into row sources.
    pub compile_ns: u64,
    /// Number of plan compilations.
    pub compile_count: u64,
    /// Total nanoseconds spent stepping sources to exhaustion.
    pub drive_ns: u64,
    /// Number of driven pipelines.
    pub drive_count: u64,
    /// Total source steps taken across all drives.
    pub steps: u64,
    /// Total nanoseconds spent evaluating filter predicates.
    pub filter_ns: u64,
    /// Number of filter predicate evaluations.
    pub filter_count: u64,
}

#[derive(Default)]
struct QueryProfileCounters {
    compile_ns: AtomicU64,
    compile_count: AtomicU64,
    drive_ns: AtomicU64,
    drive_count: AtomicU64,
    steps: AtomicU64,
    filter_ns: AtomicU64,
    filter_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<QueryProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("ROWPIPE_PROFILE").is_some())
}

fn counters() -> Option<&'static QueryProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(QueryProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

pub(crate) enum QueryProfileKind {
    /// Plan compilation.
    Compile,
    /// Driving a compiled source to `Done`.
    Drive,
    /// Filter predicate evaluation.
    Filter,
}

pub(crate) fn record_profile_timer(kind: QueryProfileKind, start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    match kind {
        QueryProfileKind::Compile => {
            counters.compile_ns.fetch_add(nanos, Ordering::Relaxed);
            counters.compile_count.fetch_add(1, Ordering::Relaxed);
        }
        QueryProfileKind::Drive => {
            counters.drive_ns.fetch_add(nanos, Ordering::Relaxed);
            counters.drive_count.fetch_add(1, Ordering::Relaxed);
        }
        QueryProfileKind::Filter => {
            counters.filter_ns.fetch_add(nanos, Ordering::Relaxed);
            counters.filter_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub(crate) fn record_steps(steps: u64) {
    if let Some(counters) = counters() {
        counters.steps.fetch_add(steps, Ordering::Relaxed);
    }
}

/// Retrieves a snapshot of the profiling counters.
///
/// Returns `None` unless `ROWPIPE_PROFILE` is set. With `reset`, counters are
/// zeroed as they are read.
///
/// ```no_run
/// use rowpipe::query::profile::profile_snapshot;
///
/// if let Some(snapshot) = profile_snapshot(false) {
///     println!("compiled {} plans", snapshot.compile_count);
/// }
/// ```
pub fn profile_snapshot(reset: bool) -> Option<QueryProfileSnapshot> {
    let counters = counters()?;
    let load = |counter: &AtomicU64| {
        if reset {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    };
    Some(QueryProfileSnapshot {
        compile_ns: load(&counters.compile_ns),
        compile_count: load(&counters.compile_count),
        drive_ns: load(&counters.drive_ns),
        drive_count: load(&counters.drive_count),
        steps: load(&counters.steps),
        filter_ns: load(&counters.filter_ns),
        filter_count: load(&counters.filter_count),
    })
}
