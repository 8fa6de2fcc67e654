//! Worker pool for the concurrent phases
//!
//! Tasks of a phase are handed out through a shared cursor. A failing or
//! panicking task stops the phase: workers stop claiming tasks and the
//! first failure is reported once every worker has returned.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Instant;

use rayon::prelude::*;

use crate::error::{LayoutError, LayoutResult};

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

/// Shared state of one phase run
struct PhaseControl {
    cursor: AtomicUsize,
    aborted: AtomicBool,
    failure: Mutex<Option<LayoutError>>,
}

impl PhaseControl {
    fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    fn next_task(&self, total: usize) -> Option<usize> {
        if self.aborted.load(Ordering::Acquire) {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        (index < total).then_some(index)
    }

    /// Keep the first failure and stop the phase
    fn fail(&self, err: LayoutError) {
        let mut failure = self.failure.lock().unwrap_or_else(|p| p.into_inner());
        if failure.is_none() {
            *failure = Some(err);
        }
        self.aborted.store(true, Ordering::Release);
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    fn into_result(self) -> LayoutResult<()> {
        match self.failure.into_inner().unwrap_or_else(|p| p.into_inner()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Results waiting to be consumed in task order
struct OrderedSlots<R> {
    state: Mutex<SlotState<R>>,
    ready: Condvar,
}

struct SlotState<R> {
    values: Vec<Option<R>>,
    aborted: bool,
}

impl<R> OrderedSlots<R> {
    fn new(len: usize) -> LayoutResult<Self> {
        let mut values = Vec::new();
        values.try_reserve_exact(len)?;
        values.resize_with(len, || None);
        Ok(Self {
            state: Mutex::new(SlotState { values, aborted: false }),
            ready: Condvar::new(),
        })
    }

    fn fill(&self, index: usize, value: R) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.values[index] = Some(value);
        self.ready.notify_all();
    }

    fn abort(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.aborted = true;
        self.ready.notify_all();
    }

    /// Block until slot `index` is filled. `None` once the run is aborted.
    fn take(&self, index: usize) -> Option<R> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        loop {
            if state.aborted {
                return None;
            }
            if let Some(value) = state.values[index].take() {
                return Some(value);
            }
            state = self.ready.wait(state).unwrap_or_else(|p| p.into_inner());
        }
    }
}

/// Attach phase and task to an error raised by a task. Resource errors and
/// errors already carrying a phase are kept as they are.
fn task_error(phase: &str, index: usize, err: LayoutError) -> LayoutError {
    match err {
        LayoutError::Resource { .. } | LayoutError::TaskFailed { .. } | LayoutError::Interrupted { .. } => err,
        other => LayoutError::task_failed(phase.to_string(), index, other.to_string()),
    }
}

impl WorkerPool {
    pub fn new(threads: usize) -> LayoutResult<Self> {
        if threads == 0 {
            return Err(LayoutError::config("worker pool needs at least one thread"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ovlx-worker-{}", i))
            .build()
            .map_err(|e| LayoutError::resource(format!("Failed to configure thread pool: {}", e)))?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `job` for every item. Returns the first failure; a panic in a
    /// task becomes [`LayoutError::Interrupted`].
    pub fn run_phase<T, F>(&self, phase: &str, items: &[T], job: F) -> LayoutResult<()>
    where
        T: Sync,
        F: Fn(&T) -> LayoutResult<()> + Sync,
    {
        let started = Instant::now();
        let control = PhaseControl::new();
        let workers = self.threads.min(items.len());
        self.pool.scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| {
                    while let Some(index) = control.next_task(items.len()) {
                        match catch_unwind(AssertUnwindSafe(|| job(&items[index]))) {
                            Ok(Ok(())) => {}
                            Ok(Err(err)) => {
                                control.fail(task_error(phase, index, err));
                                break;
                            }
                            Err(_) => {
                                log::error!("Task {} of phase '{}' panicked", index, phase);
                                control.fail(LayoutError::interrupted(phase));
                                break;
                            }
                        }
                    }
                });
            }
        });
        let result = control.into_result();
        log::debug!(
            "Phase '{}': {} tasks on {} threads in {:.2?}",
            phase,
            items.len(),
            workers,
            started.elapsed()
        );
        result
    }

    /// Run `job` for every item concurrently and feed the results to
    /// `drain` in item order on the calling thread. The drain is the only
    /// consumer, so it may mutate shared state without locking.
    pub fn run_ordered<T, R, F, D>(&self, phase: &str, items: &[T], job: F, mut drain: D) -> LayoutResult<()>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> LayoutResult<R> + Sync,
        D: FnMut(usize, R) -> LayoutResult<()>,
    {
        let started = Instant::now();
        let control = PhaseControl::new();
        let slots = OrderedSlots::new(items.len())?;
        let workers = self.threads.min(items.len());
        self.pool.in_place_scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| {
                    while let Some(index) = control.next_task(items.len()) {
                        match catch_unwind(AssertUnwindSafe(|| job(&items[index]))) {
                            Ok(Ok(value)) => slots.fill(index, value),
                            Ok(Err(err)) => {
                                control.fail(task_error(phase, index, err));
                                slots.abort();
                                break;
                            }
                            Err(_) => {
                                log::error!("Task {} of phase '{}' panicked", index, phase);
                                control.fail(LayoutError::interrupted(phase));
                                slots.abort();
                                break;
                            }
                        }
                    }
                });
            }

            for index in 0..items.len() {
                let Some(value) = slots.take(index) else {
                    break;
                };
                match catch_unwind(AssertUnwindSafe(|| drain(index, value))) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        control.fail(err);
                        slots.abort();
                        break;
                    }
                    Err(_) => {
                        control.fail(LayoutError::interrupted(phase));
                        slots.abort();
                        break;
                    }
                }
                if control.is_aborted() {
                    break;
                }
            }
        });
        let result = control.into_result();
        log::debug!(
            "Ordered phase '{}': {} tasks on {} threads in {:.2?}",
            phase,
            items.len(),
            workers,
            started.elapsed()
        );
        result
    }

    /// Order preserving parallel map
    pub fn map<T, R, F>(&self, phase: &str, items: &[T], f: F) -> LayoutResult<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        catch_unwind(AssertUnwindSafe(|| self.pool.install(|| items.par_iter().map(&f).collect())))
            .map_err(|_| LayoutError::interrupted(phase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(LayoutError::Config { .. })));
        assert_eq!(WorkerPool::new(3).unwrap().threads(), 3);
    }

    #[test]
    fn test_run_phase_visits_every_item() {
        let pool = WorkerPool::new(4).unwrap();
        let items: Vec<u64> = (1..=1000).collect();
        let sum = AtomicU64::new(0);
        pool.run_phase("sum", &items, |&x| {
            sum.fetch_add(x, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();
        assert_eq!(sum.load(Ordering::Relaxed), 500_500);
        pool.run_phase("empty", &Vec::<u64>::new(), |_| Ok(())).unwrap();
    }

    #[test]
    fn test_failing_task_stops_phase() {
        let pool = WorkerPool::new(2).unwrap();
        let items: Vec<usize> = (0..100).collect();
        let err = pool
            .run_phase("index", &items, |&x| {
                if x == 7 {
                    Err(LayoutError::config("bad sequence"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        match err {
            LayoutError::TaskFailed { phase, id, .. } => {
                assert_eq!(phase, "index");
                assert_eq!(id, 7);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_resource_error_passes_through() {
        let pool = WorkerPool::new(2).unwrap();
        let err = pool
            .run_phase("index", &[1, 2, 3], |_| Err(LayoutError::resource("out of memory")))
            .unwrap_err();
        assert!(matches!(err, LayoutError::Resource { .. }));
    }

    #[test]
    fn test_panic_becomes_interrupted() {
        let pool = WorkerPool::new(2).unwrap();
        let err = pool
            .run_phase("discovery", &[1, 2, 3], |&x| {
                if x == 2 {
                    panic!("worker crashed");
                }
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_fatal_phase_error());
        assert!(matches!(err, LayoutError::Interrupted { ref phase } if phase == "discovery"));
    }

    #[test]
    fn test_run_ordered_drains_in_order() {
        let pool = WorkerPool::new(4).unwrap();
        let items: Vec<u32> = (0..500).collect();
        let mut seen = Vec::new();
        pool.run_ordered(
            "discovery",
            &items,
            |&x| {
                if x % 7 == 0 {
                    std::thread::yield_now();
                }
                Ok(x * 2)
            },
            |index, value| {
                assert_eq!(value, index as u32 * 2);
                seen.push(index);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_ordered_stops_on_drain_error() {
        let pool = WorkerPool::new(2).unwrap();
        let items: Vec<u32> = (0..50).collect();
        let mut drained = 0;
        let err = pool
            .run_ordered(
                "discovery",
                &items,
                |&x| Ok(x),
                |index, _| {
                    drained += 1;
                    if index == 10 {
                        Err(LayoutError::resource("graph full"))
                    } else {
                        Ok(())
                    }
                },
            )
            .unwrap_err();
        assert!(matches!(err, LayoutError::Resource { .. }));
        assert_eq!(drained, 11);
    }

    #[test]
    fn test_run_ordered_reports_task_panic() {
        let pool = WorkerPool::new(3).unwrap();
        let items: Vec<u32> = (0..20).collect();
        let err = pool
            .run_ordered(
                "discovery",
                &items,
                |&x| {
                    if x == 5 {
                        panic!("bad hits");
                    }
                    Ok(x)
                },
                |_, _| Ok(()),
            )
            .unwrap_err();
        assert!(matches!(err, LayoutError::Interrupted { .. }));
    }

    #[test]
    fn test_map_preserves_order() {
        let pool = WorkerPool::new(3).unwrap();
        let items: Vec<usize> = (0..100).collect();
        let squares = pool.map("square", &items, |&x| x * x).unwrap();
        assert_eq!(squares[9], 81);
        assert_eq!(squares.len(), 100);
    }
}
