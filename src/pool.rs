//! Worker pool for batched relatedness computation.
//!
//! A disambiguation run produces many independent pair queries; the pool
//! fans them out over OS threads and folds every finite score into a shared
//! dependency graph. Task node ids address that dependency graph, not the
//! store: callers flatten their candidate lists into a contiguous id space
//! and size the graph with [`RelatednessPool::reset`] before queueing.
//! Workers are spawned on the first `start` and then parked on a condvar
//! between runs; each keeps its own algorithm instance so scratch state
//! never crosses threads.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::error::PoolError;
use crate::graph::GraphStore;
use crate::relatedness::{AlgorithmKind, Relatedness};

/// One pending pair query. `from_node`/`to_node` are dependency-graph ids
/// assigned by the caller.
struct RelatednessTask {
    from: Arc<str>,
    to: Arc<str>,
    from_node: u32,
    to_node: u32,
}

/// Scores produced by a pool run: one edge per finite pair score, weighted
/// by the relatedness value.
pub type DependencyGraph = DiGraph<(), f64, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    Idle,
    Running,
}

struct PoolCtl {
    state: PoolState,
    /// Bumped on every `start`; workers compare it to the last generation
    /// they served so a late wakeup never re-runs a finished batch.
    generation: u64,
    active: usize,
    shutdown: bool,
    kind: AlgorithmKind,
    max_dist: usize,
}

struct PoolShared {
    store: Arc<GraphStore>,
    tasks: Mutex<VecDeque<RelatednessTask>>,
    result: Mutex<DependencyGraph>,
    ctl: Mutex<PoolCtl>,
    work_cv: Condvar,
    done_cv: Condvar,
}

pub struct RelatednessPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
    threads: usize,
}

impl RelatednessPool {
    pub fn new(
        store: Arc<GraphStore>,
        threads: usize,
        kind: AlgorithmKind,
        max_dist: usize,
    ) -> Self {
        let shared = Arc::new(PoolShared {
            store,
            tasks: Mutex::new(VecDeque::new()),
            result: Mutex::new(DependencyGraph::default()),
            ctl: Mutex::new(PoolCtl {
                state: PoolState::Idle,
                generation: 0,
                active: 0,
                shutdown: false,
                kind,
                max_dist,
            }),
            work_cv: Condvar::new(),
            done_cv: Condvar::new(),
        });
        Self {
            shared,
            workers: Vec::new(),
            threads: threads.max(1),
        }
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<MutexGuard<'_, PoolCtl>, PoolError> {
        let ctl = self.shared.ctl.lock().expect("pool lock poisoned");
        if ctl.state == PoolState::Running {
            return Err(PoolError::Busy { operation });
        }
        Ok(ctl)
    }

    /// Queue one pair for the next run. Unknown URIs are accepted; they
    /// simply score `+∞` and contribute no edge.
    pub fn add_task(
        &self,
        from: &str,
        to: &str,
        from_node: u32,
        to_node: u32,
    ) -> Result<(), PoolError> {
        let _ctl = self.ensure_idle("add_task")?;
        self.shared
            .tasks
            .lock()
            .expect("pool lock poisoned")
            .push_back(RelatednessTask {
                from: Arc::from(from),
                to: Arc::from(to),
                from_node,
                to_node,
            });
        Ok(())
    }

    pub fn task_count(&self) -> usize {
        self.shared.tasks.lock().expect("pool lock poisoned").len()
    }

    /// Drop queued tasks and reinitialize the dependency graph with
    /// `vertices` isolated nodes.
    pub fn reset(&self, vertices: usize) -> Result<(), PoolError> {
        let _ctl = self.ensure_idle("reset")?;
        self.shared.tasks.lock().expect("pool lock poisoned").clear();
        let mut result = self.shared.result.lock().expect("pool lock poisoned");
        result.clear();
        for _ in 0..vertices {
            result.add_node(());
        }
        Ok(())
    }

    /// Switch the algorithm for subsequent runs. Workers rebuild their
    /// instances the next time they pick up work.
    pub fn set_algorithm(&self, kind: AlgorithmKind, max_dist: usize) -> Result<(), PoolError> {
        let mut ctl = self.ensure_idle("set_algorithm")?;
        ctl.kind = kind;
        ctl.max_dist = max_dist;
        Ok(())
    }

    /// Kick off processing of the queued tasks on the worker threads.
    pub fn start(&mut self) -> Result<(), PoolError> {
        {
            let mut ctl = self.ensure_idle("start")?;
            ctl.state = PoolState::Running;
            ctl.generation += 1;
        }
        if self.workers.is_empty() {
            self.spawn_workers();
        }
        self.shared.work_cv.notify_all();
        Ok(())
    }

    /// Block until the current run has drained the task queue.
    pub fn join(&self) {
        let mut ctl = self.shared.ctl.lock().expect("pool lock poisoned");
        while ctl.state == PoolState::Running {
            ctl = self.shared.done_cv.wait(ctl).expect("pool lock poisoned");
        }
    }

    /// `start` followed by `join`.
    pub fn run(&mut self) -> Result<(), PoolError> {
        self.start()?;
        self.join();
        Ok(())
    }

    pub fn result(&self) -> MutexGuard<'_, DependencyGraph> {
        self.shared.result.lock().expect("pool lock poisoned")
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.shared.store
    }

    fn spawn_workers(&mut self) {
        for i in 0..self.threads {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("relatedness-{i}"))
                .spawn(move || worker(shared))
                .expect("failed to spawn relatedness worker");
            self.workers.push(handle);
        }
        debug!(threads = self.threads, "relatedness workers spawned");
    }
}

impl Drop for RelatednessPool {
    fn drop(&mut self) {
        {
            let mut ctl = self.shared.ctl.lock().expect("pool lock poisoned");
            ctl.shutdown = true;
        }
        self.shared.work_cv.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker(shared: Arc<PoolShared>) {
    let mut alg: Option<(AlgorithmKind, usize, Box<dyn Relatedness>)> = None;
    let mut served = 0u64;
    loop {
        let (kind, max_dist) = {
            let mut ctl = shared.ctl.lock().expect("pool lock poisoned");
            loop {
                if ctl.shutdown {
                    return;
                }
                if ctl.state == PoolState::Running && ctl.generation != served {
                    break;
                }
                ctl = shared.work_cv.wait(ctl).expect("pool lock poisoned");
            }
            served = ctl.generation;
            ctl.active += 1;
            (ctl.kind, ctl.max_dist)
        };

        let needs_rebuild = match &alg {
            Some((k, d, _)) => *k != kind || *d != max_dist,
            None => true,
        };
        if needs_rebuild {
            alg = Some((
                kind,
                max_dist,
                kind.instantiate(Arc::clone(&shared.store), max_dist),
            ));
        }
        let instance = &mut alg.as_mut().expect("algorithm instance missing").2;

        loop {
            let task = shared.tasks.lock().expect("pool lock poisoned").pop_front();
            let Some(task) = task else { break };
            let score = instance.relatedness(&task.from, &task.to);
            if score.is_finite() {
                let mut result = shared.result.lock().expect("pool lock poisoned");
                let needed = task.from_node.max(task.to_node) as usize + 1;
                while result.node_count() < needed {
                    result.add_node(());
                }
                result.add_edge(
                    NodeIndex::new(task.from_node as usize),
                    NodeIndex::new(task.to_node as usize),
                    score,
                );
            }
        }

        let mut ctl = shared.ctl.lock().expect("pool lock poisoned");
        ctl.active -= 1;
        if ctl.active == 0 {
            ctl.state = PoolState::Idle;
            shared.done_cv.notify_all();
        }
    }
}
