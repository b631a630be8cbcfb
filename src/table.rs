//! The owning handle for a color-conversion table. See §3 (`Table`) and §6 (`Destroy`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::config::{Concurrency, Method, TableConfig};
use crate::corner_cache::{CornerPtrCache, CornerRef, INVALID};
use crate::error::TableError;
use crate::evaluator::Evaluator;
use crate::grid::Grid;
use crate::lowmem::{self, PurgeContext};
use crate::numeric::{scaled_color, IndexVec};
use crate::registry::REGISTRY;

#[cfg(feature = "metrics")]
use crate::metrics::{MetricsCounters, TableMetrics};

/// `DispatcherState` from §3: per-table scratch used to short-circuit repeat inputs and to
/// anchor the in-progress mini-cube against concurrent purges.
pub(crate) struct DispatcherState {
    pub last_input: Option<SmallVec<[i32; 4]>>,
    pub last_output: SmallVec<[u16; 8]>,
    pub last_indices: IndexVec,
    pub last_inc_indices: IndexVec,
    pub last_hash: u32,
    pub last_id: u32,
    pub last_fracs: IndexVec,
    pub last_corners: Option<SmallVec<[CornerRef; 16]>>,
}

impl DispatcherState {
    fn new(dims: usize) -> Self {
        Self {
            last_input: None,
            last_output: SmallVec::new(),
            last_indices: IndexVec::from_elem(-1, dims),
            last_inc_indices: IndexVec::from_elem(-1, dims),
            last_hash: 0,
            last_id: INVALID,
            last_fracs: IndexVec::from_elem(0, dims),
            last_corners: None,
        }
    }

    /// `InvalidateCache()` from §4.3: forces the next `Convert` call to re-derive and re-probe.
    pub fn invalidate(&mut self) {
        self.last_id = INVALID;
        if !self.last_indices.is_empty() {
            self.last_indices[0] = -1;
        }
        self.last_corners = None;
        self.last_input = None;
    }
}

pub(crate) struct TableState {
    pub grid: Grid,
    pub cache: CornerPtrCache,
    pub dispatcher: DispatcherState,
    #[cfg(feature = "metrics")]
    pub metrics: MetricsCounters,
}

pub(crate) struct TableInner<E: Evaluator> {
    pub dims: usize,
    pub output_dims: usize,
    pub max_index: i32,
    pub base: Vec<f64>,
    pub scale: Vec<f64>,
    pub error_scale: Vec<f64>,
    pub error_tolerance: f64,
    pub smoothness: f64,
    pub method: Method,
    pub concurrency: Concurrency,
    pub evaluator: E,
    pub state: Mutex<TableState>,
    /// Front-end "beingUsed" flag (§4.6/§4.7): set for the duration of `Convert` so the
    /// low-memory handler knows to protect the in-flight mini-cube instead of purging freely.
    pub being_used: AtomicBool,
}

/// Object-safe handle the [`crate::registry::Registry`] uses to solicit/release memory from a
/// table without knowing its evaluator type.
pub trait PurgeableTable: Send + Sync {
    /// Attempts to reclaim approximately `bytes_needed` bytes, returning the amount actually
    /// reclaimed. Mirrors `Release` in §6.
    fn release(&self, bytes_needed: usize) -> usize;
}

impl<E> PurgeableTable for TableInner<E>
where
    E: Evaluator + Send + Sync,
{
    fn release(&self, bytes_needed: usize) -> usize {
        let preserve_in_use =
            self.concurrency == Concurrency::FrontEnd && self.being_used.load(Ordering::Acquire);
        let mut state = self.state.lock();

        let floor_owned: Option<Vec<i32>> = preserve_in_use
            .then(|| state.dispatcher.last_indices.iter().copied().collect());
        let inc_owned: Option<Vec<i32>> = preserve_in_use
            .then(|| state.dispatcher.last_inc_indices.iter().copied().collect());
        let ctx = PurgeContext {
            last_hash: Some(state.dispatcher.last_hash),
            floor_indices: floor_owned.as_deref(),
            inc_indices: inc_owned.as_deref(),
        };

        // Mid-`Convert`, only half the LRU rows are purged per solicitation so a single
        // low-memory hiccup doesn't evict everything the surrounding cache is relying on; a
        // caller soliciting between `Convert` calls (nothing to preserve) gets the whole
        // reclaimable set in one pass instead of needing repeated solicitations.
        let fraction = if preserve_in_use { 0.5 } else { 1.0 };
        let state = &mut *state;
        let reclaimed = lowmem::release(
            &mut state.grid,
            &mut state.cache,
            fraction,
            preserve_in_use,
            &ctx,
        );
        if !preserve_in_use {
            state.dispatcher.invalidate();
        }
        reclaimed.min(bytes_needed.max(1))
    }
}

/// A sparse N-dimensional lookup table accelerating evaluation of an [`Evaluator`].
///
/// Cloning a `Table` is cheap (it's a reference-counted handle, like every table handle the
/// registry and the caller both hold); the underlying grid, cache, and dispatcher state are
/// shared. Dropping the last handle deregisters the table (`Destroy`, §6).
pub struct Table<E: Evaluator> {
    pub(crate) inner: Arc<TableInner<E>>,
}

impl<E: Evaluator> Clone for Table<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Table<E>
where
    E: Evaluator + Send + Sync + 'static,
{
    /// Validates `config` and creates a new table wrapping `evaluator`. Registers the table
    /// with the process-wide registry so the low-memory handler can reach it.
    pub fn new(config: TableConfig, evaluator: E) -> Result<Self, TableError<E::Error>> {
        let max_index = config.validate()?;
        let dims = config.input_dims;

        let base: Vec<f64> = config.input_range.iter().map(|&(lo, _)| lo).collect();
        let scale: Vec<f64> = config
            .input_range
            .iter()
            .map(|&(lo, hi)| {
                if max_index > 0 {
                    (hi - lo) / max_index as f64
                } else {
                    0.0
                }
            })
            .collect();
        let error_scale: Vec<f64> = config
            .device_levels
            .iter()
            .map(|&levels| 1.0 / (levels.max(1) as f64))
            .collect();

        let grid = Grid::new(dims, config.grid_side, config.memory_limit_bytes, config.output_dims);
        let cache = CornerPtrCache::new(dims, config.grid_side, config.cache_bits);
        let state = TableState {
            grid,
            cache,
            dispatcher: DispatcherState::new(dims),
            #[cfg(feature = "metrics")]
            metrics: MetricsCounters::default(),
        };

        let inner = Arc::new(TableInner {
            dims,
            output_dims: config.output_dims,
            max_index,
            base,
            scale,
            error_scale,
            error_tolerance: config.error_tolerance,
            smoothness: config.smoothness,
            method: config.method,
            concurrency: config.concurrency,
            evaluator,
            state: Mutex::new(state),
            being_used: AtomicBool::new(false),
        });

        REGISTRY.register(inner.clone() as Arc<dyn PurgeableTable>);
        Ok(Table { inner })
    }

    /// `SCALED_COLOR` for this table: `maxIndex << FRACBITS`. Callers must scale raw `[lo,
    /// hi]` colors into `[0, scaled_color()]` before calling [`Self::convert`].
    pub fn scaled_color(&self) -> i32 {
        scaled_color(self.inner.max_index)
    }

    pub fn input_dims(&self) -> usize {
        self.inner.dims
    }

    pub fn output_dims(&self) -> usize {
        self.inner.output_dims
    }

    /// `Convert` from §4.6/§6: converts `ncolors` scaled input colors (each `input_dims` i32
    /// components with 8 fractional bits) into output colors (each `output_dims` u16
    /// components).
    pub fn convert(&self, inputs: &[i32], outputs: &mut [u16]) -> Result<(), TableError<E::Error>> {
        crate::dispatcher::convert(&self.inner, inputs, outputs)
    }

    /// External low-memory interface (§6): solicits and releases up to `bytes_needed` bytes of
    /// grid/cache memory from the process-wide table registry (potentially across multiple
    /// tables, not just this one), returning the amount actually reclaimed. Safe to call at any
    /// time, including while no `Convert` is in flight on any table.
    pub fn release(&self, bytes_needed: usize) -> usize {
        REGISTRY.solicit_and_release(bytes_needed)
    }

    /// Snapshot of this table's debug counters (only meaningful with the `metrics` feature).
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> TableMetrics {
        let state = self.inner.state.lock();
        let duplicate_count = state.cache.duplicate_count();
        state.metrics.snapshot(duplicate_count)
    }
}

impl<E: Evaluator> Drop for Table<E> {
    fn drop(&mut self) {
        // The registry only holds a Weak reference; once the last strong Table handle drops,
        // the next registry walk prunes the dead entry. Prune eagerly here too so a
        // short-lived table doesn't linger in the list between Convert calls on others.
        REGISTRY.prune_dead();
    }
}
