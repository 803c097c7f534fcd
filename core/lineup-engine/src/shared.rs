//! FILENAME: core/lineup-engine/src/shared.rs
//! PURPOSE: Thread-safe wrapper around a `DataProvider`.
//! CONTEXT: One writer at a time mutates the provider behind a mutex. Each
//! refresh publishes an immutable `ProviderSnapshot`; readers clone the
//! `Arc` without touching the writer lock. Refresh requests that arrive
//! while another refresh is running are folded into one extra pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};

use log::debug;

use lineup_data::{DataIndex, RowSource, SourceVersion};

use crate::column::{FlatColumn, RankingId};
use crate::group::{GroupExtent, Groups};
use crate::order::Order;
use crate::provider::DataProvider;

/// Published state of one ranking.
#[derive(Debug, Clone)]
pub struct RankingSnapshot {
    pub id: RankingId,
    pub generation: u64,
    pub order: Order,
    pub groups: Groups,
    pub layout: Vec<GroupExtent>,
    pub columns: Vec<FlatColumn>,
}

/// Published state of the whole provider. May lag behind the provider
/// until the next refresh.
#[derive(Debug, Clone, Default)]
pub struct ProviderSnapshot {
    pub rankings: Vec<RankingSnapshot>,
    pub selection: Vec<DataIndex>,
    pub rows: usize,
    pub version: SourceVersion,
}

impl ProviderSnapshot {
    fn capture(provider: &DataProvider) -> Self {
        ProviderSnapshot {
            rankings: provider
                .rankings()
                .iter()
                .map(|r| RankingSnapshot {
                    id: r.id(),
                    generation: r.generation(),
                    order: r.order().clone(),
                    groups: r.groups().clone(),
                    layout: r.group_layout(),
                    columns: r.flatten_columns(),
                })
                .collect(),
            selection: provider.selection().indices().collect(),
            rows: provider.store().len(),
            version: provider.view().version(),
        }
    }

    pub fn ranking(&self, id: RankingId) -> Option<&RankingSnapshot> {
        self.rankings.iter().find(|r| r.id == id)
    }
}

pub struct SharedProvider {
    inner: Mutex<DataProvider>,
    snapshot: RwLock<Arc<ProviderSnapshot>>,
    pending: AtomicBool,
    refresh_gate: Mutex<()>,
}

impl SharedProvider {
    pub fn new(provider: DataProvider) -> Self {
        let snapshot = Arc::new(ProviderSnapshot::capture(&provider));
        SharedProvider {
            inner: Mutex::new(provider),
            snapshot: RwLock::new(snapshot),
            pending: AtomicBool::new(false),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Runs `f` with exclusive access to the provider. Changes become
    /// visible to readers after the next refresh.
    pub fn update<R>(&self, f: impl FnOnce(&mut DataProvider) -> R) -> R {
        let mut provider = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut provider)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<ProviderSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Refreshes the provider and publishes a snapshot. If a refresh is
    /// already running on another thread, the request is left for that
    /// thread to pick up and this call returns immediately.
    /// Returns the number of passes this call ran.
    pub fn request_refresh(&self) -> usize {
        self.pending.store(true, Ordering::Release);
        let mut passes = 0;
        loop {
            {
                let _gate = match self.refresh_gate.try_lock() {
                    Ok(gate) => gate,
                    Err(TryLockError::WouldBlock) => return passes,
                    Err(TryLockError::Poisoned(gate)) => gate.into_inner(),
                };
                while self.pending.swap(false, Ordering::AcqRel) {
                    self.run_pass();
                    passes += 1;
                }
            }
            // a request may have landed between the last swap and the unlock
            if !self.pending.load(Ordering::Acquire) {
                return passes;
            }
        }
    }

    fn run_pass(&self) {
        let snapshot = {
            let mut provider = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let published = provider.refresh();
            debug!("shared provider: refresh published {} rankings", published.len());
            Arc::new(ProviderSnapshot::capture(&provider))
        };
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn into_inner(self) -> DataProvider {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
