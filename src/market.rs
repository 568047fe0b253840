//! Market snapshot and the cache that owns it
//!
//! A [`MarketSnapshot`] is an immutable view of quotes and metrics. The
//! [`SnapshotCache`] hands out `Arc`s to the current snapshot and swaps in a
//! new one on refresh, so a resolution in flight never observes a partial
//! update.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::item_id::ItemId;
use crate::models::{MarketQuote, ProductMetrics};

#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    quotes: HashMap<ItemId, MarketQuote>,
    metrics: HashMap<ItemId, ProductMetrics>,
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_quote(&mut self, item: ItemId, quote: MarketQuote) {
        self.quotes.insert(item, quote);
    }

    pub fn insert_metrics(&mut self, item: ItemId, metrics: ProductMetrics) {
        self.metrics.insert(item, metrics);
    }

    /// The quote for `item` if it is usable; unusable quotes read as absent.
    pub fn quote(&self, item: &ItemId) -> Option<&MarketQuote> {
        self.quotes.get(item).filter(|q| q.is_usable())
    }

    /// The raw listing, usable or not. Trade volume is read from here.
    pub fn listing(&self, item: &ItemId) -> Option<&MarketQuote> {
        self.quotes.get(item)
    }

    pub fn metrics(&self, item: &ItemId) -> Option<&ProductMetrics> {
        self.metrics.get(item)
    }

    /// Every listed good, sorted.
    pub fn listed_items(&self) -> Vec<ItemId> {
        let mut items: Vec<_> = self.quotes.keys().cloned().collect();
        items.sort();
        items
    }

    pub fn quote_count(&self) -> usize {
        self.quotes.len()
    }

    pub fn metrics_count(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty() && self.metrics.is_empty()
    }
}

/// Where snapshots come from.
pub trait SnapshotSource: Send + Sync {
    fn load(&self) -> Result<MarketSnapshot>;
}

impl<F> SnapshotSource for F
where
    F: Fn() -> Result<MarketSnapshot> + Send + Sync,
{
    fn load(&self) -> Result<MarketSnapshot> {
        self()
    }
}

pub struct SnapshotCache {
    source: Box<dyn SnapshotSource>,
    current: RwLock<Option<Arc<MarketSnapshot>>>,
    refresh_lock: Mutex<()>,
}

impl SnapshotCache {
    pub fn new(source: impl SnapshotSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// The current snapshot, loading it on first demand.
    pub fn get(&self) -> Result<Arc<MarketSnapshot>> {
        if let Some(snapshot) = self.current.read().as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let _guard = self.refresh_lock.lock();
        // Another caller may have loaded it while we waited.
        if let Some(snapshot) = self.current.read().as_ref() {
            return Ok(Arc::clone(snapshot));
        }
        self.reload()
    }

    /// Rebuild from the source and swap it in. On failure the previous
    /// snapshot stays in place.
    pub fn refresh(&self) -> Result<Arc<MarketSnapshot>> {
        let _guard = self.refresh_lock.lock();
        self.reload()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    fn reload(&self) -> Result<Arc<MarketSnapshot>> {
        let started = Instant::now();
        let snapshot = match self.source.load() {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(error = %e, "snapshot refresh failed, keeping previous snapshot");
                return Err(e);
            }
        };
        info!(
            quotes = snapshot.quote_count(),
            metrics = snapshot.metrics_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "market snapshot refreshed"
        );
        *self.current.write() = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// Handle to the background refresher thread.
pub struct RefresherHandle {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signal the refresher and wait for it to exit.
    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            warn!("snapshot refresher panicked");
        }
    }
}

/// Start the single background refresher. It refreshes every `interval`
/// until stopped.
pub fn spawn_refresher(cache: Arc<SnapshotCache>, interval: Duration) -> RefresherHandle {
    let (stop, stop_rx) = mpsc::channel::<()>();
    let thread = std::thread::spawn(move || {
        debug!(interval_secs = interval.as_secs_f64(), "snapshot refresher started");
        loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    // Failure is logged in reload; keep serving the old snapshot.
                    let _ = cache.refresh();
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("snapshot refresher stopped");
    });
    RefresherHandle { stop, thread }
}
