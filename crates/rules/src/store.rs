use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::category::{Category, FALLBACK_CATEGORY};

/// How long a cached snapshot is served before a read reloads it from
/// the backing set.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("category not found: {0}")]
    RuleNotFound(String),
    #[error("keyword is empty")]
    EmptyKeyword,
    #[error("failed to read category configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse category configuration: {0}")]
    Csv(#[from] csv::Error),
}

/// Outcome of a configuration load: rows merged in vs rows skipped as
/// malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

struct Snapshot {
    categories: Arc<Vec<Category>>,
    refreshed_at: Instant,
}

/// Owns the authoritative, insertion-ordered category set and serves a
/// TTL-cached read view of it.
///
/// Readers receive an `Arc` clone of a complete snapshot; `refresh`
/// swaps the whole snapshot at once, so a reader sees either the old or
/// the new set, never a partial update. When the snapshot goes stale,
/// one caller wins the refresh gate and rebuilds while the rest keep
/// serving the existing snapshot instead of queueing behind the winner.
pub struct CategoryStore {
    backing: Mutex<Vec<Category>>,
    cache: RwLock<Option<Snapshot>>,
    refresh_gate: Mutex<()>,
    ttl: Duration,
}

impl Default for CategoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        CategoryStore {
            backing: Mutex::new(Vec::new()),
            cache: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            ttl,
        }
    }

    /// Loads category configuration rows from a CSV file at `path`.
    pub fn load_csv_path(&self, path: &Path) -> Result<LoadReport, RuleError> {
        let file = std::fs::File::open(path)?;
        self.load_csv(file)
    }

    /// Loads category configuration rows from a CSV reader with header
    /// `category_name,display_name,requires_positive_amount,keywords`.
    ///
    /// Blank lines and `#` comments are skipped. A row with fewer than
    /// four fields is logged and skipped, never fatal. Rows merge by
    /// name: an existing category keeps its position in load order but
    /// takes the new display name, flag, and a replaced keyword set.
    /// Ends with a cache refresh.
    pub fn load_csv<R: Read>(&self, reader: R) -> Result<LoadReport, RuleError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut report = LoadReport {
            loaded: 0,
            skipped: 0,
        };

        {
            let mut backing = lock(&self.backing);
            for record in csv_reader.records() {
                let record = match record {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("skipping unreadable category row: {e}");
                        report.skipped += 1;
                        continue;
                    }
                };
                if record.len() < 4 {
                    warn!(
                        fields = record.len(),
                        "skipping category row with fewer than 4 fields"
                    );
                    report.skipped += 1;
                    continue;
                }

                let name = record.get(0).unwrap_or_default();
                let display_name = record.get(1).unwrap_or_default();
                let requires_positive = record
                    .get(2)
                    .is_some_and(|v| v.eq_ignore_ascii_case("true"));
                let keywords = record.get(3).unwrap_or_default().split(',');

                match backing.iter_mut().find(|c| c.name == name) {
                    Some(existing) => {
                        existing.display_name = display_name.to_string();
                        existing.requires_positive_amount = requires_positive;
                        existing.set_keywords(keywords);
                        debug!(category = name, "updated category from configuration");
                    }
                    None => {
                        backing.push(
                            Category::new(name, display_name, requires_positive)
                                .with_keywords(keywords),
                        );
                        debug!(category = name, "added category from configuration");
                    }
                }
                report.loaded += 1;
            }
        }

        info!(
            loaded = report.loaded,
            skipped = report.skipped,
            "category configuration load complete"
        );
        self.refresh();
        Ok(report)
    }

    /// Rebuilds the cached snapshot from the backing set and swaps it in.
    pub fn refresh(&self) {
        self.rebuild();
    }

    /// The cached snapshot, refreshed first when it is missing or older
    /// than the TTL. This is the single staleness decision point.
    pub fn categories(&self) -> Arc<Vec<Category>> {
        if let Some(categories) = self.cached(false) {
            return categories;
        }
        match self.refresh_gate.try_lock() {
            Ok(_gate) => self.rebuild(),
            Err(_) => {
                // Someone else is refreshing. Serve the stale snapshot
                // when there is one; only a cold cache waits.
                if let Some(categories) = self.cached(true) {
                    categories
                } else {
                    let _gate = lock(&self.refresh_gate);
                    match self.cached(false) {
                        Some(categories) => categories,
                        None => self.rebuild(),
                    }
                }
            }
        }
    }

    /// Exact-name lookup in the cached snapshot.
    pub fn by_name(&self, name: &str) -> Result<Category, RuleError> {
        self.categories()
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| RuleError::RuleNotFound(name.to_string()))
    }

    /// Verifies the mandatory fallback category exists. Every
    /// categorization depends on it, so a miss must abort startup.
    pub fn ensure_fallback(&self) -> Result<(), RuleError> {
        self.by_name(FALLBACK_CATEGORY).map(|_| ())
    }

    // ── Admin surface ─────────────────────────────────────────────────

    /// Adds a category, or updates the display name and flag of an
    /// existing one (keywords untouched). Refreshes the cache.
    pub fn add_category(&self, name: &str, display_name: &str, requires_positive_amount: bool) {
        {
            let mut backing = lock(&self.backing);
            match backing.iter_mut().find(|c| c.name == name) {
                Some(existing) => {
                    existing.display_name = display_name.to_string();
                    existing.requires_positive_amount = requires_positive_amount;
                }
                None => backing.push(Category::new(name, display_name, requires_positive_amount)),
            }
        }
        self.refresh();
    }

    /// Adds a keyword to an existing category, then refreshes the cache.
    pub fn add_keyword(&self, category_name: &str, keyword: &str) -> Result<(), RuleError> {
        if keyword.trim().is_empty() {
            return Err(RuleError::EmptyKeyword);
        }
        {
            let mut backing = lock(&self.backing);
            let category = backing
                .iter_mut()
                .find(|c| c.name == category_name)
                .ok_or_else(|| RuleError::RuleNotFound(category_name.to_string()))?;
            category.add_keyword(keyword);
        }
        self.refresh();
        Ok(())
    }

    /// Removes a keyword (case-insensitive) from an existing category,
    /// then refreshes the cache.
    pub fn remove_keyword(&self, category_name: &str, keyword: &str) -> Result<(), RuleError> {
        {
            let mut backing = lock(&self.backing);
            let category = backing
                .iter_mut()
                .find(|c| c.name == category_name)
                .ok_or_else(|| RuleError::RuleNotFound(category_name.to_string()))?;
            category.remove_keyword(keyword);
        }
        self.refresh();
        Ok(())
    }

    // ── Snapshot plumbing ─────────────────────────────────────────────

    fn cached(&self, allow_stale: bool) -> Option<Arc<Vec<Category>>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.as_ref().and_then(|snapshot| {
            if allow_stale || snapshot.refreshed_at.elapsed() <= self.ttl {
                Some(Arc::clone(&snapshot.categories))
            } else {
                None
            }
        })
    }

    fn rebuild(&self) -> Arc<Vec<Category>> {
        let categories = Arc::new(lock(&self.backing).clone());
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(Snapshot {
            categories: Arc::clone(&categories),
            refreshed_at: Instant::now(),
        });
        categories
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
