//! Per-session cache of boot options and boot order.
//!
//! Entries have no time-based expiry; they are invalidated by successful
//! boot order writes. Each entry sits behind its own mutex which is held for
//! the duration of a fetch, so concurrent readers of a cold entry share one
//! network round-trip.

use std::collections::HashSet;
use std::fmt;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{BmcError, Result};
use crate::vendors::{BootManagement, BootOption};

/// Cached resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    BootOptions,
    BootOrder,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BootOptions => write!(f, "boot_options"),
            Self::BootOrder => write!(f, "boot_order"),
        }
    }
}

/// Last fetched value and whether it may be served.
#[derive(Debug)]
struct CacheEntry<T> {
    value: Option<T>,
    fresh: bool,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            value: None,
            fresh: false,
        }
    }
}

impl<T: Clone> CacheEntry<T> {
    fn cached(&self) -> Option<T> {
        if self.fresh {
            self.value.clone()
        } else {
            None
        }
    }

    fn store(&mut self, value: T) {
        self.value = Some(value);
        self.fresh = true;
    }

    fn invalidate(&mut self) {
        self.fresh = false;
    }
}

/// Fetch unless `entry` holds a fresh value. The entry is updated only on success.
async fn get_or_fetch<T, F, Fut>(
    kind: ResourceKind,
    entry: &Mutex<CacheEntry<T>>,
    force: bool,
    fetch: F,
) -> Result<T>
where
    T: Clone,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut entry = entry.lock().await;
    if !force {
        if let Some(value) = entry.cached() {
            debug!(resource = %kind, "Cache hit");
            return Ok(value);
        }
    }

    debug!(resource = %kind, force, "Cache miss, fetching");
    let value = fetch().await?;
    entry.store(value.clone());
    Ok(value)
}

/// Boot option and boot order cache owned by one client.
#[derive(Debug, Default)]
pub struct BootOptionCache {
    options: Mutex<CacheEntry<Vec<BootOption>>>,
    order: Mutex<CacheEntry<Vec<String>>>,
}

impl BootOptionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Boot options, fetched through `boot` when not cached or when `force` is set.
    ///
    /// # Errors
    /// Returns the fetch error; the cache is left unchanged.
    pub async fn boot_options(
        &self,
        boot: &dyn BootManagement,
        force: bool,
    ) -> Result<Vec<BootOption>> {
        get_or_fetch(ResourceKind::BootOptions, &self.options, force, || {
            boot.boot_options()
        })
        .await
    }

    /// Persistent boot order, fetched through `boot` when not cached or when `force` is set.
    ///
    /// # Errors
    /// Returns the fetch error; the cache is left unchanged.
    pub async fn boot_order(&self, boot: &dyn BootManagement, force: bool) -> Result<Vec<String>> {
        get_or_fetch(ResourceKind::BootOrder, &self.order, force, || {
            boot.boot_order()
        })
        .await
    }

    /// Validate and write a complete boot order.
    ///
    /// `order` must be a permutation of the known boot option references. A
    /// rejected order performs no write. A successful write invalidates both
    /// entries; a failed write leaves them as they were.
    ///
    /// # Errors
    /// Returns [`BmcError::InvalidArgument`] for duplicate, missing or unknown
    /// references, or the error of the write itself.
    pub async fn set_boot_order(&self, boot: &dyn BootManagement, order: &[String]) -> Result<()> {
        let mut known: Vec<String> = self
            .boot_options(boot, false)
            .await?
            .into_iter()
            .map(|option| option.reference)
            .collect();
        if known.is_empty() {
            // Some BMCs expose no BootOptions collection; fall back to the order itself.
            known = self.boot_order(boot, false).await?;
        }
        validate_permutation(&known, order)?;

        let mut options = self.options.lock().await;
        let mut current = self.order.lock().await;

        info!(order = ?order, "Writing boot order");
        boot.set_boot_order(order).await?;

        options.invalidate();
        current.invalidate();
        Ok(())
    }

    /// Mark one entry stale.
    pub async fn invalidate(&self, kind: ResourceKind) {
        debug!(resource = %kind, "Invalidating cache entry");
        match kind {
            ResourceKind::BootOptions => self.options.lock().await.invalidate(),
            ResourceKind::BootOrder => self.order.lock().await.invalidate(),
        }
    }

    /// Mark every entry stale.
    pub async fn invalidate_all(&self) {
        self.invalidate(ResourceKind::BootOptions).await;
        self.invalidate(ResourceKind::BootOrder).await;
    }

    /// Whether `kind` would be served from the cache.
    pub async fn is_fresh(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::BootOptions => self.options.lock().await.fresh,
            ResourceKind::BootOrder => self.order.lock().await.fresh,
        }
    }
}

/// Check that `order` lists every reference in `known` exactly once.
///
/// # Errors
/// Returns [`BmcError::InvalidArgument`] describing the mismatch.
pub fn validate_permutation(known: &[String], order: &[String]) -> Result<()> {
    let known_set: HashSet<&str> = known.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let duplicates: Vec<&str> = order
        .iter()
        .map(String::as_str)
        .filter(|r| !seen.insert(*r))
        .collect();

    let mut missing: Vec<&str> = known_set
        .iter()
        .copied()
        .filter(|r| !seen.contains(r))
        .collect();
    let mut unknown: Vec<&str> = seen
        .iter()
        .copied()
        .filter(|r| !known_set.contains(r))
        .collect();

    if duplicates.is_empty() && missing.is_empty() && unknown.is_empty() {
        return Ok(());
    }

    missing.sort_unstable();
    unknown.sort_unstable();

    let mut message = String::from("Boot order validation failed.");
    if !duplicates.is_empty() {
        message.push_str(&format!(" Duplicate options: {duplicates:?}."));
    }
    if !missing.is_empty() {
        message.push_str(&format!(" Missing options: {missing:?}."));
    }
    if !unknown.is_empty() {
        message.push_str(&format!(" Unknown options: {unknown:?}."));
    }
    Err(BmcError::InvalidArgument(message))
}
