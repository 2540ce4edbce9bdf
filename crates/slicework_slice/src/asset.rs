//! Source assets and where they come from.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use slicework_foundation::{Error, ErrorContext, ErrorKind, Result, SliceAssetId};
use tracing::debug;

use crate::component::SliceComponent;

/// Loads and stores slice assets by id.
///
/// Loading is synchronous from the caller's point of view: an implementation
/// may fetch in the background but must block until the asset is ready or
/// known to be missing.
pub trait AssetProvider: Send + Sync {
    /// Returns the asset, or `None` if it does not exist.
    fn load_slice(&self, asset: SliceAssetId) -> Option<Arc<SliceAsset>>;

    /// Persists `component` as asset `asset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the asset cannot be written.
    fn save_slice(&self, asset: SliceAssetId, component: &SliceComponent) -> Result<()>;
}

/// A loaded slice asset: a component behind a reentrant lock.
///
/// The lock lets the thread that is instantiating through this asset
/// re-enter it, while other threads wait. Re-entering while the component is
/// already borrowed is reported as an error instead of aliasing it.
pub struct SliceAsset {
    id: SliceAssetId,
    component: ReentrantMutex<RefCell<SliceComponent>>,
}

impl SliceAsset {
    /// Wraps `component` as asset `id`.
    #[must_use]
    pub fn new(id: SliceAssetId, mut component: SliceComponent) -> Self {
        component.set_asset_id(Some(id));
        Self {
            id,
            component: ReentrantMutex::new(RefCell::new(component)),
        }
    }

    /// The asset id.
    #[must_use]
    pub fn id(&self) -> SliceAssetId {
        self.id
    }

    /// Runs `f` with exclusive access to the component.
    ///
    /// # Errors
    ///
    /// Returns [`Internal`](ErrorKind::Internal) if the component is already
    /// borrowed further up this thread's call stack, or whatever `f` returns.
    pub fn with_component<R>(&self, f: impl FnOnce(&mut SliceComponent) -> Result<R>) -> Result<R> {
        let guard = self.component.lock();
        let mut component = guard.try_borrow_mut().map_err(|_| {
            Error::new(ErrorKind::Internal(
                "slice asset component re-entered while borrowed".to_string(),
            ))
            .with_context(ErrorContext::new().with_asset(self.id))
        })?;
        f(&mut component)
    }

    /// Returns a copy of the component.
    ///
    /// # Errors
    ///
    /// Returns an error if the component is currently borrowed.
    pub fn snapshot(&self) -> Result<SliceComponent> {
        self.with_component(|c| Ok(c.clone_component(None)))
    }
}

impl fmt::Debug for SliceAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceAsset").field("id", &self.id).finish_non_exhaustive()
    }
}

/// In-memory asset store.
#[derive(Default)]
pub struct MemoryAssetProvider {
    assets: RwLock<HashMap<SliceAssetId, Arc<SliceAsset>>>,
}

impl MemoryAssetProvider {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an asset, returning its handle.
    pub fn insert(&self, id: SliceAssetId, component: SliceComponent) -> Arc<SliceAsset> {
        let asset = Arc::new(SliceAsset::new(id, component));
        self.assets.write().insert(id, Arc::clone(&asset));
        asset
    }

    /// Removes an asset.
    pub fn remove(&self, id: SliceAssetId) -> Option<Arc<SliceAsset>> {
        self.assets.write().remove(&id)
    }

    /// Returns true if the asset is present.
    #[must_use]
    pub fn contains(&self, id: SliceAssetId) -> bool {
        self.assets.read().contains_key(&id)
    }

    /// Number of stored assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

impl fmt::Debug for MemoryAssetProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAssetProvider")
            .field("assets", &self.len())
            .finish()
    }
}

impl AssetProvider for MemoryAssetProvider {
    fn load_slice(&self, asset: SliceAssetId) -> Option<Arc<SliceAsset>> {
        self.assets.read().get(&asset).cloned()
    }

    fn save_slice(&self, asset: SliceAssetId, component: &SliceComponent) -> Result<()> {
        debug!(%asset, "storing slice asset in memory");
        self.insert(asset, component.clone_component(None));
        Ok(())
    }
}
