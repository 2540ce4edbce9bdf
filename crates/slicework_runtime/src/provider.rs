//! File-backed slice assets.
//!
//! Each asset lives in `<root>/<asset id>.slice` as a `MessagePack`
//! [`SliceDocument`](slicework_slice::SliceDocument). Loaded assets are cached
//! so that every reference to the same asset shares one component.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use slicework_foundation::{Result, SliceAssetId};
use slicework_slice::{AssetProvider, SliceAsset, SliceComponent, SliceConfig};
use tracing::{debug, info, warn};

use crate::serialize::{load_from_file, save_to_file};

/// File extension of slice asset files.
pub const SLICE_EXTENSION: &str = "slice";

/// Asset provider reading and writing slice files under one directory.
#[derive(Debug)]
pub struct FileAssetProvider {
    root: PathBuf,
    config: SliceConfig,
    cache: RwLock<HashMap<SliceAssetId, Arc<SliceAsset>>>,
}

impl FileAssetProvider {
    /// Creates a provider rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, SliceConfig::default())
    }

    /// Creates a provider whose loaded components use `config`.
    #[must_use]
    pub fn with_config(root: impl Into<PathBuf>, config: SliceConfig) -> Self {
        Self {
            root: root.into(),
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The directory assets are read from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file for `asset`.
    #[must_use]
    pub fn path_for(&self, asset: SliceAssetId) -> PathBuf {
        self.root.join(format!("{asset}.{SLICE_EXTENSION}"))
    }

    /// Ids of every asset file under the root, in id order.
    ///
    /// Files whose stem is not an asset id are ignored.
    #[must_use]
    pub fn asset_ids(&self) -> Vec<SliceAssetId> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut ids: Vec<SliceAssetId> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == SLICE_EXTENSION))
            .filter_map(|path| path.file_stem()?.to_str()?.parse().ok())
            .collect();
        ids.sort();
        ids
    }

    /// Forgets every loaded asset; the next load reads from disk again.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Number of cached assets.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}

impl AssetProvider for FileAssetProvider {
    fn load_slice(&self, asset: SliceAssetId) -> Option<Arc<SliceAsset>> {
        if let Some(handle) = self.cache.read().get(&asset) {
            return Some(Arc::clone(handle));
        }

        let path = self.path_for(asset);
        if !path.exists() {
            debug!(%asset, path = %path.display(), "slice asset file not found");
            return None;
        }
        let document = match load_from_file(&path) {
            Ok(document) => document,
            Err(e) => {
                warn!(%asset, error = %e, "failed to load slice asset");
                return None;
            }
        };

        let component = SliceComponent::from_document(document, self.config.clone());
        let handle = Arc::new(SliceAsset::new(asset, component));
        info!(%asset, path = %path.display(), "loaded slice asset");
        Some(Arc::clone(
            self.cache.write().entry(asset).or_insert(handle),
        ))
    }

    fn save_slice(&self, asset: SliceAssetId, component: &SliceComponent) -> Result<()> {
        let path = self.path_for(asset);
        let mut document = component.to_document();
        document.asset_id = Some(asset);
        save_to_file(&document, &path)?;
        info!(%asset, path = %path.display(), "saved slice asset");

        let handle = Arc::new(SliceAsset::new(asset, component.clone_component(None)));
        self.cache.write().insert(asset, handle);
        Ok(())
    }
}
