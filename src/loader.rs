use std::path::{Path, PathBuf};

use tracing::info;

use crate::enums::DatasetKey;
use crate::error::Result;
use crate::state::{StateManager, WorkItem};
use crate::store::ArrayStore;
use crate::volume::{Volume, Voxel};

/// Suffix of store directories, `<class>-<subid>.store`.
pub const STORE_EXTENSION: &str = "store";

/// Resolves a (class, sub-identifier) selection to a stored dataset and
/// loads it as a fresh work item.
#[derive(Clone, Debug)]
pub struct DatasetLoader {
    basepath: PathBuf,
}

impl DatasetLoader {
    pub fn new(basepath: impl Into<PathBuf>) -> Self {
        Self {
            basepath: basepath.into(),
        }
    }

    pub fn basepath(&self) -> &Path {
        &self.basepath
    }

    pub fn dataset_id(class: &str, subidentifier: &str) -> String {
        format!("{class}-{subidentifier}")
    }

    pub fn build_path(&self, class: &str, subidentifier: &str) -> PathBuf {
        self.basepath.join(format!(
            "{}.{STORE_EXTENSION}",
            Self::dataset_id(class, subidentifier)
        ))
    }

    /// Load the raw volume of a dataset
    ///
    /// # Errors
    ///
    /// Returns error if the store is missing, has no raw array, or the
    /// array does not reduce to three dimensions
    pub fn load<T: Voxel>(&self, class: &str, subidentifier: &str) -> Result<WorkItem<T>> {
        let path = self.build_path(class, subidentifier);
        let store = ArrayStore::open(&path)?;
        let volume = store.read_volume::<T>(DatasetKey::Raw)?;
        let id = Self::dataset_id(class, subidentifier);
        info!(%id, shape = ?volume.dim(), path = %path.display(), "loaded dataset");
        Ok(WorkItem::new(id, volume))
    }

    /// Load a dataset and make it the session's current item.
    pub fn load_into<T: Voxel>(
        &self,
        manager: &mut StateManager<T>,
        class: &str,
        subidentifier: &str,
    ) -> Result<()> {
        let item = self.load(class, subidentifier)?;
        manager.update(item)
    }
}

/// Load the natively downsampled volume of a store as a 3D volume.
pub fn load_volume<T: Voxel>(source: impl AsRef<Path>) -> Result<Volume<T>> {
    ArrayStore::open(source)?.read_volume(DatasetKey::Native)
}
