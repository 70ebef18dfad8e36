//! Ordering numbered slice files and stacking them into a volume.

use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, VolumeError};
use crate::volume::{Volume, Voxel};

/// Slice index to file path, kept in first-insertion order.
///
/// Inserting an index that is already present replaces its path but keeps
/// its original position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathMapping {
    entries: Vec<(i64, PathBuf)>,
}

impl PathMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: i64, path: PathBuf) -> Option<PathBuf> {
        match self.entries.iter_mut().find(|(existing, _)| *existing == index) {
            Some((_, slot)) => Some(std::mem::replace(slot, path)),
            None => {
                self.entries.push((index, path));
                None
            }
        }
    }

    pub fn get(&self, index: i64) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == index)
            .map(|(_, path)| path.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &Path)> {
        self.entries.iter().map(|(index, path)| (*index, path.as_path()))
    }

    /// Entries ordered by ascending index.
    pub fn sorted(&self) -> Vec<(i64, &Path)> {
        let mut sorted: Vec<_> = self.iter().collect();
        sorted.sort_by_key(|(index, _)| *index);
        sorted
    }
}

/// Map each path whose file stem the matcher accepts to the index it
/// extracts. Later paths win on duplicate indices.
pub fn generate_path_mapping<P, F>(
    paths: impl IntoIterator<Item = P>,
    mut matcher: F,
) -> PathMapping
where
    P: AsRef<Path>,
    F: FnMut(&str) -> Option<i64>,
{
    let mut mapping = PathMapping::new();
    for path in paths {
        let path = path.as_ref();
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if let Some(index) = matcher(stem) {
            if let Some(replaced) = mapping.insert(index, path.to_path_buf()) {
                debug!(
                    index,
                    replaced = %replaced.display(),
                    by = %path.display(),
                    "duplicate slice index"
                );
            }
        }
    }
    mapping
}

/// Matcher for stems made of `prefix`, anything, then a trailing run of
/// digits, e.g. `reko_0042` with prefix `reko`.
pub fn trailing_index_matcher(prefix: impl Into<String>) -> impl Fn(&str) -> Option<i64> {
    let prefix = prefix.into();
    move |stem: &str| {
        let rest = stem.strip_prefix(prefix.as_str())?;
        let digits_start = rest
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)?;
        rest[digits_start..].parse().ok()
    }
}

/// Read an image file as 16-bit grayscale.
pub fn read_grayscale(path: &Path) -> Result<Array2<u16>> {
    let image = image::open(path)?.into_luma16();
    let (width, height) = image.dimensions();
    Array2::from_shape_vec((height as usize, width as usize), image.into_raw())
        .map_err(|e| VolumeError::ShapeMismatch(format!("{}: {e}", path.display())))
}

/// Read every mapped slice and stack them by ascending index.
pub fn assemble_volume<T, F>(mapping: &PathMapping, reader: F) -> Result<Volume<T>>
where
    T: Voxel,
    F: Fn(&Path) -> Result<Array2<T>> + Sync,
{
    let sorted = mapping.sorted();
    if sorted.is_empty() {
        return Err(VolumeError::NoSlices);
    }

    let images: Vec<Array2<T>> = sorted
        .par_iter()
        .map(|(_, path)| reader(path))
        .collect::<Result<_>>()?;

    validate_dimensions(&sorted, &images)?;
    Ok(Volume::new(build_volume_array(&images)))
}

fn validate_dimensions<T>(sorted: &[(i64, &Path)], images: &[Array2<T>]) -> Result<()> {
    let first_dim = images[0].dim();
    match images.iter().position(|image| image.dim() != first_dim) {
        Some(bad) => Err(VolumeError::ShapeMismatch(format!(
            "slice {} ('{}') has shape {:?}, expected {first_dim:?}",
            sorted[bad].0,
            sorted[bad].1.display(),
            images[bad].dim()
        ))),
        None => Ok(()),
    }
}

fn build_volume_array<T: Voxel>(images: &[Array2<T>]) -> Array3<T> {
    let (height, width) = images[0].dim();
    let depth = images.len();
    let mut volume = Array3::<T>::default((depth, height, width));

    for (i, image) in images.iter().enumerate() {
        volume.slice_mut(s![i, .., ..]).assign(image);
    }

    volume
}
