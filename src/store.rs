//! Directory-backed array storage.
//!
//! A store is a directory. Each array sits under a slash separated key and
//! is made of two files:
//!
//! - `array.json`: `{"shape": [...], "dtype": "u16"}`
//! - `data.bin`: the elements in C order, little-endian
//!
//! Arrays are read and written whole. Nothing is ever overwritten: writing
//! to an existing store path or key fails with
//! [`VolumeError::AlreadyExists`].

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytemuck::Zeroable;
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::enums::DType;
use crate::error::{Result, VolumeError};
use crate::volume::{Volume, Voxel};

const HEADER_FILE: &str = "array.json";
const DATA_FILE: &str = "data.bin";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayHeader {
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl ArrayHeader {
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.dtype.size()
    }
}

#[derive(Clone, Debug)]
pub struct ArrayStore {
    root: PathBuf,
}

impl ArrayStore {
    /// Open an existing store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(VolumeError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no array store at '{}'", root.display()),
            )));
        }
        Ok(Self { root })
    }

    /// Create a new, empty store. An existing path is never reused.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if root.exists() {
            return Err(VolumeError::AlreadyExists(root));
        }
        fs::create_dir_all(&root)?;
        debug!(path = %root.display(), "created array store");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn array_dir(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |dir, part| dir.join(part))
    }

    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.array_dir(key.as_ref()).join(HEADER_FILE).is_file()
    }

    pub fn header(&self, key: impl AsRef<str>) -> Result<ArrayHeader> {
        let key = key.as_ref();
        let header_path = self.array_dir(key).join(HEADER_FILE);
        if !header_path.is_file() {
            return Err(VolumeError::MissingKey(format!(
                "{key} in '{}'",
                self.root.display()
            )));
        }
        Ok(serde_json::from_slice(&fs::read(header_path)?)?)
    }

    /// Shape of a stored array, without reading its data.
    pub fn shape(&self, key: impl AsRef<str>) -> Result<Vec<usize>> {
        Ok(self.header(key)?.shape)
    }

    pub fn read<T: Voxel>(&self, key: impl AsRef<str>) -> Result<ArrayD<T>> {
        let key = key.as_ref();
        let header = self.header(key)?;
        if header.dtype != T::DTYPE {
            return Err(VolumeError::DTypeMismatch {
                stored: header.dtype,
                requested: T::DTYPE,
            });
        }

        let bytes = fs::read(self.array_dir(key).join(DATA_FILE))?;
        if bytes.len() != header.byte_len() {
            return Err(VolumeError::ShapeMismatch(format!(
                "'{key}' holds {} bytes, shape {:?} of {} needs {}",
                bytes.len(),
                header.shape,
                header.dtype,
                header.byte_len()
            )));
        }
        let mut values = vec![T::zeroed(); header.len()];
        let raw = bytemuck::cast_slice_mut::<T, u8>(&mut values);
        raw.copy_from_slice(&bytes);
        swap_to_native(raw, header.dtype.size());

        debug!(key, shape = ?header.shape, dtype = %header.dtype, "read array");
        ArrayD::from_shape_vec(IxDyn(&header.shape), values)
            .map_err(|e| VolumeError::ShapeMismatch(e.to_string()))
    }

    pub fn read_volume<T: Voxel>(&self, key: impl AsRef<str>) -> Result<Volume<T>> {
        Volume::from_dyn(self.read(key)?)
    }

    pub fn write<T, S, D>(&self, key: impl AsRef<str>, array: &ArrayBase<S, D>) -> Result<()>
    where
        T: Voxel,
        S: Data<Elem = T>,
        D: Dimension,
    {
        let key = key.as_ref();
        let dir = self.array_dir(key);
        if self.contains(key) {
            return Err(VolumeError::AlreadyExists(dir));
        }
        fs::create_dir_all(&dir)?;

        let standard = array.as_standard_layout();
        let values = standard.as_slice().ok_or_else(|| {
            VolumeError::ShapeMismatch(format!("'{key}' is not contiguous after relayout"))
        })?;
        fs::write(dir.join(DATA_FILE), little_endian_bytes(values))?;

        // the header goes last so a key only exists once its data is complete
        let header = ArrayHeader {
            shape: array.shape().to_vec(),
            dtype: T::DTYPE,
        };
        fs::write(dir.join(HEADER_FILE), serde_json::to_vec(&header)?)?;
        debug!(key, shape = ?header.shape, dtype = %header.dtype, "wrote array");
        Ok(())
    }

    pub fn write_volume<T: Voxel>(&self, key: impl AsRef<str>, volume: &Volume<T>) -> Result<()> {
        self.write(key, volume.data())
    }
}

fn little_endian_bytes<T: Voxel>(values: &[T]) -> Cow<'_, [u8]> {
    let bytes = bytemuck::cast_slice::<T, u8>(values);
    if cfg!(target_endian = "little") {
        return Cow::Borrowed(bytes);
    }
    let mut swapped = bytes.to_vec();
    swap_to_native(&mut swapped, T::DTYPE.size());
    Cow::Owned(swapped)
}

/// Converts little-endian elements of `width` bytes to host order, and back.
fn swap_to_native(bytes: &mut [u8], width: usize) {
    if cfg!(target_endian = "big") {
        bytes
            .chunks_exact_mut(width)
            .for_each(|element| element.reverse());
    }
}
