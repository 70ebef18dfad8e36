//! Store-to-store processing steps and the bulk rotation job.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use half::f16;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::enums::{DType, DatasetKey, Interpolation};
use crate::error::{Result, VolumeError};
use crate::roi::{RoiSpec, extract_roi};
use crate::store::ArrayStore;
use crate::transform::{downsample, rotate_volume};

/// Runs `$body` with `$t` bound to the element type matching `$dtype`.
macro_rules! dispatch_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DType::U8 => {
                type $t = u8;
                $body
            }
            DType::U16 => {
                type $t = u16;
                $body
            }
            DType::I16 => {
                type $t = i16;
                $body
            }
            DType::F16 => {
                type $t = f16;
                $body
            }
            DType::F32 => {
                type $t = f32;
                $body
            }
        }
    };
}

/// Rotation angle in degrees per dataset stem.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AngleMapping(BTreeMap<String, f64>);

impl AngleMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn insert(&mut self, stem: impl Into<String>, angle: f64) -> Option<f64> {
        self.0.insert(stem.into(), angle)
    }

    pub fn get(&self, stem: &str) -> Result<f64> {
        self.0
            .get(stem)
            .copied()
            .ok_or_else(|| VolumeError::MissingKey(format!("angle for '{stem}'")))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for AngleMapping {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(stem, angle)| (stem.into(), angle)).collect())
    }
}

fn refuse_existing(target: &Path) -> Result<()> {
    if target.exists() {
        return Err(VolumeError::AlreadyExists(target.to_path_buf()));
    }
    Ok(())
}

/// Rotate the raw volume of `source` and write it to a new store at
/// `target` under the rotated key, keeping the element type.
pub fn rotate_store(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    angle: f64,
    mode: Interpolation,
) -> Result<PathBuf> {
    let target = target.as_ref();
    refuse_existing(target)?;
    let store = ArrayStore::open(source)?;
    let dtype = store.header(DatasetKey::Raw)?.dtype;
    dispatch_dtype!(dtype, T => {
        let volume = store.read_volume::<T>(DatasetKey::Raw)?;
        let rotated = rotate_volume(&volume.data().view(), angle, mode);
        ArrayStore::create(target)?.write(DatasetKey::Rotated, &rotated)?;
    });
    debug!(
        source = %store.path().display(),
        target = %target.display(),
        angle,
        %mode,
        "rotated store"
    );
    Ok(target.to_path_buf())
}

/// Downsample the half-resolution (C, D, H, W) array of `source` into a
/// new store at `target`.
pub fn downsample_store(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    in_plane_target: usize,
) -> Result<PathBuf> {
    let target = target.as_ref();
    refuse_existing(target)?;
    let store = ArrayStore::open(source)?;
    let dtype = store.header(DatasetKey::Half)?.dtype;
    dispatch_dtype!(dtype, T => {
        let volume = store.read::<T>(DatasetKey::Half)?;
        let downsampled = downsample(volume.view(), in_plane_target)?;
        ArrayStore::create(target)?.write(DatasetKey::Native, &downsampled)?;
    });
    debug!(
        source = %store.path().display(),
        target = %target.display(),
        in_plane_target,
        "downsampled store"
    );
    Ok(target.to_path_buf())
}

/// Crop the array stored under `key` in `source` to `roi` and write the
/// result to a new store at `target`.
pub fn extract_roi_store(
    source: impl AsRef<Path>,
    key: &str,
    roi: &RoiSpec,
    target: impl AsRef<Path>,
) -> Result<PathBuf> {
    let target = target.as_ref();
    refuse_existing(target)?;
    let store = ArrayStore::open(source)?;
    let dtype = store.header(key)?.dtype;
    dispatch_dtype!(dtype, T => {
        let volume = store.read_volume::<T>(key)?;
        let cropped = extract_roi(volume.data(), roi)?;
        ArrayStore::create(target)?.write(DatasetKey::Roi, &cropped)?;
    });
    debug!(
        source = %store.path().display(),
        key,
        target = %target.display(),
        "extracted roi"
    );
    Ok(target.to_path_buf())
}

#[derive(Debug)]
pub struct SkippedItem {
    pub name: String,
    pub reason: VolumeError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<SkippedItem>,
}

impl BatchReport {
    pub fn skip_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of skipped items per reason.
    pub fn skip_summary(&self) -> BTreeMap<&'static str, usize> {
        let mut summary = BTreeMap::new();
        for item in &self.skipped {
            *summary.entry(item.reason.kind()).or_insert(0) += 1;
        }
        summary
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wrote {}, skipped {}", self.written.len(), self.skip_count())?;
        let summary = self.skip_summary();
        if !summary.is_empty() {
            let reasons: Vec<String> = summary
                .iter()
                .map(|(reason, count)| format!("{reason}: {count}"))
                .collect();
            write!(f, " ({})", reasons.join(", "))?;
        }
        Ok(())
    }
}

enum Outcome {
    Written(PathBuf),
    Skipped(SkippedItem),
}

/// Rotate every store in `source_dir` by its entry in `angles`, writing
/// same-named stores into `target_dir`.
///
/// Items whose target exists, whose name is not `<stem>.<suffix>` or whose
/// stem has no angle are skipped and reported. Any other failure stops the
/// batch.
pub fn bulk_rotate(
    source_dir: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
    angles: &AngleMapping,
    mode: Interpolation,
) -> Result<BatchReport> {
    let source_dir = source_dir.as_ref();
    let target_dir = target_dir.as_ref();

    let mut names = fs::read_dir(source_dir)?
        .map(|entry| entry.map(|entry| entry.file_name()))
        .collect::<std::io::Result<Vec<OsString>>>()?;
    names.sort();
    info!(items = names.len(), source = %source_dir.display(), "starting bulk rotation");

    let outcomes = names
        .into_par_iter()
        .map(|entry_name| {
            match rotate_item(source_dir, target_dir, &entry_name, angles, mode) {
                Ok(path) => Ok(Outcome::Written(path)),
                Err(reason) if reason.is_skippable() => {
                    let name = entry_name.to_string_lossy().into_owned();
                    warn!(%name, %reason, "skipping item");
                    Ok(Outcome::Skipped(SkippedItem { name, reason }))
                }
                Err(reason) => Err(reason),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let mut report = BatchReport::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Written(path) => report.written.push(path),
            Outcome::Skipped(item) => report.skipped.push(item),
        }
    }
    info!(%report, "bulk rotation finished");
    Ok(report)
}

fn rotate_item(
    source_dir: &Path,
    target_dir: &Path,
    entry_name: &OsStr,
    angles: &AngleMapping,
    mode: Interpolation,
) -> Result<PathBuf> {
    let target = target_dir.join(entry_name);
    refuse_existing(&target)?;
    let name = entry_name
        .to_str()
        .ok_or_else(|| VolumeError::MalformedName(entry_name.to_string_lossy().into_owned()))?;
    let stem = match name.split('.').collect::<Vec<_>>().as_slice() {
        [stem, _suffix] => *stem,
        _ => return Err(VolumeError::MalformedName(name.to_string())),
    };
    let angle = angles.get(stem)?;
    rotate_store(source_dir.join(name), target, angle, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    fn raw_store(path: &Path) {
        let data = Array3::from_shape_fn((2, 5, 5), |(z, y, x)| (z * 25 + y * 5 + x) as u16);
        ArrayStore::create(path).unwrap().write(DatasetKey::Raw, &data).unwrap();
    }

    #[test]
    fn rotate_store_keeps_dtype_and_shape() {
        let dir = tempfile::tempdir().unwrap();
        raw_store(&dir.path().join("a.store"));
        let target = rotate_store(
            dir.path().join("a.store"),
            dir.path().join("b.store"),
            90.0,
            Interpolation::Nearest,
        )
        .unwrap();
        let out = ArrayStore::open(target).unwrap();
        assert_eq!(out.header(DatasetKey::Rotated).unwrap().dtype, DType::U16);
        assert_eq!(out.shape(DatasetKey::Rotated).unwrap(), vec![2, 5, 5]);
    }

    #[test]
    fn rotate_store_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        raw_store(&dir.path().join("a.store"));
        fs::create_dir(dir.path().join("b.store")).unwrap();
        let err = rotate_store(
            dir.path().join("a.store"),
            dir.path().join("b.store"),
            1.0,
            Interpolation::Nearest,
        )
        .unwrap_err();
        assert!(matches!(err, VolumeError::AlreadyExists(_)));
    }

    #[test]
    fn downsample_store_writes_native_key() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.store");
        let half = Array4::from_elem((1, 8, 16, 16), 2.0f32);
        ArrayStore::create(&source).unwrap().write(DatasetKey::Half, &half).unwrap();

        let target = downsample_store(&source, dir.path().join("n.store"), 4).unwrap();
        let out = ArrayStore::open(target).unwrap();
        assert_eq!(out.shape(DatasetKey::Native).unwrap(), vec![1, 2, 4, 4]);
    }

    #[test]
    fn extract_roi_store_crops_any_key() {
        let dir = tempfile::tempdir().unwrap();
        raw_store(&dir.path().join("a.store"));
        let roi = RoiSpec::from_extents(1.0, 1.0, 4.0, 3.0).with_z_range(1, 2);
        let target = extract_roi_store(
            dir.path().join("a.store"),
            DatasetKey::Raw.as_str(),
            &roi,
            dir.path().join("roi.store"),
        )
        .unwrap();
        let cropped = ArrayStore::open(target).unwrap().read::<u16>(DatasetKey::Roi).unwrap();
        assert_eq!(cropped.shape(), &[1, 2, 3]);
        assert_eq!(cropped[[0, 0, 0]], 25 + 5 + 1);
    }

    #[test]
    fn malformed_names_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (source, target) = (dir.path().join("in"), dir.path().join("out"));
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();
        raw_store(&source.join("acer.left.store"));
        let angles: AngleMapping = [("acer", 2.0)].into_iter().collect();

        let report = bulk_rotate(&source, &target, &angles, Interpolation::Nearest).unwrap();
        assert!(report.written.is_empty());
        assert!(matches!(report.skipped[0].reason, VolumeError::MalformedName(_)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_skipped() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let (source, target) = (dir.path().join("in"), dir.path().join("out"));
        fs::create_dir_all(&target).unwrap();
        raw_store(&source.join(OsStr::from_bytes(b"acer-\xff.store")));
        let angles: AngleMapping = [("acer-\u{fffd}", 2.0)].into_iter().collect();

        let report = bulk_rotate(&source, &target, &angles, Interpolation::Nearest).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.skipped[0].name, "acer-\u{fffd}.store");
        assert!(matches!(report.skipped[0].reason, VolumeError::MalformedName(_)));
    }

    #[test]
    fn missing_source_directory_halts() {
        let dir = tempfile::tempdir().unwrap();
        let err = bulk_rotate(
            dir.path().join("absent"),
            dir.path(),
            &AngleMapping::new(),
            Interpolation::Nearest,
        )
        .unwrap_err();
        assert!(matches!(err, VolumeError::Io(_)));
    }

    #[test]
    fn angles_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("angles.json");
        fs::write(&path, r#"{"acer-center": 3.5, "pinus-left": -12.0}"#).unwrap();
        let angles = AngleMapping::from_json_file(&path).unwrap();
        assert_eq!(angles.get("pinus-left").unwrap(), -12.0);
        assert!(matches!(angles.get("acer-right"), Err(VolumeError::MissingKey(_))));
    }
}
