//! Interactive processing steps over a session's [`StateManager`].
//!
//! Each step reads the current item, builds its replacement and hands it to
//! [`StateManager::update`], so observers only ever see whole items.
//!
//! Steps only edit the recorded parameters. The processed volume is then
//! rebuilt from the loaded one, applying rotation, crop and downsampling in
//! that order, so it always matches the parameters. ROI coordinates refer to
//! the rotated, uncropped, full-resolution frame.

use ndarray::{Array2, Axis};
use tracing::info;

use crate::enums::Interpolation;
use crate::error::{Result, VolumeError};
use crate::roi::{RoiSpec, extract_roi};
use crate::state::{
    CROP_PARAMETER, DOWNSAMPLE_PARAMETER, DownsampleParams, RotationParams, StateManager, WorkItem,
};
use crate::transform::{downsample, rotate_plane, rotate_volume, squeeze_channel};
use crate::volume::{Volume, Voxel};

/// Copy of `item` without its processed volume, ready for new parameters.
fn unprocessed<T: Voxel>(item: &WorkItem<T>) -> WorkItem<T> {
    WorkItem {
        id: item.id.clone(),
        volume: item.volume.clone(),
        processed: None,
        parameters: item.parameters.clone(),
    }
}

/// Apply the recorded rotation, crop and downsampling to the loaded volume.
/// Returns `None` when no processing step is recorded.
pub fn derive_volume<T: Voxel>(item: &WorkItem<T>) -> Result<Option<Volume<T>>> {
    let source = item.volume()?;
    let rotation = item.rotation()?;
    let crop = item.crop()?;
    let downsampling = item.downsampling()?;
    if rotation.is_none() && crop.is_none() && downsampling.is_none() {
        return Ok(None);
    }

    let mut data = match rotation {
        Some(RotationParams { angle, mode }) => rotate_volume(&source.data().view(), angle, mode),
        None => source.data().clone(),
    };
    if let Some(roi) = crop {
        data = extract_roi(&data, &roi)?;
    }
    if let Some(DownsampleParams { in_plane_target }) = downsampling {
        let channel_first = data.view().insert_axis(Axis(0)).into_dyn();
        data = squeeze_channel(downsample(channel_first, in_plane_target)?)?;
    }
    Ok(Some(Volume::new(data)))
}

fn reprocess<T: Voxel>(manager: &mut StateManager<T>, mut item: WorkItem<T>) -> Result<()> {
    item.processed = derive_volume(&item)?;
    info!(id = ?item.id, shape = ?item.working_volume()?.dim(), "processed volume");
    manager.update(item)
}

/// Rotated copies of the preview slices, for live feedback while an angle
/// is being chosen.
pub fn preview_rotation<T: Voxel>(
    volume: &Volume<T>,
    angle: f64,
    mode: Interpolation,
) -> Vec<Array2<T>> {
    volume
        .preview_slices()
        .iter()
        .map(|plane| rotate_plane(plane, angle, mode))
        .collect()
}

/// Record a rotation of the loaded volume. A later rotation replaces an
/// earlier one instead of adding to it.
pub fn rotate_current<T: Voxel>(
    manager: &mut StateManager<T>,
    angle: f64,
    mode: Interpolation,
) -> Result<()> {
    let mut item = unprocessed(manager.item());
    item.set_rotation(RotationParams { angle, mode })?;
    info!(id = ?item.id, angle, %mode, "rotating current volume");
    reprocess(manager, item)
}

/// Record a ROI for the current item after checking it fits its volume.
pub fn record_roi<T: Voxel>(manager: &mut StateManager<T>, roi: &RoiSpec) -> Result<()> {
    let current = manager.item();
    let bounds = roi.crop_bounds(current.volume()?.dim())?;
    let mut item = current.clone();
    item.set_roi(roi)?;
    info!(id = ?item.id, crop = ?bounds, "recorded roi");
    manager.update(item)
}

/// Crop the processed volume to the recorded ROI.
pub fn crop_current<T: Voxel>(manager: &mut StateManager<T>) -> Result<()> {
    let current = manager.item();
    let roi = current
        .roi()?
        .ok_or_else(|| VolumeError::MissingKey("roi".to_string()))?;
    let mut item = unprocessed(current);
    item.set_parameter(CROP_PARAMETER, &roi)?;
    reprocess(manager, item)
}

/// Downsample the processed volume to `in_plane_target` pixels in-plane.
pub fn downsample_current<T: Voxel>(
    manager: &mut StateManager<T>,
    in_plane_target: usize,
) -> Result<()> {
    let mut item = unprocessed(manager.item());
    item.set_parameter(DOWNSAMPLE_PARAMETER, &DownsampleParams { in_plane_target })?;
    reprocess(manager, item)
}
