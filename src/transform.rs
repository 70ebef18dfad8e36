//! Geometric transforms over planes and volumes.
//!
//! Rotation is about the plane center `((W - 1) / 2, (H - 1) / 2)` and is
//! counterclockwise on screen (rows growing downwards) for positive angles.
//! Every output pixel is pulled from the inverse-rotated source position;
//! positions outside the source read as zero.

use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayView3, ArrayViewD, Axis, Ix2, Ix4, Zip};
use tracing::{debug, warn};

use crate::enums::Interpolation;
use crate::error::{Result, VolumeError};
use crate::interpolator::Interpolator;
use crate::volume::Voxel;

/// Rotate a single planar image by `angle` degrees.
///
/// Accepts an array of any rank so callers holding dynamically shaped data
/// get a shape error instead of a panic; only rank 2 is valid.
pub fn rotate_image<T: Voxel>(
    image: ArrayViewD<'_, T>,
    angle: f64,
    mode: Interpolation,
) -> Result<Array2<T>> {
    let shape = image.shape().to_vec();
    let plane = image.into_dimensionality::<Ix2>().map_err(|_| {
        VolumeError::ShapeMismatch(format!(
            "expected a planar image, got shape {shape:?} (angle {angle}, mode {mode})"
        ))
    })?;
    Ok(rotate_plane(&plane, angle, mode))
}

pub fn rotate_plane<T: Voxel>(
    plane: &ArrayView2<'_, T>,
    angle: f64,
    mode: Interpolation,
) -> Array2<T> {
    let (height, width) = plane.dim();
    let (sin, cos) = angle.to_radians().sin_cos();
    let cy = (height as f64 - 1.0) * 0.5;
    let cx = (width as f64 - 1.0) * 0.5;

    let mut output = Array2::<T>::default((height, width));
    Zip::indexed(&mut output).for_each(|(y, x), value| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let src_x = (cos * dx - sin * dy + cx) as f32;
        let src_y = (sin * dx + cos * dy + cy) as f32;
        *value = match mode {
            Interpolation::Nearest => Interpolator::nearest(plane, src_y, src_x),
            Interpolation::Bilinear => {
                T::from_f32(Interpolator::bilinear_interpolate(plane, src_y, src_x))
            }
        };
    });
    output
}

/// Rotate every depth slice of a (D, H, W) volume by the same angle.
pub fn rotate_volume<T: Voxel>(
    volume: &ArrayView3<'_, T>,
    angle: f64,
    mode: Interpolation,
) -> Array3<T> {
    debug!(shape = ?volume.dim(), angle, %mode, "rotating volume");
    let mut output = Array3::<T>::default(volume.dim());
    Zip::from(output.axis_iter_mut(Axis(0)))
        .and(volume.axis_iter(Axis(0)))
        .par_for_each(|mut rotated, plane| {
            rotated.assign(&rotate_plane(&plane, angle, mode));
        });
    output
}

/// Resize a (C, D, H, W) volume so the in-plane extent becomes
/// `in_plane_target` and depth keeps its ratio to the in-plane extent.
///
/// Each channel is resized independently with trilinear interpolation.
pub fn downsample<T: Voxel>(
    volume: ArrayViewD<'_, T>,
    in_plane_target: usize,
) -> Result<Array4<T>> {
    if volume.ndim() != 4 {
        return Err(VolumeError::ShapeMismatch(format!(
            "expecting 4D (C x D x H x W) volume, got shape {:?}",
            volume.shape()
        )));
    }
    let volume = volume
        .into_dimensionality::<Ix4>()
        .map_err(|e| VolumeError::ShapeMismatch(e.to_string()))?;
    let (channels, depth, height, width) = volume.dim();
    if channels != 1 {
        warn!(channels, "encountered non-unit channel dimension");
    }
    if height != width {
        return Err(VolumeError::ShapeMismatch(format!(
            "in-plane dimensions not square: H={height} W={width}"
        )));
    }
    if height == 0 || in_plane_target == 0 {
        return Err(VolumeError::ShapeMismatch(format!(
            "cannot resize in-plane extent {height} to {in_plane_target}"
        )));
    }

    let factor = in_plane_target as f64 / height as f64;
    let z_target = (factor * depth as f64).round_ties_even() as usize;
    if z_target == 0 {
        return Err(VolumeError::ShapeMismatch(format!(
            "depth {depth} scaled by {factor} collapses to zero slices"
        )));
    }
    let target = (z_target, in_plane_target, in_plane_target);
    debug!(source = ?volume.dim(), ?target, factor, "downsampling volume");

    let mut output = Array4::<T>::default((channels, z_target, in_plane_target, in_plane_target));
    for (mut resized, channel) in output.outer_iter_mut().zip(volume.outer_iter()) {
        resized.assign(&Interpolator::resize_trilinear(&channel, target));
    }
    Ok(output)
}

/// Drop the channel axis of a single-channel (1, D, H, W) array.
pub fn squeeze_channel<T: Voxel>(volume: Array4<T>) -> Result<Array3<T>> {
    match volume.dim().0 {
        1 => Ok(volume.index_axis_move(Axis(0), 0)),
        channels => Err(VolumeError::ShapeMismatch(format!(
            "cannot squeeze channel axis of length {channels}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn, array};

    fn ramp(height: usize, width: usize) -> Array2<f32> {
        Array2::from_shape_fn((height, width), |(y, x)| (y * width + x) as f32 + 1.0)
    }

    #[test]
    fn zero_angle_is_identity_for_every_mode() {
        let image = ramp(7, 9);
        for mode in [Interpolation::Nearest, Interpolation::Bilinear] {
            let rotated = rotate_image(image.view().into_dyn(), 0.0, mode).unwrap();
            assert_eq!(rotated, image, "mode {mode}");
        }
    }

    #[test]
    fn zero_angle_identity_holds_for_integers() {
        let image = Array2::from_shape_fn((4, 6), |(y, x)| (y * 6 + x) as u16 * 1000);
        let rotated = rotate_image(image.view().into_dyn(), 0.0, Interpolation::Bilinear).unwrap();
        assert_eq!(rotated, image);
    }

    #[test]
    fn rank_three_input_is_rejected() {
        let image = Array::<f32, _>::zeros(IxDyn(&[2, 3, 3]));
        let err = rotate_image(image.view(), 5.0, Interpolation::Nearest).unwrap_err();
        assert!(matches!(err, VolumeError::ShapeMismatch(_)));
    }

    #[test]
    fn positive_angle_turns_counterclockwise() {
        // a bright pixel right of center moves above center
        let mut image = Array2::<u8>::zeros((3, 3));
        image[[1, 2]] = 9;
        let rotated = rotate_image(image.view().into_dyn(), 90.0, Interpolation::Nearest).unwrap();
        let expected = array![[0u8, 9, 0], [0, 0, 0], [0, 0, 0]];
        assert_eq!(rotated, expected);
    }

    #[test]
    fn negative_angle_turns_clockwise() {
        let mut image = Array2::<u8>::zeros((3, 3));
        image[[1, 2]] = 9;
        let rotated = rotate_image(image.view().into_dyn(), -90.0, Interpolation::Nearest).unwrap();
        assert_eq!(rotated[[2, 1]], 9);
        assert_eq!(rotated.sum(), 9);
    }

    #[test]
    fn corners_fill_with_zero() {
        let image = Array2::from_elem((5, 5), 4.0f32);
        let rotated = rotate_image(image.view().into_dyn(), 45.0, Interpolation::Nearest).unwrap();
        assert_eq!(rotated.dim(), (5, 5));
        assert_eq!(rotated[[0, 0]], 0.0);
        assert_eq!(rotated[[2, 2]], 4.0);
    }

    #[test]
    fn full_turn_is_identity_for_nearest() {
        let image = ramp(5, 5);
        let rotated = rotate_image(image.view().into_dyn(), 360.0, Interpolation::Nearest).unwrap();
        assert_eq!(rotated, image);
    }

    #[test]
    fn volume_rotation_matches_per_slice_rotation() {
        let volume = Array3::from_shape_fn((3, 6, 6), |(z, y, x)| (z * 36 + y * 6 + x) as f32);
        let rotated = rotate_volume(&volume.view(), 12.5, Interpolation::Bilinear);
        for (z, plane) in volume.outer_iter().enumerate() {
            let expected = rotate_plane(&plane, 12.5, Interpolation::Bilinear);
            assert_eq!(rotated.index_axis(Axis(0), z), expected);
        }
    }

    #[test]
    fn downsample_scales_depth_with_in_plane_factor() {
        let volume = Array::<f32, _>::zeros(IxDyn(&[1, 100, 200, 200]));
        let out = downsample(volume.view(), 50).unwrap();
        assert_eq!(out.dim(), (1, 25, 50, 50));
        assert_eq!(squeeze_channel(out).unwrap().dim(), (25, 50, 50));
    }

    #[test]
    fn downsample_depth_rounds_half_to_even() {
        // 0.5 * 5 = 2.5 rounds to 2
        let volume = Array::<f32, _>::zeros(IxDyn(&[1, 5, 8, 8]));
        let out = downsample(volume.view(), 4).unwrap();
        assert_eq!(out.dim(), (1, 2, 4, 4));
    }

    #[test]
    fn downsample_rejects_non_square_planes() {
        let volume = Array::<f32, _>::zeros(IxDyn(&[1, 4, 8, 6]));
        let err = downsample(volume.view(), 4).unwrap_err();
        assert!(matches!(err, VolumeError::ShapeMismatch(_)));
    }

    #[test]
    fn downsample_rejects_wrong_rank() {
        let volume = Array::<f32, _>::zeros(IxDyn(&[4, 8, 8]));
        let err = downsample(volume.view(), 4).unwrap_err();
        assert!(matches!(err, VolumeError::ShapeMismatch(_)));
    }

    #[test]
    fn downsample_keeps_channels() {
        let volume = Array::from_elem(IxDyn(&[2, 4, 8, 8]), 3u16);
        let out = downsample(volume.view(), 4).unwrap();
        assert_eq!(out.dim(), (2, 2, 4, 4));
        assert!(out.iter().all(|&v| v == 3));
        assert!(squeeze_channel(out).is_err());
    }
}
