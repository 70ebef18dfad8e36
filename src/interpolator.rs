use ndarray::{Array3, ArrayView2, ArrayView3, Zip};

use crate::volume::Voxel;

pub(crate) struct Interpolator;

/// Source taps along one axis for a half-pixel aligned resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Taps {
    pub lo: usize,
    pub hi: usize,
    pub weight_hi: f32,
}

impl Interpolator {
    /// Nearest sample at a fractional position; zero outside the plane.
    #[inline]
    pub(crate) fn nearest<T: Voxel>(plane: &ArrayView2<T>, y: f32, x: f32) -> T {
        let (height, width) = plane.dim();
        let y = y.round_ties_even();
        let x = x.round_ties_even();
        if !(0.0..height as f32).contains(&y) || !(0.0..width as f32).contains(&x) {
            return T::default();
        }
        plane[[y as usize, x as usize]]
    }

    /// Bilinear sample at a fractional position. Taps falling outside the
    /// plane contribute zero, so edges fade into the background.
    #[inline]
    pub(crate) fn bilinear_interpolate<T: Voxel>(plane: &ArrayView2<T>, y: f32, x: f32) -> f32 {
        let (height, width) = plane.dim();
        let tap = |row: f32, col: f32| -> f32 {
            if (0.0..height as f32).contains(&row) && (0.0..width as f32).contains(&col) {
                plane[[row as usize, col as usize]].to_f32()
            } else {
                0.0
            }
        };

        let y0 = y.floor();
        let x0 = x.floor();
        let dy = y - y0;
        let dx = x - x0;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = tap(y0, x0);
        let v01 = tap(y0, x0 + 1.0);
        let v10 = tap(y0 + 1.0, x0);
        let v11 = tap(y0 + 1.0, x0 + 1.0);

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Source taps for every output index when `input` samples are resized
    /// to `output` samples with pixel centers aligned (not corners).
    pub(crate) fn resize_taps(input: usize, output: usize) -> Vec<Taps> {
        let scale = input as f32 / output as f32;
        (0..output)
            .map(|dst| {
                let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
                let lo = (src.floor() as usize).min(input - 1);
                let hi = (lo + 1).min(input - 1);
                Taps {
                    lo,
                    hi,
                    weight_hi: src - lo as f32,
                }
            })
            .collect()
    }

    /// Trilinear resize of a (depth, height, width) block to `target`.
    pub(crate) fn resize_trilinear<T: Voxel>(
        source: &ArrayView3<T>,
        target: (usize, usize, usize),
    ) -> Array3<T> {
        let (depth, height, width) = source.dim();
        let z_taps = Self::resize_taps(depth, target.0);
        let y_taps = Self::resize_taps(height, target.1);
        let x_taps = Self::resize_taps(width, target.2);

        let mut output = Array3::<T>::default(target);
        Zip::indexed(&mut output).par_for_each(|(z, y, x), value| {
            let (tz, ty, tx) = (z_taps[z], y_taps[y], x_taps[x]);
            let sample = |zz: usize, yy: usize| -> f32 {
                let lo = source[[zz, yy, tx.lo]].to_f32();
                let hi = source[[zz, yy, tx.hi]].to_f32();
                lo.mul_add(1.0 - tx.weight_hi, hi * tx.weight_hi)
            };
            let plane = |zz: usize| -> f32 {
                sample(zz, ty.lo).mul_add(1.0 - ty.weight_hi, sample(zz, ty.hi) * ty.weight_hi)
            };
            let interpolated =
                plane(tz.lo).mul_add(1.0 - tz.weight_hi, plane(tz.hi) * tz.weight_hi);
            *value = T::from_f32(interpolated);
        });
        output
    }
}
