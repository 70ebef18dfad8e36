use std::fmt;

use bytemuck::Pod;
use half::f16;
use ndarray::{Array3, ArrayD, ArrayView2, Axis, Ix3, s};

use crate::enums::DType;
use crate::error::{Result, VolumeError};

/// Numeric element stored in a volume.
///
/// Interpolating kernels compute in `f32` and convert back with
/// [`Voxel::from_f32`], which rounds and saturates for integer types.
pub trait Voxel: Pod + Default + PartialEq + Send + Sync + fmt::Debug + 'static {
    const DTYPE: DType;

    fn to_f32(self) -> f32;

    fn from_f32(value: f32) -> Self;
}

macro_rules! integer_voxel {
    ($ty:ty, $dtype:expr) => {
        impl Voxel for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f32(self) -> f32 {
                self as f32
            }

            #[inline]
            fn from_f32(value: f32) -> Self {
                // `as` saturates at the type bounds and maps NaN to zero
                value.round_ties_even() as $ty
            }
        }
    };
}

integer_voxel!(u8, DType::U8);
integer_voxel!(u16, DType::U16);
integer_voxel!(i16, DType::I16);

impl Voxel for f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}

impl Voxel for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }
}

/// A stack of equally sized planar slices, indexed (depth, height, width).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Volume<T = f32> {
    pub data: Array3<T>,
}

impl<T: Voxel> Volume<T> {
    pub fn new(data: Array3<T>) -> Self {
        Self { data }
    }

    /// Build a volume from an array of any rank by dropping leading
    /// singleton axes, e.g. a `(1, D, H, W)` channel-first array.
    pub fn from_dyn(mut data: ArrayD<T>) -> Result<Self> {
        while data.ndim() > 3 && data.shape()[0] == 1 {
            data = data.index_axis_move(Axis(0), 0);
        }
        let shape = data.shape().to_vec();
        let data = data.into_dimensionality::<Ix3>().map_err(|_| {
            VolumeError::ShapeMismatch(format!("expected a 3D volume, got shape {shape:?}"))
        })?;
        Ok(Self { data })
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<T> {
        &mut self.data
    }

    pub fn into_inner(self) -> Array3<T> {
        self.data
    }

    pub fn slice(&self, index: usize) -> Option<ArrayView2<'_, T>> {
        (index < self.dim().0).then(|| self.data.slice(s![index, .., ..]))
    }

    /// The first, center and last depth slices, as shown by a selector UI.
    pub fn preview_slices(&self) -> Vec<ArrayView2<'_, T>> {
        let depth = self.dim().0;
        if depth == 0 {
            return Vec::new();
        }
        [0, depth / 2, depth - 1]
            .into_iter()
            .filter_map(|index| self.slice(index))
            .collect()
    }
}

impl<T: Voxel> From<Array3<T>> for Volume<T> {
    fn from(data: Array3<T>) -> Self {
        Self::new(data)
    }
}
