//! Rectangular regions of interest and their extraction from volumes.
//!
//! A ROI is stored the way the selector UI exports it: a mapping of the four
//! corner names to `[x, y]` pixel coordinates plus an optional half-open
//! depth range. The four corners are redundant; extraction checks that
//! opposite edges agree after rounding.
//!
//! ```text
//! top_left ----- top_right
//!    |               |
//! bottom_left -- bottom_right
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use ndarray::{Array3, ArrayBase, Data, Ix3, s};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VolumeError};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Corner::TopLeft => "top_left",
            Corner::TopRight => "top_right",
            Corner::BottomLeft => "bottom_left",
            Corner::BottomRight => "bottom_right",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiSpec {
    #[serde(flatten)]
    pub corners: BTreeMap<String, Vec<f64>>,
    /// Half-open `[start, end)` range along the depth axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_range: Option<[i64; 2]>,
}

/// Validated, in-bounds crop ranges along (depth, height, width).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CropBounds {
    pub z: Range<usize>,
    pub y: Range<usize>,
    pub x: Range<usize>,
}

impl CropBounds {
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.z.len(), self.y.len(), self.x.len())
    }
}

impl RoiSpec {
    /// Corner mapping for a rectangle dragged between two points. The
    /// extents are ordered so `top_left` is always the minimum corner.
    pub fn from_extents(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (top, bottom) = (y0.min(y1), y0.max(y1));
        let corners = [
            (Corner::TopLeft, [left, top]),
            (Corner::TopRight, [right, top]),
            (Corner::BottomLeft, [left, bottom]),
            (Corner::BottomRight, [right, bottom]),
        ]
        .into_iter()
        .map(|(corner, xy)| (corner.name().to_string(), xy.to_vec()))
        .collect();
        Self {
            corners,
            z_range: None,
        }
    }

    pub fn with_z_range(mut self, start: i64, end: i64) -> Self {
        self.z_range = Some([start, end]);
        self
    }

    pub fn corner(&self, corner: Corner) -> Result<Point> {
        let coords = self
            .corners
            .get(corner.name())
            .ok_or_else(|| VolumeError::MissingKey(corner.name().to_string()))?;
        match coords.as_slice() {
            [x, y] if x.is_finite() && y.is_finite() => Ok(Point::new(*x, *y)),
            [_, _] => Err(VolumeError::ShapeMismatch(format!(
                "corner '{corner}' has non-finite coordinates {coords:?}"
            ))),
            _ => Err(VolumeError::ShapeMismatch(format!(
                "corner '{corner}' needs 2 coordinates, got {}",
                coords.len()
            ))),
        }
    }

    /// Resolve the ROI against a volume of dimensions `dim` into whole-pixel
    /// crop ranges. Coordinates round half to even.
    pub fn crop_bounds(&self, dim: (usize, usize, usize)) -> Result<CropBounds> {
        let top_left = self.corner(Corner::TopLeft)?;
        let top_right = self.corner(Corner::TopRight)?;
        let bottom_left = self.corner(Corner::BottomLeft)?;
        let bottom_right = self.corner(Corner::BottomRight)?;

        let dx = round(top_right.x - top_left.x);
        let bottom_dx = round(bottom_right.x - bottom_left.x);
        if dx != bottom_dx {
            return Err(VolumeError::ShapeMismatch(format!(
                "horizontal spans differ: top edge {dx}, bottom edge {bottom_dx}"
            )));
        }
        let dy = round(bottom_left.y - top_left.y);
        let right_dy = round(bottom_right.y - top_right.y);
        if dy != right_dy {
            return Err(VolumeError::ShapeMismatch(format!(
                "vertical spans differ: left edge {dy}, right edge {right_dy}"
            )));
        }
        if dx < 0 || dy < 0 {
            return Err(VolumeError::ShapeMismatch(format!(
                "inverted rectangle with spans dx={dx}, dy={dy}"
            )));
        }

        let x0 = round(top_left.x);
        let y0 = round(top_left.y);
        let (depth, height, width) = dim;

        let z = match self.z_range {
            Some([start, end]) => checked_range("depth", start, end, depth)?,
            None => 0..depth,
        };
        let y = span_range("height", y0, dy, height)?;
        let x = span_range("width", x0, dx, width)?;
        Ok(CropBounds { z, y, x })
    }
}

#[inline]
fn round(value: f64) -> i64 {
    value.round_ties_even() as i64
}

fn checked_range(axis: &'static str, start: i64, end: i64, extent: usize) -> Result<Range<usize>> {
    if start < 0 || end < start || end > extent as i64 {
        return Err(VolumeError::IndexOutOfBounds {
            axis,
            start,
            end,
            extent,
        });
    }
    Ok(start as usize..end as usize)
}

fn span_range(axis: &'static str, start: i64, span: i64, extent: usize) -> Result<Range<usize>> {
    let end = start
        .checked_add(span)
        .ok_or(VolumeError::IndexOutOfBounds {
            axis,
            start,
            end: i64::MAX,
            extent,
        })?;
    checked_range(axis, start, end, extent)
}

/// Copy the subvolume selected by `roi` out of `volume`.
///
/// The result owns its buffer; it never aliases the source. Without a
/// `z_range` every depth slice is kept.
pub fn extract_roi<S, T>(volume: &ArrayBase<S, Ix3>, roi: &RoiSpec) -> Result<Array3<T>>
where
    S: Data<Elem = T>,
    T: Clone,
{
    let bounds = roi.crop_bounds(volume.dim())?;
    debug!(source = ?volume.dim(), crop = ?bounds, "extracting roi");
    Ok(volume
        .slice(s![bounds.z.clone(), bounds.y.clone(), bounds.x.clone()])
        .to_owned())
}
