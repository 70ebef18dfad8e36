use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VolumeError;

/// Resampling kernel used when an image is rotated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Nearest,
    Bilinear,
}

impl Interpolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interpolation {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(Interpolation::Nearest),
            "bilinear" => Ok(Interpolation::Bilinear),
            other => Err(VolumeError::InvalidMode(other.to_string())),
        }
    }
}

/// Element type of a persisted array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    U8,
    U16,
    I16,
    F16,
    F32,
}

impl DType {
    pub fn size(&self) -> usize {
        match self {
            DType::U8 => 1,
            DType::U16 | DType::I16 | DType::F16 => 2,
            DType::F32 => 4,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::I16 => "i16",
            DType::F16 => "f16",
            DType::F32 => "f32",
        };
        f.write_str(name)
    }
}

/// Canonical array keys inside a store, one per processing stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatasetKey {
    Raw,
    Half,
    Native,
    Rotated,
    Roi,
}

impl DatasetKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKey::Raw => "metric/raw",
            DatasetKey::Half => "downsampled/half",
            DatasetKey::Native => "downsampled/sam-native",
            DatasetKey::Rotated => "rotated/raw",
            DatasetKey::Roi => "roi/raw",
        }
    }
}

impl AsRef<str> for DatasetKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
