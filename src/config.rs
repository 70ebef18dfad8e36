use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::enums::Interpolation;
use crate::error::{Result, VolumeError};
use crate::loader::DatasetLoader;

/// Settings shared by the interactive session and the batch commands.
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the `<class>-<subid>.store` datasets.
    pub basepath: PathBuf,
    pub classes: Vec<String>,
    pub subidentifiers: Vec<String>,
    /// Angle bounds in degrees offered to a user choosing a rotation.
    pub angle_range: (f64, f64),
    pub interpolation: Interpolation,
    pub in_plane_target: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            basepath: PathBuf::from("."),
            classes: vec!["acer".into(), "pinus".into()],
            subidentifiers: ["center", "left", "right", "upper", "lower"]
                .into_iter()
                .map(String::from)
                .collect(),
            angle_range: (-20.0, 20.0),
            interpolation: Interpolation::Nearest,
            in_plane_target: 512,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = serde_json::from_slice(&fs::read(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let (low, high) = self.angle_range;
        if !(low <= high) {
            return Err(VolumeError::ShapeMismatch(format!(
                "angle range [{low}, {high}] is empty"
            )));
        }
        if self.in_plane_target == 0 {
            return Err(VolumeError::ShapeMismatch(
                "in_plane_target must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn loader(&self) -> DatasetLoader {
        DatasetLoader::new(&self.basepath)
    }

    /// Every (class, sub-identifier) pair a user can pick.
    pub fn selections(&self) -> impl Iterator<Item = (&str, &str)> {
        self.classes.iter().flat_map(move |class| {
            self.subidentifiers
                .iter()
                .map(move |subid| (class.as_str(), subid.as_str()))
        })
    }

    pub fn angle_in_range(&self, angle: f64) -> bool {
        let (low, high) = self.angle_range;
        (low..=high).contains(&angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"basepath": "/data", "interpolation": "bilinear"}"#).unwrap();
        assert_eq!(config.basepath, PathBuf::from("/data"));
        assert_eq!(config.interpolation, Interpolation::Bilinear);
        assert_eq!(config.in_plane_target, 512);
        assert_eq!(config.classes, vec!["acer", "pinus"]);
    }

    #[test]
    fn selections_cross_classes_and_subids() {
        let config = PipelineConfig::default();
        let selections: Vec<_> = config.selections().collect();
        assert_eq!(selections.len(), 10);
        assert_eq!(selections[0], ("acer", "center"));
        assert_eq!(selections[9], ("pinus", "lower"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"angle_range": [5.0, -5.0]}"#).unwrap();
        assert!(PipelineConfig::from_json_file(&path).is_err());
        fs::write(&path, r#"{"interpolation": "cubic"}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&path),
            Err(VolumeError::Json(_))
        ));
    }

    #[test]
    fn angle_range_is_inclusive() {
        let config = PipelineConfig::default();
        assert!(config.angle_in_range(20.0));
        assert!(!config.angle_in_range(-20.5));
    }
}
