//! # volume-annotate
//!
//! This crate holds the numeric core of an annotation workflow for
//! volumetric scans, such as CT volumes of wood samples: choose a dataset,
//! correct its in-plane rotation, select a rectangular region of interest
//! and crop or downsample the result for downstream processing.
//!
//! Volumes are dense `(depth, height, width)` arrays of any [`Voxel`]
//! element type. The pieces are:
//!  - [`roi`]: four-corner ROI specifications and [`extract_roi`]
//!  - [`transform`]: rotation of planes and volumes, trilinear downsampling
//!  - [`state`]: the session's [`WorkItem`] and its observing [`StateManager`]
//!  - [`session`]: interactive steps that update the current work item
//!  - [`store`], [`loader`]: persisted arrays and dataset loading
//!  - [`pathing`]: stacking numbered slice images into a volume
//!  - [`pipeline`]: store-to-store rotation and downsampling, bulk rotation
//!
//! Rotations and resizes run in parallel using rayon. Nothing in this crate
//! keeps global state: a session owns one [`StateManager`] and passes it to
//! whatever needs it.
//!
//! # Examples
//!
//! ## Loading a dataset and cropping a region
//!
//! ```no_run
//! # use volume_annotate::{DatasetLoader, Interpolation, RoiSpec, StateManager, WorkItem};
//! # use volume_annotate::session::{crop_current, record_roi, rotate_current};
//! let mut manager = StateManager::<u16>::default();
//! manager.register_observer(|item: &WorkItem<u16>| -> volume_annotate::Result<()> {
//!     println!("now showing {item}");
//!     Ok(())
//! });
//!
//! DatasetLoader::new("data")
//!     .load_into(&mut manager, "acer", "center")
//!     .expect("should have loaded the dataset");
//! rotate_current(&mut manager, 4.5, Interpolation::Bilinear)
//!     .expect("should have rotated the volume");
//! let roi = RoiSpec::from_extents(120.0, 80.0, 380.0, 410.0).with_z_range(10, 200);
//! record_roi(&mut manager, &roi).expect("roi should fit the volume");
//! crop_current(&mut manager).expect("should have cropped the volume");
//! ```
//!
//! ## Extracting a ROI directly
//!
//! ```
//! # use ndarray::Array3;
//! # use volume_annotate::{RoiSpec, extract_roi};
//! let volume = Array3::<f32>::zeros((16, 64, 64));
//! let roi = RoiSpec::from_extents(8.0, 4.0, 40.0, 20.0);
//! let subvolume = extract_roi(&volume, &roi).expect("roi lies inside the volume");
//! assert_eq!(subvolume.dim(), (16, 16, 32));
//! ```

pub mod config;
pub mod enums;
pub mod error;
mod interpolator;
pub mod loader;
pub mod logging;
pub mod pathing;
pub mod pipeline;
pub mod roi;
pub mod session;
pub mod state;
pub mod store;
pub mod transform;
pub mod volume;

pub use config::PipelineConfig;
pub use enums::{DType, DatasetKey, Interpolation};
pub use error::{Result, VolumeError};
pub use loader::DatasetLoader;
pub use roi::{RoiSpec, extract_roi};
pub use state::{StateManager, StateObserver, WorkItem};
pub use volume::{Volume, Voxel};
