//! Session state shared between interactive steps.
//!
//! A [`StateManager`] owns exactly one current [`WorkItem`]. Steps never edit
//! the held item in place: they take a copy, change it and hand it back
//! through [`StateManager::update`], which notifies observers in
//! registration order.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::Interpolation;
use crate::error::{Result, VolumeError};
use crate::roi::RoiSpec;
use crate::volume::{Volume, Voxel};

pub const ROI_PARAMETER: &str = "roi";
pub const ROTATION_PARAMETER: &str = "rotation";
pub const CROP_PARAMETER: &str = "crop";
pub const DOWNSAMPLE_PARAMETER: &str = "downsample";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationParams {
    pub angle: f64,
    pub mode: Interpolation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownsampleParams {
    pub in_plane_target: usize,
}

/// The dataset currently being worked on and the parameters chosen for it.
///
/// `volume` is the dataset as loaded and is never modified by processing
/// steps. `processed` is what the recorded parameters make of it; it is
/// rebuilt from `volume` whenever a step changes them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkItem<T = f32> {
    pub id: Option<String>,
    pub volume: Option<Volume<T>>,
    pub processed: Option<Volume<T>>,
    /// Parameter kind (`"roi"`, `"rotation"`, ...) to its structured value.
    pub parameters: Map<String, Value>,
}

impl<T: Voxel> WorkItem<T> {
    pub fn new(id: impl Into<String>, volume: Volume<T>) -> Self {
        Self {
            id: Some(id.into()),
            volume: Some(volume),
            processed: None,
            parameters: Map::new(),
        }
    }

    /// The volume as loaded.
    pub fn volume(&self) -> Result<&Volume<T>> {
        self.volume
            .as_ref()
            .ok_or_else(|| VolumeError::MissingKey("volume".to_string()))
    }

    /// The processed volume if any step produced one, else the loaded one.
    pub fn working_volume(&self) -> Result<&Volume<T>> {
        match &self.processed {
            Some(processed) => Ok(processed),
            None => self.volume(),
        }
    }

    pub fn set_parameter<P: Serialize>(&mut self, kind: &str, value: &P) -> Result<()> {
        self.parameters
            .insert(kind.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn parameter<P: DeserializeOwned>(&self, kind: &str) -> Result<Option<P>> {
        self.parameters
            .get(kind)
            .map(|value| P::deserialize(value).map_err(VolumeError::from))
            .transpose()
    }

    pub fn roi(&self) -> Result<Option<RoiSpec>> {
        self.parameter(ROI_PARAMETER)
    }

    pub fn set_roi(&mut self, roi: &RoiSpec) -> Result<()> {
        self.set_parameter(ROI_PARAMETER, roi)
    }

    pub fn rotation(&self) -> Result<Option<RotationParams>> {
        self.parameter(ROTATION_PARAMETER)
    }

    pub fn set_rotation(&mut self, rotation: RotationParams) -> Result<()> {
        self.set_parameter(ROTATION_PARAMETER, &rotation)
    }

    pub fn crop(&self) -> Result<Option<RoiSpec>> {
        self.parameter(CROP_PARAMETER)
    }

    pub fn downsampling(&self) -> Result<Option<DownsampleParams>> {
        self.parameter(DOWNSAMPLE_PARAMETER)
    }
}

impl<T: Voxel> fmt::Display for WorkItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id.as_deref().unwrap_or("None");
        let parameters = Value::Object(self.parameters.clone());
        match self.working_volume() {
            Ok(volume) => write!(
                f,
                "WorkItem(ID={id}, (volume={:?}, {}), parameters={parameters})",
                volume.dim(),
                volume.dtype()
            ),
            Err(_) => write!(f, "WorkItem(ID={id}, (volume=None), parameters={parameters})"),
        }
    }
}

/// Anything that wants to hear about a replaced work item, typically a UI
/// element that redraws from the new item.
pub trait StateObserver<T = f32> {
    fn on_state_change(&mut self, item: &WorkItem<T>) -> Result<()>;
}

impl<T, F> StateObserver<T> for F
where
    F: FnMut(&WorkItem<T>) -> Result<()>,
{
    fn on_state_change(&mut self, item: &WorkItem<T>) -> Result<()> {
        self(item)
    }
}

/// Handle returned on registration, used to unregister again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

/// Holds the current work item and notifies observers when it is replaced.
///
/// Not thread safe; one manager belongs to one session. Registering the
/// same observer twice yields two notifications per update.
pub struct StateManager<T = f32> {
    item: WorkItem<T>,
    observers: Vec<(ObserverId, Box<dyn StateObserver<T>>)>,
    next_id: usize,
}

impl<T: Voxel> StateManager<T> {
    pub fn new(initial_item: WorkItem<T>) -> Self {
        Self {
            item: initial_item,
            observers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn item(&self) -> &WorkItem<T> {
        &self.item
    }

    /// Replace the held item, then notify every observer in registration
    /// order. The first failing observer aborts the remaining notifications;
    /// the new item stays in place.
    pub fn update(&mut self, new_item: WorkItem<T>) -> Result<()> {
        self.item = new_item;
        self.notify_observers()
    }

    pub fn register_observer(&mut self, observer: impl StateObserver<T> + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns whether the observer was registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(registered, _)| *registered != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify_observers(&mut self) -> Result<()> {
        for (_, observer) in &mut self.observers {
            observer.on_state_change(&self.item)?;
        }
        Ok(())
    }
}

impl<T: Voxel> Default for StateManager<T> {
    fn default() -> Self {
        Self::new(WorkItem::default())
    }
}

impl<T: Voxel> fmt::Debug for StateManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateManager")
            .field("item", &self.item)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(
        log: &Log,
        name: &'static str,
    ) -> impl FnMut(&WorkItem<u16>) -> Result<()> + Clone + 'static {
        let log = Rc::clone(log);
        move |item: &WorkItem<u16>| {
            log.borrow_mut()
                .push(format!("{name}:{}", item.id.as_deref().unwrap_or("-")));
            Ok(())
        }
    }

    fn item(id: &str) -> WorkItem<u16> {
        WorkItem::new(id, Volume::new(Array3::zeros((2, 3, 4))))
    }

    #[test]
    fn update_notifies_in_registration_order() {
        let log = Log::default();
        let mut manager = StateManager::<u16>::default();
        manager.register_observer(recorder(&log, "first"));
        manager.register_observer(recorder(&log, "second"));

        manager.update(item("acer-center")).unwrap();
        assert_eq!(*log.borrow(), vec!["first:acer-center", "second:acer-center"]);

        manager.update(item("pinus-left")).unwrap();
        assert_eq!(log.borrow().len(), 4);
        assert_eq!(manager.item().id.as_deref(), Some("pinus-left"));
    }

    #[test]
    fn duplicate_registration_notifies_twice() {
        let log = Log::default();
        let mut manager = StateManager::<u16>::default();
        let observer = recorder(&log, "dup");
        manager.register_observer(observer.clone());
        manager.register_observer(observer);
        manager.update(item("x")).unwrap();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn removed_observer_is_silent() {
        let log = Log::default();
        let mut manager = StateManager::<u16>::default();
        let first = manager.register_observer(recorder(&log, "first"));
        manager.register_observer(recorder(&log, "second"));

        assert!(manager.remove_observer(first));
        assert!(!manager.remove_observer(first));
        manager.update(item("x")).unwrap();
        assert_eq!(*log.borrow(), vec!["second:x"]);
    }

    #[test]
    fn failing_observer_stops_notification() {
        let log = Log::default();
        let mut manager = StateManager::<u16>::default();
        manager.register_observer(|_: &WorkItem<u16>| -> Result<()> {
            Err(VolumeError::Observer("redraw failed".into()))
        });
        manager.register_observer(recorder(&log, "late"));

        let err = manager.update(item("x")).unwrap_err();
        assert!(matches!(err, VolumeError::Observer(_)));
        assert!(log.borrow().is_empty());
        assert_eq!(manager.item().id.as_deref(), Some("x"));
    }

    #[test]
    fn copy_is_independent() {
        let mut original = item("acer-center");
        original
            .set_rotation(RotationParams { angle: 3.0, mode: Interpolation::Nearest })
            .unwrap();
        let mut copy = original.clone();
        copy.volume.as_mut().unwrap().data_mut()[[0, 0, 0]] = 7;
        copy.set_rotation(RotationParams { angle: -1.0, mode: Interpolation::Bilinear })
            .unwrap();

        assert_eq!(original.volume().unwrap().data()[[0, 0, 0]], 0);
        assert_eq!(original.rotation().unwrap().unwrap().angle, 3.0);
    }

    #[test]
    fn parameters_round_trip() {
        let mut work = item("acer-center");
        let roi = RoiSpec::from_extents(1.0, 2.0, 3.0, 4.0).with_z_range(0, 1);
        work.set_roi(&roi).unwrap();
        assert_eq!(work.roi().unwrap(), Some(roi));
        assert_eq!(work.rotation().unwrap(), None);
        assert_eq!(work.parameters["roi"]["top_right"], serde_json::json!([3.0, 2.0]));
    }

    #[test]
    fn display_summarizes_volume() {
        let work = item("acer-center");
        assert_eq!(
            work.to_string(),
            "WorkItem(ID=acer-center, (volume=(2, 3, 4), u16), parameters={})"
        );
        assert_eq!(
            WorkItem::<f32>::default().to_string(),
            "WorkItem(ID=None, (volume=None), parameters={})"
        );
    }

    #[test]
    fn working_volume_prefers_processed() {
        let mut work = item("acer-center");
        assert_eq!(work.working_volume().unwrap().dim(), (2, 3, 4));
        work.processed = Some(Volume::new(Array3::zeros((1, 2, 2))));
        assert_eq!(work.working_volume().unwrap().dim(), (1, 2, 2));
        assert_eq!(work.volume().unwrap().dim(), (2, 3, 4));
        assert!(work.to_string().contains("(1, 2, 2)"));
    }

    #[test]
    fn missing_volume_is_reported() {
        let work = WorkItem::<f32>::default();
        assert!(matches!(work.volume(), Err(VolumeError::MissingKey(ref k)) if k == "volume"));
    }
}
