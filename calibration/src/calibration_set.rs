use kinematics::{renormalize, KinematicsError};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::sync::Arc;

use crate::error::ApplyError;
use crate::segment::SegmentKey;

/// Plain numeric form of a calibration set: `[w, x, y, z]` per segment.
pub type QuaternionMap = BTreeMap<SegmentKey, [f64; 4]>;

/// Calibration quaternions of a session, one per segment. Each one maps anatomical
/// coordinates to the coordinates of the segment's sensor.
///
/// A set is never modified once built. Recalibration builds a new set and publishes it
/// through a [`CalibrationStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "QuaternionMap", try_from = "QuaternionMap")]
pub struct CalibrationSet {
	quaternions: BTreeMap<SegmentKey, UnitQuaternion<f64>>,
}

impl CalibrationSet {
	pub fn new(quaternions: BTreeMap<SegmentKey, UnitQuaternion<f64>>) -> Self {
		Self {
			quaternions: quaternions.into_iter()
				.map(|(key, q)| (key, renormalize(q)))
				.collect(),
		}
	}

	pub fn get(&self, key: SegmentKey) -> Option<&UnitQuaternion<f64>> {
		self.quaternions.get(&key)
	}

	pub fn calibration(&self, key: SegmentKey) -> Result<UnitQuaternion<f64>, ApplyError> {
		self.get(key)
			.copied()
			.ok_or(ApplyError::MissingCalibration(key))
	}

	/// Medio-lateral axis of the segment's anatomical frame, in its sensor frame.
	pub fn medio_lateral_axis(&self, key: SegmentKey) -> Option<Vector3<f64>> {
		self.get(key).map(|q| q * Vector3::x())
	}

	pub fn iter(&self) -> impl Iterator<Item=(&SegmentKey, &UnitQuaternion<f64>)> {
		self.quaternions.iter()
	}

	pub fn len(&self) -> usize {
		self.quaternions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.quaternions.is_empty()
	}

	/// Whether every segment of both sides is calibrated.
	pub fn is_complete(&self) -> bool {
		SegmentKey::all().all(|key| self.quaternions.contains_key(&key))
	}

	pub fn to_quaternion_map(&self) -> QuaternionMap {
		self.quaternions.iter()
			.map(|(key, q)| (*key, [q.w, q.i, q.j, q.k]))
			.collect()
	}

	pub fn from_quaternion_map(map: &QuaternionMap) -> Result<Self, KinematicsError> {
		let quaternions = map.iter()
			.map(|(key, &[w, x, y, z])| {
				UnitQuaternion::try_new(Quaternion::new(w, x, y, z), 0.0)
					.map(|q| (*key, q))
					.ok_or_else(|| KinematicsError::MalformedStream(format!("null calibration quaternion for {}", key)))
			})
			.collect::<Result<BTreeMap<_, _>, _>>()?;

		Ok(Self::new(quaternions))
	}
}

impl From<CalibrationSet> for QuaternionMap {
	fn from(set: CalibrationSet) -> Self {
		set.to_quaternion_map()
	}
}

impl TryFrom<QuaternionMap> for CalibrationSet {
	type Error = KinematicsError;

	fn try_from(map: QuaternionMap) -> Result<Self, Self::Error> {
		CalibrationSet::from_quaternion_map(&map)
	}
}

/// Holds the calibration set in use. Publishing replaces the whole set at once; readers
/// keep the snapshot they took until they ask for a new one.
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
	current: Arc<RwLock<Arc<CalibrationSet>>>,
}

impl CalibrationStore {
	pub fn new(set: CalibrationSet) -> Self {
		Self {
			current: Arc::new(RwLock::new(Arc::new(set))),
		}
	}

	pub fn current(&self) -> Arc<CalibrationSet> {
		self.current.read().clone()
	}

	/// Replaces the current set, returning the previous one.
	pub fn publish(&self, set: CalibrationSet) -> Arc<CalibrationSet> {
		let set = Arc::new(set);
		info!("Publishing calibration set ({} segments)", set.len());

		std::mem::replace(&mut *self.current.write(), set)
	}
}
