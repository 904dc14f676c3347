use kinematics::{compose, inverse, JointAngles};
use nalgebra::UnitQuaternion;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::calibration_set::CalibrationSet;
use crate::error::ApplyError;
use crate::segment::{Segment, SegmentKey, Side};

/// Maps a raw sensor orientation into the segment's anatomical frame.
pub fn to_anatomical(raw: &UnitQuaternion<f64>, calibration: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
	compose(raw, &inverse(calibration))
}

/// Inverse of [`to_anatomical`].
pub fn to_sensor(anatomical: &UnitQuaternion<f64>, calibration: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
	compose(anatomical, calibration)
}

pub fn segment_angles(raw: &UnitQuaternion<f64>, calibration: &UnitQuaternion<f64>) -> JointAngles {
	JointAngles::from_quaternion(&to_anatomical(raw, calibration))
}

/// Joint between two adjacent segments of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Joint {
	Knee,
	Ankle,
}

impl Joint {
	pub const ALL: [Joint; 2] = [Joint::Knee, Joint::Ankle];

	pub fn proximal(self) -> Segment {
		match self {
			Joint::Knee => Segment::Thigh,
			Joint::Ankle => Segment::Shank,
		}
	}

	pub fn distal(self) -> Segment {
		match self {
			Joint::Knee => Segment::Shank,
			Joint::Ankle => Segment::Foot,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JointKey {
	pub side: Side,
	pub joint: Joint,
}

impl Display for JointKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let joint = match self.joint {
			Joint::Knee => "knee",
			Joint::Ankle => "ankle",
		};

		write!(f, "{}_{}", self.side.name(), joint)
	}
}

/// Angles of one frame of raw orientations. Each entry fails on its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedFrame {
	/// Orientation of each segment's anatomical frame.
	pub segments: BTreeMap<SegmentKey, Result<JointAngles, ApplyError>>,
	/// Orientation of each distal segment relative to its proximal one.
	pub joints: BTreeMap<JointKey, Result<JointAngles, ApplyError>>,
}

/// Applies a calibration set to one frame of raw orientations.
///
/// Every segment present in either `raw` or `calibration` gets an entry. A segment missing its
/// calibration or its sample fails alone; joints fail only when one of their segments does.
pub fn apply_frame(calibration: &CalibrationSet,
				   raw: &BTreeMap<SegmentKey, UnitQuaternion<f64>>) -> AppliedFrame {
	let keys: BTreeSet<SegmentKey> = raw.keys()
		.chain(calibration.iter().map(|(key, _)| key))
		.copied()
		.collect();

	let anatomical: BTreeMap<SegmentKey, Result<UnitQuaternion<f64>, ApplyError>> = keys.into_iter()
		.map(|key| {
			let result = calibration.calibration(key).and_then(|cal| {
				raw.get(&key)
					.map(|q| to_anatomical(q, &cal))
					.ok_or(ApplyError::MissingSample(key))
			});

			(key, result)
		})
		.collect();

	let mut joints = BTreeMap::new();
	for &side in Side::ALL.iter() {
		for &joint in Joint::ALL.iter() {
			let proximal = anatomical.get(&SegmentKey::new(side, joint.proximal()));
			let distal = anatomical.get(&SegmentKey::new(side, joint.distal()));

			let result = match (proximal, distal) {
				(None, None) => continue,
				(Some(Ok(proximal)), Some(Ok(distal))) =>
					Ok(JointAngles::from_quaternion(&compose(&inverse(proximal), distal))),
				(Some(Err(error)), _) | (_, Some(Err(error))) => Err(*error),
				(None, _) => Err(ApplyError::MissingCalibration(SegmentKey::new(side, joint.proximal()))),
				(_, None) => Err(ApplyError::MissingCalibration(SegmentKey::new(side, joint.distal()))),
			};

			joints.insert(JointKey { side, joint }, result);
		}
	}

	let segments = anatomical.into_iter()
		.map(|(key, result)| (key, result.map(|q| JointAngles::from_quaternion(&q))))
		.collect();

	AppliedFrame { segments, joints }
}
