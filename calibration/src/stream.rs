use kinematics::{renormalize, KinematicsError};
use nalgebra::{Quaternion, UnitQuaternion};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::CalibrationError;
use crate::segment::{SegmentKey, TrialKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
	/// Seconds since the start of the trial.
	pub timestamp: f64,
	pub orientation: UnitQuaternion<f64>,
}

/// Orientation samples of one segment sensor at a fixed sampling rate. Immutable once
/// captured; clones share the same samples.
#[derive(Debug, Clone)]
pub struct SensorStream {
	fs: f64,
	samples: Arc<[OrientationSample]>,
}

impl SensorStream {
	pub fn new(fs: f64, samples: Vec<OrientationSample>) -> Result<Self, KinematicsError> {
		if !(fs.is_finite() && fs > 0.0) {
			return Err(KinematicsError::MalformedStream(format!("invalid sampling rate {}", fs)));
		}

		let samples = samples.into_iter()
			.enumerate()
			.map(|(i, sample)| {
				let orientation = renormalize(sample.orientation);

				if !(sample.timestamp.is_finite() && orientation.as_ref().coords.iter().all(|c| c.is_finite())) {
					return Err(KinematicsError::MalformedStream(format!("non-finite sample {}", i)));
				}

				Ok(OrientationSample {
					orientation,
					..sample
				})
			})
			.collect::<Result<Vec<_>, KinematicsError>>()?;

		Ok(Self {
			fs,
			samples: samples.into(),
		})
	}

	/// Builds a stream from `[w, x, y, z]` quaternions, sample `i` being timestamped `i / fs`.
	pub fn from_quaternions<I>(fs: f64, quaternions: I) -> Result<Self, KinematicsError>
		where I: IntoIterator<Item=[f64; 4]> {
		let samples = quaternions.into_iter()
			.enumerate()
			.map(|(i, [w, x, y, z])| {
				let q = Quaternion::new(w, x, y, z);
				let orientation = UnitQuaternion::try_new(q, 0.0)
					.ok_or_else(|| KinematicsError::MalformedStream(format!("null quaternion at sample {}", i)))?;

				Ok(OrientationSample {
					timestamp: i as f64 / fs,
					orientation,
				})
			})
			.collect::<Result<Vec<_>, KinematicsError>>()?;

		Self::new(fs, samples)
	}

	/// Identity orientations, standing for a segment that does not move (e.g. a pelvis
	/// assumed fixed during the hip trial).
	pub fn fixed_reference(len: usize, fs: f64) -> Result<Self, KinematicsError> {
		Self::from_quaternions(fs, std::iter::repeat([1., 0., 0., 0.]).take(len))
	}

	pub fn fs(&self) -> f64 {
		self.fs
	}

	pub fn len(&self) -> usize {
		self.samples.len()
	}

	pub fn is_empty(&self) -> bool {
		self.samples.is_empty()
	}

	pub fn samples(&self) -> &[OrientationSample] {
		&self.samples
	}

	pub fn orientations(&self) -> Vec<UnitQuaternion<f64>> {
		self.samples.iter().map(|sample| sample.orientation).collect()
	}

	/// Checks that `self` and `other` can be compared sample by sample.
	pub fn check_aligned(&self, other: &SensorStream) -> Result<(), KinematicsError> {
		if self.len() != other.len() {
			return Err(KinematicsError::MalformedStream(format!(
				"stream lengths differ ({} vs {})", self.len(), other.len())));
		}

		if (self.fs - other.fs).abs() > f64::EPSILON * self.fs.max(other.fs) {
			return Err(KinematicsError::MalformedStream(format!(
				"sampling rates differ ({} Hz vs {} Hz)", self.fs, other.fs)));
		}

		Ok(())
	}
}

/// Streams recorded during one trial, keyed by segment.
#[derive(Debug, Clone)]
pub struct TrialData {
	kind: TrialKind,
	streams: BTreeMap<SegmentKey, SensorStream>,
}

impl TrialData {
	pub fn new(kind: TrialKind) -> Self {
		Self {
			kind,
			streams: BTreeMap::new(),
		}
	}

	pub fn with_stream(mut self, key: SegmentKey, stream: SensorStream) -> Self {
		self.streams.insert(key, stream);
		self
	}

	pub fn kind(&self) -> TrialKind {
		self.kind
	}

	pub fn stream(&self, key: SegmentKey) -> Result<&SensorStream, CalibrationError> {
		self.streams
			.get(&key)
			.ok_or(CalibrationError::MissingStream { key, trial: self.kind })
	}

	pub fn keys(&self) -> impl Iterator<Item=&SegmentKey> {
		self.streams.keys()
	}
}

/// The four trials of a calibration session.
#[derive(Debug, Clone)]
pub struct CalibrationTrials {
	pub static_trial: TrialData,
	pub hip: TrialData,
	pub knee: TrialData,
	pub ankle: TrialData,
}
