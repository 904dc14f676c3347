use kinematics::KinematicsError;
use thiserror::Error;

use crate::segment::{SegmentKey, TrialKind};

#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid segment key \"{0}\" (expected e.g. \"left_thigh\")")]
pub struct ParseKeyError(pub String);

/// Calibration failure of one segment. Carries the context needed to retry with fresh data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
	#[error("{trial} trial has no stream for {key}")]
	MissingStream { key: SegmentKey, trial: TrialKind },
	#[error("failed to calibrate {key} from {trial} trial: {source}")]
	Estimation {
		key: SegmentKey,
		trial: TrialKind,
		#[source]
		source: KinematicsError,
	},
}

impl CalibrationError {
	pub fn key(&self) -> SegmentKey {
		match self {
			CalibrationError::MissingStream { key, .. } => *key,
			CalibrationError::Estimation { key, .. } => *key,
		}
	}

	pub fn trial(&self) -> TrialKind {
		match self {
			CalibrationError::MissingStream { trial, .. } => *trial,
			CalibrationError::Estimation { trial, .. } => *trial,
		}
	}
}

/// Runtime failure of one segment. Sibling segments are unaffected.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ApplyError {
	#[error("no calibration for {0}")]
	MissingCalibration(SegmentKey),
	#[error("no orientation sample for {0}")]
	MissingSample(SegmentKey),
}
