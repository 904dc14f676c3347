#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

#[macro_use]
extern crate log;

pub use crate::parser::{Header, ParserState, TelemetryEvent, TelemetryParser, TelemetryRow};
pub use crate::recorder::TrialRecorder;

use calibration::{SegmentKey, TrialKind};
use kinematics::KinematicsError;
use thiserror::Error;

pub mod parser;
pub mod recorder;

#[derive(Debug, Error)]
pub enum TelemetryError {
	#[error("expected {expected} fields, found {found}")]
	Arity { expected: usize, found: usize },
	#[error("non-numeric value \"{value}\" in column {column}")]
	NonNumeric { column: String, value: String },
	#[error("non-finite value \"{value}\" in column {column}")]
	NonFinite { column: String, value: String },
	#[error("missing column {0}")]
	MissingColumn(String),
	#[error("null quaternion for {key} at row {row}")]
	NullQuaternion { key: SegmentKey, row: usize },
	#[error("{0} trial has no data rows")]
	NoRows(TrialKind),
	#[error("{0} trial has no segment quaternion columns")]
	NoSegments(TrialKind),
	#[error(transparent)]
	Kinematics(#[from] KinematicsError),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}
