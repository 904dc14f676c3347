#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

#[macro_use]
extern crate log;

pub use crate::applier::{apply_frame, segment_angles, to_anatomical, to_sensor, AppliedFrame, Joint, JointKey};
pub use crate::calibration_set::{CalibrationSet, CalibrationStore, QuaternionMap};
pub use crate::error::{ApplyError, CalibrationError, ParseKeyError};
pub use crate::orchestrator::{calibrate, AxisAgreement, CalibrationOptions, CalibrationOutcome, CalibrationReport};
pub use crate::segment::{Segment, SegmentKey, Side, TrialKind};
pub use crate::stream::{CalibrationTrials, OrientationSample, SensorStream, TrialData};

pub mod applier;
pub mod calibration_set;
pub mod error;
pub mod orchestrator;
pub mod segment;
pub mod stream;
