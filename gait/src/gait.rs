use calibration::{apply_frame, AppliedFrame, CalibrationStore, Joint, JointKey, SegmentKey, Side};
use kinematics::JointAngles;
use nalgebra::UnitQuaternion;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::io::Write;

use crate::input::{DeviceStatus, Input};
use crate::traits::{Collector, Dispatcher, Estimator};

const ANGLE_NAMES: [&str; 3] = ["flexion_extension", "abduction_adduction", "internal_external"];

/// Raw orientations of one telemetry row.
#[derive(Debug, Clone)]
pub struct SegmentFrame {
	/// Milliseconds, as sent by the device.
	pub timestamp: Option<f64>,
	pub orientations: BTreeMap<SegmentKey, UnitQuaternion<f64>>,
}

#[derive(Debug, Clone)]
pub struct JointAngleFrame {
	pub timestamp: Option<f64>,
	pub angles: AppliedFrame,
}

pub struct GaitCollector {
	device_status: Option<DeviceStatus>,
}

impl GaitCollector {
	pub fn new() -> Self {
		Self {
			device_status: None,
		}
	}
}

impl Collector<SegmentFrame> for GaitCollector {
	fn collect(&mut self, input: Input) -> Option<SegmentFrame> {
		match input {
			Input::DeviceStatus(status) => {
				info!("Device status: {:?}", status);
				self.device_status = Some(status);
				None
			}
			// Orientations are unreliable while the device calibrates its sensors
			Input::Orientations(_) if self.device_status == Some(DeviceStatus::Calibrating) => None,
			Input::Orientations((orientations, _)) if orientations.is_empty() => None,
			Input::Orientations((orientations, timestamp)) => Some(SegmentFrame { timestamp, orientations }),
		}
	}
}

/// Applies the published calibration to every frame.
pub struct CalibrationEstimator {
	store: CalibrationStore,
	failing: BTreeSet<SegmentKey>,
}

impl CalibrationEstimator {
	pub fn new(store: CalibrationStore) -> Self {
		Self {
			store,
			failing: BTreeSet::new(),
		}
	}
}

impl Estimator<SegmentFrame, JointAngleFrame> for CalibrationEstimator {
	fn output_frame(&mut self, input_frame: SegmentFrame) -> JointAngleFrame {
		let calibration = self.store.current();
		let angles = apply_frame(&calibration, &input_frame.orientations);

		// Report each failing segment once, until it recovers
		let failing: BTreeSet<SegmentKey> = angles.segments.iter()
			.filter_map(|(key, result)| result.as_ref().err().map(|e| (*key, e)))
			.map(|(key, e)| {
				if !self.failing.contains(&key) {
					warn!("{}", e);
				}
				key
			})
			.collect();
		self.failing = failing;

		JointAngleFrame {
			timestamp: input_frame.timestamp,
			angles,
		}
	}
}

/// Writes angles in degrees as tab-separated lines, preceded by a header line. Failed
/// entries are written as `nan`.
pub struct AngleDispatcher<W: Write + Send> {
	writer: W,
	header_written: bool,
}

impl<W: Write + Send> AngleDispatcher<W> {
	pub fn new(writer: W) -> Self {
		Self {
			writer,
			header_written: false,
		}
	}

	fn joint_keys() -> impl Iterator<Item=JointKey> {
		Side::ALL.iter()
			.flat_map(|&side| Joint::ALL.iter().map(move |&joint| JointKey { side, joint }))
	}

	fn header() -> String {
		let mut columns = vec!["timestamp".to_string()];

		let names: Vec<String> = Self::joint_keys().map(|key| key.to_string())
			.chain(SegmentKey::all().map(|key| key.to_string()))
			.collect();

		for name in names {
			columns.extend(ANGLE_NAMES.iter().map(|angle| format!("{}_{}", name, angle)));
		}

		columns.join("\t")
	}

	fn line(frame: &JointAngleFrame) -> String {
		let mut fields = vec![frame.timestamp.map_or_else(|| "nan".to_string(), |t| format!("{}", t))];

		let results: Vec<Option<&JointAngles>> = Self::joint_keys()
			.map(|key| frame.angles.joints.get(&key).and_then(|r| r.as_ref().ok()))
			.chain(SegmentKey::all().map(|key| frame.angles.segments.get(&key).and_then(|r| r.as_ref().ok())))
			.collect();

		for result in results {
			match result {
				Some(angles) => fields.extend(angles.to_degrees().iter().map(|a| format!("{:.3}", a))),
				None => fields.extend(ANGLE_NAMES.iter().map(|_| "nan".to_string())),
			}
		}

		fields.join("\t")
	}
}

impl<W: Write + Send + 'static> Dispatcher<JointAngleFrame> for AngleDispatcher<W> {
	fn dispatch(&mut self, frame: JointAngleFrame) -> Result<(), Box<dyn Error>> {
		if !self.header_written {
			writeln!(self.writer, "{}", Self::header())?;
			self.header_written = true;
		}

		writeln!(self.writer, "{}", Self::line(&frame))?;
		self.writer.flush()?;

		Ok(())
	}
}
