use calibration::SegmentKey;
use nalgebra::UnitQuaternion;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceStatus {
	Calibrating,
	Calibrated,
	Streaming,
}

#[derive(Clone, Debug)]
pub enum Input {
	DeviceStatus(DeviceStatus),
	/// Raw sensor orientations of one telemetry row, timestamp in milliseconds.
	Orientations((BTreeMap<SegmentKey, UnitQuaternion<f64>>, Option<f64>)),
}
