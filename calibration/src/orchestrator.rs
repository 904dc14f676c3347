use crossbeam_utils::thread;
use kinematics::{mean_rotation, AnatomicalFrame, Axis, AxisSign, FunctionalAxis, KinematicsError, RelativeMotion};
use nalgebra::{UnitQuaternion, Vector3};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::calibration_set::CalibrationSet;
use crate::error::CalibrationError;
use crate::segment::{Segment, SegmentKey, Side, TrialKind};
use crate::stream::{CalibrationTrials, SensorStream, TrialData};

/// Below this, hip and knee trials disagree on the thigh axis enough to be worth a warning.
const LOW_AGREEMENT: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct CalibrationOptions {
	/// Global "up" direction the subject stands along during the static trial.
	pub up: Vector3<f64>,
	/// Previous session. When set, each medio-lateral axis is flipped to agree with it.
	pub reference: Option<Arc<CalibrationSet>>,
}

impl Default for CalibrationOptions {
	fn default() -> Self {
		Self {
			up: Vector3::y(),
			reference: None,
		}
	}
}

impl CalibrationOptions {
	fn axis_sign(&self, key: SegmentKey) -> AxisSign {
		self.reference
			.as_ref()
			.and_then(|set| set.medio_lateral_axis(key))
			.map(AxisSign::AlignWith)
			.unwrap_or_default()
	}
}

/// Agreement between the thigh axis seen by the hip trial and by the knee trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAgreement {
	/// Signed dot product of both unit axes.
	pub dot: f64,
}

impl AxisAgreement {
	/// Sign-independent agreement in `[0, 1]`.
	pub fn confidence(&self) -> f64 {
		self.dot.abs()
	}
}

/// Hip/knee cross-check per side. A hip trial that cannot be used only fails the check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationReport {
	pub agreement: BTreeMap<Side, Result<AxisAgreement, CalibrationError>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
	pub set: CalibrationSet,
	pub report: CalibrationReport,
}

struct SideCalibration {
	quaternions: Vec<(SegmentKey, UnitQuaternion<f64>)>,
	agreement: Result<AxisAgreement, CalibrationError>,
}

/// Runs the whole calibration session. Both sides are processed concurrently; the first
/// failure in side order is returned.
pub fn calibrate(trials: &CalibrationTrials,
				 options: &CalibrationOptions) -> Result<CalibrationOutcome, CalibrationError> {
	let sides = thread::scope(|scope| {
		let handles: Vec<_> = Side::ALL.iter()
			.map(|&side| (side, scope.spawn(move |_| calibrate_side(side, trials, options))))
			.collect();

		handles.into_iter()
			.map(|(side, handle)| (side, handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))))
			.collect::<Vec<_>>()
	}).unwrap_or_else(|panic| std::panic::resume_unwind(panic));

	let mut quaternions = BTreeMap::new();
	let mut report = CalibrationReport::default();

	for (side, result) in sides {
		let calibration = result?;

		quaternions.extend(calibration.quaternions);
		report.agreement.insert(side, calibration.agreement);
	}

	let set = CalibrationSet::new(quaternions);
	info!("Calibrated {} segments", set.len());

	Ok(CalibrationOutcome { set, report })
}

fn calibrate_side(side: Side,
				  trials: &CalibrationTrials,
				  options: &CalibrationOptions) -> Result<SideCalibration, CalibrationError> {
	let thigh = SegmentKey::new(side, Segment::Thigh);
	let shank = SegmentKey::new(side, Segment::Shank);
	let foot = SegmentKey::new(side, Segment::Foot);

	let knee = joint_axis(&trials.knee, Some(thigh), shank)?;
	let ankle = joint_axis(&trials.ankle, Some(shank), foot)?;

	let agreement = joint_axis(&trials.hip, None, thigh).map(|hip| AxisAgreement {
		dot: hip.proximal.dot(&*knee.proximal),
	});

	match &agreement {
		Ok(agreement) if agreement.confidence() < LOW_AGREEMENT =>
			warn!("{} thigh axis: hip and knee trials disagree (|dot| = {:.3})", side.name(), agreement.confidence()),
		Ok(agreement) =>
			info!("{} thigh axis: hip/knee agreement {:.3}", side.name(), agreement.confidence()),
		Err(e) =>
			warn!("{} thigh axis not cross-checked: {}", side.name(), e),
	}

	// Knee motion isolates thigh and shank from hip cross-talk
	let medio_lateral = [
		(thigh, knee.proximal),
		(shank, knee.distal),
		(foot, ankle.distal),
	];

	let quaternions = medio_lateral.iter()
		.map(|&(key, axis)| segment_calibration(key, axis, &trials.static_trial, options))
		.collect::<Result<Vec<_>, _>>()?;

	Ok(SideCalibration {
		quaternions,
		agreement,
	})
}

/// Functional axis of the joint between `proximal` and `distal`. A missing proximal key
/// stands for a segment held still (the pelvis in the hip trial). Estimation failures are
/// attributed to the distal segment.
fn joint_axis(trial: &TrialData,
			  proximal: Option<SegmentKey>,
			  distal: SegmentKey) -> Result<FunctionalAxis, CalibrationError> {
	let estimation_error = |source: KinematicsError| CalibrationError::Estimation {
		key: distal,
		trial: trial.kind(),
		source,
	};

	let distal_stream = trial.stream(distal)?;
	let proximal_stream = match proximal {
		Some(key) => trial.stream(key)?.clone(),
		None => SensorStream::fixed_reference(distal_stream.len(), distal_stream.fs())
			.map_err(estimation_error)?,
	};

	proximal_stream
		.check_aligned(distal_stream)
		.map_err(estimation_error)?;

	let motion = RelativeMotion::estimate(&proximal_stream.orientations(),
										  &distal_stream.orientations(),
										  distal_stream.fs())
		.map_err(estimation_error)?;

	FunctionalAxis::estimate(&motion).map_err(estimation_error)
}

fn segment_calibration(key: SegmentKey,
					   medio_lateral: Axis,
					   static_trial: &TrialData,
					   options: &CalibrationOptions) -> Result<(SegmentKey, UnitQuaternion<f64>), CalibrationError> {
	let medio_lateral = options.axis_sign(key).apply(medio_lateral);
	let longitudinal = longitudinal_axis(static_trial, key, &options.up)?;

	let frame = AnatomicalFrame::build(&medio_lateral.into_inner(), &longitudinal)
		.map_err(|source| CalibrationError::Estimation {
			key,
			trial: static_trial.kind(),
			source,
		})?;

	let q = frame.to_quaternion();
	debug!("{}: calibration quaternion ({:.4}, {:.4}, {:.4}, {:.4})", key, q.w, q.i, q.j, q.k);

	Ok((key, q))
}

/// The segment's longitudinal axis in its own sensor frame: "up" brought back through the
/// mean static orientation.
fn longitudinal_axis(static_trial: &TrialData,
					 key: SegmentKey,
					 up: &Vector3<f64>) -> Result<Vector3<f64>, CalibrationError> {
	let stream = static_trial.stream(key)?;

	let mean = mean_rotation(stream.samples().iter().map(|sample| &sample.orientation))
		.ok_or_else(|| CalibrationError::Estimation {
			key,
			trial: TrialKind::Static,
			source: KinematicsError::MalformedStream("empty static stream".to_string()),
		})?;

	Ok(mean.inverse() * up)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stream(orientations: Vec<UnitQuaternion<f64>>) -> SensorStream {
		SensorStream::new(100., orientations.into_iter()
			.enumerate()
			.map(|(i, orientation)| crate::stream::OrientationSample {
				timestamp: i as f64 / 100.,
				orientation,
			})
			.collect()).unwrap()
	}

	fn swing(len: usize) -> Vec<UnitQuaternion<f64>> {
		(0..len)
			.map(|i| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), (i as f64 * 0.05).sin()))
			.collect()
	}

	#[test]
	fn hip_axis_test() {
		let thigh = SegmentKey::new(Side::Left, Segment::Thigh);
		let trial = TrialData::new(TrialKind::Hip).with_stream(thigh, stream(swing(200)));

		let axis = joint_axis(&trial, None, thigh).unwrap();
		assert_approx_eq!(axis.proximal.x.abs(), 1.0, 1e-9);
	}

	#[test]
	fn joint_axis_errors_test() {
		let thigh = SegmentKey::new(Side::Right, Segment::Thigh);
		let shank = SegmentKey::new(Side::Right, Segment::Shank);

		let trial = TrialData::new(TrialKind::Knee)
			.with_stream(thigh, stream(swing(50)))
			.with_stream(shank, stream(swing(40)));

		match joint_axis(&trial, Some(thigh), shank) {
			Err(CalibrationError::Estimation { key, trial: TrialKind::Knee, source: KinematicsError::MalformedStream(_) }) =>
				assert_eq!(key, shank),
			other => panic!("unexpected result {:?}", other),
		}

		// Both segments moving together: no relative motion
		let trial = TrialData::new(TrialKind::Knee)
			.with_stream(thigh, stream(swing(50)))
			.with_stream(shank, stream(swing(50)));

		assert_eq!(joint_axis(&trial, Some(thigh), shank).unwrap_err(), CalibrationError::Estimation {
			key: shank,
			trial: TrialKind::Knee,
			source: KinematicsError::InsufficientMotion,
		});
	}

	#[test]
	fn longitudinal_axis_test() {
		let key = SegmentKey::new(Side::Left, Segment::Foot);
		let mounting = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
		let trial = TrialData::new(TrialKind::Static).with_stream(key, stream(vec![mounting; 20]));

		let axis = longitudinal_axis(&trial, key, &Vector3::y()).unwrap();
		assert_approx_eq!(axis.x, 1.0, 1e-9);
		assert_approx_eq!(axis.y, 0.0, 1e-9);

		let empty = TrialData::new(TrialKind::Static).with_stream(key, stream(vec![]));
		assert!(longitudinal_axis(&empty, key, &Vector3::y()).is_err());
	}

	#[test]
	fn axis_sign_test() {
		let key = SegmentKey::new(Side::Left, Segment::Shank);
		assert_eq!(CalibrationOptions::default().axis_sign(key), AxisSign::Unchanged);

		let mut quaternions = BTreeMap::new();
		quaternions.insert(key, UnitQuaternion::identity());
		let options = CalibrationOptions {
			reference: Some(Arc::new(CalibrationSet::new(quaternions))),
			..CalibrationOptions::default()
		};

		let flipped = options.axis_sign(key).apply(-Vector3::x_axis());
		assert_approx_eq!(flipped.x, 1.0);
	}
}
