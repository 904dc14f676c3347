use nalgebra::{UnitQuaternion, Vector3};

/// Below this distance from ±1 of `sin(abduction)`, the decomposition is in gimbal lock.
const GIMBAL_LOCK_EPSILON: f64 = 1e-9;

/// Clinical angles in radians, intrinsic X-Y-Z sequence of the anatomical frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct JointAngles {
	/// Flexion (+) / extension about the medio-lateral axis X.
	pub flexion_extension: f64,
	/// Abduction / adduction about the floating Y axis.
	pub abduction_adduction: f64,
	/// Internal / external rotation about the longitudinal Z axis.
	pub internal_external: f64,
}

impl JointAngles {
	/// Decomposes `q = Rx(flexion) * Ry(abduction) * Rz(rotation)`.
	pub fn from_quaternion(q: &UnitQuaternion<f64>) -> Self {
		let r = q.to_rotation_matrix();
		let m = r.matrix();

		let sin_b = m[(0, 2)].max(-1.0).min(1.0);
		let abduction_adduction = sin_b.asin();

		let (flexion_extension, internal_external) = if 1.0 - sin_b.abs() > GIMBAL_LOCK_EPSILON {
			(
				(-m[(1, 2)]).atan2(m[(2, 2)]),
				(-m[(0, 1)]).atan2(m[(0, 0)]),
			)
		} else {
			// Only the sum (or difference) of X and Z is observable, attributed to X
			(m[(2, 1)].atan2(m[(1, 1)]), 0.0)
		};

		Self {
			flexion_extension,
			abduction_adduction,
			internal_external,
		}
	}

	pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
		UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.flexion_extension)
			* UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.abduction_adduction)
			* UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.internal_external)
	}

	pub fn to_degrees(&self) -> [f64; 3] {
		[
			self.flexion_extension.to_degrees(),
			self.abduction_adduction.to_degrees(),
			self.internal_external.to_degrees(),
		]
	}
}
