use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

use crate::KinematicsError;

/// Below this sine of the angle between the primary and longitudinal axes, they are
/// considered parallel.
const MIN_AXES_SINE: f64 = 1e-6;

/// Orthonormal anatomical frame of a segment: X medio-lateral, Y superior-inferior,
/// Z anterior-posterior.
///
/// The rotation columns are the anatomical axes expressed in the sensor frame, i.e. it maps
/// anatomical coordinates to sensor coordinates. Its inverse maps sensor coordinates to
/// anatomical ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnatomicalFrame {
	rotation: Rotation3<f64>,
}

impl AnatomicalFrame {
	/// Builds the frame by Gram-Schmidt from a medio-lateral candidate and a longitudinal
	/// candidate: `x = ml`, `z = x × si`, `y = z × x`.
	pub fn build(primary_axis: &Vector3<f64>,
				 longitudinal_axis: &Vector3<f64>) -> Result<Self, KinematicsError> {
		let x = primary_axis
			.try_normalize(0.0)
			.ok_or(KinematicsError::DegenerateAxes)?;

		let longitudinal = longitudinal_axis
			.try_normalize(0.0)
			.ok_or(KinematicsError::DegenerateAxes)?;

		let z = x.cross(&longitudinal);
		if z.norm() < MIN_AXES_SINE {
			return Err(KinematicsError::DegenerateAxes);
		}
		let z = z.normalize();

		let y = z.cross(&x).normalize();

		let matrix = Matrix3::from_columns(&[x, y, z]);

		Ok(Self {
			rotation: Rotation3::from_matrix_unchecked(matrix),
		})
	}

	pub fn rotation(&self) -> &Rotation3<f64> {
		&self.rotation
	}

	pub fn medio_lateral(&self) -> Vector3<f64> {
		self.rotation.matrix().column(0).into_owned()
	}

	pub fn superior_inferior(&self) -> Vector3<f64> {
		self.rotation.matrix().column(1).into_owned()
	}

	pub fn anterior_posterior(&self) -> Vector3<f64> {
		self.rotation.matrix().column(2).into_owned()
	}

	/// Quaternion form, used as the segment's calibration quaternion.
	pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
		UnitQuaternion::from_rotation_matrix(&self.rotation)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn assert_orthonormal(frame: &AnatomicalFrame) {
		let m = frame.rotation().matrix();

		for i in 0..3 {
			assert_approx_eq!(m.column(i).norm(), 1.0, 1e-12);
		}
		assert_approx_eq!(m.column(0).dot(&m.column(1)), 0.0, 1e-12);
		assert_approx_eq!(m.column(1).dot(&m.column(2)), 0.0, 1e-12);
		assert_approx_eq!(m.column(0).dot(&m.column(2)), 0.0, 1e-12);
		assert_approx_eq!(m.determinant(), 1.0, 1e-12);
	}

	#[test]
	fn orthonormal_test() {
		let pairs = [
			(Vector3::new(1., 0., 0.), Vector3::new(0., 1., 0.)),
			(Vector3::new(0.9, 0.1, -0.2), Vector3::new(0.2, 1.1, 0.3)),
			(Vector3::new(-3., 0.5, 2.), Vector3::new(0., 0., -0.5)),
			(Vector3::new(0.01, 1., 0.), Vector3::new(0., 1., 0.01)),
		];

		for (primary, longitudinal) in pairs.iter() {
			let frame = AnatomicalFrame::build(primary, longitudinal).unwrap();
			assert_orthonormal(&frame);

			// X keeps the primary direction
			assert_approx_eq!(frame.medio_lateral().dot(&primary.normalize()), 1.0, 1e-12);
			// Y stays on the longitudinal side
			assert!(frame.superior_inferior().dot(longitudinal) > 0.0);
		}
	}

	#[test]
	fn identity_test() {
		let frame = AnatomicalFrame::build(&Vector3::x(), &Vector3::y()).unwrap();
		assert_approx_eq!(frame.to_quaternion().angle(), 0.0, 1e-6);
	}

	#[test]
	fn quaternion_matches_rotation_test() {
		let frame = AnatomicalFrame::build(&Vector3::new(0.3, -0.2, 0.9),
										   &Vector3::new(0.1, 1.0, 0.2)).unwrap();
		let q = frame.to_quaternion();

		let ml = q * Vector3::x();
		assert_approx_eq!(ml.dot(&frame.medio_lateral()), 1.0, 1e-9);
		let ap = q * Vector3::z();
		assert_approx_eq!(ap.dot(&frame.anterior_posterior()), 1.0, 1e-9);
	}

	#[test]
	fn degenerate_test() {
		assert_eq!(AnatomicalFrame::build(&Vector3::new(1., 0., 0.), &Vector3::new(2., 0., 0.)),
				   Err(KinematicsError::DegenerateAxes));
		assert_eq!(AnatomicalFrame::build(&Vector3::new(1., 0., 0.), &Vector3::new(-1., 1e-9, 0.)),
				   Err(KinematicsError::DegenerateAxes));
		assert_eq!(AnatomicalFrame::build(&Vector3::zeros(), &Vector3::y()),
				   Err(KinematicsError::DegenerateAxes));
		assert_eq!(AnatomicalFrame::build(&Vector3::x(), &Vector3::zeros()),
				   Err(KinematicsError::DegenerateAxes));
	}
}
