use nalgebra::{Matrix3, Unit, UnitQuaternion, Vector3};

use crate::relative_motion::{RelativeMotion, MIN_VELOCITY_SAMPLES};
use crate::{Axis, KinematicsError};

/// Below this dominant variance the trial is considered motionless. Angular velocities are
/// in rad/s whatever the sampling rate, so this is an RMS of 1e-6 rad/s about the axis.
/// Round-off in the velocities grows with `fs` but stays orders of magnitude below.
pub const MIN_DOMINANT_VARIANCE: f64 = 1e-12;

/// Sign policy for an estimated axis. Covariance eigenvectors have no canonical sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisSign {
	/// Keep whatever sign the eigen-decomposition returned.
	Unchanged,
	/// Flip the axis when its dot product with the reference is negative.
	AlignWith(Vector3<f64>),
}

impl Default for AxisSign {
	fn default() -> Self {
		AxisSign::Unchanged
	}
}

impl AxisSign {
	pub fn apply(&self, axis: Axis) -> Axis {
		match self {
			AxisSign::AlignWith(reference) if axis.dot(reference) < 0.0 => -axis,
			_ => axis,
		}
	}
}

/// Principal rotation axis of a hinge-like motion, expressed in both adjacent sensor frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionalAxis {
	/// Axis in the proximal sensor frame.
	pub proximal: Axis,
	/// Same physical axis in the distal sensor frame.
	pub distal: Axis,
	/// Largest eigenvalue of the angular velocity covariance.
	pub dominant_variance: f64,
}

impl FunctionalAxis {
	pub fn estimate(motion: &RelativeMotion) -> Result<Self, KinematicsError> {
		Self::from_angular_velocities(motion.angular_velocities(), motion.mean_rotation())
	}

	/// The dominant covariance direction of the angular velocities gives the proximal axis;
	/// rotating it by the mean relative rotation gives the distal one.
	pub fn from_angular_velocities(angular_velocities: &[Vector3<f64>],
								   mean_rotation: &UnitQuaternion<f64>) -> Result<Self, KinematicsError> {
		let covariance = covariance(angular_velocities)?;

		if !covariance.iter().all(|c| c.is_finite()) {
			return Err(KinematicsError::MalformedStream("non-finite angular velocity".to_string()));
		}

		if !mean_rotation.as_ref().coords.iter().all(|c| c.is_finite()) {
			return Err(KinematicsError::MalformedStream("non-finite mean rotation".to_string()));
		}

		let eigen = covariance.symmetric_eigen();
		let dominant = eigen.eigenvalues.imax();
		let dominant_variance = eigen.eigenvalues[dominant];

		if !(dominant_variance > MIN_DOMINANT_VARIANCE) {
			return Err(KinematicsError::InsufficientMotion);
		}

		let proximal = Unit::new_normalize(eigen.eigenvectors.column(dominant).into_owned());
		let distal = Unit::new_normalize(mean_rotation * proximal.into_inner());

		debug!("Functional axis: proximal ({:.4}, {:.4}, {:.4}), distal ({:.4}, {:.4}, {:.4}), variance {:.4}",
			   proximal.x, proximal.y, proximal.z,
			   distal.x, distal.y, distal.z,
			   dominant_variance);

		Ok(Self {
			proximal,
			distal,
			dominant_variance,
		})
	}
}

/// Sample covariance (normalized by `n - 1`) of a set of 3D observations.
pub fn covariance(observations: &[Vector3<f64>]) -> Result<Matrix3<f64>, KinematicsError> {
	let n = observations.len();
	if n < MIN_VELOCITY_SAMPLES {
		return Err(KinematicsError::InsufficientData { velocity_samples: n });
	}

	let mean = observations.iter()
		.fold(Vector3::zeros(), |sum, v| sum + v) / n as f64;

	let scatter = observations.iter()
		.fold(Matrix3::zeros(), |sum, v| {
			let centered = v - mean;
			sum + centered * centered.transpose()
		});

	Ok(scatter / (n - 1) as f64)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn covariance_test() {
		let observations = vec![
			Vector3::new(1., 0., 0.),
			Vector3::new(-1., 0., 0.),
			Vector3::new(0., 2., 0.),
			Vector3::new(0., -2., 0.),
		];

		let c = covariance(&observations).unwrap();
		assert_approx_eq!(c[(0, 0)], 2. / 3.);
		assert_approx_eq!(c[(1, 1)], 8. / 3.);
		assert_approx_eq!(c[(2, 2)], 0.);
		assert_approx_eq!(c[(0, 1)], 0.);
	}

	#[test]
	fn dominant_direction_test() {
		let direction = Vector3::new(1., 2., -2.).normalize();
		let velocities: Vec<Vector3<f64>> = (0..50)
			.map(|i| direction * (i as f64 * 0.1).sin() * 3.
				+ Vector3::new(0.001, -0.002, 0.001) * ((i % 3) as f64))
			.collect();

		let axis = FunctionalAxis::from_angular_velocities(&velocities, &UnitQuaternion::identity())
			.unwrap();

		assert_approx_eq!(axis.proximal.dot(&direction).abs(), 1.0, 1e-4);
		assert_approx_eq!(axis.distal.dot(&axis.proximal), 1.0, 1e-12);
	}

	#[test]
	fn distal_axis_is_rotated_test() {
		let velocities: Vec<Vector3<f64>> = (0..20)
			.map(|i| Vector3::z() * i as f64)
			.collect();
		let mean = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::FRAC_PI_2);

		let axis = FunctionalAxis::from_angular_velocities(&velocities, &mean).unwrap();

		// z rotated by +90° about x is -y
		let expected = -axis.proximal.z.signum() * Vector3::y();
		assert_approx_eq!(axis.distal.dot(&expected), 1.0, 1e-9);
	}

	#[test]
	fn motionless_test() {
		let velocities = vec![Vector3::new(0.5, 0., 0.); 10];

		assert_eq!(FunctionalAxis::from_angular_velocities(&velocities, &UnitQuaternion::identity()),
				   Err(KinematicsError::InsufficientMotion));
	}

	#[test]
	fn non_finite_test() {
		let mut velocities = vec![Vector3::new(0.5, 0., 0.), Vector3::new(-0.5, 0., 0.), Vector3::new(0.2, 0., 0.)];

		let nan_mean = UnitQuaternion::new_unchecked(nalgebra::Quaternion::new(f64::NAN, 0., 0., 0.));
		assert!(matches!(FunctionalAxis::from_angular_velocities(&velocities, &nan_mean),
						 Err(KinematicsError::MalformedStream(_))));

		velocities[1].y = f64::INFINITY;
		assert!(matches!(FunctionalAxis::from_angular_velocities(&velocities, &UnitQuaternion::identity()),
						 Err(KinematicsError::MalformedStream(_))));
	}

	#[test]
	fn slow_hinge_test() {
		// One degree of amplitude over a ten second period
		for &fs in &[50., 100., 1000.] {
			let n = (10. * fs) as usize;
			let proximal = vec![UnitQuaternion::identity(); n];
			let distal: Vec<UnitQuaternion<f64>> = (0..n)
				.map(|i| {
					let t = i as f64 / fs;
					UnitQuaternion::from_axis_angle(&Vector3::z_axis(),
													1f64.to_radians() * (2. * std::f64::consts::PI * t / 10.).sin())
				})
				.collect();

			let motion = RelativeMotion::estimate(&proximal, &distal, fs).unwrap();
			let axis = FunctionalAxis::estimate(&motion).unwrap();

			assert!(axis.dominant_variance > 1e6 * MIN_DOMINANT_VARIANCE);
			assert_approx_eq!(axis.proximal.z.abs(), 1.0, 1e-9);
		}
	}

	#[test]
	fn single_sample_test() {
		let velocities = vec![Vector3::new(0.5, 0., 0.)];

		assert_eq!(FunctionalAxis::from_angular_velocities(&velocities, &UnitQuaternion::identity()),
				   Err(KinematicsError::InsufficientData { velocity_samples: 1 }));
	}

	#[test]
	fn axis_sign_test() {
		let axis = Vector3::x_axis();

		assert_eq!(AxisSign::Unchanged.apply(-axis), -axis);
		assert_eq!(AxisSign::AlignWith(Vector3::new(1., 1., 0.)).apply(-axis), axis);
		assert_eq!(AxisSign::AlignWith(Vector3::new(1., 1., 0.)).apply(axis), axis);
	}
}
