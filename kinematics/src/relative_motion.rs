use nalgebra::{UnitQuaternion, Vector3};

use crate::rotation::{axis_angle, compose, inverse, mean_rotation};
use crate::KinematicsError;

/// Minimum number of angular velocity samples needed to estimate a covariance.
pub const MIN_VELOCITY_SAMPLES: usize = 2;

/// Relative rotation between two time-aligned segment orientation streams, and the angular
/// velocity of that rotation.
#[derive(Debug, Clone)]
pub struct RelativeMotion {
	rotations: Vec<UnitQuaternion<f64>>,
	angular_velocities: Vec<Vector3<f64>>,
	mean_rotation: UnitQuaternion<f64>,
}

fn is_finite(q: &UnitQuaternion<f64>) -> bool {
	q.as_ref().coords.iter().all(|c| c.is_finite())
}

impl RelativeMotion {
	/// `rel[i] = distal[i] * proximal[i]^-1`, and angular velocities
	/// `w[i] = axis_angle(rel[i]^-1 * rel[i+1]) * fs` over consecutive pairs only, so that the
	/// sequence boundary does not produce a spurious jump. Velocities are expressed in the
	/// proximal sensor frame (first-order approximation).
	pub fn estimate(proximal: &[UnitQuaternion<f64>],
					distal: &[UnitQuaternion<f64>],
					fs: f64) -> Result<Self, KinematicsError> {
		if proximal.len() != distal.len() {
			return Err(KinematicsError::MalformedStream(format!(
				"proximal and distal lengths differ ({} vs {})", proximal.len(), distal.len())));
		}

		if !(fs.is_finite() && fs > 0.0) {
			return Err(KinematicsError::MalformedStream(format!("invalid sampling rate {}", fs)));
		}

		let velocity_samples = proximal.len().saturating_sub(1);
		if velocity_samples < MIN_VELOCITY_SAMPLES {
			return Err(KinematicsError::InsufficientData { velocity_samples });
		}

		if let Some(i) = proximal.iter().zip(distal.iter()).position(|(p, d)| !(is_finite(p) && is_finite(d))) {
			return Err(KinematicsError::MalformedStream(format!("non-finite orientation at sample {}", i)));
		}

		let rotations: Vec<UnitQuaternion<f64>> = proximal.iter()
			.zip(distal.iter())
			.map(|(p, d)| compose(d, &inverse(p)))
			.collect();

		let angular_velocities = rotations.windows(2)
			.map(|pair| axis_angle(&compose(&inverse(&pair[0]), &pair[1])) * fs)
			.collect();

		let mean_rotation = mean_rotation(&rotations)
			.ok_or_else(|| KinematicsError::MalformedStream("no relative rotation".to_string()))?;

		trace!("Relative motion over {} samples at {} Hz", rotations.len(), fs);

		Ok(Self {
			rotations,
			angular_velocities,
			mean_rotation,
		})
	}

	pub fn rotations(&self) -> &[UnitQuaternion<f64>] {
		&self.rotations
	}

	/// `N - 1` angular velocity vectors in rad/s.
	pub fn angular_velocities(&self) -> &[Vector3<f64>] {
		&self.angular_velocities
	}

	/// Mean relative rotation over the trial, by rotation averaging.
	pub fn mean_rotation(&self) -> &UnitQuaternion<f64> {
		&self.mean_rotation
	}
}
