use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};

/// Maximum drift of a quaternion norm from 1 before it gets renormalized.
pub const NORM_TOLERANCE: f64 = 1e-9;

/// Renormalizes `q` if its norm drifted from 1 beyond `NORM_TOLERANCE`.
pub fn renormalize(q: UnitQuaternion<f64>) -> UnitQuaternion<f64> {
	let norm = q.as_ref().norm();

	if (norm - 1.0).abs() > NORM_TOLERANCE {
		UnitQuaternion::new_normalize(q.into_inner())
	} else {
		q
	}
}

/// Rotation applying `rhs` first, then `lhs`.
pub fn compose(lhs: &UnitQuaternion<f64>, rhs: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
	renormalize(lhs * rhs)
}

pub fn inverse(q: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
	renormalize(q.inverse())
}

/// Rotation vector: unit axis scaled by the rotation angle in radians.
pub fn axis_angle(q: &UnitQuaternion<f64>) -> Vector3<f64> {
	q.scaled_axis()
}

/// Averages rotations as the dominant eigenvector of the accumulated outer products
/// `sum(q q^T)` of their quaternion coordinates. This is insensitive to the sign of each
/// quaternion, unlike a component-wise average.
///
/// Returns `None` for an empty set.
pub fn mean_rotation<'a, I>(rotations: I) -> Option<UnitQuaternion<f64>>
	where I: IntoIterator<Item=&'a UnitQuaternion<f64>> {
	let mut accumulator = Matrix4::<f64>::zeros();
	let mut count = 0usize;

	for q in rotations {
		let coords = q.as_ref().coords;
		accumulator += coords * coords.transpose();
		count += 1;
	}

	if count == 0 {
		return None;
	}

	let eigen = accumulator.symmetric_eigen();
	let dominant = eigen.eigenvalues.imax();
	let coords = eigen.eigenvectors.column(dominant).into_owned();

	let mean = UnitQuaternion::new_normalize(Quaternion::from_vector(coords));

	// Same hemisphere as scalar-positive quaternions, so that a constant input comes back as is
	if mean.w < 0.0 {
		Some(UnitQuaternion::new_unchecked(-mean.into_inner()))
	} else {
		Some(mean)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::f64::consts::FRAC_PI_2;

	#[test]
	fn renormalize_test() {
		let drifted = UnitQuaternion::new_unchecked(Quaternion::new(1.001, 0.002, 0., 0.));
		let q = renormalize(drifted);
		assert_approx_eq!(q.as_ref().norm(), 1.0, 1e-12);

		let exact = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
		assert_eq!(renormalize(exact), exact);
	}

	#[test]
	fn compose_inverse_test() {
		let a = UnitQuaternion::from_euler_angles(0.3, -1.2, 2.0);
		let b = UnitQuaternion::from_euler_angles(-0.7, 0.4, 0.1);

		let mut c = a;
		for _ in 0..1000 {
			c = compose(&c, &inverse(&b));
			assert!((c.as_ref().norm() - 1.0).abs() < NORM_TOLERANCE);
		}

		let identity = compose(&a, &inverse(&a));
		assert_approx_eq!(identity.angle(), 0.0, 1e-6);
	}

	#[test]
	fn axis_angle_test() {
		let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
		let v = axis_angle(&q);
		assert_approx_eq!(v.x, 0.0);
		assert_approx_eq!(v.y, FRAC_PI_2);
		assert_approx_eq!(v.z, 0.0);
	}

	#[test]
	fn mean_rotation_sign_invariance_test() {
		let q = UnitQuaternion::from_euler_angles(0.4, 0.1, -0.3);
		let flipped = UnitQuaternion::new_unchecked(-q.into_inner());
		let samples = vec![q, flipped, q, flipped];

		let mean = mean_rotation(&samples).unwrap();
		assert_approx_eq!(mean.angle_to(&q), 0.0, 1e-6);
	}

	#[test]
	fn mean_rotation_symmetric_spread_test() {
		let axis = Vector3::z_axis();
		let samples = vec![
			UnitQuaternion::from_axis_angle(&axis, 0.5 - 0.1),
			UnitQuaternion::from_axis_angle(&axis, 0.5),
			UnitQuaternion::from_axis_angle(&axis, 0.5 + 0.1),
		];

		let mean = mean_rotation(&samples).unwrap();
		assert_approx_eq!(mean.angle_to(&samples[1]), 0.0, 1e-6);
	}

	#[test]
	fn mean_rotation_empty_test() {
		assert!(mean_rotation(&Vec::<UnitQuaternion<f64>>::new()).is_none());
	}
}
