#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

#[macro_use]
extern crate log;

pub use crate::anatomical_frame::AnatomicalFrame;
pub use crate::euler::JointAngles;
pub use crate::functional_axis::{AxisSign, FunctionalAxis};
pub use crate::relative_motion::RelativeMotion;
pub use crate::rotation::{axis_angle, compose, inverse, mean_rotation, renormalize};

use nalgebra::{Unit, Vector3};
use thiserror::Error;

pub mod anatomical_frame;
pub mod euler;
pub mod functional_axis;
pub mod relative_motion;
pub mod rotation;

/// Unit rotation axis. The frame it is expressed in is carried by the field holding it.
pub type Axis = Unit<Vector3<f64>>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinematicsError {
	#[error("insufficient data: {velocity_samples} angular velocity samples, at least 2 required")]
	InsufficientData { velocity_samples: usize },
	#[error("degenerate axes: primary and longitudinal axes are (near-)parallel")]
	DegenerateAxes,
	#[error("malformed stream: {0}")]
	MalformedStream(String),
	#[error("insufficient motion: angular velocity has no dominant direction")]
	InsufficientMotion,
}
