use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::ParseKeyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
	Left,
	Right,
}

impl Side {
	pub const ALL: [Side; 2] = [Side::Left, Side::Right];

	pub fn name(self) -> &'static str {
		match self {
			Side::Left => "left",
			Side::Right => "right",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
	Thigh,
	Shank,
	Foot,
}

impl Segment {
	/// Proximal to distal.
	pub const ALL: [Segment; 3] = [Segment::Thigh, Segment::Shank, Segment::Foot];

	pub fn name(self) -> &'static str {
		match self {
			Segment::Thigh => "thigh",
			Segment::Shank => "shank",
			Segment::Foot => "foot",
		}
	}
}

/// Body segment on one side, e.g. the left thigh. Displayed as `left_thigh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SegmentKey {
	pub side: Side,
	pub segment: Segment,
}

impl SegmentKey {
	pub const fn new(side: Side, segment: Segment) -> Self {
		Self { side, segment }
	}

	/// Every segment of both sides, left side first.
	pub fn all() -> impl Iterator<Item=SegmentKey> {
		Side::ALL.iter()
			.flat_map(|&side| Segment::ALL.iter().map(move |&segment| SegmentKey::new(side, segment)))
	}
}

impl Display for SegmentKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}_{}", self.side.name(), self.segment.name())
	}
}

impl FromStr for SegmentKey {
	type Err = ParseKeyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (side, segment) = s
			.split_once('_')
			.ok_or_else(|| ParseKeyError(s.to_string()))?;

		let side = match side {
			"left" => Side::Left,
			"right" => Side::Right,
			_ => return Err(ParseKeyError(s.to_string())),
		};

		let segment = match segment {
			"thigh" => Segment::Thigh,
			"shank" | "shin" => Segment::Shank,
			"foot" => Segment::Foot,
			_ => return Err(ParseKeyError(s.to_string())),
		};

		Ok(SegmentKey::new(side, segment))
	}
}

impl From<SegmentKey> for String {
	fn from(key: SegmentKey) -> Self {
		key.to_string()
	}
}

impl TryFrom<String> for SegmentKey {
	type Error = ParseKeyError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

/// Recording protocol a stream was captured under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialKind {
	Static,
	Hip,
	Knee,
	Ankle,
}

impl Display for TrialKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			TrialKind::Static => "static",
			TrialKind::Hip => "hip",
			TrialKind::Knee => "knee",
			TrialKind::Ankle => "ankle",
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_names_test() {
		let names: Vec<String> = SegmentKey::all().map(|key| key.to_string()).collect();
		assert_eq!(names, vec![
			"left_thigh", "left_shank", "left_foot",
			"right_thigh", "right_shank", "right_foot",
		]);

		for key in SegmentKey::all() {
			assert_eq!(key.to_string().parse::<SegmentKey>().unwrap(), key);
		}
	}

	#[test]
	fn key_parse_error_test() {
		assert!("left".parse::<SegmentKey>().is_err());
		assert!("middle_thigh".parse::<SegmentKey>().is_err());
		assert!("left_arm".parse::<SegmentKey>().is_err());
		assert_eq!("right_shin".parse::<SegmentKey>().unwrap(),
				   SegmentKey::new(Side::Right, Segment::Shank));
	}
}
