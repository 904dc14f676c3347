use calibration::{OrientationSample, SegmentKey, SensorStream, TrialData, TrialKind};
use nalgebra::{Quaternion, UnitQuaternion};
use std::collections::BTreeMap;
use std::io::BufRead;

use crate::parser::{Header, TelemetryEvent, TelemetryParser, TelemetryRow};
use crate::TelemetryError;

/// Relative disagreement between configured and measured sampling rates worth a warning.
const FS_TOLERANCE: f64 = 0.1;

/// Names of the `w, x, y, z` columns of a segment, e.g. `left_thigh_qw`.
pub fn quaternion_columns(key: SegmentKey) -> [String; 4] {
	[
		format!("{}_qw", key),
		format!("{}_qx", key),
		format!("{}_qy", key),
		format!("{}_qz", key),
	]
}

fn column_indices(header: &Header, key: SegmentKey) -> Option<[usize; 4]> {
	let [w, x, y, z] = quaternion_columns(key);

	Some([
		header.index_of(&w)?,
		header.index_of(&x)?,
		header.index_of(&y)?,
		header.index_of(&z)?,
	])
}

/// Segments whose four quaternion columns are all present in `header`.
pub fn segments(header: &Header) -> Vec<SegmentKey> {
	SegmentKey::all()
		.filter(|&key| column_indices(header, key).is_some())
		.collect()
}

/// Orientation of every segment carried by the row. Null quaternions are left out.
pub fn orientations(row: &TelemetryRow) -> BTreeMap<SegmentKey, UnitQuaternion<f64>> {
	SegmentKey::all()
		.filter_map(|key| {
			let [w, x, y, z] = column_indices(row.header(), key)?;
			let values = row.values();

			UnitQuaternion::try_new(Quaternion::new(values[w], values[x], values[y], values[z]), 0.0)
				.map(|q| (key, q))
		})
		.collect()
}

/// Accumulates the data rows of one trial.
#[derive(Debug, Default)]
pub struct TrialRecorder {
	rows: Vec<TelemetryRow>,
}

impl TrialRecorder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records every row of a recorded trial file.
	pub fn read<R: BufRead>(reader: R) -> Result<Self, TelemetryError> {
		let mut parser = TelemetryParser::offline();
		let mut recorder = Self::new();

		for line in reader.lines() {
			if let Some(TelemetryEvent::Row(row)) = parser.parse_line(&line?) {
				recorder.push(row);
			}
		}

		if parser.skipped_rows() > 0 {
			warn!("Skipped {} malformed rows", parser.skipped_rows());
		}

		Ok(recorder)
	}

	pub fn push(&mut self, row: TelemetryRow) {
		self.rows.push(row);
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// Sampling rate (Hz) from the median spacing of the millisecond timestamps.
	pub fn estimated_fs(&self) -> Option<f64> {
		let timestamps: Vec<f64> = self.rows.iter().filter_map(TelemetryRow::timestamp).collect();

		let mut spacings: Vec<f64> = timestamps.windows(2)
			.map(|pair| pair[1] - pair[0])
			.filter(|dt| dt.is_finite() && *dt > 0.0)
			.collect();

		if spacings.is_empty() {
			return None;
		}

		spacings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
		let median = spacings[spacings.len() / 2];

		Some(1000.0 / median)
	}

	/// Builds the trial from every segment present in the recorded columns. Streams are
	/// sampled at `fs`; a timestamp-based estimate that disagrees is only reported.
	pub fn build(&self, kind: TrialKind, fs: f64) -> Result<TrialData, TelemetryError> {
		let header = self.rows.first()
			.map(|row| row.header().clone())
			.ok_or(TelemetryError::NoRows(kind))?;

		if let Some(estimated) = self.estimated_fs() {
			if (estimated - fs).abs() > FS_TOLERANCE * fs {
				warn!("{} trial: timestamps suggest {:.1} Hz, using configured {:.1} Hz", kind, estimated, fs);
			}
		}

		let keys = segments(&header);
		if keys.is_empty() {
			return Err(TelemetryError::NoSegments(kind));
		}

		keys.into_iter().try_fold(TrialData::new(kind), |trial, key| {
			let stream = self.stream(key, fs)?;
			debug!("{} trial: {} samples for {}", kind, stream.len(), key);

			Ok(trial.with_stream(key, stream))
		})
	}

	fn stream(&self, key: SegmentKey, fs: f64) -> Result<SensorStream, TelemetryError> {
		let samples = self.rows.iter()
			.enumerate()
			.map(|(i, row)| {
				let [w, x, y, z] = column_indices(row.header(), key)
					.ok_or_else(|| TelemetryError::MissingColumn(quaternion_columns(key)[0].clone()))?;
				let values = row.values();

				let orientation = UnitQuaternion::try_new(Quaternion::new(values[w], values[x], values[y], values[z]), 0.0)
					.ok_or(TelemetryError::NullQuaternion { key, row: i })?;

				Ok(OrientationSample {
					timestamp: i as f64 / fs,
					orientation,
				})
			})
			.collect::<Result<Vec<_>, TelemetryError>>()?;

		Ok(SensorStream::new(fs, samples)?)
	}
}
