use std::sync::Arc;

use crate::TelemetryError;

pub const CALIBRATING_PREFIX: &str = "Calibrating";
pub const CALIBRATION_DONE: &str = "===CALIBRATION_DONE===";
pub const START: &str = "===START===";
pub const TIMESTAMP_COLUMN: &str = "timestamp";

const SEPARATOR: char = '\t';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
	/// Handshake in progress, data lines are ignored.
	AwaitingStart,
	Streaming,
}

/// Column names of the data rows that follow, `timestamp` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
	columns: Vec<String>,
}

impl Header {
	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	pub fn len(&self) -> usize {
		self.columns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.columns.is_empty()
	}

	pub fn index_of(&self, column: &str) -> Option<usize> {
		self.columns.iter().position(|c| c == column)
	}
}

/// One data row, sharing the header it was parsed with.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRow {
	header: Arc<Header>,
	values: Vec<f64>,
}

impl TelemetryRow {
	pub fn header(&self) -> &Arc<Header> {
		&self.header
	}

	pub fn values(&self) -> &[f64] {
		&self.values
	}

	pub fn get(&self, column: &str) -> Option<f64> {
		self.header.index_of(column).map(|i| self.values[i])
	}

	/// Timestamp in milliseconds, as sent by the device.
	pub fn timestamp(&self) -> Option<f64> {
		self.get(TIMESTAMP_COLUMN)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
	DeviceCalibrating,
	DeviceCalibrated,
	StreamStarted,
	Header(Arc<Header>),
	Row(TelemetryRow),
}

/// Line-oriented parser of the device telemetry. Bytes may be pushed in arbitrary chunks;
/// events come out one complete line at a time.
#[derive(Debug)]
pub struct TelemetryParser {
	state: ParserState,
	header: Option<Arc<Header>>,
	buffer: Vec<u8>,
	skipped_rows: usize,
}

impl TelemetryParser {
	/// Parser for a live device, waiting for the start marker.
	pub fn new() -> Self {
		Self::with_state(ParserState::AwaitingStart)
	}

	/// Parser for recorded files, which start directly with the header.
	pub fn offline() -> Self {
		Self::with_state(ParserState::Streaming)
	}

	fn with_state(state: ParserState) -> Self {
		Self {
			state,
			header: None,
			buffer: Vec::new(),
			skipped_rows: 0,
		}
	}

	pub fn state(&self) -> ParserState {
		self.state
	}

	pub fn header(&self) -> Option<&Arc<Header>> {
		self.header.as_ref()
	}

	/// Data rows dropped so far for a wrong number of fields or a non-numeric field.
	pub fn skipped_rows(&self) -> usize {
		self.skipped_rows
	}

	pub fn push_bytes(&mut self, bytes: &[u8]) {
		self.buffer.extend_from_slice(bytes);
	}

	/// Consumes buffered lines until one produces an event. Returns `None` once no complete
	/// line is left.
	pub fn try_parse(&mut self) -> Option<TelemetryEvent> {
		while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
			let raw: Vec<u8> = self.buffer.drain(..=end).collect();
			let line = String::from_utf8_lossy(&raw);

			if let Some(event) = self.parse_line(&line) {
				return Some(event);
			}
		}

		None
	}

	pub fn parse_line(&mut self, line: &str) -> Option<TelemetryEvent> {
		let line = line.trim();

		if line.starts_with(CALIBRATING_PREFIX) {
			return Some(TelemetryEvent::DeviceCalibrating);
		}

		match line {
			CALIBRATION_DONE => return Some(TelemetryEvent::DeviceCalibrated),
			START => {
				self.state = ParserState::Streaming;
				return Some(TelemetryEvent::StreamStarted);
			}
			_ => {}
		}

		if self.state == ParserState::AwaitingStart || line.is_empty() {
			return None;
		}

		if line.split(SEPARATOR).next() == Some(TIMESTAMP_COLUMN) {
			let header = Arc::new(Header {
				columns: line.split(SEPARATOR).map(|c| c.trim().to_string()).collect(),
			});
			debug!("Telemetry header: {:?}", header.columns());

			self.header = Some(header.clone());
			return Some(TelemetryEvent::Header(header));
		}

		let header = self.header.clone()?;

		match parse_row(&header, line) {
			Ok(values) => Some(TelemetryEvent::Row(TelemetryRow { header, values })),
			Err(e) => {
				self.skipped_rows += 1;
				trace!("Skipping telemetry row: {}", e);
				None
			}
		}
	}
}

impl Default for TelemetryParser {
	fn default() -> Self {
		Self::new()
	}
}

fn parse_row(header: &Header, line: &str) -> Result<Vec<f64>, TelemetryError> {
	let fields: Vec<&str> = line.split(SEPARATOR).collect();

	if fields.len() != header.len() {
		return Err(TelemetryError::Arity {
			expected: header.len(),
			found: fields.len(),
		});
	}

	fields.iter()
		.zip(header.columns())
		.map(|(field, column)| {
			let value = field.trim().parse::<f64>().map_err(|_| TelemetryError::NonNumeric {
				column: column.clone(),
				value: field.to_string(),
			})?;

			// `inf` and `NaN` parse, but would end up in quaternions
			if !value.is_finite() {
				return Err(TelemetryError::NonFinite {
					column: column.clone(),
					value: field.to_string(),
				});
			}

			Ok(value)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn events(parser: &mut TelemetryParser, input: &str) -> Vec<TelemetryEvent> {
		parser.push_bytes(input.as_bytes());
		std::iter::from_fn(|| parser.try_parse()).collect()
	}

	#[test]
	fn handshake_test() {
		let mut parser = TelemetryParser::new();

		let events = events(&mut parser, "Calibrating gyro...\n\
			timestamp\tx\n\
			10\t1\n\
			===CALIBRATION_DONE===\n\
			===START===\n\
			timestamp\tx\n\
			20\t2.5\n");

		assert_eq!(events.len(), 5);
		assert_eq!(events[0], TelemetryEvent::DeviceCalibrating);
		assert_eq!(events[1], TelemetryEvent::DeviceCalibrated);
		assert_eq!(events[2], TelemetryEvent::StreamStarted);
		assert_eq!(parser.state(), ParserState::Streaming);

		match &events[4] {
			TelemetryEvent::Row(row) => {
				assert_eq!(row.timestamp(), Some(20.));
				assert_eq!(row.get("x"), Some(2.5));
				assert_eq!(row.get("y"), None);
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn malformed_rows_test() {
		let mut parser = TelemetryParser::offline();

		let events = events(&mut parser, "1\t2\n\
			timestamp\ta\tb\n\
			1\t2\n\
			1\t2\t3\t4\n\
			1\tnan?\t3\n\
			\n\
			2\t0.5\t-1e-3\n");

		// Header and the last row; the row before the header is not counted
		assert_eq!(events.len(), 2);
		assert_eq!(parser.skipped_rows(), 3);

		match &events[1] {
			TelemetryEvent::Row(row) => assert_eq!(row.values(), &[2., 0.5, -1e-3]),
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn non_finite_rows_test() {
		let mut parser = TelemetryParser::offline();

		let events = events(&mut parser, "timestamp\tleft_thigh_qw\n\
			10\tinf\n\
			20\tNaN\n\
			30\t-infinity\n\
			40\t1\n");

		assert_eq!(events.len(), 2);
		assert_eq!(parser.skipped_rows(), 3);

		let header = Header {
			columns: vec!["timestamp".to_string(), "q".to_string()],
		};
		assert!(matches!(parse_row(&header, "10\tinf"),
						 Err(TelemetryError::NonFinite { ref column, .. }) if column == "q"));
	}

	#[test]
	fn split_chunks_test() {
		let mut parser = TelemetryParser::offline();

		parser.push_bytes(b"timestamp\tv\r\n3\t");
		assert!(matches!(parser.try_parse(), Some(TelemetryEvent::Header(_))));
		assert_eq!(parser.try_parse(), None);

		parser.push_bytes(b"4\r\n");
		match parser.try_parse() {
			Some(TelemetryEvent::Row(row)) => assert_eq!(row.get("v"), Some(4.)),
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn header_redefinition_test() {
		let mut parser = TelemetryParser::offline();

		events(&mut parser, "timestamp\ta\n");
		events(&mut parser, "timestamp\ta\tb\n");

		assert_eq!(parser.header().unwrap().len(), 3);
		assert_eq!(parser.header().unwrap().index_of("b"), Some(2));
	}
}
