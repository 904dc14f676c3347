use std::error::Error;
use std::io::BufRead;
use std::time::Duration;
use telemetry::{recorder, TelemetryEvent, TelemetryParser};

use crate::input::{DeviceStatus, Input};
use crate::traits::InputController;

/// Reads telemetry lines from a device stream or a recorded file.
pub struct TelemetryInputController {
	reader: Box<dyn BufRead + Send>,
	parser: TelemetryParser,
	end_of_input: bool,
}

impl TelemetryInputController {
	/// Live device output, starting with the calibration handshake.
	pub fn live(reader: Box<dyn BufRead + Send>) -> Self {
		Self::new(reader, TelemetryParser::new())
	}

	/// Recorded trial, starting directly with the header.
	pub fn offline(reader: Box<dyn BufRead + Send>) -> Self {
		Self::new(reader, TelemetryParser::offline())
	}

	fn new(reader: Box<dyn BufRead + Send>, parser: TelemetryParser) -> Self {
		Self {
			reader,
			parser,
			end_of_input: false,
		}
	}

	fn input(event: TelemetryEvent) -> Option<Input> {
		match event {
			TelemetryEvent::DeviceCalibrating => Some(Input::DeviceStatus(DeviceStatus::Calibrating)),
			TelemetryEvent::DeviceCalibrated => Some(Input::DeviceStatus(DeviceStatus::Calibrated)),
			TelemetryEvent::StreamStarted => Some(Input::DeviceStatus(DeviceStatus::Streaming)),
			TelemetryEvent::Header(header) => {
				let segments: Vec<String> = recorder::segments(&header).iter().map(|key| key.to_string()).collect();
				info!("Telemetry segments: {}", segments.join(", "));
				None
			}
			TelemetryEvent::Row(row) => Some(Input::Orientations((recorder::orientations(&row), row.timestamp()))),
		}
	}
}

impl InputController for TelemetryInputController {
	const DELAY: Option<Duration> = None;

	fn read_input(&mut self) -> Result<Option<Input>, Box<dyn Error>> {
		loop {
			while let Some(event) = self.parser.try_parse() {
				if let Some(input) = Self::input(event) {
					return Ok(Some(input));
				}
			}

			if self.end_of_input {
				if self.parser.skipped_rows() > 0 {
					warn!("Skipped {} malformed telemetry rows", self.parser.skipped_rows());
				}
				return Ok(None);
			}

			let consumed = match self.reader.fill_buf() {
				Ok(bytes) if bytes.is_empty() => {
					// Terminates a last line without newline
					self.parser.push_bytes(b"\n");
					self.end_of_input = true;
					0
				}
				Ok(bytes) => {
					self.parser.push_bytes(bytes);
					bytes.len()
				}
				Err(e) => {
					self.end_of_input = true;
					return Err(e.into());
				}
			};

			self.reader.consume(consumed);
		}
	}
}
