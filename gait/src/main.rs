#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

#[macro_use]
extern crate anyhow;

#[macro_use]
extern crate log;

use calibration::CalibrationStore;
use crossbeam_channel::unbounded;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::thread::JoinHandle;

use crate::gait::{AngleDispatcher, CalibrationEstimator, GaitCollector, JointAngleFrame, SegmentFrame};
use crate::gait_config::TryIntoLevelFilter;
use crate::input::Input;
use crate::input_controllers::telemetry_input_controller::TelemetryInputController;
use crate::traits::{Collector, Dispatcher, Estimator, InputController};

use black_box::BlackBox;

mod gait;
mod gait_config;
mod input;
mod input_controllers;
mod session;
mod traits;

fn join(handle: JoinHandle<()>, name: &str) -> anyhow::Result<()> {
	handle.join().map_err(|_| anyhow!("{} thread panicked", name))
}

fn main() -> anyhow::Result<()> {
	// Command line arguments
	const CONFIG_ARG: &str = "config";
	const CALIBRATE_ARG: &str = "calibrate";
	const INPUT_ARG: &str = "input";

	let args = clap::Command::new("Gait")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Vincent Leporcher <vincent.leporcher@telecom-paris.fr>")
		.about("Joint angles from body-worn orientation sensors")
		.arg(clap::Arg::new(CONFIG_ARG)
			.long("config")
			.help("Configuration file")
			.takes_value(true)
			.default_value(gait_config::CONFIG_FILE_PATH))
		.arg(clap::Arg::new(CALIBRATE_ARG)
			.long("calibrate")
			.help("Run a calibration session from the configured trials")
			.takes_value(false))
		.arg(clap::Arg::new(INPUT_ARG)
			.long("input")
			.help("Recorded telemetry file (live device output on stdin otherwise)")
			.takes_value(true))
		.get_matches();

	// Configuration
	let config_path = PathBuf::from(args.value_of(CONFIG_ARG).unwrap_or(gait_config::CONFIG_FILE_PATH));
	let mut config = gait_config::read(&config_path)?;

	// Log
	let level_filter = config.log_level_filter
		.try_into_level_filter()
		.map_err(|_| anyhow!("Failed to parse log level filter"))?;

	let calibrate = args.is_present(CALIBRATE_ARG);
	let calibration_state = match &config.calibration {
		Some(set) if set.is_complete() => "complete".to_string(),
		Some(set) => format!("partial ({} segments)", set.len()),
		None => "none".to_string(),
	};

	let mut black_box = BlackBox::new(if calibrate { "calibration" } else { "runtime" })?;
	black_box.write_header(vec![
		("config", config_path.display().to_string()),
		("input", args.value_of(INPUT_ARG).unwrap_or("stdin").to_string()),
		("sampling_rate", format!("{} Hz", config.sampling_rate)),
		("up_vector", format!("{:?}", config.up_vector)),
		("calibration", calibration_state),
	])?;
	black_box.spawn(level_filter)?;

	info!("Gait {}", env!("CARGO_PKG_VERSION"));

	let store = CalibrationStore::new(config.calibration.clone().unwrap_or_default());

	// Runs alongside the pipeline, which keeps the previous calibration until publication
	let calibration_session = if calibrate {
		let config = config.clone();
		let store = store.clone();

		Some(std::thread::spawn(move || session::run(&config, &store)))
	} else {
		if config.calibration.is_none() {
			warn!("No calibration available, run with --calibrate");
		}
		None
	};

	// Dispatcher
	let (angle_frame_sender,
		angle_frame_receiver) = unbounded::<JointAngleFrame>();

	let dispatcher = AngleDispatcher::new(std::io::stdout())
		.spawn(angle_frame_receiver);

	// Estimator
	let (segment_frame_sender,
		segment_frame_receiver) = unbounded::<SegmentFrame>();

	let estimator = CalibrationEstimator::new(store.clone())
		.spawn(segment_frame_receiver, angle_frame_sender);

	// Collector
	let (input_sender, input_receiver) = unbounded::<Input>();

	let collector = GaitCollector::new()
		.spawn(input_receiver, segment_frame_sender);

	// Input controller
	let input_controller = match args.value_of(INPUT_ARG) {
		Some(path) => {
			info!("Reading telemetry from {}", path);
			let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(File::open(path)?));
			TelemetryInputController::offline(reader)
		}
		None => {
			info!("Reading telemetry from stdin");
			TelemetryInputController::live(Box::new(BufReader::new(std::io::stdin())))
		}
	};

	let input_controller = input_controller.spawn(input_sender);

	join(input_controller, "Input controller")?;
	join(collector, "Collector")?;
	join(estimator, "Estimator")?;
	join(dispatcher, "Dispatcher")?;

	if let Some(session) = calibration_session {
		let calibration = session.join()
			.map_err(|_| anyhow!("Calibration thread panicked"))??;

		config.calibration = Some(calibration);
		gait_config::save(&config_path, &config)?;

		info!("Calibration saved to {}", config_path.display());
	}

	log::logger().flush();
	std::thread::sleep(std::time::Duration::from_millis(100));

	Ok(())
}
