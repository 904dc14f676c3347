use anyhow::Context;
use calibration::CalibrationSet;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_PATH: &str = "gait.json";

/// Recorded calibration trials, as tab-separated telemetry files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrialPaths {
	pub static_trial: PathBuf,
	pub hip: PathBuf,
	pub knee: PathBuf,
	pub ankle: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GaitConfig {
	pub log_level_filter: String,
	/// Sensor sampling rate in Hz.
	pub sampling_rate: f64,
	/// Global "up" direction during the static trial.
	pub up_vector: [f64; 3],
	pub trials: TrialPaths,
	/// Last calibration, written back after each calibration session.
	pub calibration: Option<CalibrationSet>,
}

pub trait TryIntoLevelFilter {
	fn try_into_level_filter(&self) -> Result<LevelFilter, ()>;
}

impl TryIntoLevelFilter for String {
	fn try_into_level_filter(&self) -> Result<LevelFilter, ()> {
		Ok(match self.as_str() {
			"none" => LevelFilter::Off,
			"error" => LevelFilter::Error,
			"warn" => LevelFilter::Warn,
			"info" => LevelFilter::Info,
			"debug" => LevelFilter::Debug,
			"all" => LevelFilter::Trace,
			_ => return Err(()),
		})
	}
}

impl Default for GaitConfig {
	fn default() -> Self {
		GaitConfig {
			log_level_filter: String::from("info"),
			sampling_rate: 100.,
			up_vector: [0., 1., 0.],
			trials: TrialPaths {
				static_trial: PathBuf::from("trials/static.tsv"),
				hip: PathBuf::from("trials/hip.tsv"),
				knee: PathBuf::from("trials/knee.tsv"),
				ankle: PathBuf::from("trials/ankle.tsv"),
			},
			calibration: None,
		}
	}
}

pub fn read(path: &Path) -> anyhow::Result<GaitConfig> {
	let config_file = File::open(path)
		.with_context(|| format!("Failed to open {}", path.display()))?;

	let config: GaitConfig = serde_json::from_reader(config_file)
		.with_context(|| format!("Failed to parse {}", path.display()))?;

	Ok(config)
}

pub fn save(path: &Path, config: &GaitConfig) -> anyhow::Result<()> {
	let mut config_file = OpenOptions::new()
		.create(true)
		.write(true)
		.truncate(true)
		.open(path)?;

	write!(config_file, "{}", serde_json::to_string_pretty(config)?)?;

	Ok(())
}
