use anyhow::Context;
use calibration::{calibrate, CalibrationOptions, CalibrationSet, CalibrationStore, CalibrationTrials, TrialData, TrialKind};
use nalgebra::Vector3;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use telemetry::TrialRecorder;

use crate::gait_config::GaitConfig;

fn load_trial(path: &Path, kind: TrialKind, fs: f64) -> anyhow::Result<TrialData> {
	let file = File::open(path)
		.with_context(|| format!("Failed to open {} trial {}", kind, path.display()))?;

	let recorder = TrialRecorder::read(BufReader::new(file))?;
	info!("{} trial: {} rows from {}", kind, recorder.len(), path.display());

	Ok(recorder.build(kind, fs)?)
}

pub fn load_trials(config: &GaitConfig) -> anyhow::Result<CalibrationTrials> {
	let fs = config.sampling_rate;

	Ok(CalibrationTrials {
		static_trial: load_trial(&config.trials.static_trial, TrialKind::Static, fs)?,
		hip: load_trial(&config.trials.hip, TrialKind::Hip, fs)?,
		knee: load_trial(&config.trials.knee, TrialKind::Knee, fs)?,
		ankle: load_trial(&config.trials.ankle, TrialKind::Ankle, fs)?,
	})
}

/// Calibrates from the configured trials and publishes the result. The set in use, if any,
/// orients the new medio-lateral axes. Failures are logged as soon as they occur and the
/// set in use stays published.
pub fn run(config: &GaitConfig, store: &CalibrationStore) -> anyhow::Result<CalibrationSet> {
	calibrate_session(config, store).map_err(|e| {
		error!("Calibration failed: {:#}", e);
		e
	})
}

fn calibrate_session(config: &GaitConfig, store: &CalibrationStore) -> anyhow::Result<CalibrationSet> {
	let trials = load_trials(config)?;

	let previous = store.current();
	let [x, y, z] = config.up_vector;
	let options = CalibrationOptions {
		up: Vector3::new(x, y, z),
		reference: if previous.is_empty() { None } else { Some(previous) },
	};

	let outcome = calibrate(&trials, &options)?;

	for (side, agreement) in outcome.report.agreement.iter() {
		match agreement {
			Ok(agreement) => info!("{} hip/knee axis agreement: {:.3}", side.name(), agreement.confidence()),
			Err(e) => warn!("{} hip/knee axis agreement unavailable: {}", side.name(), e),
		}
	}

	store.publish(outcome.set.clone());

	Ok(outcome.set)
}
