use crossbeam_channel::{Receiver, Sender};
use std::{
	error::Error,
	thread,
	time::Duration,
};

use crate::input::Input;

/// Controllers that import external data. Reading stops at the end of the input, which
/// closes the channel and lets the downstream threads finish.
pub trait InputController
	where
		Self: Sized + Send + 'static,
{
	/// Minimum duration to wait between two successive `read_input` calls.
	const DELAY: Option<Duration>;

	/// `Ok(None)` at the end of the input.
	fn read_input(&mut self) -> Result<Option<Input>, Box<dyn Error>>;

	fn read_loop(&mut self, input_sender: Sender<Input>) {
		loop {
			match self.read_input() {
				Ok(Some(input)) => {
					if input_sender.send(input).is_err() {
						warn!("Input receiver disconnected");
						break;
					}
				}
				Ok(None) => break,
				Err(e) => error!("{}", e),
			}

			if let Some(delay) = Self::DELAY {
				thread::sleep(delay);
			}
		}

		info!("End of input");
	}

	/// Spawns a thread running `read_loop`. The controller is expected to be ready to read.
	fn spawn(mut self, input_sender: Sender<Input>) -> thread::JoinHandle<()> {
		thread::spawn(move || self.read_loop(input_sender))
	}
}

/// Controllers that filter and buffer asynchronous inputs into frames
pub trait Collector<F: Send + 'static>
	where
		Self: Sized + Send + 'static,
{
	/// Frame completed by `input`, if any.
	fn collect(&mut self, input: Input) -> Option<F>;

	fn collect_loop(&mut self, receiver: Receiver<Input>, sender: Sender<F>) {
		for input in receiver {
			if let Some(frame) = self.collect(input) {
				if sender.send(frame).is_err() {
					break;
				}
			}
		}
	}

	fn spawn(mut self, receiver: Receiver<Input>, sender: Sender<F>) -> thread::JoinHandle<()> {
		thread::spawn(move || self.collect_loop(receiver, sender))
	}
}

/// Turns every input frame into an output frame.
pub trait Estimator<In, Out>
	where
		Self: Sized + Send + 'static,
		In: Send + 'static,
		Out: Send + 'static,
{
	fn output_frame(&mut self, input_frame: In) -> Out;

	fn estimate_loop(&mut self, receiver: Receiver<In>, sender: Sender<Out>) {
		for input_frame in receiver {
			if sender.send(self.output_frame(input_frame)).is_err() {
				break;
			}
		}
	}

	fn spawn(mut self, receiver: Receiver<In>, sender: Sender<Out>) -> thread::JoinHandle<()> {
		thread::spawn(move || self.estimate_loop(receiver, sender))
	}
}

/// Controllers that dispense outputs
pub trait Dispatcher<F: Send + Sized + 'static>
	where
		Self: Sized + Send + 'static,
{
	fn dispatch(&mut self, frame: F) -> Result<(), Box<dyn Error>>;

	fn dispatch_loop(&mut self, receiver: Receiver<F>) {
		for frame in receiver {
			if let Err(e) = self.dispatch(frame) {
				error!("{}", e);
			}
		}
	}

	fn spawn(mut self, receiver: Receiver<F>) -> thread::JoinHandle<()> {
		thread::spawn(move || self.dispatch_loop(receiver))
	}
}
