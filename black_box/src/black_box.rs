use chrono::NaiveDateTime;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::{
	collections::VecDeque,
	fmt::Display,
	fs::OpenOptions,
	io,
	io::Write,
	thread,
	thread::JoinHandle,
	time::{Instant, Duration},
};

lazy_static! {
    static ref SESSION_CHANNEL: (Sender<Message>, Receiver<Message>) = unbounded::<Message>();
    static ref SESSION_LOGGER: SessionLogger = SessionLogger {
        start_instant: Instant::now()
    };
}

/// Records kept in memory while the log file cannot be written.
const MAX_PENDING: usize = 1024;
/// Pending records that trigger a write.
const FLUSH_THRESHOLD: usize = 8;
const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);

enum Message {
	Log(String),
	Flush,
}

/// Session log. Records are echoed on stderr as they arrive, stdout being reserved for
/// joint angles, and written to `gait_<session>_<date>_<time>.log` in batches.
///
/// A record leaves memory only once written. While the file is unwritable, at most
/// `MAX_PENDING` records are kept, the oldest being discarded and counted.
pub struct BlackBox {
	sink: Box<dyn Write + Send>,
	echo: bool,
	pending: VecDeque<String>,
	lost: usize,
	failing: bool,
	last_write_instant: Instant,
}

pub(crate) fn log_file_name(session: &str, time: &NaiveDateTime) -> String {
	format!("gait_{}_{}.log", session, time.format("%Y-%m-%d_%H-%M-%S"))
}

pub(crate) fn format_record(elapsed: Duration, record: &Record) -> String {
	let line = format!(
		"[{:.3}][{:?}][{}] {}",
		elapsed.as_secs_f32(),
		record.level(),
		record.module_path().unwrap_or("unknown"),
		record.args()
	);

	match (record.level(), record.file(), record.line()) {
		(Level::Error, Some(file), Some(line_number)) => format!("{} ({}:{})", line, file, line_number),
		_ => line,
	}
}

impl BlackBox {
	/// Creates the log file of a session, e.g. `calibration` or `runtime`.
	pub fn new(session: &str) -> io::Result<Self> {
		let path = log_file_name(session, &chrono::Local::now().naive_local());

		let file = OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)?;

		Ok(Self::with_sink(Box::new(file), true))
	}

	pub(crate) fn with_sink(sink: Box<dyn Write + Send>, echo: bool) -> Self {
		Self {
			sink,
			echo,
			pending: VecDeque::new(),
			lost: 0,
			failing: false,
			last_write_instant: Instant::now(),
		}
	}

	/// Writes `# key: value` lines describing the session, before any record.
	pub fn write_header<I, K, V>(&mut self, entries: I) -> io::Result<()>
		where I: IntoIterator<Item=(K, V)>, K: Display, V: Display {
		writeln!(self.sink, "# gait {}", env!("CARGO_PKG_VERSION"))?;

		for (key, value) in entries {
			writeln!(self.sink, "# {}: {}", key, value)?;
		}

		self.sink.flush()
	}

	fn push(&mut self, record: String) {
		if self.echo {
			eprintln!("{}", record);
		}

		if self.pending.len() == MAX_PENDING {
			self.pending.pop_front();
			self.lost += 1;
		}

		self.pending.push_back(record);
	}

	fn write_pending(&mut self) -> io::Result<()> {
		if self.lost > 0 {
			writeln!(self.sink, "[black box] {} records lost while the log file was unwritable", self.lost)?;
			self.lost = 0;
		}

		while let Some(record) = self.pending.front() {
			writeln!(self.sink, "{}", record)?;
			self.pending.pop_front();
		}

		self.sink.flush()
	}

	fn try_write(&mut self) {
		match self.write_pending() {
			Ok(()) => {
				self.failing = false;
				self.last_write_instant = Instant::now();
			}
			// Reported once per failure streak, records stay pending
			Err(e) if !self.failing => {
				self.failing = true;
				eprintln!("[black box] failed to write log file: {}", e);
			}
			Err(_) => {}
		}
	}

	fn receive(&mut self, message: Message) {
		match message {
			Message::Log(record) => self.push(record),
			Message::Flush => self.try_write(),
		}

		if self.pending.len() >= FLUSH_THRESHOLD || self.last_write_instant.elapsed() > MAX_FLUSH_INTERVAL {
			self.try_write();
		}
	}

	fn receive_loop(&mut self) {
		while let Ok(message) = SESSION_CHANNEL.1.recv_timeout(RECEIVE_TIMEOUT) {
			self.receive(message);
		}

		if !self.pending.is_empty() {
			self.try_write();
		}
	}

	/// Installs the black box as the global logger and starts its writer thread.
	pub fn spawn(mut self, level_filter: LevelFilter) -> Result<JoinHandle<()>, SetLoggerError> {
		log::set_logger(&*SESSION_LOGGER)
			.map(|()| log::set_max_level(level_filter))?;

		Ok(thread::spawn(move || loop {
			self.receive_loop()
		}))
	}
}

/// Formats records and hands them to the black box thread
struct SessionLogger {
	start_instant: Instant,
}

impl Log for SessionLogger {
	fn enabled(&self, _: &Metadata) -> bool {
		true
	}

	fn log(&self, record: &Record) {
		let formatted = format_record(self.start_instant.elapsed(), record);

		// The receiver lives in a static, sending cannot fail
		let _ = SESSION_CHANNEL.0.send(Message::Log(formatted));
	}

	fn flush(&self) {
		let _ = SESSION_CHANNEL.0.send(Message::Flush);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::{Arc, Mutex};

	/// In-memory log file that can be made to fail.
	#[derive(Clone, Default)]
	struct Sink {
		written: Arc<Mutex<Vec<u8>>>,
		broken: Arc<AtomicBool>,
	}

	impl Sink {
		fn lines(&self) -> Vec<String> {
			String::from_utf8(self.written.lock().unwrap().clone())
				.unwrap()
				.lines()
				.map(String::from)
				.collect()
		}
	}

	impl Write for Sink {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			if self.broken.load(Ordering::SeqCst) {
				return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
			}
			self.written.lock().unwrap().write(buf)
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	fn black_box() -> (BlackBox, Sink) {
		let sink = Sink::default();
		(BlackBox::with_sink(Box::new(sink.clone()), false), sink)
	}

	#[test]
	fn file_name_test() {
		let time = NaiveDate::from_ymd_opt(2024, 3, 5)
			.and_then(|date| date.and_hms_opt(14, 7, 9))
			.unwrap();

		assert_eq!(log_file_name("calibration", &time), "gait_calibration_2024-03-05_14-07-09.log");
	}

	#[test]
	fn format_test() {
		let info = format_record(Duration::from_millis(1500), &Record::builder()
			.args(format_args!("left thigh calibrated"))
			.level(Level::Info)
			.module_path(Some("calibration::orchestrator"))
			.file(Some("calibration/src/orchestrator.rs"))
			.line(Some(42))
			.build());
		assert_eq!(info, "[1.500][Info][calibration::orchestrator] left thigh calibrated");

		let error = format_record(Duration::from_millis(250), &Record::builder()
			.args(format_args!("no stream"))
			.level(Level::Error)
			.module_path(Some("gait::session"))
			.file(Some("gait/src/session.rs"))
			.line(Some(7))
			.build());
		assert_eq!(error, "[0.250][Error][gait::session] no stream (gait/src/session.rs:7)");
	}

	#[test]
	fn header_test() {
		let (mut black_box, sink) = black_box();

		black_box.write_header(vec![("mode", "runtime"), ("calibration", "none")]).unwrap();

		let lines = sink.lines();
		assert_eq!(lines.len(), 3);
		assert!(lines[0].starts_with("# gait "));
		assert_eq!(lines[2], "# calibration: none");
	}

	#[test]
	fn batched_write_test() {
		let (mut black_box, sink) = black_box();

		for i in 0..FLUSH_THRESHOLD - 1 {
			black_box.receive(Message::Log(format!("record {}", i)));
		}
		assert!(sink.lines().is_empty());

		black_box.receive(Message::Log("last".to_string()));
		assert_eq!(sink.lines().len(), FLUSH_THRESHOLD);
		assert!(black_box.pending.is_empty());
	}

	#[test]
	fn unwritable_file_test() {
		let (mut black_box, sink) = black_box();
		sink.broken.store(true, Ordering::SeqCst);

		black_box.receive(Message::Log("first".to_string()));
		black_box.receive(Message::Flush);
		assert!(black_box.failing);
		assert_eq!(black_box.pending.len(), 1);

		sink.broken.store(false, Ordering::SeqCst);
		black_box.receive(Message::Flush);

		assert!(!black_box.failing);
		assert_eq!(sink.lines(), vec!["first".to_string()]);
	}

	#[test]
	fn bounded_pending_test() {
		let (mut black_box, sink) = black_box();
		sink.broken.store(true, Ordering::SeqCst);

		for i in 0..MAX_PENDING + 10 {
			black_box.receive(Message::Log(format!("record {}", i)));
		}
		assert_eq!(black_box.pending.len(), MAX_PENDING);
		assert_eq!(black_box.lost, 10);

		sink.broken.store(false, Ordering::SeqCst);
		black_box.receive(Message::Flush);

		let lines = sink.lines();
		assert_eq!(lines.len(), MAX_PENDING + 1);
		assert_eq!(lines[0], "[black box] 10 records lost while the log file was unwritable");
		assert_eq!(lines[1], "record 10");
		assert_eq!(black_box.lost, 0);
	}
}
