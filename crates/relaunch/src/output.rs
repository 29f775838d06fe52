use owo_colors::{OwoColorize, Stream};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::LogError;
use crate::logs;

#[derive(Debug, Clone, Copy)]
enum Tone {
	Plain,
	Error,
	Banner,
}

/// The per-run log sink. Clones share one append-only file; each line is
/// written and flushed under the lock, then mirrored to stdout.
#[derive(Clone)]
pub struct Logger {
	file: Arc<Mutex<File>>,
	path: PathBuf,
	mirror: bool,
}

impl Logger {
	/// Opens (or appends to) today's log file inside `logs_dir`.
	/// The directory must already exist.
	pub fn open(logs_dir: &Path) -> Result<Self, LogError> {
		let path = logs_dir.join(logs::current_log_name());
		let file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(&path)
			.map_err(|source| LogError::Open {
				path: path.clone(),
				source,
			})?;

		Ok(Self {
			file: Arc::new(Mutex::new(file)),
			path,
			mirror: true,
		})
	}

	/// Stops mirroring lines to stdout.
	pub fn quiet(mut self) -> Self {
		self.mirror = false;
		self
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub async fn write_line(&self, text: &str) -> io::Result<()> {
		self.write(text, Tone::Plain).await
	}

	/// Writes `[HH:MM:SS] text` and returns the formatted line.
	pub async fn line(&self, text: &str) -> String {
		let line = format!("[{}] {}", logs::line_stamp(), text);
		self.best_effort(&line, Tone::Plain).await;
		line
	}

	/// Writes `[HH:MM:SS][ERROR] text` and returns the formatted line.
	pub async fn error_line(&self, text: &str) -> String {
		let line = format!("[{}][ERROR] {}", logs::line_stamp(), text);
		self.best_effort(&line, Tone::Error).await;
		line
	}

	/// Unstamped line, highlighted on the console.
	pub async fn banner(&self, text: &str) {
		self.best_effort(text, Tone::Banner).await;
	}

	/// Console only; never reaches the log file.
	pub fn console(&self, text: &str) {
		if self.mirror {
			let _ = writeln!(io::stdout().lock(), "{}", text);
		}
	}

	async fn best_effort(&self, text: &str, tone: Tone) {
		if let Err(e) = self.write(text, tone).await {
			tracing::warn!("failed to write to {}: {}", self.path.display(), e);
		}
	}

	async fn write(&self, text: &str, tone: Tone) -> io::Result<()> {
		let mut file = self.file.lock().await;

		let mut record = String::with_capacity(text.len() + 1);
		record.push_str(text);
		record.push('\n');
		let result = file.write_all(record.as_bytes()).and_then(|_| file.flush());

		if self.mirror {
			let mut stdout = io::stdout().lock();
			let _ = match tone {
				Tone::Plain => writeln!(stdout, "{}", text),
				Tone::Error => writeln!(stdout, "{}", text.if_supports_color(Stream::Stdout, |t| t.red())),
				Tone::Banner => writeln!(stdout, "{}", text.if_supports_color(Stream::Stdout, |t| t.bold())),
			};
		}

		result
	}
}

/// Drops one trailing `\n` or `\r\n`.
pub fn strip_line_terminator(line: &[u8]) -> &[u8] {
	match line {
		[rest @ .., b'\r', b'\n'] => rest,
		[rest @ .., b'\n'] => rest,
		_ => line,
	}
}
