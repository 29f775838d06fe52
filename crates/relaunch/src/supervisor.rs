use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;

use crate::alert::{Notifier, SmtpAlerter};
use crate::error::SupervisorError;
use crate::output::{strip_line_terminator, Logger};
use crate::types::*;

const SEPARATOR: &str = "-------------";

/// Longest line logged in one piece; longer output is split into several lines.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Mutable state carried across child instances.
#[derive(Debug, Default)]
pub struct SupervisionState {
	/// Most recent formatted stderr line since startup.
	pub last_error_line: String,
}

pub struct Supervisor {
	config: Configuration,
	logger: Logger,
	notifier: Option<Arc<dyn Notifier>>,
	state: SupervisionState,
	phase: watch::Sender<Phase>,
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
	Stdout,
	Stderr,
}

impl Supervisor {
	pub fn new(config: Configuration, logger: Logger) -> Self {
		let notifier = config
			.email_alert
			.clone()
			.map(|alert| Arc::new(SmtpAlerter::new(alert)) as Arc<dyn Notifier>);
		let (phase, _) = watch::channel(Phase::Spawning);

		Self {
			config,
			logger,
			notifier,
			state: SupervisionState::default(),
			phase,
		}
	}

	pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	pub fn subscribe(&self) -> watch::Receiver<Phase> {
		self.phase.subscribe()
	}

	pub fn logger(&self) -> &Logger {
		&self.logger
	}

	pub fn last_error_line(&self) -> &str {
		&self.state.last_error_line
	}

	pub fn restart_delay(&self) -> Option<Duration> {
		match self.config.restart_delay_secs {
			0 => None,
			secs => Some(Duration::from_secs(secs)),
		}
	}

	/// Spawns, waits and restarts forever. Only returns when a child can't
	/// be started or its exit can't be observed.
	pub async fn run(mut self) -> SupervisorError {
		loop {
			if let Err(e) = self.run_once().await {
				return e;
			}

			if let Some(delay) = self.restart_delay() {
				tracing::debug!("restarting {} in {:?}", self.config.command, delay);
				self.phase.send_replace(Phase::Delaying(delay));
				tokio::time::sleep(delay).await;
			}
		}
	}

	/// One child instance: spawn, capture both pipes until they drain,
	/// then handle the exit.
	pub async fn run_once(&mut self) -> Result<ExitOutcome, SupervisorError> {
		self.phase.send_replace(Phase::Spawning);

		let mut child = match spawn_child(&self.config) {
			Ok(child) => child,
			Err(source) => {
				let err = SupervisorError::Spawn {
					command: self.config.command.clone(),
					source,
				};
				self.report_fatal(&err).await;
				return Err(err);
			}
		};

		let pid = child.id().unwrap_or(0);
		tracing::debug!("started {} (pid {})", self.config.command_line(), pid);
		self.phase.send_replace(Phase::Running { pid });

		let stdout = child
			.stdout
			.take()
			.map(|out| tokio::spawn(capture(out, self.logger.clone(), Pipe::Stdout)));
		let stderr = child
			.stderr
			.take()
			.map(|err| tokio::spawn(capture(err, self.logger.clone(), Pipe::Stderr)));

		let status = child.wait().await;

		if let Some(handle) = stdout {
			let _ = handle.await;
		}
		if let Some(handle) = stderr {
			if let Ok(Some(line)) = handle.await {
				self.state.last_error_line = line;
			}
		}

		let exit = match status {
			Ok(status) => ExitOutcome::from_status(status),
			Err(e) => {
				let err = SupervisorError::Wait(e);
				self.report_fatal(&err).await;
				return Err(err);
			}
		};

		self.handle_exit(exit).await;
		Ok(exit)
	}

	/// Dispatches the crash alert without waiting for it, then logs the
	/// exit banner.
	pub async fn handle_exit(&mut self, exit: ExitOutcome) {
		if !exit.success() {
			if let Some(notifier) = &self.notifier {
				notifier.notify(CrashReport {
					exit,
					command_line: self.config.command_line(),
					last_error_line: self.state.last_error_line.clone(),
				});
			}
		}

		self.logger.banner("").await;
		self.logger.banner(&exit.banner()).await;
		self.logger.banner(SEPARATOR).await;
		self.logger.banner("Restarting...").await;
		self.logger.console("Trying to restart process...");

		self.phase.send_replace(Phase::Exited(exit));
	}

	async fn report_fatal(&self, err: &SupervisorError) {
		tracing::error!("{}", err);
		self.logger.line(&err.to_string()).await;
		self.logger.banner(SEPARATOR).await;
		self.logger.console(&format!("Failed to start child process: {}", err));
		self.logger.console("Quitting...");
	}
}

fn spawn_child(config: &Configuration) -> std::io::Result<Child> {
	Command::new(&config.command)
		.args(&config.args)
		.current_dir(&config.working_dir)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true)
		.spawn()
}

/// Logs every line of one pipe until EOF. For stderr, returns the last
/// formatted line. Lines longer than [`MAX_LINE_BYTES`] are logged in chunks.
async fn capture<R: AsyncRead + Unpin>(reader: R, logger: Logger, pipe: Pipe) -> Option<String> {
	let mut reader = BufReader::new(reader);
	let mut buf = Vec::new();
	let mut last = None;

	loop {
		buf.clear();
		let read = (&mut reader)
			.take(MAX_LINE_BYTES as u64)
			.read_until(b'\n', &mut buf)
			.await;
		match read {
			Ok(0) => break,
			Ok(_) => {
				let text = String::from_utf8_lossy(strip_line_terminator(&buf));
				match pipe {
					Pipe::Stdout => {
						logger.line(&text).await;
					}
					Pipe::Stderr => last = Some(logger.error_line(&text).await),
				}
			}
			Err(e) => {
				tracing::warn!("reading child {:?}: {}", pipe, e);
				break;
			}
		}
	}

	last
}
