use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Resolved launcher configuration. Immutable once the supervisor starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
	pub command: String,
	pub args: Vec<String>,
	pub working_dir: PathBuf,
	pub logs_dir: PathBuf,
	/// Seconds to wait between an exit and the next spawn. 0 restarts immediately.
	pub restart_delay_secs: u64,
	pub email_alert: Option<AlertConfig>,
}

impl Configuration {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			args: Vec::new(),
			working_dir: PathBuf::from("."),
			logs_dir: PathBuf::from("."),
			restart_delay_secs: 0,
			email_alert: None,
		}
	}

	/// `command` followed by its arguments, space separated.
	pub fn command_line(&self) -> String {
		if self.args.is_empty() {
			self.command.clone()
		} else {
			format!("{} {}", self.command, self.args.join(" "))
		}
	}
}

/// SMTP settings, in the shape of the email config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
	pub host: String,
	pub port: u16,
	#[serde(rename = "secure", default)]
	pub use_implicit_tls: bool,
	pub user: String,
	#[serde(rename = "pass")]
	pub password: String,
	pub from: String,
	pub to: String,
}

/// How a child process instance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
	pub code: Option<i32>,
	pub signal: Option<i32>,
}

impl ExitOutcome {
	pub fn code(code: i32) -> Self {
		Self { code: Some(code), signal: None }
	}

	pub fn signal(signal: i32) -> Self {
		Self { code: None, signal: Some(signal) }
	}

	pub fn from_status(status: std::process::ExitStatus) -> Self {
		use std::os::unix::process::ExitStatusExt;
		Self {
			code: status.code(),
			signal: status.signal(),
		}
	}

	pub fn success(&self) -> bool {
		self.code == Some(0)
	}

	pub fn signal_name(&self) -> Option<String> {
		let raw = self.signal?;
		Some(match nix::sys::signal::Signal::try_from(raw) {
			Ok(sig) => sig.as_str().to_string(),
			Err(_) => format!("{}", raw),
		})
	}

	/// Banner written to the log after every exit.
	pub fn banner(&self) -> String {
		match (self.code, self.signal_name()) {
			(Some(code), _) => format!("Child process exited with code {}", code),
			(None, Some(name)) => format!("Child process terminated by signal {}", name),
			(None, None) => "Child process exited with unknown status".to_string(),
		}
	}
}

/// Everything an alert needs to describe one abnormal exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
	pub exit: ExitOutcome,
	pub command_line: String,
	pub last_error_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
	Spawning,
	Running { pid: u32 },
	Exited(ExitOutcome),
	Delaying(Duration),
}
