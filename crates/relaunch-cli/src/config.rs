use relaunch::{AlertConfig, Configuration};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("Unknown key {0}")]
	UnknownFlag(String),
	#[error("key {0} given more than once")]
	DuplicateFlag(String),
	#[error("key {0} needs a value")]
	MissingValue(String),
	#[error("invalid timeout {0:?}: expected whole seconds")]
	InvalidTimeout(String),
	#[error("no application given")]
	MissingApp,
	#[error("cannot read {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("cannot parse {}: {source}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

pub enum Invocation {
	Help,
	Run(Configuration),
}

// ── config.json / email.json ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
	pub command: String,
	#[serde(default)]
	pub args: Vec<String>,
	pub working_dir: Option<PathBuf>,
	pub logs_dir: Option<PathBuf>,
	pub timeout: Option<u64>,
	pub email_config: Option<AlertConfig>,
}

pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
	read_json(path)
}

pub fn load_email_config(path: &Path) -> Result<AlertConfig, ConfigError> {
	read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
	let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
		path: path.to_path_buf(),
		source,
	})?;
	serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
		path: path.to_path_buf(),
		source,
	})
}

// ── Command line ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Flags {
	config: Option<PathBuf>,
	working_dir: Option<PathBuf>,
	logs_dir: Option<PathBuf>,
	timeout: Option<u64>,
	email: Option<PathBuf>,
	app: Option<String>,
	app_args: Vec<String>,
}

/// `[KEY]... [APP] [ARGS]...`. Everything after APP belongs to the child.
pub fn parse_args(args: &[String]) -> Result<Invocation, ConfigError> {
	let mut flags = Flags::default();
	let mut iter = args.iter();

	while let Some(arg) = iter.next() {
		match arg.as_str() {
			"-h" | "--help" => return Ok(Invocation::Help),
			"-c" => set_once(&mut flags.config, arg, iter.next().map(PathBuf::from))?,
			"-d" => set_once(&mut flags.working_dir, arg, iter.next().map(PathBuf::from))?,
			"-l" => set_once(&mut flags.logs_dir, arg, iter.next().map(PathBuf::from))?,
			"-e" => set_once(&mut flags.email, arg, iter.next().map(PathBuf::from))?,
			"-t" => {
				if flags.timeout.is_some() {
					return Err(ConfigError::DuplicateFlag(arg.clone()));
				}
				let value = iter.next().ok_or_else(|| ConfigError::MissingValue(arg.clone()))?;
				let secs = value
					.trim()
					.parse::<u64>()
					.map_err(|_| ConfigError::InvalidTimeout(value.clone()))?;
				flags.timeout = Some(secs);
			}
			other if other.trim_start().starts_with('-') => {
				return Err(ConfigError::UnknownFlag(other.to_string()));
			}
			_ => {
				flags.app = Some(arg.clone());
				flags.app_args = iter.by_ref().cloned().collect();
			}
		}
	}

	resolve(flags).map(Invocation::Run)
}

fn set_once<T>(slot: &mut Option<T>, flag: &str, value: Option<T>) -> Result<(), ConfigError> {
	if slot.is_some() {
		return Err(ConfigError::DuplicateFlag(flag.to_string()));
	}
	match value {
		Some(v) => {
			*slot = Some(v);
			Ok(())
		}
		None => Err(ConfigError::MissingValue(flag.to_string())),
	}
}

/// Config file values first, then explicit keys on top.
fn resolve(flags: Flags) -> Result<Configuration, ConfigError> {
	let mut config = match (&flags.config, &flags.app) {
		(Some(path), _) => {
			let file = load_config_file(path)?;
			let mut config = Configuration::new(file.command);
			config.args = file.args;
			if let Some(dir) = file.working_dir {
				config.working_dir = dir;
			}
			if let Some(dir) = file.logs_dir {
				config.logs_dir = dir;
			}
			config.restart_delay_secs = file.timeout.unwrap_or(0);
			config.email_alert = file.email_config;
			config
		}
		(None, Some(app)) => Configuration::new(app.clone()),
		(None, None) => return Err(ConfigError::MissingApp),
	};

	if let Some(app) = flags.app {
		config.command = app;
		config.args = flags.app_args;
	}
	if let Some(dir) = flags.working_dir {
		config.working_dir = dir;
	}
	if let Some(dir) = flags.logs_dir {
		config.logs_dir = dir;
	}
	if let Some(secs) = flags.timeout {
		config.restart_delay_secs = secs;
	}
	if let Some(path) = flags.email {
		config.email_alert = Some(load_email_config(&path)?);
	}

	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

	fn temp_file(name: &str, content: &str) -> PathBuf {
		let n = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
		let dir = std::env::temp_dir().join(format!("relaunch-cli-{}-{}", std::process::id(), n));
		let _ = std::fs::create_dir_all(&dir);
		let path = dir.join(name);
		std::fs::write(&path, content).unwrap();
		path
	}

	fn args(list: &[&str]) -> Vec<String> {
		list.iter().map(|s| s.to_string()).collect()
	}

	fn run(list: &[&str]) -> Configuration {
		match parse_args(&args(list)) {
			Ok(Invocation::Run(config)) => config,
			Ok(Invocation::Help) => panic!("unexpected help"),
			Err(e) => panic!("parse failed: {}", e),
		}
	}

	const EMAIL: &str = r#"{"host":"smtp.example.com","port":587,"secure":false,
		"user":"ops","pass":"pw","from":"ops@example.com","to":"dev@example.com"}"#;

	#[test]
	fn app_with_args() {
		let config = run(&["node", "server.js", "--port", "80"]);
		assert_eq!(config.command, "node");
		assert_eq!(config.args, vec!["server.js", "--port", "80"]);
		assert_eq!(config.working_dir, PathBuf::from("."));
		assert_eq!(config.logs_dir, PathBuf::from("."));
		assert_eq!(config.restart_delay_secs, 0);
		assert!(config.email_alert.is_none());
	}

	#[test]
	fn keys_before_app() {
		let config = run(&["-d", "/srv/app", "-l", "/var/log/app", "-t", "5", "./run.sh"]);
		assert_eq!(config.command, "./run.sh");
		assert!(config.args.is_empty());
		assert_eq!(config.working_dir, PathBuf::from("/srv/app"));
		assert_eq!(config.logs_dir, PathBuf::from("/var/log/app"));
		assert_eq!(config.restart_delay_secs, 5);
	}

	#[test]
	fn help() {
		assert!(matches!(parse_args(&args(&["-h"])), Ok(Invocation::Help)));
		assert!(matches!(parse_args(&args(&["-t", "3", "-h", "app"])), Ok(Invocation::Help)));
	}

	#[test]
	fn missing_app() {
		assert!(matches!(parse_args(&[]), Err(ConfigError::MissingApp)));
		assert!(matches!(parse_args(&args(&["-t", "3"])), Err(ConfigError::MissingApp)));
	}

	#[test]
	fn unknown_key() {
		match parse_args(&args(&["-x", "app"])) {
			Err(ConfigError::UnknownFlag(flag)) => assert_eq!(flag, "-x"),
			_ => panic!("expected unknown key"),
		}
	}

	#[test]
	fn duplicate_key() {
		assert!(matches!(
			parse_args(&args(&["-t", "1", "-t", "2", "app"])),
			Err(ConfigError::DuplicateFlag(_))
		));
		assert!(matches!(
			parse_args(&args(&["-d", "a", "-d", "b", "app"])),
			Err(ConfigError::DuplicateFlag(_))
		));
	}

	#[test]
	fn missing_value() {
		assert!(matches!(parse_args(&args(&["-l"])), Err(ConfigError::MissingValue(_))));
		assert!(matches!(parse_args(&args(&["-t"])), Err(ConfigError::MissingValue(_))));
	}

	#[test]
	fn timeout_must_be_a_number() {
		assert!(matches!(
			parse_args(&args(&["-t", "soon", "app"])),
			Err(ConfigError::InvalidTimeout(_))
		));
		assert!(matches!(
			parse_args(&args(&["-t", "-1", "app"])),
			Err(ConfigError::InvalidTimeout(_))
		));
	}

	#[test]
	fn config_file_alone_is_enough() {
		let path = temp_file(
			"config.json",
			&format!(
				r#"{{"command":"/usr/bin/worker","args":["--queue","jobs"],"working_dir":"/srv",
				"logs_dir":"/var/log/worker","timeout":10,"email_config":{}}}"#,
				EMAIL
			),
		);
		let config = run(&["-c", path.to_str().unwrap()]);
		assert_eq!(config.command, "/usr/bin/worker");
		assert_eq!(config.args, vec!["--queue", "jobs"]);
		assert_eq!(config.working_dir, PathBuf::from("/srv"));
		assert_eq!(config.logs_dir, PathBuf::from("/var/log/worker"));
		assert_eq!(config.restart_delay_secs, 10);
		assert_eq!(config.email_alert.unwrap().host, "smtp.example.com");
	}

	#[test]
	fn config_file_minimal_fields() {
		let path = temp_file("config.json", r#"{"command":"/bin/false"}"#);
		let config = run(&["-c", path.to_str().unwrap()]);
		assert_eq!(config.command, "/bin/false");
		assert!(config.args.is_empty());
		assert_eq!(config.restart_delay_secs, 0);
		assert!(config.email_alert.is_none());
	}

	#[test]
	fn keys_override_config_file_in_any_order() {
		let path = temp_file("config.json", r#"{"command":"a","args":["x"],"timeout":10,"logs_dir":"/one"}"#);
		let config = run(&["-t", "0", "-c", path.to_str().unwrap(), "-l", "/two", "b", "y", "z"]);
		assert_eq!(config.command, "b");
		assert_eq!(config.args, vec!["y", "z"]);
		assert_eq!(config.restart_delay_secs, 0);
		assert_eq!(config.logs_dir, PathBuf::from("/two"));
	}

	#[test]
	fn email_key_loads_alert_config() {
		let path = temp_file("email.json", EMAIL);
		let config = run(&["-e", path.to_str().unwrap(), "app"]);
		let alert = config.email_alert.unwrap();
		assert_eq!(alert.port, 587);
		assert_eq!(alert.password, "pw");
		assert_eq!(alert.to, "dev@example.com");
	}

	#[test]
	fn broken_config_files() {
		let path = temp_file("config.json", "{ not json");
		assert!(matches!(
			parse_args(&args(&["-c", path.to_str().unwrap()])),
			Err(ConfigError::Parse { .. })
		));

		let no_command = temp_file("config.json", r#"{"args":[]}"#);
		assert!(matches!(
			parse_args(&args(&["-c", no_command.to_str().unwrap()])),
			Err(ConfigError::Parse { .. })
		));

		assert!(matches!(
			parse_args(&args(&["-e", "/nonexistent/email.json", "app"])),
			Err(ConfigError::Read { .. })
		));
	}
}
