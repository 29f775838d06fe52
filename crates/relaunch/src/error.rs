use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
	#[error("cannot open log file {}: {source}", path.display())]
	Open {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Fatal supervisor failures. Anything else is logged and the loop carries on.
#[derive(Debug, Error)]
pub enum SupervisorError {
	#[error("can't run \"{command}\": {source}")]
	Spawn {
		command: String,
		#[source]
		source: std::io::Error,
	},
	#[error("lost track of child process: {0}")]
	Wait(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AlertError {
	#[error("invalid address {address:?}: {source}")]
	Address {
		address: String,
		#[source]
		source: lettre::address::AddressError,
	},
	#[error("cannot build message: {0}")]
	Message(#[from] lettre::error::Error),
	#[error("TLS setup failed: {0}")]
	Tls(#[source] lettre::transport::smtp::Error),
	#[error("cannot connect to {host}:{port}: {source}")]
	Transport {
		host: String,
		port: u16,
		#[source]
		source: lettre::transport::smtp::Error,
	},
	#[error("authentication failed: {0}")]
	Auth(#[source] lettre::transport::smtp::Error),
	#[error("send failed: {0}")]
	Send(#[source] lettre::transport::smtp::Error),
	#[error("SMTP session timed out after {0:?}")]
	Timeout(std::time::Duration),
}
