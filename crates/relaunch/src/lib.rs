//! # relaunch
//!
//! Keep one command running forever.
//!
//! The supervisor spawns the configured command, writes every line of its
//! stdout and stderr to a per-day log file (mirrored to the console), restarts
//! it whenever it exits and, when the exit is abnormal, mails a crash report.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use relaunch::{Configuration, Logger, Supervisor};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut config = Configuration::new("node");
//! config.args = vec!["server.js".into()];
//! config.logs_dir = "/var/log/myapp".into();
//! config.restart_delay_secs = 5;
//!
//! let logger = Logger::open(&config.logs_dir).unwrap();
//! let err = Supervisor::new(config, logger).run().await;
//! eprintln!("{}", err);
//! # }
//! ```

pub mod alert;
pub mod error;
pub mod logs;
pub mod output;
pub mod supervisor;
pub mod types;

pub use alert::{Notifier, SmtpAlerter};
pub use error::{AlertError, LogError, SupervisorError};
pub use output::Logger;
pub use supervisor::{SupervisionState, Supervisor};
pub use types::*;
