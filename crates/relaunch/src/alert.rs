//! Crash notification by email.
//!
//! One [`CrashReport`] produces at most one message, delivered over its own
//! SMTP session. Failures are logged and dropped; nothing is retried.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::Response;
use lettre::Message;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AlertError;
use crate::logs;
use crate::types::{AlertConfig, CrashReport};

pub const SUBJECT: &str = "Application crashed!";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Receives crash reports from the supervisor. `notify` must not wait on
/// delivery; the supervisor calls it right before scheduling the restart.
pub trait Notifier: Send + Sync {
	fn notify(&self, report: CrashReport);
}

#[derive(Debug, Clone)]
pub struct SmtpAlerter {
	config: Arc<AlertConfig>,
	connect_timeout: Duration,
	session_timeout: Duration,
}

impl SmtpAlerter {
	pub fn new(config: AlertConfig) -> Self {
		Self {
			config: Arc::new(config),
			connect_timeout: CONNECT_TIMEOUT,
			session_timeout: SESSION_TIMEOUT,
		}
	}

	pub fn with_timeouts(mut self, connect: Duration, session: Duration) -> Self {
		self.connect_timeout = connect;
		self.session_timeout = session;
		self
	}

	/// Delivers one report: connect, authenticate, send, quit.
	/// The session is closed on every path once it has been opened.
	pub async fn send(&self, report: &CrashReport) -> Result<Response, AlertError> {
		let message = compose_message(&self.config, report, &logs::full_stamp())?;

		// Greeting, EHLO and STARTTLS are bounded too, not just the TCP connect.
		let handshake_limit = self.connect_timeout + self.session_timeout;
		let mut session = match tokio::time::timeout(handshake_limit, self.open_session()).await {
			Ok(session) => session?,
			Err(_) => return Err(AlertError::Timeout(handshake_limit)),
		};
		let result = match tokio::time::timeout(
			self.session_timeout,
			deliver(&mut session, &self.config, &message),
		)
		.await
		{
			Ok(result) => result,
			Err(_) => Err(AlertError::Timeout(self.session_timeout)),
		};
		close_session(&mut session, self.session_timeout).await;

		result
	}

	async fn open_session(&self) -> Result<AsyncSmtpConnection, AlertError> {
		let config = &self.config;
		let hello = ClientId::Domain("localhost".to_string());
		let transport_error = |source: lettre::transport::smtp::Error| AlertError::Transport {
			host: config.host.clone(),
			port: config.port,
			source,
		};

		let implicit_tls = if config.use_implicit_tls {
			Some(TlsParameters::new(config.host.clone()).map_err(AlertError::Tls)?)
		} else {
			None
		};

		let mut session = AsyncSmtpConnection::connect_tokio1(
			(config.host.as_str(), config.port),
			Some(self.connect_timeout),
			&hello,
			implicit_tls,
			None,
		)
		.await
		.map_err(transport_error)?;

		if !config.use_implicit_tls && session.can_starttls() {
			let upgrade = match TlsParameters::new(config.host.clone()) {
				Ok(params) => session.starttls(params, &hello).await.map_err(transport_error),
				Err(e) => Err(AlertError::Tls(e)),
			};
			if let Err(e) = upgrade {
				close_session(&mut session, self.session_timeout).await;
				return Err(e);
			}
		}

		Ok(session)
	}
}

impl Notifier for SmtpAlerter {
	fn notify(&self, report: CrashReport) {
		let alerter = self.clone();
		tokio::spawn(async move {
			match alerter.send(&report).await {
				Ok(response) => {
					let text: Vec<&str> = response.message().collect();
					tracing::info!(
						"crash alert sent to {}: {} {}",
						alerter.config.to,
						response.code(),
						text.join(" ")
					);
				}
				Err(e) => tracing::warn!("crash alert to {} failed: {}", alerter.config.to, e),
			}
		});
	}
}

async fn deliver(
	session: &mut AsyncSmtpConnection,
	config: &AlertConfig,
	message: &Message,
) -> Result<Response, AlertError> {
	let credentials = Credentials::new(config.user.clone(), config.password.clone());
	session
		.auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
		.await
		.map_err(AlertError::Auth)?;

	session
		.send(message.envelope(), &message.formatted())
		.await
		.map_err(AlertError::Send)
}

/// Sends QUIT. The socket itself closes when the session is dropped, so a
/// failed or stalled QUIT only costs the wait.
async fn close_session(session: &mut AsyncSmtpConnection, limit: Duration) {
	match tokio::time::timeout(limit, session.quit()).await {
		Ok(Ok(_)) => {}
		Ok(Err(e)) => tracing::debug!("SMTP QUIT failed: {}", e),
		Err(_) => tracing::debug!("SMTP QUIT timed out after {:?}", limit),
	}
}

fn mailbox(address: &str) -> Result<Mailbox, AlertError> {
	address.parse().map_err(|source| AlertError::Address {
		address: address.to_string(),
		source,
	})
}

pub fn compose_message(
	config: &AlertConfig,
	report: &CrashReport,
	timestamp: &str,
) -> Result<Message, AlertError> {
	let message = Message::builder()
		.from(mailbox(&config.from)?)
		.to(mailbox(&config.to)?)
		.subject(SUBJECT)
		.header(ContentType::TEXT_PLAIN)
		.body(message_body(report, timestamp))?;
	Ok(message)
}

pub fn message_body(report: &CrashReport, timestamp: &str) -> String {
	let how = match (report.exit.code, report.exit.signal_name()) {
		(Some(code), _) => format!("has been crashed with return code: {}", code),
		(None, Some(name)) => format!("has been terminated by signal {}", name),
		(None, None) => "has stopped with an unknown status".to_string(),
	};
	format!(
		"{}\nApplication '{}' {}\n\nLast error line:\n{}\n",
		timestamp, report.command_line, how, report.last_error_line
	)
}
