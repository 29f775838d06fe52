mod config;

use config::Invocation;
use owo_colors::OwoColorize;
use relaunch::{Logger, Supervisor};

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt().with_writer(std::io::stderr).init();

	let args: Vec<String> = std::env::args().skip(1).collect();

	let configuration = match config::parse_args(&args) {
		Ok(Invocation::Run(configuration)) => configuration,
		Ok(Invocation::Help) => {
			print_usage();
			return;
		}
		Err(e) => {
			println!("{}", e);
			println!();
			print_usage();
			std::process::exit(2);
		}
	};

	let logger = match Logger::open(&configuration.logs_dir) {
		Ok(logger) => logger,
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	};

	tracing::info!(
		"supervising '{}' (logs: {}, restart delay: {}s, alerts: {})",
		configuration.command_line(),
		logger.path().display(),
		configuration.restart_delay_secs,
		if configuration.email_alert.is_some() { "on" } else { "off" }
	);

	let err = Supervisor::new(configuration, logger).run().await;
	tracing::debug!("supervisor stopped: {}", err);
	std::process::exit(1);
}

fn print_usage() {
	println!("usage: {} [KEY]... [APP] [ARGS]...", "relaunch".bold());
	println!();
	println!("{}", "keys".cyan().bold());
	println!("  {} config.json        Set up the launcher from a config file", "-c".bold());
	println!("  {} path               Set working dir", "-d".bold());
	println!("  {} path               Set logs dir", "-l".bold());
	println!("  {} secs               Set restart delay", "-t".bold());
	println!("  {} email.json         Set up email alerts", "-e".bold());
	println!("  {}                    Show this help", "-h".bold());
}
