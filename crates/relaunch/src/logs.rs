use std::time::{SystemTime, UNIX_EPOCH};

/// Log file name for the current UTC date, e.g. `26-1017.log`.
pub fn current_log_name() -> String {
	log_name_at(now_secs())
}

pub fn log_name_at(secs: u64) -> String {
	let (year, month, day, _, _, _) = secs_to_datetime(secs);
	format!("{:02}-{:02}{:02}.log", year % 100, month, day)
}

/// `HH:MM:SS` in UTC, used to stamp every log line.
pub fn line_stamp() -> String {
	line_stamp_at(now_secs())
}

pub fn line_stamp_at(secs: u64) -> String {
	let (_, _, _, hour, minute, second) = secs_to_datetime(secs);
	format!("{:02}:{:02}:{:02}", hour, minute, second)
}

/// Full timestamp for alert bodies.
pub fn full_stamp() -> String {
	full_stamp_at(now_secs())
}

pub fn full_stamp_at(secs: u64) -> String {
	let (year, month, day, hour, minute, second) = secs_to_datetime(secs);
	format!(
		"{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
		year, month, day, hour, minute, second
	)
}

pub fn secs_to_datetime(secs: u64) -> (u32, u32, u32, u32, u32, u32) {
	let days = (secs / 86400) as i64;
	let time_of_day = secs % 86400;
	let hour = (time_of_day / 3600) as u32;
	let minute = ((time_of_day % 3600) / 60) as u32;
	let second = (time_of_day % 60) as u32;

	let z = days + 719468;
	let era = if z >= 0 { z } else { z - 146096 } / 146097;
	let doe = (z - era * 146097) as u32;
	let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
	let y = yoe as i64 + era * 400;
	let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	let mp = (5 * doy + 2) / 153;
	let d = doy - (153 * mp + 2) / 5 + 1;
	let m = if mp < 10 { mp + 3 } else { mp - 9 };
	let y = if m <= 2 { y + 1 } else { y };

	(y as u32, m, d, hour, minute, second)
}

fn now_secs() -> u64 {
	// A clock before 1970 is treated as the epoch.
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}
