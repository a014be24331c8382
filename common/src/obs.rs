use std::{io::Write, sync::Mutex};

use slog::{o, Drain};

/// Assemble a root logger that writes JSON records to the given writer.
/// The daemons hand this `stderr()`.
pub fn assemble_logger<W: Write + Send + 'static>(w: W) -> slog::Logger {
	slog::Logger::root(Mutex::new(slog_json::Json::default(w)).fuse(), o!())
}
