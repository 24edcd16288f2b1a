use std::io::Write;

use log::{Level, LevelFilter};

/// Log to stderr as `[LEVEL] message`.
///
/// Our own messages log at Info, or at Debug with `--debug`; dependencies only log
/// warnings and errors. `RUST_LOG` overrides both.
pub fn init(debug: bool) {
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };

    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_CRATE_NAME"), level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format(|buf, record| writeln!(buf, "[{}] {}", label(record.level()), record.args()))
        .init();
}

fn label(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}
