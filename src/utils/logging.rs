use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Installs the global logger. `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    SimpleLogger::new()
        .with_level(level)
        .with_module_level("winit", LevelFilter::Warn)
        .with_module_level("glutin", LevelFilter::Warn)
        .env()
        .init()
}
