use std::sync::Once;

use log::LevelFilter;

/// Logger setup for binaries and tests.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Full `env_logger` filter, e.g. "warn,meshtex_engine=trace". Takes
    /// precedence over `RUST_LOG` and every other field.
    pub filter: Option<String>,
    /// Level of everything outside this crate when no filter is given.
    pub level: LevelFilter,
    /// Level of `meshtex_engine` itself; per-stage create/free lines are
    /// `trace`, resolve summaries `debug`.
    pub engine_level: Option<LevelFilter>,
    pub write_style: env_logger::WriteStyle,
    /// Route output through the test harness capture.
    pub is_test: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            level: LevelFilter::Info,
            engine_level: None,
            write_style: env_logger::WriteStyle::Auto,
            is_test: false,
        }
    }
}

impl LoggingConfig {
    /// Engine at `trace`, everything else at `warn`.
    pub fn verbose() -> Self {
        Self {
            level: LevelFilter::Warn,
            engine_level: Some(LevelFilter::Trace),
            ..Self::default()
        }
    }

    fn builder(&self) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        builder.write_style(self.write_style).is_test(self.is_test);

        if let Some(filter) = &self.filter {
            builder.parse_filters(filter);
            return builder;
        }
        if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
            return builder;
        }

        builder.filter_level(self.level);
        // Adapter selection logs a lot at info.
        builder.filter_module("wgpu_core", LevelFilter::Warn);
        builder.filter_module("wgpu_hal", LevelFilter::Warn);
        if let Some(level) = self.engine_level {
            builder.filter_module("meshtex_engine", level);
        }
        builder
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` as the global logger. Only the first call has an
/// effect; a logger installed by someone else is left in place.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| match config.builder().try_init() {
        Ok(()) => log::debug!("logger installed"),
        Err(_) => log::debug!("a global logger already exists, not replacing it"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_only_the_engine() {
        let c = LoggingConfig::verbose();
        assert_eq!(c.level, LevelFilter::Warn);
        assert_eq!(c.engine_level, Some(LevelFilter::Trace));
        assert!(c.filter.is_none());
    }

    #[test]
    fn repeated_init_is_harmless() {
        let config = LoggingConfig { is_test: true, ..LoggingConfig::verbose() };
        init_logging(config.clone());
        init_logging(config);
        log::trace!("still logging");
    }
}
