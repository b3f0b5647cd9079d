//! Logger bring-up.
//!
//! Library code only uses the `log` macros. Installing `env_logger` is left to
//! binaries and tests through [`init_logging`].

mod init;

pub use init::{LoggingConfig, init_logging};
