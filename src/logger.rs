//! Logger Module
//!
//! The logging capability a cache writes its debug trace to. The cache never
//! reaches for a global logger; one is injected at construction or through
//! `Cache::set_logger`.

use std::io::{self, Write};

use parking_lot::Mutex;
use tracing::info;

// == Cache Logger ==
/// Capability the cache logs debug messages through.
///
/// A failing logger makes the cache operation that triggered the message
/// fail with `CacheError::Logger`.
pub trait CacheLogger: Send + Sync {
    fn log(&self, message: &str) -> io::Result<()>;
}

// == Tracing Logger ==
/// Default logger, forwards every message to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl CacheLogger for TracingLogger {
    fn log(&self, message: &str) -> io::Result<()> {
        info!(target: "ttl_cache", "{}", message);
        Ok(())
    }
}

// == Noop Logger ==
/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl CacheLogger for NoopLogger {
    fn log(&self, _message: &str) -> io::Result<()> {
        Ok(())
    }
}

// == Writer Logger ==
/// Writes one line per message to any `Write` sink (stdout, a file, a buffer).
#[derive(Debug)]
pub struct WriterLogger<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterLogger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the logger and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> CacheLogger for WriterLogger<W> {
    fn log(&self, message: &str) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", message)?;
        writer.flush()
    }
}
