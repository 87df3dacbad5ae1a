//! Reader configuration and the injectable diagnostic hook

use serde::Deserialize;
use std::fmt;
use std::rc::Rc;

/// Largest record a GDSII stream can declare (16-bit length field)
pub const MAX_RECORD_LENGTH: usize = 0xFFFF;

/// Receives human-readable diagnostics (missing references, unreadable files)
#[derive(Clone)]
pub struct DiagnosticSink(Rc<dyn Fn(&str)>);

impl DiagnosticSink {
    pub fn new(f: impl Fn(&str) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Sink that prints to stderr, like the CLI does
    pub fn stderr() -> Self {
        Self::new(|msg| eprintln!("{}", msg))
    }

    pub fn emit(&self, msg: &str) {
        (self.0)(msg)
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DiagnosticSink(..)")
    }
}

/// Options and diagnostic sink passed to the loader, the polygon extractor
/// and the serializer
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RawCellConfig {
    /// Records declaring a longer length fail with `RecordTooLong`
    pub max_record_length: usize,
    /// Prepended to every diagnostic line
    pub log_prefix: String,
    #[serde(skip)]
    pub sink: Option<DiagnosticSink>,
}

impl Default for RawCellConfig {
    fn default() -> Self {
        Self {
            max_record_length: MAX_RECORD_LENGTH,
            log_prefix: "[GDS]".to_string(),
            sink: None,
        }
    }
}

impl RawCellConfig {
    pub fn with_sink(mut self, sink: DiagnosticSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: RawCellConfig = serde_json::from_str(json)?;
        anyhow::ensure!(
            config.max_record_length >= 4,
            "max_record_length must cover the 4-byte record header"
        );
        Ok(config)
    }

    /// Forward a diagnostic to the configured sink, if any
    pub(crate) fn report(&self, msg: &str) {
        if let Some(sink) = &self.sink {
            sink.emit(&format!("{} {}", self.log_prefix, msg));
        }
    }
}
