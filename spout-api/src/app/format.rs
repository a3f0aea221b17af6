//! Line rendering for the plain HTTP log stream.

use spout_core::{Colorizer, LogRecord};

/// Narrowest name column in multi-container output.
pub const MIN_NAME_WIDTH: usize = 16;

const RESET: &str = "\x1b[0m";

/// Per-response formatter; the name column only ever widens.
#[derive(Debug)]
pub struct LogFormatter {
    multi: bool,
    json: bool,
    colors: Option<Colorizer>,
    name_width: usize,
}

impl LogFormatter {
    pub fn new(multi: bool, json: bool, colors: bool) -> Self {
        Self {
            multi,
            json,
            colors: colors.then(Colorizer::new),
            name_width: MIN_NAME_WIDTH,
        }
    }

    pub fn content_type(&self) -> &'static str {
        if self.json {
            "application/json"
        } else {
            "text/plain"
        }
    }

    /// One output line for `record`, newline included.
    pub fn format(&mut self, record: &LogRecord) -> String {
        if self.json {
            return match serde_json::to_string(record) {
                Ok(mut line) => {
                    line.push('\n');
                    line
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode log record");
                    String::new()
                }
            };
        }
        if !self.multi {
            return format!("{}\n", record.data);
        }

        self.name_width = self.name_width.max(record.name.chars().count());
        let width = self.name_width;
        match self.colors.as_mut() {
            Some(colors) => format!(
                "{}{:>width$}|{}{RESET}\n",
                colors.get(&record.name),
                record.name,
                record.data
            ),
            None => format!("{:>width$}|{}\n", record.name, record.data),
        }
    }
}
