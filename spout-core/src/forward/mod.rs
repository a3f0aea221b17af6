//! Forwarders: deliver a record to an external target, keyed by target type.

use crate::error::Result;
use crate::models::{LogRecord, Target};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

mod syslog;

pub use syslog::{format_message, log_name, SyslogForwarder, DEFAULT_DATETIME_FORMAT};

/// Best-effort delivery of one record; errors are reported, never retried.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, target: &Target, record: &LogRecord) -> Result<()>;
}

/// Target type → forwarder.
#[derive(Default, Clone)]
pub struct Forwarders {
    by_type: HashMap<String, Arc<dyn Forwarder>>,
}

impl std::fmt::Debug for Forwarders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.by_type.keys().collect();
        kinds.sort();
        f.debug_struct("Forwarders").field("types", &kinds).finish()
    }
}

impl Forwarders {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in set: `syslog` with the given timestamp format.
    pub fn with_syslog(datetime_format: &str) -> Self {
        let mut forwarders = Self::new();
        forwarders.register("syslog", Arc::new(SyslogForwarder::new(datetime_format)));
        forwarders
    }

    pub fn register(&mut self, kind: impl Into<String>, forwarder: Arc<dyn Forwarder>) {
        self.by_type.insert(kind.into(), forwarder);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Forwarder>> {
        self.by_type.get(kind).cloned()
    }
}
