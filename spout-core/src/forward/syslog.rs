use super::*;
use chrono::format::{Item, StrftimeItems};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%Z";

/// `<app>_v<version>.<process>.<replica>`
static LOG_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9-]+)_(v[0-9]+)\.([a-z_-]+\.[0-9]+)$").expect("valid log name regex")
});

/// Syslog tag and pid for a container name.
///
/// Names following the application convention give `(app, "process.replica")`;
/// anything else is tagged with the whole name and pid `1`.
pub fn log_name(name: &str) -> (String, String) {
    match LOG_NAME_RE.captures(name) {
        Some(caps) => (caps[1].to_string(), caps[3].to_string()),
        None => (name.to_string(), "1".to_string()),
    }
}

/// `"{timestamp} {tag}[{pid}]: {data}"`
pub fn format_message(record: &LogRecord, datetime_format: &str) -> String {
    let (tag, pid) = log_name(&record.name);
    format!(
        "{} {}[{}]: {}",
        record.time.format(datetime_format),
        tag,
        pid,
        record.data
    )
}

fn is_valid_datetime_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// One UDP datagram per record. Sockets are cached per target address and
/// dropped after a failed send so the next record reconnects.
#[derive(Debug)]
pub struct SyslogForwarder {
    datetime_format: String,
    sockets: Mutex<HashMap<String, Arc<UdpSocket>>>,
}

impl SyslogForwarder {
    /// An unparseable format falls back to [`DEFAULT_DATETIME_FORMAT`].
    pub fn new(datetime_format: &str) -> Self {
        let datetime_format = if is_valid_datetime_format(datetime_format) {
            datetime_format.to_string()
        } else {
            tracing::warn!(
                format = datetime_format,
                fallback = DEFAULT_DATETIME_FORMAT,
                "invalid datetime format"
            );
            DEFAULT_DATETIME_FORMAT.to_string()
        };
        Self {
            datetime_format,
            sockets: Mutex::new(HashMap::new()),
        }
    }

    pub fn datetime_format(&self) -> &str {
        &self.datetime_format
    }

    async fn socket(&self, addr: &str) -> Result<Arc<UdpSocket>> {
        let mut sockets = self.sockets.lock().await;
        if let Some(socket) = sockets.get(addr) {
            return Ok(socket.clone());
        }
        let remote = tokio::net::lookup_host(addr).await?.next().ok_or_else(|| {
            crate::SpoutError::Other(format!("syslog address '{addr}' did not resolve"))
        })?;
        let local = if remote.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        let socket = Arc::new(socket);
        sockets.insert(addr.to_string(), socket.clone());
        tracing::debug!(addr, %remote, "syslog socket opened");
        Ok(socket)
    }
}

#[async_trait]
impl Forwarder for SyslogForwarder {
    async fn forward(&self, target: &Target, record: &LogRecord) -> Result<()> {
        let message = format_message(record, &self.datetime_format);
        let socket = self.socket(&target.addr).await?;
        if let Err(e) = socket.send(message.as_bytes()).await {
            self.sockets.lock().await.remove(&target.addr);
            return Err(e.into());
        }
        Ok(())
    }
}
