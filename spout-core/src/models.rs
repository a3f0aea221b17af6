use crate::error::{Result, SpoutError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the abbreviated container id used for matching and lookups.
pub const SHORT_ID_LEN: usize = 12;

/// Returns the first [`SHORT_ID_LEN`] characters of a container id.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// A running container tracked by the attach manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
}

impl Container {
    /// Builds a handle; the runtime reports names as `/name`, the slash is dropped.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            name: name.trim_start_matches('/').to_string(),
        }
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// One line of container output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogRecord {
    pub id: String,
    pub name: String,
    /// Stream type, `stdout` or `stderr`.
    #[serde(rename = "type")]
    pub stream: String,
    pub data: String,
    pub time: DateTime<Utc>,
}

impl LogRecord {
    pub fn new(container: &Container, stream: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: container.id.clone(),
            name: container.name.clone(),
            stream: stream.into(),
            data: data.into(),
            time: Utc::now(),
        }
    }
}

/// External endpoint a route forwards to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Target {
    #[serde(rename = "type", alias = "Type", default)]
    pub kind: String,
    #[serde(alias = "Addr", default)]
    pub addr: String,
}

impl Target {
    pub fn new(kind: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            addr: addr.into(),
        }
    }

    /// Parses `scheme://host:port` into a target; the scheme names the target type.
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = url::Url::parse(raw)
            .map_err(|e| SpoutError::InvalidRoute(format!("invalid target url '{raw}': {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| SpoutError::InvalidRoute(format!("target url '{raw}' has no host")))?;
        let addr = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self::new(url.scheme(), addr))
    }
}

/// Persisted forwarding rule.
///
/// Input accepts the capitalised field names older clients send
/// (`{"Target":{"Type":"syslog","Addr":"…"}}`); output is always lowercase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Route {
    #[serde(default, alias = "ID", alias = "Id")]
    pub id: String,
    #[serde(alias = "Target")]
    pub target: Target,
    /// Accepted stream types; empty accepts every type.
    #[serde(default, alias = "Types", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
}

impl Route {
    pub fn new(target: Target) -> Self {
        Self {
            id: String::new(),
            target,
            types: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// An empty type list means every stream type is forwarded.
    pub fn accepts(&self, stream: &str) -> bool {
        self.types.is_empty() || self.types.iter().any(|t| t == stream)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.target.kind.trim().is_empty() {
            return Err(SpoutError::InvalidRoute("target type is required".into()));
        }
        if self.target.addr.trim().is_empty() {
            return Err(SpoutError::InvalidRoute("target addr is required".into()));
        }
        Ok(())
    }
}

/// Generates a route id: 12 lowercase hex characters.
pub(crate) fn new_route_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(SHORT_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates() {
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn container_name_drops_slash() {
        let c = Container::new("0123456789abcdef", "/web_v1.web.1");
        assert_eq!(c.name, "web_v1.web.1");
        assert_eq!(c.short_id(), "0123456789ab");
    }

    #[test]
    fn route_accepts_capitalised_body() {
        let route: Route =
            serde_json::from_str(r#"{"Target":{"Type":"syslog","Addr":"10.0.0.1:514"}}"#).unwrap();
        assert_eq!(route.target, Target::new("syslog", "10.0.0.1:514"));
        assert!(route.id.is_empty());
        assert!(route.types.is_empty());
    }

    #[test]
    fn route_serializes_lowercase_and_omits_empty_types() {
        let route = Route::new(Target::new("syslog", "h:514")).with_id("abc");
        let value = serde_json::to_value(&route).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"id": "abc", "target": {"type": "syslog", "addr": "h:514"}})
        );
    }

    #[test]
    fn record_uses_type_field() {
        let c = Container::new("0123456789abcdef", "web");
        let value = serde_json::to_value(LogRecord::new(&c, "stderr", "boom")).unwrap();
        assert_eq!(value["type"], "stderr");
        assert_eq!(value["data"], "boom");
        assert_eq!(value["name"], "web");
    }

    #[test]
    fn empty_types_accept_everything() {
        let route = Route::new(Target::new("syslog", "h:514"));
        assert!(route.accepts("stdout"));
        assert!(route.accepts("stderr"));

        let stdout_only = route.with_types(["stdout"]);
        assert!(stdout_only.accepts("stdout"));
        assert!(!stdout_only.accepts("stderr"));
    }

    #[test]
    fn target_from_url() {
        let target = Target::from_url("syslog://10.0.0.1:514").unwrap();
        assert_eq!(target, Target::new("syslog", "10.0.0.1:514"));
        assert!(Target::from_url("not a url").is_err());
    }

    #[test]
    fn validate_requires_type_and_addr() {
        assert!(Route::new(Target::new("", "h:1")).validate().is_err());
        assert!(Route::new(Target::new("syslog", "")).validate().is_err());
        assert!(Route::new(Target::new("syslog", "h:1")).validate().is_ok());
    }

    #[test]
    fn generated_ids_are_short_and_unique() {
        let a = new_route_id();
        let b = new_route_id();
        assert_eq!(a.len(), SHORT_ID_LEN);
        assert_ne!(a, b);
    }
}
