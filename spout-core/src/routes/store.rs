use crate::error::Result;
use crate::models::Route;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Durable whole-table storage for routes.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Every persisted route; an absent table is empty.
    async fn load(&self) -> Result<Vec<Route>>;
    /// Replaces the persisted table.
    async fn save(&self, routes: &[Route]) -> Result<()>;
}

/// JSON array of routes in a single file.
#[derive(Debug, Clone)]
pub struct RouteFileStore {
    path: PathBuf,
}

impl RouteFileStore {
    pub const FILE_NAME: &'static str = "routes.json";

    /// A directory keeps `routes.json` inside it; any other path is the file itself.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let path = if path.is_dir() {
            path.join(Self::FILE_NAME)
        } else {
            path.to_path_buf()
        };
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl RouteStore for RouteFileStore {
    async fn load(&self) -> Result<Vec<Route>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    async fn save(&self, routes: &[Route]) -> Result<()> {
        let data = serde_json::to_vec_pretty(routes)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
