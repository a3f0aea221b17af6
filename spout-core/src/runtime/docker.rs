use super::*;
use crate::error::SpoutError;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, InspectContainerOptions,
    ListContainersOptions, LogOutput,
};
use bollard::system::EventsOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::future::ready;
use futures::StreamExt;
use std::collections::HashMap;

/// Request timeout for the docker client, in seconds.
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// Docker Engine API client.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to `unix://…`, `tcp://…` or `http://…` endpoints.
    pub fn connect(endpoint: &str) -> Result<Self> {
        let docker = if let Some(path) = endpoint.strip_prefix("unix://") {
            Self::connect_unix(path)?
        } else if let Some(addr) = endpoint.strip_prefix("tcp://") {
            Docker::connect_with_http(
                &format!("http://{addr}"),
                CLIENT_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            )?
        } else if endpoint.starts_with("http://") {
            Docker::connect_with_http(endpoint, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
        } else {
            return Err(SpoutError::Other(format!(
                "unsupported docker endpoint: {endpoint}"
            )));
        };
        Ok(Self { docker })
    }

    #[cfg(unix)]
    fn connect_unix(path: &str) -> Result<Docker> {
        Ok(Docker::connect_with_unix(
            path,
            CLIENT_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )?)
    }

    #[cfg(not(unix))]
    fn connect_unix(path: &str) -> Result<Docker> {
        Err(SpoutError::Other(format!(
            "unix sockets are not supported on this platform: {path}"
        )))
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self) -> Result<Vec<Container>> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(options)).await?;
        Ok(summaries
            .into_iter()
            .filter_map(|s| {
                let id = s.id?;
                let name = s
                    .names
                    .and_then(|names| names.into_iter().next())
                    .unwrap_or_default();
                Some(Container::new(id, name))
            })
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<Container> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        Ok(Container::new(
            info.id.unwrap_or_else(|| id.to_string()),
            info.name.unwrap_or_default(),
        ))
    }

    async fn events(&self) -> Result<EventStream> {
        let mut filters = HashMap::new();
        filters.insert("type".to_string(), vec!["container".to_string()]);
        let options = EventsOptions::<String> {
            filters,
            ..Default::default()
        };
        let stream = self.docker.events(Some(options)).filter_map(|item| {
            ready(match item {
                Ok(event) => {
                    let id = event.actor.and_then(|a| a.id);
                    match (event.action.as_deref(), id) {
                        (Some("start"), Some(id)) => Some(Ok(RuntimeEvent::Started { id })),
                        (Some("die") | Some("stop"), Some(id)) => {
                            Some(Ok(RuntimeEvent::Stopped { id }))
                        }
                        _ => None,
                    }
                }
                Err(e) => Some(Err(SpoutError::from(e))),
            })
        });
        Ok(stream.boxed())
    }

    async fn attach(&self, id: &str) -> Result<ChunkStream> {
        let options = AttachContainerOptions::<String> {
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            logs: Some(false),
            ..Default::default()
        };
        let AttachContainerResults { output, .. } =
            self.docker.attach_container(id, Some(options)).await?;
        let stream = output.filter_map(|item| {
            ready(match item {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                    Some(Ok(LogChunk::stdout(message.to_vec())))
                }
                Ok(LogOutput::StdErr { message }) => Some(Ok(LogChunk::stderr(message.to_vec()))),
                Ok(LogOutput::StdIn { .. }) => None,
                Err(e) => Some(Err(SpoutError::from(e))),
            })
        });
        Ok(stream.boxed())
    }
}
