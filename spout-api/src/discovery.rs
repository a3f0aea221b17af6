//! One-shot lookup of the default syslog target in etcd (v2 keys API).

use anyhow::Context;
use serde::Deserialize;
use spout_core::Target;
use std::time::Duration;

pub const ETCD_PORT: u16 = 4001;
const HOST_KEY: &str = "/deis/logs/host";
const PORT_KEY: &str = "/deis/logs/port";
const DIAL_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct KeyResponse {
    node: KeyNode,
}

#[derive(Debug, Deserialize)]
struct KeyNode {
    value: String,
}

/// Resolves the syslog target published under `ETCD_HOST`.
pub async fn etcd_target(etcd_host: &str) -> anyhow::Result<Target> {
    syslog_target(&format!("http://{etcd_host}:{ETCD_PORT}")).await
}

/// Reads the host and port keys from the etcd endpoint at `base_url`.
pub async fn syslog_target(base_url: &str) -> anyhow::Result<Target> {
    let client = reqwest::Client::builder()
        .connect_timeout(DIAL_TIMEOUT)
        .timeout(DIAL_TIMEOUT)
        .build()?;
    let host = get_key(&client, base_url, HOST_KEY).await?;
    let port = get_key(&client, base_url, PORT_KEY).await?;
    Ok(Target::new("syslog", format!("{host}:{port}")))
}

async fn get_key(client: &reqwest::Client, base_url: &str, key: &str) -> anyhow::Result<String> {
    let url = format!("{}/v2/keys{key}", base_url.trim_end_matches('/'));
    let resp: KeyResponse = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("request {url}"))?
        .error_for_status()
        .with_context(|| format!("read key {key}"))?
        .json()
        .await
        .with_context(|| format!("decode key {key}"))?;
    Ok(resp.node.value)
}
