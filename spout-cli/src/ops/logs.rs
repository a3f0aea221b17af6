//! Tail container output from the daemon, over chunked HTTP or a socket.

use super::ui::print_info;
use crate::client::handle_error;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use spout_core::{LogRecord, Source};
use std::io::{self, Write};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

/// What to tail and how to print it.
#[derive(Debug, Clone, Default)]
pub struct LogsArgs {
    pub id: Option<String>,
    pub name: Option<String>,
    pub filter: Option<String>,
    pub types: Vec<String>,
    pub json: bool,
    pub no_color: bool,
    pub ws: bool,
}

impl LogsArgs {
    fn source(&self) -> Source {
        Source::from_parts(
            self.id.as_deref(),
            self.name.as_deref(),
            self.filter.as_deref(),
        )
    }
}

/// Builds `/logs[/<predicate>:<value>]` with the query the chosen transport understands.
pub fn logs_url(base: &str, args: &LogsArgs) -> anyhow::Result<Url> {
    let selector = match args.source() {
        Source::Id(id) => format!("/id:{id}"),
        Source::Name(name) => format!("/name:{name}"),
        Source::Filter(filter) => format!("/filter:{filter}"),
        Source::All => String::new(),
    };
    let mut url = Url::parse(&format!("{}/logs{}", base.trim_end_matches('/'), selector))?;

    let mut pairs = Vec::new();
    if let Some(first) = args.types.first() {
        if args.ws {
            // socket sessions filter on a single type
            pairs.push(("type", first.clone()));
        } else {
            pairs.push(("types", args.types.join(",")));
        }
    }
    if args.no_color {
        pairs.push(("colors", "off".to_string()));
    }
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    if args.ws {
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("cannot use a socket with {base}"))?;
    }
    Ok(url)
}

/// Streams to stdout until the daemon closes the stream or Ctrl-C.
pub async fn stream_logs(
    client: &reqwest::Client,
    base: &str,
    args: &LogsArgs,
) -> anyhow::Result<()> {
    let url = logs_url(base, args)?;
    tracing::debug!(%url, ws = args.ws, "connecting");
    print_info(&format!("streaming {url}, Ctrl-C to stop"));
    let streaming = async {
        if args.ws {
            stream_socket(&url, args).await
        } else {
            stream_http(client, url, args).await
        }
    };
    tokio::select! {
        res = streaming => res,
        _ = tokio::signal::ctrl_c() => {
            print_info("log stream stopped");
            Ok(())
        }
    }
}

async fn stream_http(client: &reqwest::Client, url: Url, args: &LogsArgs) -> anyhow::Result<()> {
    let mut request = client.get(url);
    if args.json {
        request = request.header(ACCEPT, "application/json");
    }
    let resp = handle_error(request.send().await?).await?;
    let mut stream = resp.bytes_stream();
    let mut stdout = io::stdout();
    while let Some(chunk) = stream.next().await {
        stdout.write_all(&chunk?)?;
        stdout.flush()?;
    }
    Ok(())
}

async fn stream_socket(url: &Url, args: &LogsArgs) -> anyhow::Result<()> {
    let (ws_stream, _resp) = connect_async(url.as_str()).await?;
    let (_write, mut read) = ws_stream.split();
    let multi = args.source().is_multi();
    let mut stdout = io::stdout();
    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => {
                let line = if args.json {
                    text
                } else {
                    render_record(&serde_json::from_str::<LogRecord>(&text)?, multi)
                };
                writeln!(stdout, "{line}")?;
                stdout.flush()?;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

fn render_record(record: &LogRecord, multi: bool) -> String {
    if multi {
        format!("{}|{}", record.name, record.data)
    } else {
        record.data.clone()
    }
}
