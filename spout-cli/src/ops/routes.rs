//! Routing table operations.

use super::output::{print_json, OutputFormat};
use super::ui::{
    format_types, print_empty, print_hint, print_kv, print_section, print_success,
    print_table_header,
};
use crate::client::{endpoint, handle_error};
use crossterm::style::Stylize;
use spout_core::{Route, Target};

/// List routes.
pub async fn list_routes(
    client: &reqwest::Client,
    base: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let resp = client.get(endpoint(base, "routes")).send().await?;
    let routes: Vec<Route> = handle_error(resp).await?.json().await?;

    match output {
        OutputFormat::Json => print_json(&routes)?,
        OutputFormat::Table => {
            print_section("ROUTES");
            if routes.is_empty() {
                print_empty("No routes. Use 'add syslog://host:port' to create one.");
                return Ok(());
            }
            print_table_header(&[("ID", 14), ("TYPE", 10), ("ADDR", 28), ("TYPES", 16)]);
            for route in &routes {
                println!(
                    "  {} {:<10} {:<28} {}",
                    format!("{:<14}", route.id).cyan(),
                    route.target.kind,
                    route.target.addr,
                    format_types(&route.types)
                );
            }
            println!();
        }
    }
    Ok(())
}

/// Show one route.
pub async fn get_route(
    client: &reqwest::Client,
    base: &str,
    id: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let resp = client
        .get(endpoint(base, &format!("routes/{id}")))
        .send()
        .await?;
    let route: Route = handle_error(resp).await?.json().await?;
    match output {
        OutputFormat::Json => print_json(&route)?,
        OutputFormat::Table => print_route(&route),
    }
    Ok(())
}

/// Create a route from a target url such as `syslog://10.0.0.1:514`.
pub async fn add_route(
    client: &reqwest::Client,
    base: &str,
    target_url: &str,
    id: Option<String>,
    types: Vec<String>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let mut route = Route::new(Target::from_url(target_url)?).with_types(types);
    if let Some(id) = id {
        route = route.with_id(id);
    }
    let resp = client
        .post(endpoint(base, "routes"))
        .json(&route)
        .send()
        .await?;
    let stored: Route = handle_error(resp).await?.json().await?;
    match output {
        OutputFormat::Json => print_json(&stored)?,
        OutputFormat::Table => {
            print_success(&format!("route {} added", stored.id));
            print_route(&stored);
        }
    }
    Ok(())
}

/// Delete a route.
pub async fn remove_route(client: &reqwest::Client, base: &str, id: &str) -> anyhow::Result<()> {
    let resp = client
        .delete(endpoint(base, &format!("routes/{id}")))
        .send()
        .await?;
    handle_error(resp).await?;
    print_success(&format!("route {id} removed"));
    Ok(())
}

fn print_route(route: &Route) {
    print_section(&format!("ROUTE {}", route.id));
    print_kv("Type", &route.target.kind);
    print_kv("Addr", &route.target.addr);
    print_kv("Types", &format_types(&route.types));
    println!();
    print_hint(&format!("Use 'remove {}' to delete it", route.id));
}
