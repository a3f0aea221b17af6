mod logs;
mod output;
mod routes;
pub mod ui;

pub use logs::{stream_logs, LogsArgs};
pub use output::OutputFormat;
pub use routes::{add_route, get_route, list_routes, remove_route};
