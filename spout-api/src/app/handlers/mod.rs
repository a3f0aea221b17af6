mod health;
mod logs;
mod routes;
mod websocket;

pub use health::{handler_404, health};
pub use logs::{stream_all, stream_selected};
pub use routes::{create_route, delete_route, get_route, list_routes};
