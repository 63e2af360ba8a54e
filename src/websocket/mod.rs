//! WebSocket connection handling and HTTP routing.

pub mod connection;
pub mod handler;
pub mod routes;

pub use handler::websocket_handler;
pub use routes::create_router;
