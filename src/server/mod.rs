mod collection_routes;
pub mod config;
mod requests_logging;
mod response;
pub mod server;
pub mod state;
pub(self) mod stream_track;
mod track_routes;
mod upload_routes;

pub use config::ServerConfig;
pub use requests_logging::{log_requests, RequestsLoggingLevel};
pub use server::{make_app, run_server};
