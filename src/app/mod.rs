pub mod extract;
pub mod handlers;
pub mod report;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;

pub use routes::router;
pub use server::{serve, shutdown_signal};
pub use state::{AppState, SharedState};
