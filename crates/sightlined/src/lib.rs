//! sightlined: HTTP front end for the sightline analysis core.
//!
//! Routes decode JSON, run the core operations on a fixed worker pool and
//! return the results verbatim. See [`server::build_router`] for the route
//! table.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod worker;

pub use config::Config;
pub use server::{app, build_router, serve};
pub use state::AppState;
