//! Module implementing the sharehealth webserver.
//!
//! The main server application is implemented in the [`App`] struct, which sets up routing and
//! middleware. To listen to incoming connections and run the scheduler, use the [`server()`]
//! function.
//!
//! # Testing
//!
//! For end-to-end tests of the server, see the `sharehealth-test` crate, which provides utilities
//! to start a test server.

mod app;
mod middleware;
mod server;

pub use app::App;
pub use server::server;
