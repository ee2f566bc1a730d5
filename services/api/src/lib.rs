//! Binary surface for the kost lifecycle service: CLI parsing, the
//! HTTP server, and an offline demo of the contract lifecycle.

mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use kost_core::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
