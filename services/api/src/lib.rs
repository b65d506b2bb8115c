mod cli;
mod infra;
mod quote;
mod routes;
mod server;

use tea_quote::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
