//! AWS Lambda entry point for Lectio
//!
//! Deploy with `cargo lambda build --release --features lambda`.
//! Configuration comes from `LECTIO_*` environment variables.

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, service_fn};
use lectio::lambda::{State, handler};
use lectio::models::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env()?;
    info!(
        "Lectio Lambda starting: delivery mode {}, {} static recipient(s)",
        config.delivery.mode,
        config.subscribers.chat_ids.len()
    );

    let state = Arc::new(State::from_config(config).await?);
    lambda_runtime::run(service_fn(move |event| handler(Arc::clone(&state), event))).await
}
