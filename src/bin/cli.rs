//! Lectio CLI
//!
//! Local execution entry point. For AWS Lambda, use `lectio-lambda`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use lectio::{
    error::Result,
    models::{Artifact, Config, DeliveryMode, SectionKind},
    pipeline::{self, chat_deliveries},
    services::{Dispatcher, MessageSink, ProviderClient, ReadingsService, TelegramSink},
    storage::{LocalSubscriberStore, Recipients, Subscriber, SubscriberStore},
    utils::{self, http},
};

/// Lectio - Daily Readings Delivery
#[derive(Parser, Debug)]
#[command(
    name = "lectio",
    version,
    about = "Fetches the daily liturgical readings and delivers them to subscribers"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print the readings of a day
    Fetch {
        /// Day as YYYY-MM-DD (default: today)
        #[arg(long)]
        day: Option<NaiveDate>,

        /// Only this section (gospel, first_lecture, psalm, second_lecture)
        #[arg(long)]
        section: Option<SectionKind>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Deliver the readings of a day to every subscriber
    Notify {
        /// Day as YYYY-MM-DD (default: today)
        #[arg(long)]
        day: Option<NaiveDate>,

        /// Print what would be sent without sending
        #[arg(long)]
        dry_run: bool,
    },

    /// Add a chat to the subscriber list
    Subscribe {
        chat_id: String,

        #[arg(long, default_value = "daily")]
        kind: String,
    },

    /// Remove a chat from the subscriber list
    Unsubscribe { chat_id: String },

    /// List subscribers
    Subscribers,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config);
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Loaded configuration from {}", cli.config.display());
    let store = LocalSubscriberStore::new(&config.subscribers.path);

    match cli.command {
        Command::Fetch { day, section, json } => {
            let day = day.unwrap_or_else(utils::today);
            let readings = readings_service(&config)?;
            let cancel = utils::deadline(config.provider.deadline());

            match section {
                Some(kind) => {
                    let artifact = readings.section(kind, day, &cancel).await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&artifact)?);
                    } else {
                        print_artifact(kind, &artifact);
                    }
                }
                None => {
                    let bundle = readings.readings(day, &cancel).await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&bundle)?);
                    } else {
                        println!("{}\n", bundle.day);
                        print_artifact(SectionKind::FirstLecture, &bundle.first_lecture);
                        print_artifact(SectionKind::Psalm, &bundle.psalm);
                        if let Some(second) = &bundle.second_lecture {
                            print_artifact(SectionKind::SecondLecture, second);
                        }
                        print_artifact(SectionKind::Gospel, &bundle.gospel);
                    }
                }
            }
            cancel.cancel();
        }

        Command::Notify { day, dry_run } => {
            let day = day.unwrap_or_else(utils::today);
            let readings = readings_service(&config)?;

            if dry_run {
                let cancel = utils::deadline(config.provider.deadline());
                let bundle = readings.readings(day, &cancel).await?;
                cancel.cancel();

                let chat_ids = store.chat_ids().await?;
                let deliveries = chat_deliveries(&bundle, &chat_ids);
                log::info!(
                    "Dry run: {} message(s) to each of {} recipient(s)",
                    deliveries.first().map_or(0, |d| d.messages.len()),
                    deliveries.len()
                );
                if let Some(delivery) = deliveries.first() {
                    for message in &delivery.messages {
                        println!("{message}\n---");
                    }
                }
                return Ok(());
            }

            let sink = delivery_sink(&config).await?;
            let cancel = utils::deadline(config.provider.deadline());
            let outcome = pipeline::notify(
                &readings,
                &store,
                sink.as_ref(),
                &Dispatcher::from_config(&config.delivery),
                config.delivery.mode,
                day,
                &cancel,
            )
            .await;
            cancel.cancel();
            let outcome = outcome?;

            log::info!(
                "Notified {} of {} recipient(s) with '{}'",
                outcome.report.served_recipients().len(),
                outcome.recipients,
                outcome.day
            );
            outcome.report.into_result()?;
        }

        Command::Subscribe { chat_id, kind } => {
            if store.subscribe(Subscriber::new(&chat_id, kind)).await? {
                log::info!("Subscribed {}", chat_id);
            } else {
                log::warn!("{} is already subscribed", chat_id);
            }
        }

        Command::Unsubscribe { chat_id } => {
            if store.unsubscribe(&chat_id).await? {
                log::info!("Unsubscribed {}", chat_id);
            } else {
                log::warn!("{} was not subscribed", chat_id);
            }
        }

        Command::Subscribers => {
            let subscribers = store.list().await?;
            log::info!(
                "{} subscriber(s) in {}",
                subscribers.len(),
                store.path().display()
            );
            for subscriber in subscribers {
                println!(
                    "{}\t{}\t{}",
                    subscriber.chat_id,
                    subscriber.kind,
                    subscriber.subscribed_at.to_rfc3339()
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (provider, cache, section patterns and selectors)");

            if config.delivery.mode == DeliveryMode::Telegram && config.telegram.bot_token.is_empty()
            {
                log::warn!("telegram.bot_token is empty; notify will fail");
            }
            log::info!("All validations passed!");
        }
    }

    Ok(())
}

fn readings_service(config: &Config) -> Result<ReadingsService<ProviderClient>> {
    config.validate()?;
    ReadingsService::from_config(ProviderClient::new(&config.provider)?, config)
}

async fn delivery_sink(config: &Config) -> Result<Box<dyn MessageSink>> {
    match config.delivery.mode {
        DeliveryMode::Telegram => {
            let client = http::create_async_client(&config.provider)?;
            Ok(Box::new(TelegramSink::new(&config.telegram, client)?))
        }
        #[cfg(feature = "sqs")]
        DeliveryMode::Queue => Ok(Box::new(
            lectio::services::QueueSink::from_config(&config.queue).await?,
        )),
        #[cfg(not(feature = "sqs"))]
        DeliveryMode::Queue => Err(lectio::error::AppError::config(
            "queue delivery requires building with the `sqs` feature",
        )),
    }
}

fn print_artifact(kind: SectionKind, artifact: &Artifact) {
    if artifact.title.is_empty() && artifact.content.is_empty() {
        println!("[{kind}] not published for this day\n");
        return;
    }
    println!("[{kind}] {}\n{}\n\n{}\n", artifact.title, artifact.reference, artifact.content);
}
