//! The `pin-bot` executable.
//!
//! Parses flags, sets up tracing, loads the pin settings and hands over to [`pin_bot::start`].

use clap::Parser;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use pin_bot::base::{config::Config, types::Void};
use tracing::info;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Pin-bot: `/pin` and `/unpin` for Slack channels.
///
/// When a channel runs out of pin space, the bot asks the requester whether the
/// oldest pin should go, and waits for a reaction on that prompt.
///
/// Settings come from `.hidden/config.toml` (or `--config`), overridden by
/// `PIN_BOT_*` environment variables, e.g. `PIN_BOT_CONFIRM_TIMEOUT_SECS=30`.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Log verbosity: none is INFO, -v is DEBUG, -vv is TRACE.
    ///
    /// DEBUG shows monitor registration and every prompt choice.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    init_tracing(args.verbose)?;

    let config = Config::load(args.config.as_deref())?;

    info!(
        "Prompts wait {}s for a choice, with :{}: to make room and :{}: to cancel; at most {} eviction round(s) per pin.",
        config.confirm_timeout_secs, config.remove_oldest_emoji, config.cancel_emoji, config.max_eviction_attempts
    );

    if !config.pin_channels.is_empty() {
        info!("Pinning limited to {} channel(s).", config.pin_channels.len());
    }

    pin_bot::start(config).await
}

/// Stdout logging plus an OTLP span exporter.
fn init_tracing(verbose: u8) -> Void {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Closing a pin flow span logs how long the request took.
    let stdout = tracing_subscriber::fmt::layer()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE);

    let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
    let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("pin-bot");
    let otel = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    Ok(())
}
