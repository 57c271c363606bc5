use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use gigboard::config::AppConfig;
use gigboard::error::AppError;
use gigboard::store::MemoryStore;
use gigboard::telemetry;
use gigboard::workflows::alerts::TracingMessenger;
use gigboard::workflows::error_reports::ErrorReporter;
use gigboard::workflows::jobs::{
    format_compact, jobs_router, offer_deadline, JobLifecycle, JobRepository, JobsApi,
    RelationResolver, SelectionManager, SignatureCoordinator, DEFAULT_OFFER_WINDOW_DAYS,
};
use gigboard::workflows::notifications::{notification_router, Notifier};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Gigboard Engine",
    about = "Run the job lifecycle engine or inspect its scheduling rules from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Work out the response deadline for an offer sent on a given day
    Deadline(DeadlineArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct DeadlineArgs {
    /// Day the offer goes out (dd-mm-yyyy)
    #[arg(long, value_parser = parse_compact_date)]
    sent: NaiveDate,
    /// Working days the applicant gets to respond
    #[arg(long, default_value_t = DEFAULT_OFFER_WINDOW_DAYS)]
    working_days: u32,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Deadline(args) => {
            run_deadline(args);
            Ok(())
        }
    }
}

fn parse_compact_date(raw: &str) -> Result<NaiveDate, String> {
    gigboard::workflows::jobs::parse_compact(raw.trim())
        .map_err(|err| format!("failed to parse '{raw}' as dd-mm-yyyy ({err})"))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let store = Arc::new(MemoryStore::new());
    let messenger = Arc::new(TracingMessenger);
    let notifier = Arc::new(Notifier::new(Arc::clone(&store), &config.platform.name));

    let repo = JobRepository::new(Arc::clone(&store));
    let lifecycle = Arc::new(JobLifecycle::new(
        repo.clone(),
        Arc::clone(&notifier),
        Arc::clone(&messenger),
    ));
    let signatures = Arc::new(SignatureCoordinator::new(
        repo.clone(),
        Arc::clone(&notifier),
        Arc::clone(&messenger),
    ));
    let selection = Arc::new(SelectionManager::new(
        repo.clone(),
        Arc::clone(&notifier),
        Arc::clone(&messenger),
        Arc::clone(&lifecycle),
    ));
    let relations = Arc::new(RelationResolver::new(repo));
    let api = JobsApi {
        lifecycle,
        signatures,
        selection,
        relations,
        reporter: ErrorReporter::new(Arc::clone(&store)),
    };

    let ops = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state);

    let app = jobs_router(api)
        .merge(notification_router(notifier))
        .merge(ops)
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, platform = %config.platform.name, "job lifecycle engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_deadline(args: DeadlineArgs) {
    let sent = Utc.from_utc_datetime(&args.sent.and_time(NaiveTime::MIN));
    let deadline = offer_deadline(sent, args.working_days);

    println!("Offer sent:      {}", format_compact(args.sent));
    println!("Response window: {} working days", args.working_days);
    println!(
        "Deadline:        {} at end of day",
        format_compact(deadline.date_naive())
    );
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_dates_parse_for_the_cli() {
        let date = parse_compact_date(" 03-01-2025 ").expect("parses");
        assert_eq!(
            date,
            NaiveDate::from_ymd_opt(2025, 1, 3).expect("valid date")
        );
        assert!(parse_compact_date("2025-01-03").is_err());
    }

    #[test]
    fn offer_deadline_flows_through_the_cli_arguments() {
        let args = DeadlineArgs {
            sent: NaiveDate::from_ymd_opt(2025, 1, 3).expect("valid date"),
            working_days: 2,
        };
        let sent = Utc.from_utc_datetime(&args.sent.and_time(NaiveTime::MIN));
        let deadline = offer_deadline(sent, args.working_days);
        assert_eq!(
            deadline.date_naive(),
            NaiveDate::from_ymd_opt(2025, 1, 7).expect("valid date")
        );
    }
}
