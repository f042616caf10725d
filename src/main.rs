use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use coderank::{db::Db, services::generator::HttpContentGenerator, xp::XpConfig, AppState};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// SQLite database URL, e.g. `sqlite://coderank.db`.
    #[clap(env)]
    database_url: String,

    /// The address to bind to.
    #[arg(short, long, env, default_value = "127.0.0.1:1414")]
    address: String,

    /// JSON file with level thresholds and XP rewards.
    #[arg(long, env)]
    xp_config: Option<PathBuf>,

    /// OpenAI-compatible chat completions URL. Content generation is
    /// disabled when unset.
    #[arg(long, env)]
    generator_url: Option<String>,

    #[arg(long, env, default_value = "")]
    generator_api_key: String,

    #[arg(long, env, default_value = "gpt-4o-mini")]
    generator_model: String,

    /// Include technical details in error responses.
    #[arg(long, env)]
    expose_error_details: bool,

    /// Email of an admin account to create on first start.
    #[arg(long, env)]
    bootstrap_admin: Option<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tracing=info,coderank=debug".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();

    let config = XpConfig::load(args.xp_config.as_deref())?;
    let db = Db::new(&args.database_url, config.levels()?).await?;

    // level thresholds may have changed since the last run
    db.recalculate_all_totals(Utc::now()).await?;

    if let Some(email) = &args.bootstrap_admin {
        if let Some(token) = db.bootstrap_admin(email, Utc::now()).await? {
            println!("bootstrap admin {email} created, token: {token}");
        }
    }

    if args.generator_url.is_none() {
        tracing::warn!("GENERATOR_URL not set, quiz and desafio generation disabled");
    }
    let generator = HttpContentGenerator::new(
        args.generator_url,
        args.generator_api_key,
        args.generator_model,
    );

    let state = AppState::new(db, config.rewards, generator, args.expose_error_details);
    let app = coderank::router(state);

    let listener = tokio::net::TcpListener::bind(&args.address).await?;
    tracing::info!("listening on {}", args.address);
    axum::serve(listener, app).await?;

    Ok(())
}
