//! Outreach: email sequences, scheduled social posts, and prospect ingestion.
//!
//! Each subcommand performs one bounded batch and exits; scheduling is left
//! to cron or a CI workflow.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use outreach_channels::{LinkedInChannel, SendGridChannel, SocialChannel, UnconfiguredSocialChannel};
use outreach_content::MessagesApiGenerator;
use outreach_core::types::ProspectFilter;
use outreach_core::AppConfig;
use outreach_runner::{ingest_path, BatchRunner, RunTotals, RunnerSettings, SocialRunner};
use outreach_sequence::{NextTouch, Schedule, SenderProfile, SequenceEngine, TemplateRegistry};
use outreach_store::{PostgrestStore, ProspectStore};

#[derive(Parser, Debug)]
#[command(name = "outreach")]
#[command(about = "Outreach sequences, scheduled social posts, and prospect ingestion")]
#[command(version)]
struct Cli {
    /// Hosted database URL (overrides config)
    #[arg(long, env = "SUPABASE_URL", global = true)]
    supabase_url: Option<String>,

    /// Hosted database service key (overrides config)
    #[arg(long, env = "SUPABASE_SERVICE_KEY", global = true, hide_env_values = true)]
    supabase_service_key: Option<String>,

    /// Email provider API key (overrides config)
    #[arg(long, env = "SENDGRID_API_KEY", global = true, hide_env_values = true)]
    sendgrid_api_key: Option<String>,

    /// Content generator API key (overrides config)
    #[arg(long, env = "ANTHROPIC_API_KEY", global = true, hide_env_values = true)]
    anthropic_api_key: Option<String>,

    /// Social network access token
    #[arg(long, env = "LINKEDIN_ACCESS_TOKEN", global = true, hide_env_values = true)]
    linkedin_access_token: Option<String>,

    /// Social network organization id
    #[arg(long, env = "LINKEDIN_ORG_ID", global = true)]
    linkedin_org_id: Option<String>,

    /// Prospects per run (overrides config)
    #[arg(long, env = "BATCH_SIZE", global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send the initial email to prospects who have not been contacted
    Send {
        /// Seconds between sends (overrides config)
        #[arg(long)]
        delay_secs: Option<u64>,
    },

    /// Send every follow-up step that has come due
    Followup {
        /// Seconds between sends (overrides config)
        #[arg(long)]
        delay_secs: Option<u64>,
    },

    /// Generate and publish social posts scheduled for now
    Social,

    /// Upsert prospects from a CSV file
    Upload {
        /// CSV with an `email` column
        path: PathBuf,

        /// Records per upsert request
        #[arg(long, default_value_t = outreach_runner::UPSERT_CHUNK)]
        chunk_size: usize,
    },

    /// Show when each active prospect is next due
    Schedule {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outreach=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    apply_overrides(&mut config, &cli);

    // Credentials are checked before any work starts.
    config.require_database()?;
    let store = Arc::new(PostgrestStore::new(&config.database)?);

    let failed = match cli.command {
        Commands::Send { delay_secs } => {
            let runner = batch_runner(&config, store)?;
            let summary = runner
                .run(
                    outreach_sequence::INITIAL_STEP,
                    config.sequence.batch_size,
                    send_delay(&config, delay_secs),
                )
                .await;
            println!(
                "Initial emails: sent {}, failed {}, fallbacks {}, success rate {:.1}%",
                summary.sent_count,
                summary.failed_count,
                summary.fallback_count,
                summary.success_rate()
            );
            if summary.state_update_failures > 0 {
                eprintln!(
                    "{} sent email(s) could not be recorded and may be repeated",
                    summary.state_update_failures
                );
            }
            summary.has_failures()
        }
        Commands::Followup { delay_secs } => {
            let runner = batch_runner(&config, store)?;
            let summaries = runner
                .run_followups(config.sequence.batch_size, send_delay(&config, delay_secs))
                .await;
            for summary in &summaries {
                println!(
                    "Step {}: eligible {}, sent {}, failed {}",
                    summary.step, summary.eligible, summary.sent_count, summary.failed_count
                );
            }
            let totals = RunTotals::from_runs(&summaries);
            println!(
                "Follow-ups: sent {}, failed {}, success rate {:.1}%",
                totals.sent_count,
                totals.failed_count,
                totals.success_rate()
            );
            totals.has_failures()
        }
        Commands::Social => {
            config.require_generator()?;
            let generator = Arc::new(MessagesApiGenerator::new(&config.generator)?);
            let channel: Arc<dyn SocialChannel> = match &config.social.access_token {
                Some(token) if config.social_configured() => {
                    Arc::new(LinkedInChannel::new(&config.social, token.clone())?)
                }
                _ => {
                    warn!("Social credentials not set, posts will be logged and marked failed");
                    Arc::new(UnconfiguredSocialChannel)
                }
            };
            let org_id = config.social.org_id.clone().unwrap_or_default();
            let runner = SocialRunner::new(store, generator, channel, org_id)
                .with_settings(RunnerSettings::from_config(&config));
            let summary = runner.run(&config.social.platform, Utc::now()).await;
            println!(
                "Social posts: posted {}, failed {}",
                summary.posted_count, summary.failed_count
            );
            summary.has_failures()
        }
        Commands::Upload { path, chunk_size } => {
            let summary = ingest_path(&path, store.as_ref(), chunk_size)
                .await
                .with_context(|| format!("ingesting {}", path.display()))?;
            println!(
                "Upload: read {}, uploaded {}, skipped {}, failed batches {}",
                summary.read, summary.uploaded, summary.skipped, summary.failed_batches
            );
            summary.failed_batches > 0
        }
        Commands::Schedule { limit } => {
            let engine = sequence_engine(&config)?;
            print_schedule(&engine, store.as_ref(), limit).await?;
            false
        }
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(url) = &cli.supabase_url {
        config.database.url = url.clone();
    }
    if let Some(key) = &cli.supabase_service_key {
        config.database.service_key = key.clone();
    }
    if let Some(key) = &cli.sendgrid_api_key {
        config.email.api_key = key.clone();
    }
    if let Some(key) = &cli.anthropic_api_key {
        config.generator.api_key = key.clone();
    }
    if let Some(token) = &cli.linkedin_access_token {
        config.social.access_token = Some(token.clone());
    }
    if let Some(org) = &cli.linkedin_org_id {
        config.social.org_id = Some(org.clone());
    }
    if let Some(size) = cli.batch_size {
        config.sequence.batch_size = size;
    }

    info!(
        batch_size = config.sequence.batch_size,
        send_delay_secs = config.sequence.send_delay_secs,
        from = %config.email.from_email,
        social_configured = config.social_configured(),
        "Configuration loaded"
    );
}

fn send_delay(config: &AppConfig, override_secs: Option<u64>) -> Duration {
    Duration::from_secs(override_secs.unwrap_or(config.sequence.send_delay_secs))
}

fn sequence_engine(config: &AppConfig) -> anyhow::Result<SequenceEngine> {
    let registry = match &config.sequence.templates_path {
        Some(path) => TemplateRegistry::from_path(path)
            .with_context(|| format!("loading templates from {path}"))?,
        None => TemplateRegistry::builtin(),
    };
    let sender = SenderProfile {
        name: config.email.from_name.clone(),
        email: config.email.from_email.clone(),
        cta_url: config.sequence.cta_url.clone(),
    };
    Ok(SequenceEngine::new(Schedule::standard(), registry, sender)?)
}

fn batch_runner(config: &AppConfig, store: Arc<PostgrestStore>) -> anyhow::Result<BatchRunner> {
    config.require_email()?;
    config.require_generator()?;

    let engine = Arc::new(sequence_engine(config)?);
    let generator = Arc::new(MessagesApiGenerator::new(&config.generator)?);
    let channel = Arc::new(SendGridChannel::new(&config.email)?);

    Ok(BatchRunner::new(engine, store, generator, channel)
        .with_settings(RunnerSettings::from_config(config)))
}

async fn print_schedule(
    engine: &SequenceEngine,
    store: &dyn ProspectStore,
    limit: usize,
) -> anyhow::Result<()> {
    let filter = ProspectFilter {
        replied: Some(false),
        limit: Some(limit),
        ..Default::default()
    };
    let prospects = store.query(&filter).await?;
    let now = Utc::now();

    for prospect in &prospects {
        let next = match engine.next_touch(prospect) {
            NextTouch::DueNow => "initial email due now".to_string(),
            NextTouch::DueAt { step, at } if at <= now => format!("step {step} due now"),
            NextTouch::DueAt { step, at } => format!("step {step} due {}", at.to_rfc3339()),
            NextTouch::Unscheduled { step: 1 } => {
                "initial email blocked: flagged sent at step 0".to_string()
            }
            NextTouch::Unscheduled { step } => {
                format!("step {step} blocked: previous send has no timestamp")
            }
            NextTouch::Finished => "sequence complete".to_string(),
            NextTouch::Replied => "replied".to_string(),
        };
        println!("{:<40} step {}  {}", prospect.email, prospect.sequence_step, next);
    }
    println!("{} prospect(s)", prospects.len());
    Ok(())
}
