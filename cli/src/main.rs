//! APort command-line client.
//!
//! Verifies agents, manages passports, and browses policy packs against the
//! APort service, or against the in-process mock with `--mock`. The `demo`
//! subcommand runs the bundled walk-throughs on the mock.
//!
//! Usage:
//!   aport verify payments.refund.v1 ap_128094d3 --context '{"amount": 50}'
//!   aport --api-key ak_... passport suspend agt_1 --reason fraud
//!   aport --mock policies list
//!   aport demo run-all
//!
//! Exit codes: 0 success, 1 error, 2 verification denied.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use aport_contracts::{
    decision::VerificationResult,
    error::{AportError, AportResult},
    passport::{CapabilityGrant, Passport},
    request::Context,
};
use aport_core::{with_retry, CallOptions, ClientConfig, RetryPolicy, VerificationClient};
use aport_mock::{
    scenarios::{self, error_handling, refund, workflow, ScenarioError},
    MockTransport,
};

const EXIT_ERROR: i32 = 1;
const EXIT_DENIED: i32 = 2;

// ── CLI definition ───────────────────────────────────────────────────────────

/// APort agent verification client.
#[derive(Parser)]
#[command(
    name = "aport",
    about = "Verify AI agents against APort policy packs",
    long_about = "Verifies agent passports against APort policy packs, manages passports,\n\
                  and lists policy packs. Configuration comes from APORT_API_KEY,\n\
                  APORT_BASE_URL and APORT_TIMEOUT_MS (or --config), overridden by flags."
)]
struct Cli {
    /// Service root, e.g. https://api.aport.io
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// API key for issue, suspend, and direct passport lookup.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Per-call timeout in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// TOML config file (api_key, base_url, timeout_ms) used instead of the environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Answer from the in-process mock service instead of the network.
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Client(ClientCommand),
    /// Run the bundled demo scenarios against the mock service.
    #[command(subcommand)]
    Demo(DemoCommand),
}

/// Commands that talk to the verification service.
#[derive(Subcommand)]
enum ClientCommand {
    /// Verify an agent against a policy pack.
    Verify {
        policy: String,
        agent_id: String,
        /// Context as a JSON object.
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        idempotency_key: Option<String>,
        /// Retry network and 5xx failures up to this many extra times.
        #[arg(long, default_value_t = 0)]
        retries: usize,
    },
    /// Passport operations.
    #[command(subcommand)]
    Passport(PassportCommand),
    /// Policy pack catalogue.
    #[command(subcommand)]
    Policies(PoliciesCommand),
}

#[derive(Subcommand)]
enum PassportCommand {
    /// Look a passport up.
    Get { agent_id: String },
    /// Issue a new passport (requires an API key).
    Create {
        agent_id: String,
        #[arg(long)]
        name: String,
        /// Capability id; repeat for more.
        #[arg(long = "capability")]
        capabilities: Vec<String>,
        /// Region code; repeat for more.
        #[arg(long = "region")]
        regions: Vec<String>,
    },
    /// Suspend a passport (requires an API key).
    Suspend {
        agent_id: String,
        #[arg(long)]
        reason: String,
    },
}

#[derive(Subcommand)]
enum PoliciesCommand {
    /// List available policy packs.
    List,
    /// Show one policy pack.
    Show { pack_id: String },
}

#[derive(Subcommand)]
enum DemoCommand {
    /// Run all three scenarios in sequence.
    RunAll,
    /// Scenario 1: refund check (allow, denial, suspended passport).
    Refund,
    /// Scenario 2: checkpoint-guarded workflow.
    Workflow,
    /// Scenario 3: retries, guard modes, and error kinds.
    ErrorHandling,
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for request-level output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let code = match &cli.command {
        Command::Demo(demo) => run_demo(demo).await,
        Command::Client(command) => match run(&cli, command).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error [{}]: {}", e.kind(), e);
                EXIT_ERROR
            }
        },
    };

    std::process::exit(code);
}

fn build_client(cli: &Cli) -> AportResult<VerificationClient> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(api_key) = &cli.api_key {
        config.api_key = Some(api_key.clone());
    }
    if let Some(ms) = cli.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    }

    if cli.mock {
        debug!("using in-process mock service");
        VerificationClient::new(config, Arc::new(MockTransport::new()))
    } else {
        VerificationClient::with_http(config)
    }
}

async fn run(cli: &Cli, command: &ClientCommand) -> AportResult<i32> {
    let client = build_client(cli)?;

    match command {
        ClientCommand::Verify {
            policy,
            agent_id,
            context,
            idempotency_key,
            retries,
        } => {
            let context = parse_context(context.as_deref())?;
            let mut options = CallOptions::default();
            if let Some(key) = idempotency_key {
                options = options.with_idempotency_key(key.clone());
            }
            let retry = RetryPolicy {
                max_attempts: retries + 1,
                ..RetryPolicy::default()
            };

            let result = with_retry(&retry, || client.verify_with(policy, agent_id, &context, &options)).await?;
            print_verification(policy, agent_id, &result);
            Ok(if result.verified { 0 } else { EXIT_DENIED })
        }

        ClientCommand::Passport(PassportCommand::Get { agent_id }) => {
            print_json(&client.get_passport(agent_id).await?);
            Ok(0)
        }

        ClientCommand::Passport(PassportCommand::Create {
            agent_id,
            name,
            capabilities,
            regions,
        }) => {
            let mut passport = Passport::new(agent_id.as_str(), name.as_str());
            passport.capabilities = capabilities.iter().map(CapabilityGrant::new).collect();
            passport.regions = regions.clone();
            let created = client.create_passport(&passport).await?;
            println!("Passport issued for {} [{}]", created.agent_id, created.status);
            print_json(&created);
            Ok(0)
        }

        ClientCommand::Passport(PassportCommand::Suspend { agent_id, reason }) => {
            let outcome = client.suspend_passport(agent_id, reason).await?;
            if outcome.success {
                println!("Passport for {} suspended.", agent_id);
                Ok(0)
            } else {
                eprintln!("Service did not confirm the suspension of {}.", agent_id);
                Ok(EXIT_ERROR)
            }
        }

        ClientCommand::Policies(PoliciesCommand::List) => {
            let packs = client.list_policy_packs().await?;
            for pack in &packs {
                println!(
                    "{:<26} {:<8} {}",
                    pack.id,
                    pack.version.as_deref().unwrap_or("-"),
                    pack.name
                );
            }
            println!("{} policy pack(s)", packs.len());
            Ok(0)
        }

        ClientCommand::Policies(PoliciesCommand::Show { pack_id }) => {
            print_json(&client.get_policy_pack(pack_id).await?);
            Ok(0)
        }
    }
}

async fn run_demo(command: &DemoCommand) -> i32 {
    print_banner();

    let result = match command {
        DemoCommand::RunAll => scenarios::run_all().await,
        DemoCommand::Refund => refund::run_scenario().await,
        DemoCommand::Workflow => workflow::run_scenario().await,
        DemoCommand::ErrorHandling => error_handling::run_scenario().await,
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
            0
        }
        Err(ScenarioError::Client(e)) => {
            eprintln!("error [{}]: {}", e.kind(), e);
            EXIT_ERROR
        }
        Err(e) => {
            eprintln!("error [scenario]: {}", e);
            EXIT_ERROR
        }
    }
}

// ── Output ───────────────────────────────────────────────────────────────────

fn parse_context(raw: Option<&str>) -> AportResult<Context> {
    let Some(raw) = raw else {
        return Ok(Context::new());
    };
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(AportError::Validation {
            reason: "--context must be a JSON object".to_string(),
        }),
        Err(e) => Err(AportError::Validation {
            reason: format!("--context is not valid JSON: {}", e),
        }),
    }
}

fn print_verification(policy: &str, agent_id: &str, result: &VerificationResult) {
    let decision = &result.decision;
    println!("Verification Result:");
    println!("   Agent ID:    {}", agent_id);
    println!("   Policy:      {}", policy);
    println!("   Decision ID: {}", decision.decision_id);
    println!("   Status:      {}", if decision.allow { "ALLOWED" } else { "DENIED" });
    println!("   Expires In:  {} seconds", decision.expires_in_seconds);
    if let Some(level) = &decision.assurance_level {
        println!("   Assurance:   {}", level);
    }
    if !decision.allow {
        println!("   Reasons:     {}", decision.denial_summary());
    }
    if let Some(passport) = &result.passport {
        println!("   Passport:    {} [{}]", passport.name, passport.status);
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to render output: {}", e),
    }
}

fn print_banner() {
    println!();
    println!("APort Verification Demo");
    println!("=======================");
    println!();
    println!("Every protected action follows the same path:");
    println!("  [1] Resolve the agent id (header, query, body, or workflow state)");
    println!("  [2] POST /api/verify/policy/{{policy}} with the action's context");
    println!("  [3] allow -> proceed; deny -> block with the service's reasons");
    println!("  [4] No response -> an error, never an implicit allow or deny");
    println!();
}
