//! Renewal CLI
//!
//! Command-line interface for the lease-renewal policy engine. Drives the
//! engine against a YAML ledger fixture describing the policy, lease terms,
//! and payment histories.
//!
//! ## Usage
//!
//! ```bash
//! # Attempt an automatic renewal
//! renewal renew --ledger ledger.yaml --lease 1
//!
//! # Oracle-triggered manual evaluation
//! renewal evaluate --ledger ledger.yaml --lease 1 --caller ST1TEST
//!
//! # JSON output at a fixed block height
//! renewal renew --ledger ledger.yaml --lease 1 --at 100 --format json
//!
//! # Validate a rules document
//! renewal rules validate rules.yaml
//! ```
//!
//! ## Exit Codes
//!
//! - 0: renewed / evaluation ran
//! - 1: rejected (the taxonomy code is printed)
//! - 3: operational error (unreadable fixture, bad arguments)

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use renewal_core::{
    EngineError, LeaseId, LeaseRules, MemoryLeaseFactory, MemoryPaymentTracker, PaymentRecord,
    Policy, Principal, RenewalEngine, RenewalStatus, RuleStore,
};

/// Renewal: lease-renewal policy evaluation
#[derive(Parser)]
#[command(name = "renewal")]
#[command(version)]
#[command(about = "Evaluate lease renewals against payment-history rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attempt an automatic renewal for one lease
    Renew {
        /// Path to the ledger fixture (YAML)
        #[arg(short, long)]
        ledger: PathBuf,

        /// Lease to renew
        #[arg(long)]
        lease: LeaseId,

        /// Block height to evaluate at (overrides the fixture)
        #[arg(long)]
        at: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Explicit report timestamp (ISO 8601 / RFC 3339) for reproducible
        /// output. Example: --generated-at 2026-01-01T00:00:00Z
        #[arg(long, value_parser = parse_datetime)]
        generated_at: Option<DateTime<Utc>>,
    },

    /// Run an oracle-gated manual evaluation for one lease
    Evaluate {
        /// Path to the ledger fixture (YAML)
        #[arg(short, long)]
        ledger: PathBuf,

        /// Lease to evaluate
        #[arg(long)]
        lease: LeaseId,

        /// Calling principal (defaults to the fixture's oracle)
        #[arg(long)]
        caller: Option<String>,

        /// Block height to evaluate at (overrides the fixture)
        #[arg(long)]
        at: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Explicit report timestamp (ISO 8601 / RFC 3339)
        #[arg(long, value_parser = parse_datetime)]
        generated_at: Option<DateTime<Utc>>,
    },

    /// Show a lease's rules, history summary, and renewal status
    Status {
        /// Path to the ledger fixture (YAML)
        #[arg(short, long)]
        ledger: PathBuf,

        /// Lease to inspect
        #[arg(long)]
        lease: LeaseId,
    },

    /// Rules document commands
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// Validate a rules document
    Validate {
        /// Path to the rules file
        path: PathBuf,

        /// Grace ceiling to validate against
        #[arg(long, default_value_t = 30)]
        grace_ceiling: u64,
    },

    /// Show a rules document
    Show {
        /// Path to the rules file
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Parse ISO 8601 / RFC 3339 datetime string to DateTime<Utc>.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid datetime format: {}. Expected ISO 8601/RFC 3339 (e.g., 2026-01-01T00:00:00Z)", e))
}

/// One lease entry in the ledger fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseEntry {
    /// Current term, in term units.
    term: u64,

    /// Per-lease rules; absent means the lease rides the policy defaults.
    #[serde(default)]
    rules: Option<LeaseRules>,

    /// Carried-over renewal status, e.g. a suspension.
    #[serde(default)]
    status: Option<RenewalStatus>,

    /// Ordered payment history.
    #[serde(default)]
    payments: Vec<PaymentRecord>,
}

/// The ledger fixture the CLI drives the engine from.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerFixture {
    policy: Policy,

    #[serde(default)]
    leases: BTreeMap<LeaseId, LeaseEntry>,

    /// Block height at load time; `--at` overrides.
    #[serde(default)]
    block_height: u64,
}

impl LedgerFixture {
    fn load(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger from {:?}", path))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse ledger from {:?}", path))
    }

    /// Build an engine primed with this fixture's collaborators and rules.
    fn into_engine(self, at: Option<u64>) -> Result<RenewalEngine> {
        let mut payments = MemoryPaymentTracker::new();
        let mut leases = MemoryLeaseFactory::new();
        for (id, entry) in &self.leases {
            payments.set_history(*id, entry.payments.clone());
            leases.set_term(*id, entry.term);
        }

        let mut engine = RenewalEngine::builder(self.policy)
            .payment_tracker(payments)
            .lease_factory(leases)
            .block_height(at.unwrap_or(self.block_height))
            .build();

        for (id, entry) in self.leases {
            if let Some(rules) = entry.rules {
                engine.set_lease_rules(id, rules).map_err(|e| {
                    anyhow!("lease {}: rules rejected: {} (code {})", id, e, e.code())
                })?;
            }
            if let Some(status) = entry.status {
                engine.prime_status(id, status);
            }
        }
        Ok(engine)
    }
}

/// Machine-readable verdict for `renew` and `evaluate`.
#[derive(Debug, Serialize)]
struct Report {
    lease: LeaseId,
    block_height: u64,
    verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_term: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<RenewalStatus>,
    generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Verdict {
    Renewed,
    NotRenewed,
    Rejected,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    match run() {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Renew {
            ledger,
            lease,
            at,
            format,
            generated_at,
        } => renew_command(ledger, lease, at, format, generated_at),

        Commands::Evaluate {
            ledger,
            lease,
            caller,
            at,
            format,
            generated_at,
        } => evaluate_command(ledger, lease, caller, at, format, generated_at),

        Commands::Status { ledger, lease } => status_command(ledger, lease),

        Commands::Rules { action } => match action {
            RulesAction::Validate {
                path,
                grace_ceiling,
            } => validate_rules(path, grace_ceiling),
            RulesAction::Show { path } => show_rules(path),
        },
    }
}

fn renew_command(
    ledger: PathBuf,
    lease: LeaseId,
    at: Option<u64>,
    format: OutputFormat,
    generated_at: Option<DateTime<Utc>>,
) -> Result<ExitCode> {
    let mut engine = LedgerFixture::load(&ledger)?.into_engine(at)?;
    let block_height = engine.block_height();

    let (verdict, new_term, error_code) = match engine.check_and_renew(lease) {
        Ok(term) => (Verdict::Renewed, Some(term), None),
        Err(err) => (Verdict::Rejected, None, Some(err.code())),
    };

    let report = Report {
        lease,
        block_height,
        verdict,
        new_term,
        error_code,
        status: engine.renewal_status(lease).cloned(),
        generated_at: generated_at.unwrap_or_else(Utc::now),
    };
    print_report(&report, format)?;

    Ok(match report.verdict {
        Verdict::Renewed => ExitCode::from(0),
        _ => ExitCode::from(1),
    })
}

fn evaluate_command(
    ledger: PathBuf,
    lease: LeaseId,
    caller: Option<String>,
    at: Option<u64>,
    format: OutputFormat,
    generated_at: Option<DateTime<Utc>>,
) -> Result<ExitCode> {
    let fixture = LedgerFixture::load(&ledger)?;
    let caller = caller
        .map(Principal::new)
        .unwrap_or_else(|| fixture.policy.oracle.clone());
    let mut engine = fixture.into_engine(at)?;
    let block_height = engine.block_height();

    let (verdict, error_code) = match engine.manual_evaluation(&caller, lease) {
        Ok(true) => (Verdict::Renewed, None),
        Ok(false) => (Verdict::NotRenewed, None),
        Err(err) => (Verdict::Rejected, Some(err.code())),
    };

    let report = Report {
        lease,
        block_height,
        verdict,
        new_term: None,
        error_code,
        status: engine.renewal_status(lease).cloned(),
        generated_at: generated_at.unwrap_or_else(Utc::now),
    };
    print_report(&report, format)?;

    Ok(match report.verdict {
        Verdict::Renewed | Verdict::NotRenewed => ExitCode::from(0),
        Verdict::Rejected => ExitCode::from(1),
    })
}

fn print_report(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            match report.verdict {
                Verdict::Renewed => {
                    println!("RENEWED");
                    if let Some(term) = report.new_term {
                        println!();
                        println!("New term: {}", term);
                    }
                }
                Verdict::NotRenewed => {
                    println!("NOT RENEWED");
                    println!();
                    println!("Evaluation ran; the lease did not clear its threshold.");
                }
                Verdict::Rejected => {
                    println!("REJECTED");
                    if let Some(code) = report.error_code {
                        println!();
                        println!("Code: {}", code);
                    }
                }
            }
            if let Some(status) = &report.status {
                println!();
                println!("Last renewed: block {}", status.last_renewed);
                println!("Next eligible: block {}", status.next_eligible);
                println!("Extensions: {}", status.extensions);
            }
        }
    }
    Ok(())
}

fn status_command(ledger: PathBuf, lease: LeaseId) -> Result<ExitCode> {
    let fixture = LedgerFixture::load(&ledger)?;
    let entry = fixture
        .leases
        .get(&lease)
        .ok_or_else(|| anyhow!("lease {} not present in {:?}", lease, ledger))?;

    println!("Lease {}", lease);
    println!("Term: {}", entry.term);
    println!();

    match &entry.rules {
        Some(rules) => {
            println!("Rules:");
            println!("  Threshold: {}%", rules.threshold);
            println!("  Period: {} payments", rules.period);
            println!("  Extension: {} term units", rules.duration_extension);
            println!("  Min payments: {}", rules.min_payments);
            println!("  Grace days: {}", rules.grace_days);
        }
        None => {
            let defaults = fixture.policy.default_rules();
            println!(
                "Rules: defaults ({}% over {} payments)",
                defaults.threshold, defaults.period
            );
        }
    }
    println!();

    let on_time = entry.payments.iter().filter(|p| p.on_time).count();
    println!(
        "Payments: {} total, {} on time",
        entry.payments.len(),
        on_time
    );

    if let Some(status) = &entry.status {
        println!();
        println!("Renewal status:");
        println!("  Last renewed: block {}", status.last_renewed);
        println!("  Next eligible: block {}", status.next_eligible);
        println!("  Active: {}", status.active);
        println!("  Extensions: {}", status.extensions);
    }

    Ok(ExitCode::from(0))
}

fn validate_rules(path: PathBuf, grace_ceiling: u64) -> Result<ExitCode> {
    match load_and_check_rules(&path, grace_ceiling) {
        Ok(rules) => {
            println!("Rules are valid");
            println!();
            println!("Threshold: {}%", rules.threshold);
            println!("Period: {} payments", rules.period);
            println!(
                "Grace days: {} (ceiling {})",
                rules.grace_days, grace_ceiling
            );
            Ok(ExitCode::from(0))
        }
        Err(e) => {
            eprintln!("Rules validation failed: {} (code {})", e, e.code());
            Ok(ExitCode::from(1))
        }
    }
}

/// Parse a rules document and run it through store validation.
fn load_and_check_rules(path: &PathBuf, grace_ceiling: u64) -> Result<LeaseRules, EngineError> {
    let rules = LeaseRules::from_yaml_file(path)?;
    // A scratch store applies the same write-time validation the engine does.
    let mut store = RuleStore::new();
    store.set(1, rules.clone(), grace_ceiling)?;
    Ok(rules)
}

fn show_rules(path: PathBuf) -> Result<ExitCode> {
    let rules = LeaseRules::from_yaml_file(&path)
        .map_err(|e| anyhow!("failed to load rules from {:?}: {} (code {})", path, e, e.code()))?;

    println!("Threshold: {}%", rules.threshold);
    println!("Period: {} payments", rules.period);
    println!("Extension: {} term units", rules.duration_extension);
    println!("Min payments: {}", rules.min_payments);
    println!("Grace days: {}", rules.grace_days);

    Ok(ExitCode::from(0))
}
