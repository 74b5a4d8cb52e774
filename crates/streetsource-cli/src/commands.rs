use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use streetsource_ledger::{
    LedgerCommands, LedgerEvent, LedgerQueries, TrustLedger, ViolationKind,
};
use streetsource_server::{parse_caller, ServerConfig, StreetSourceServer};
use streetsource_types::CallerId;

use crate::cli::*;

const DEFAULT_CONFIG: &str = "streetsource.toml";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Init(ref args) => cmd_init(args, &cli),
        Command::Identity(ref args) => cmd_identity(args, format),
        Command::Serve(ref args) => cmd_serve(args, &cli),
        Command::Check => cmd_check(&load_config(&cli)?, format),
        ref command => {
            let ledger = open_ledger(&load_config(&cli)?)?;
            run_ledger_command(command, &ledger, format)
        }
    }
}

fn run_ledger_command(
    command: &Command,
    ledger: &TrustLedger,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        Command::Register(args) => cmd_register(args, ledger, format),
        Command::Rate(args) => cmd_rate(args, ledger, format),
        Command::Verify(args) => cmd_set_verified(args, ledger, format, true),
        Command::Unverify(args) => cmd_set_verified(args, ledger, format, false),
        Command::Suppliers(args) => cmd_suppliers(args, ledger, format),
        Command::Show(args) => cmd_show(args, ledger, format),
        Command::Reviews(args) => cmd_reviews(args, ledger, format),
        Command::Stats => cmd_stats(ledger, format),
        Command::MyRatings(args) => cmd_my_ratings(args, ledger, format),
        Command::Events(args) => cmd_events(args, ledger, format),
        Command::Init(_) | Command::Identity(_) | Command::Check | Command::Serve(_) => {
            bail!("command does not operate on an open ledger")
        }
    }
}

/// Config file (explicit, or `./streetsource.toml` if present) plus flag
/// overrides.
fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => ServerConfig::load(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("failed to load config {DEFAULT_CONFIG}"))?,
        None => ServerConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.ledger.data_dir = dir.clone();
    }
    if let Some(owner) = &cli.owner {
        config.ledger.owner =
            Some(parse_caller(owner).with_context(|| format!("invalid --owner {owner}"))?);
    }
    Ok(config)
}

fn open_ledger(config: &ServerConfig) -> anyhow::Result<TrustLedger> {
    if config.ledger.owner.is_none() {
        bail!("ledger owner is not configured; pass --owner or set [ledger].owner");
    }
    TrustLedger::open(&config.ledger).with_context(|| {
        format!(
            "failed to open ledger in {}",
            config.ledger.data_dir.display()
        )
    })
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `450` → `4.50`.
fn stars(avg_rating: u64) -> String {
    format!("{}.{:02}", avg_rating / 100, avg_rating % 100)
}

fn cmd_init(args: &InitArgs, cli: &Cli) -> anyhow::Result<()> {
    if args.path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", args.path.display());
    }
    let mut config = ServerConfig::default();
    if let Some(dir) = &cli.data_dir {
        config.ledger.data_dir = dir.clone();
    }
    config.ledger.owner = Some(CallerId::account(args.owner_account.as_str()));
    std::fs::write(&args.path, config.to_toml_string()?)
        .with_context(|| format!("failed to write {}", args.path.display()))?;

    println!("{} Wrote {}", "✓".green().bold(), args.path.display().to_string().bold());
    println!("  Data dir: {}", config.ledger.data_dir.display());
    println!(
        "  Owner: {} ({})",
        args.owner_account.yellow(),
        CallerId::account(args.owner_account.as_str()).to_string().cyan()
    );
    Ok(())
}

fn cmd_identity(args: &IdentityArgs, format: OutputFormat) -> anyhow::Result<()> {
    let id = CallerId::account(args.account.as_str());
    match format {
        OutputFormat::Json => print_json(&json!({ "account": args.account, "id": id })),
        OutputFormat::Text => {
            println!("{} {}", args.account.bold(), id.to_string().cyan());
            println!("  {}", id.to_hex());
            Ok(())
        }
    }
}

fn cmd_register(
    args: &RegisterArgs,
    ledger: &TrustLedger,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let caller = CallerId::account(args.caller.account.as_str());
    let supplier = ledger.register_supplier(&args.name, &args.description, &args.contact, &caller)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&supplier)?),
        OutputFormat::Text => {
            println!(
                "{} Registered supplier {}",
                "✓".green().bold(),
                supplier.name.yellow().bold()
            );
            println!("  Registered by: {}", caller.to_string().cyan());
            println!("  At: {}", supplier.registration_time.to_rfc3339());
            Ok(())
        }
    }
}

fn cmd_rate(args: &RateArgs, ledger: &TrustLedger, format: OutputFormat) -> anyhow::Result<()> {
    let caller = CallerId::account(args.caller.account.as_str());
    let review = ledger.add_rating(&args.supplier, args.score, &args.comment, &caller)?;
    let rating = ledger.supplier_rating(&args.supplier)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "review": review, "rating": rating })),
        OutputFormat::Text => {
            println!(
                "{} Rated {} {}/5",
                "✓".green().bold(),
                review.supplier_name.yellow().bold(),
                review.score
            );
            println!(
                "  Average: {} ({} ratings)",
                stars(rating.avg_rating).bold(),
                rating.total_ratings
            );
            Ok(())
        }
    }
}

fn cmd_set_verified(
    args: &PrivilegedArgs,
    ledger: &TrustLedger,
    format: OutputFormat,
    verified: bool,
) -> anyhow::Result<()> {
    let caller = CallerId::account(args.caller.account.as_str());
    let changed = if verified {
        ledger.verify_supplier(&args.supplier, &caller)?
    } else {
        ledger.unverify_supplier(&args.supplier, &caller)?
    };
    match format {
        OutputFormat::Json => print_json(&json!({
            "supplier": args.supplier,
            "is_verified": verified,
            "changed": changed,
        })),
        OutputFormat::Text => {
            let state = if verified { "verified" } else { "unverified" };
            if changed {
                println!(
                    "{} {} is now {}",
                    "✓".green().bold(),
                    args.supplier.yellow().bold(),
                    state.green()
                );
            } else {
                println!("{} is already {}", args.supplier.yellow().bold(), state);
            }
            Ok(())
        }
    }
}

fn cmd_suppliers(
    args: &SuppliersArgs,
    ledger: &TrustLedger,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if args.summary {
        let summaries = ledger.supplier_summaries()?;
        if format == OutputFormat::Json {
            return print_json(&serde_json::to_value(&summaries)?);
        }
        if summaries.is_empty() {
            println!("No suppliers registered.");
        }
        for s in &summaries {
            let mark = if s.is_verified { "✓".green().bold() } else { " ".normal() };
            println!(
                "[{mark}] {}  {} ★ ({} ratings)",
                s.name.bold(),
                stars(s.avg_rating),
                s.total_ratings
            );
        }
        return Ok(());
    }

    let names = ledger.all_suppliers()?;
    match format {
        OutputFormat::Json => print_json(&json!(names)),
        OutputFormat::Text => {
            if names.is_empty() {
                println!("No suppliers registered.");
            }
            for name in &names {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn cmd_show(args: &SupplierArgs, ledger: &TrustLedger, format: OutputFormat) -> anyhow::Result<()> {
    let supplier = ledger.supplier_details(&args.name)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&supplier)?),
        OutputFormat::Text => {
            let status = if supplier.is_verified {
                "verified".green().bold()
            } else {
                "unverified".dimmed()
            };
            println!("{} ({status})", supplier.name.yellow().bold());
            println!("  Description: {}", supplier.description);
            println!("  Contact: {}", supplier.contact_info);
            println!("  Registered: {}", supplier.registration_time.to_rfc3339());
            println!(
                "  Rating: {} ★ ({} ratings)",
                stars(supplier.avg_rating()).bold(),
                supplier.total_ratings
            );
            Ok(())
        }
    }
}

fn cmd_reviews(
    args: &SupplierArgs,
    ledger: &TrustLedger,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let reviews = ledger.supplier_reviews(&args.name)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&reviews)?),
        OutputFormat::Text => {
            if reviews.is_empty() {
                println!("No reviews for {}.", args.name.yellow());
            }
            for r in &reviews {
                let badge = if r.verified { " [verified]".green() } else { "".normal() };
                println!(
                    "{}/5 by {}{badge}  {}",
                    r.score.to_string().bold(),
                    r.reviewer.to_string().cyan(),
                    r.timestamp.to_rfc3339().dimmed()
                );
                println!("  {}", r.comment);
            }
            Ok(())
        }
    }
}

fn cmd_stats(ledger: &TrustLedger, format: OutputFormat) -> anyhow::Result<()> {
    let stats = ledger.platform_stats()?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(stats)?),
        OutputFormat::Text => {
            println!("Suppliers: {}", stats.total_suppliers.to_string().bold());
            println!("Verified: {}", stats.total_verified_suppliers.to_string().green());
            println!("Ratings: {}", stats.total_ratings.to_string().bold());
            Ok(())
        }
    }
}

fn cmd_my_ratings(
    args: &CallerArgs,
    ledger: &TrustLedger,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let caller = CallerId::account(args.account.as_str());
    let names = ledger.user_ratings(&caller)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "caller": caller, "suppliers": names })),
        OutputFormat::Text => {
            if names.is_empty() {
                println!("{} has not rated any supplier.", args.account.bold());
            }
            for name in &names {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn describe(event: &LedgerEvent) -> String {
    format!(
        "{} {} {} {}",
        format!("#{}", event.seq).yellow(),
        event.timestamp.to_rfc3339().dimmed(),
        event.kind().to_string().cyan(),
        event.payload.supplier_name()
    )
}

fn cmd_events(args: &EventsArgs, ledger: &TrustLedger, format: OutputFormat) -> anyhow::Result<()> {
    let events = ledger.events_since(args.since)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&events)?),
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No events after #{}.", args.since);
            }
            for event in &events {
                println!("{}", describe(event));
            }
            Ok(())
        }
    }
}

fn cmd_check(config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let report = TrustLedger::inspect_journal(&config.ledger).with_context(|| {
        format!("failed to read journal in {}", config.ledger.data_dir.display())
    })?;

    if format == OutputFormat::Json {
        let violations: Vec<_> = report
            .violations
            .iter()
            .map(|v| {
                json!({
                    "seq": v.seq,
                    "kind": format!("{:?}", v.kind),
                    "description": v.description,
                })
            })
            .collect();
        print_json(&json!({
            "event_count": report.event_count,
            "valid": report.is_valid(),
            "violations": violations,
        }))?;
    } else if report.is_valid() {
        println!("{} Journal integrity verified", "✓".green().bold());
        println!("  Events: {}", report.event_count.to_string().bold());
        println!("  Frames: {}", "intact".green());
        println!("  Sequence: {}", "dense".green());
        println!("  Hashes: {}", "valid".green());
        println!("  Invariants: {}", "hold".green());
    } else {
        println!(
            "{} {} problem(s) in {} events",
            "✗".red().bold(),
            report.violations.len(),
            report.event_count
        );
        for v in &report.violations {
            let label = match v.kind {
                ViolationKind::SequenceGap => "gap",
                ViolationKind::IntegrityMismatch => "integrity",
                ViolationKind::InvariantBroken => "invariant",
                ViolationKind::DamagedFrame => "damaged",
            };
            println!("  #{} {}: {}", v.seq, label.red(), v.description);
        }
    }

    if !report.is_valid() {
        bail!("journal check failed");
    }
    Ok(())
}

fn cmd_serve(args: &ServeArgs, cli: &Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli)?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if config.ledger.owner.is_none() {
        bail!("ledger owner is not configured; pass --owner or set [ledger].owner");
    }
    let data_dir: PathBuf = config.ledger.data_dir.clone();
    let server = StreetSourceServer::open(config)
        .with_context(|| format!("failed to open ledger in {}", data_dir.display()))?;
    println!(
        "StreetSource server on {} (data: {})",
        server.config().server.bind_addr.to_string().bold(),
        data_dir.display()
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}
