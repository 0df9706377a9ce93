//! AGRITRAIL — Audit Trail Demo CLI
//!
//! Walks the full tamper-evident pipeline against in-memory stores and an
//! in-memory ledger: append → sign → anchor → verify → certificate, plus a
//! tamper-detection demonstration.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- lifecycle
//!   cargo run -p demo -- tamper

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use agritrail_anchor::{AnchorConfig, AnchorOutcome, AnchorScheduler, InMemoryLedger, SnapshotStore};
use agritrail_chain::{canonicalize, ChainStore};
use agritrail_contracts::{error::TrailResult, ActorRef};
use agritrail_sign::SignatureService;
use agritrail_verify::{verify_entries, VerificationEngine};

// ── CLI definition ────────────────────────────────────────────────────────────

/// AGRITRAIL — tamper-evident audit trail demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "AGRITRAIL audit trail demo",
    long_about = "Runs AGRITRAIL demo scenarios showing hash-chain appends,\n\
                  Merkle anchoring, inclusion proofs, and tamper detection."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run both demo scenarios in sequence.
    RunAll,
    /// Scenario 1: full entry lifecycle — append, sign, anchor, verify, certificate.
    Lifecycle,
    /// Scenario 2: tamper detection on a corrupted stream copy.
    Tamper,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_lifecycle().and_then(|_| run_tamper()),
        Command::Lifecycle => run_lifecycle(),
        Command::Tamper => run_tamper(),
    };

    match result {
        Ok(()) => println!("All selected scenarios completed successfully."),
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario 1: lifecycle ─────────────────────────────────────────────────────

fn run_lifecycle() -> TrailResult<()> {
    println!("— Scenario 1: entry lifecycle —");

    let store = Arc::new(ChainStore::new());
    let snapshots = Arc::new(SnapshotStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let signer = SignatureService::new();
    let engine = VerificationEngine::new(Arc::clone(&store), Arc::clone(&snapshots));
    let scheduler = AnchorScheduler::new(
        Arc::clone(&store),
        Arc::clone(&snapshots),
        Arc::clone(&ledger) as Arc<dyn agritrail_anchor::LedgerClient>,
        AnchorConfig::default(),
    );

    let farmhand = ActorRef::new("u-100", "farmhand", "Sam Byrne");
    let vet = ActorRef::new("u-7", "veterinarian", "Dr. Ngata");

    // Two plain appends to Animal/42.
    store.append(
        "Animal", "42", "updated",
        json!({ "field": "x", "value": 1 }),
        farmhand.clone(),
    )?;
    store.append(
        "Animal", "42", "updated",
        json!({ "field": "x", "value": 2 }),
        farmhand,
    )?;

    // A signed, non-repudiable approval from the vet.
    signer.generate_keypair("u-7")?;
    let payload = json!({ "vaccine": "bluetongue", "dose": 1 });
    let signature = signer.sign("u-7", canonicalize(&payload)?.as_bytes())?;
    let approved = store.append_signed(
        "Animal", "42", "vaccination_approved", payload, vet, signature,
    )?;
    println!("  appended 3 entries to Animal/42 (1 signed)");

    // Anchor the pending batch.
    let snapshot = match scheduler.run_anchor_cycle()? {
        AnchorOutcome::Anchored(snapshot) => snapshot,
        other => {
            println!("  unexpected anchor outcome: {other:?}");
            return Ok(());
        }
    };
    println!(
        "  anchored {} entries — root {}…, tx {}",
        snapshot.entry_count(),
        &snapshot.merkle_root[..16],
        snapshot.transaction_id
    );

    // Verify the chain and the signed entry's inclusion.
    let chain = engine.verify_chain("Animal", "42")?;
    println!(
        "  chain verification: is_valid={} total_entries={}",
        chain.is_valid, chain.total_entries
    );

    let inclusion = engine.verify_inclusion(approved.id)?;
    println!(
        "  inclusion proof: is_valid={} leaf_index={} path_len={}",
        inclusion.is_valid,
        inclusion.leaf_index,
        inclusion.path.len()
    );

    // Certificate data for the external renderer.
    let certificate = engine.assemble_certificate(approved.id)?;
    println!(
        "  certificate: {} {} on {}/{} anchored at {} ({} entries, {})",
        certificate.event_type,
        certificate.actor_role,
        certificate.entity_type,
        certificate.entity_id,
        certificate.anchored_at.format("%Y-%m-%d %H:%M:%S UTC"),
        certificate.snapshot_entry_count,
        certificate.explorer_url.as_deref().unwrap_or("no explorer"),
    );

    println!();
    Ok(())
}

// ── Scenario 2: tamper detection ──────────────────────────────────────────────

fn run_tamper() -> TrailResult<()> {
    println!("— Scenario 2: tamper detection —");

    let store = ChainStore::new();
    let actor = ActorRef::new("u-100", "farmhand", "Sam Byrne");

    for i in 0..5 {
        store.append("Animal", "42", "updated", json!({ "weight_kg": 400 + i }), actor.clone())?;
    }

    let clean = store.stream_for("Animal", "42")?;
    let verification = verify_entries(&clean);
    println!(
        "  clean stream: is_valid={} total_entries={}",
        verification.is_valid, verification.total_entries
    );

    // Corrupt the third entry's payload in a copy of the stream.
    let mut corrupted = clean.clone();
    corrupted[2].payload = json!({ "weight_kg": 9000 });

    let verification = verify_entries(&corrupted);
    println!(
        "  corrupted copy: is_valid={} broken_at={}",
        verification.is_valid,
        verification
            .broken_at_entry_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );

    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("AGRITRAIL — Tamper-evident Audit Trail");
    println!("======================================");
    println!();
    println!("Pipeline per audited action:");
    println!("  [1] Chain store appends an entry linked to the stream's previous hash");
    println!("  [2] Signature service optionally signs the canonical payload");
    println!("  [3] Anchor scheduler batches unanchored entries into a Merkle tree");
    println!("  [4] Ledger confirms the root; an anchor snapshot is recorded");
    println!("  [5] Verification proves chain continuity and batch inclusion on demand");
    println!();
}
