use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use concord_core::{Side, Transaction};
use concord_engine::{CancelToken, Checkpoint, Mode, Outcome, ReconciliationResult, Reconciler};
use concord_import::{import_csv, import_ofx, CsvImportProfile};
use tracing::{debug, info, warn};

use crate::settings::Settings;

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    /// Bank statement (CSV, OFX or QFX)
    #[arg(long)]
    pub bank: PathBuf,

    /// Ledger export (CSV)
    #[arg(long)]
    pub ledger: PathBuf,

    /// Matching preset; overrides the config file
    #[arg(long)]
    pub mode: Option<Mode>,

    /// Config file with [engine] and [import.*] sections
    #[arg(long, env = "CONCORD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write every transaction with its match status as CSV
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Write a Markdown report
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Write the full result as JSON
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Only log warnings and skip the stdout summary
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

/// Loads both sides, runs the engine, and writes every requested output.
/// A cancelled run still writes its partial result.
pub fn reconcile(args: &ReconcileArgs, cancel: CancelToken) -> anyhow::Result<Outcome> {
    let settings = Settings::load_optional(args.config.as_deref())?;
    let config = settings.engine_config(args.mode)?;

    let bank = load_side(&args.bank, settings.import.bank.as_ref(), Side::Bank)?;
    let ledger = load_side(&args.ledger, settings.import.ledger.as_ref(), Side::Ledger)?;
    info!(bank = bank.len(), ledger = ledger.len(), mode = %config.mode, "inputs loaded");

    let progress = |c: Checkpoint| debug!(stage = ?c.stage, percent = c.percent, groups = c.groups_so_far, "progress");
    let result = Reconciler::new(&config)
        .with_progress(&progress)
        .with_cancel(cancel)
        .run(&bank, &ledger);

    if let Outcome::Cancelled { completed_passes } = result.outcome {
        warn!(completed_passes, "run cancelled, writing partial results");
    }
    write_outputs(&result, args)?;
    if !args.quiet {
        print_summary(&result);
    }
    Ok(result.outcome)
}

pub fn check_config(path: &Path, mode: Option<Mode>) -> anyhow::Result<()> {
    let settings = Settings::load(path)?;
    let config = settings.engine_config(mode)?;

    println!("{} is valid", path.display());
    println!();
    println!("[engine]");
    print!("{}", toml::to_string(&config).context("cannot render engine settings")?);
    for (side, profile) in [("bank", &settings.import.bank), ("ledger", &settings.import.ledger)] {
        match profile {
            Some(p) => println!("import.{side}: profile '{}'", p.name),
            None => println!("import.{side}: columns detected from header"),
        }
    }
    Ok(())
}

fn is_ofx(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ofx") || e.eq_ignore_ascii_case("qfx"))
}

fn load_side(path: &Path, profile: Option<&CsvImportProfile>, side: Side) -> anyhow::Result<Vec<Transaction>> {
    if is_ofx(path) {
        if side != Side::Bank {
            bail!("{}: OFX is only supported for the bank statement", path.display());
        }
        let data = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        return import_ofx(&data).with_context(|| format!("cannot import {}", path.display()));
    }

    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let default_profile = CsvImportProfile::default();
    import_csv(BufReader::new(file), profile.unwrap_or(&default_profile), side)
        .with_context(|| format!("cannot import {}", path.display()))
}

fn write_to<F>(path: &Path, what: &str, write: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> anyhow::Result<()>,
{
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write(&mut out)
        .and_then(|()| out.flush().map_err(Into::into))
        .with_context(|| format!("cannot write {}", path.display()))?;
    info!(path = %path.display(), "wrote {what}");
    Ok(())
}

fn write_outputs(result: &ReconciliationResult, args: &ReconcileArgs) -> anyhow::Result<()> {
    if let Some(path) = &args.csv {
        write_to(path, "csv", |out| Ok(concord_export::write_csv(result, out)?))?;
    }
    if let Some(path) = &args.report {
        let report = concord_export::render_report(result);
        write_to(path, "report", |out| Ok(out.write_all(report.as_bytes())?))?;
    }
    if let Some(path) = &args.json {
        write_to(path, "json", |out| Ok(serde_json::to_writer_pretty(out, result)?))?;
    }
    Ok(())
}

fn print_summary(result: &ReconciliationResult) {
    let stats = &result.stats;
    println!("Run {} ({} mode)", result.run_id, result.mode);
    println!(
        "  {} groups: {} exact, {} fuzzy, {} split, {} merge",
        stats.group_count, stats.by_kind.exact, stats.by_kind.fuzzy, stats.by_kind.split, stats.by_kind.merge
    );
    println!(
        "  matched {}/{} bank, {}/{} ledger ({:.1}%)",
        stats.matched_bank, stats.total_bank, stats.matched_ledger, stats.total_ledger, stats.match_rate
    );
    println!(
        "  unmatched: bank {} ({}), ledger {} ({})",
        stats.unmatched_bank, stats.unmatched_bank_amount, stats.unmatched_ledger, stats.unmatched_ledger_amount
    );
}
