use admissions::allotment::{
    AllotmentSummary, CapacityOverrides, EnvCapacitySource, SeatAllotmentService,
};
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::roster::RosterImporter;
use admissions::students::{Branch, SqliteCandidateStore};
use admissions::telemetry::{self, LogTarget};
use chrono::{DateTime, Local};
use clap::Args;
use serde_json::json;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct AllotArgs {
    /// CSV roster of candidates, in registration order
    #[arg(long)]
    pub(crate) roster: PathBuf,
    /// Capacity override for one branch, e.g. `--capacity CSE=30` (repeatable)
    #[arg(long, value_parser = crate::infra::parse_capacity)]
    pub(crate) capacity: Vec<(Branch, u32)>,
    /// SQLite database to load the roster into (defaults to APP_DATABASE_PATH)
    #[arg(long)]
    pub(crate) database: Option<String>,
    /// Print the run summary as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_allot(args: AllotArgs) -> Result<(), AppError> {
    let AllotArgs {
        roster,
        capacity,
        database,
        json,
    } = args;

    let mut config = AppConfig::load()?;
    if let Some(database) = database {
        config.storage.database_path = database;
    }
    telemetry::init(&config.telemetry, LogTarget::Stderr)?;

    let records = RosterImporter::from_path(&roster)?;
    let store = Arc::new(SqliteCandidateStore::open(&config.storage.database_path)?);
    let loaded = RosterImporter::load_into(store.as_ref(), records)?;
    info!(loaded, roster = %roster.display(), "roster loaded");

    let overrides = capacity
        .into_iter()
        .fold(CapacityOverrides::new(), |overrides, (branch, seats)| {
            overrides.with(branch, seats)
        });

    let service = SeatAllotmentService::new(store, Arc::new(EnvCapacitySource));
    let summary = service.auto_allot(&overrides)?;

    if json {
        let payload = json!({
            "success": true,
            "allocated": summary.allocated,
            "assignments": summary.assignments,
            "details": summary.details,
        });
        let rendered = serde_json::to_string_pretty(&payload).map_err(std::io::Error::from)?;
        println!("{rendered}");
    } else {
        print!("{}", render_summary(&summary, Local::now()));
    }

    Ok(())
}

pub(crate) fn render_summary(summary: &AllotmentSummary, generated_at: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Seat allotment ({})",
        generated_at.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(out, "Allocated this run: {}", summary.allocated);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<12} {:>8} {:>8} {:>9}",
        "Branch", "Capacity", "Held", "Remaining"
    );

    let details = &summary.details;
    for (branch, capacity) in details.capacities.iter() {
        let held = details.allocated_counts.get(&branch).copied().unwrap_or(0);
        let remaining = details.remaining.get(&branch).copied().unwrap_or(0);
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>8} {:>9}",
            branch.as_str(),
            capacity,
            held,
            remaining
        );
    }

    if !summary.assignments.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Assignments (rank order):");
        for seat in &summary.assignments {
            let _ = writeln!(
                out,
                "  {} -> {} (preference {})",
                seat.student_id, seat.branch, seat.preference
            );
        }
    }

    out
}
