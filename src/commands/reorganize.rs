use anyhow::Result;
use tracing::{info, warn};

use crate::cli::ReorganizeArgs;
use crate::commands::common::{
    BackupKind, database_path, emit_report, finish, load_database, process_countries,
    save_database, write_backup,
};
use crate::model::Country;
use crate::pipeline::Pipeline;
use crate::report::{CountryReport, DocumentReport, RunReport};
use crate::structure::ValidationThresholds;
use crate::tables::ReferenceTables;
use crate::util::now_utc_string;

pub fn run(args: ReorganizeArgs) -> Result<()> {
    let tables = ReferenceTables::load(args.tables_path.as_deref())?;
    let pipeline = Pipeline::new(tables, ValidationThresholds::default())?;

    let outcomes = process_countries(&args.country.countries(), |country| {
        reorganize_country(&pipeline, &args, country)
    });

    let report = RunReport {
        generated_at: now_utc_string(),
        command: "reorganize".to_string(),
        countries: outcomes.completed,
        failed_countries: outcomes.failed,
    };
    info!(
        countries = report.countries.len(),
        failed = report.failed_countries.len(),
        warnings = report.warning_count(),
        dry_run = args.dry_run,
        "reorganize finished"
    );
    emit_report(&report, false, false, None)?;
    finish("reorganize", &report.failed_countries, 0)
}

fn reorganize_country(
    pipeline: &Pipeline,
    args: &ReorganizeArgs,
    country: Country,
) -> Result<CountryReport> {
    let path = database_path(&args.data_root, country);
    let mut report = CountryReport::new(country, path.display().to_string());
    let mut database = load_database(&path, country)?;
    if !args.dry_run {
        let backup = write_backup(&args.data_root, country, BackupKind::Chapters)?;
        report.backup_path = Some(backup.display().to_string());
    }

    let stats = pipeline.reorganize_database(&mut database, country);
    for (document, notes) in database.documents.iter().zip(&stats.notes) {
        for note in notes {
            warn!(country = %country, document = %document.display_name(), "{note}");
        }
    }

    report.document_count = database.documents.len();
    report.section_count = database.section_count();
    report.documents = database
        .documents
        .iter()
        .map(DocumentReport::summary)
        .collect();
    report.attach_notes(&stats.notes);

    if args.dry_run {
        info!(country = %country, "dry run, database left untouched");
    } else {
        save_database(&path, &mut database)?;
        report.written = true;
    }
    Ok(report)
}
