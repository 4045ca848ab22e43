use anyhow::Result;
use tracing::info;

use crate::assets::{AssetValidator, LocalFiles};
use crate::cli::ValidateArgs;
use crate::commands::common::{
    BackupKind, database_path, emit_report, finish, load_database, process_countries,
    save_database, write_backup,
};
use crate::model::Country;
use crate::pipeline::{Pipeline, fix_chapter_ids};
use crate::report::{CountryReport, RunReport};
use crate::tables::ReferenceTables;
use crate::util::now_utc_string;

pub fn run(args: ValidateArgs) -> Result<()> {
    let tables = ReferenceTables::load(args.tables_path.as_deref())?;
    let pipeline = Pipeline::new(tables, args.thresholds())?;

    let outcomes = process_countries(&args.country.countries(), |country| {
        validate_country(&pipeline, &args, country)
    });

    let report = RunReport {
        generated_at: now_utc_string(),
        command: "validate".to_string(),
        countries: outcomes.completed,
        failed_countries: outcomes.failed,
    };
    info!(
        countries = report.countries.len(),
        errors = report.error_count(),
        warnings = report.warning_count(),
        "validation finished"
    );
    emit_report(&report, args.json, args.verbose, args.report_path.as_deref())?;
    finish("validate", &report.failed_countries, report.error_count())
}

pub(crate) fn validate_country(
    pipeline: &Pipeline,
    args: &ValidateArgs,
    country: Country,
) -> Result<CountryReport> {
    let path = database_path(&args.data_root, country);
    let mut report = CountryReport::new(country, path.display().to_string());
    let mut database = load_database(&path, country)?;

    if args.fix {
        let backup = write_backup(&args.data_root, country, BackupKind::Full)?;
        report.backup_path = Some(backup.display().to_string());
        let renamed = database
            .documents
            .iter_mut()
            .map(|document| fix_chapter_ids(document, country))
            .sum::<usize>();
        info!(country = %country, renamed, "re-derived chapter ids");
    }

    let files = LocalFiles;
    let mut assets = AssetValidator::new(
        &args.data_root,
        &files,
        &pipeline.tables().supplementary_markers,
    );
    pipeline.validate_database(&database, country, &mut assets, &mut report);
    report.batch = assets.finish(country)?;

    if args.fix {
        save_database(&path, &mut database)?;
        report.written = true;
    }
    Ok(report)
}
