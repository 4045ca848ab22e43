use std::time::Duration;

use anyhow::{Result, bail};
use tracing::info;

use crate::cleanup::{HttpTextCleaner, RetryPolicy, TextCleaner};
use crate::cli::CleanArgs;
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

pub fn run(args: CleanArgs) -> Result<()> {
    let tables = ReferenceTables::load(args.tables_path.as_deref())?;
    let pipeline = Pipeline::new(tables, ValidationThresholds::default())?;
    let cleaner = build_cleaner(&args)?;
    let policy = RetryPolicy {
        max_attempts: args.ai_max_attempts.max(1),
        backoff: Duration::from_millis(args.ai_backoff_ms),
        call_delay: Duration::from_millis(args.ai_delay_ms),
    };

    let outcomes = process_countries(&args.country.countries(), |country| {
        clean_country(
            &pipeline,
            &args,
            cleaner.as_ref().map(|cleaner| cleaner as &dyn TextCleaner),
            policy,
            country,
        )
    });

    let report = RunReport {
        generated_at: now_utc_string(),
        command: "clean".to_string(),
        countries: outcomes.completed,
        failed_countries: outcomes.failed,
    };
    emit_report(&report, false, false, None)?;
    finish("clean", &report.failed_countries, 0)
}

fn build_cleaner(args: &CleanArgs) -> Result<Option<HttpTextCleaner>> {
    if !args.ai_cleanup || args.titles_only {
        return Ok(None);
    }
    let Some(endpoint) = args.ai_endpoint.as_deref() else {
        bail!("--ai-cleanup requires --ai-endpoint");
    };
    let cleaner = HttpTextCleaner::new(
        endpoint,
        &args.ai_model,
        Duration::from_secs(args.ai_timeout_secs),
    )?;
    Ok(Some(cleaner))
}

pub(crate) fn clean_country(
    pipeline: &Pipeline,
    args: &CleanArgs,
    cleaner: Option<&dyn TextCleaner>,
    policy: RetryPolicy,
    country: Country,
) -> Result<CountryReport> {
    let path = database_path(&args.data_root, country);
    let mut report = CountryReport::new(country, path.display().to_string());
    let mut database = load_database(&path, country)?;
    if !args.dry_run {
        let backup = write_backup(&args.data_root, country, BackupKind::Full)?;
        report.backup_path = Some(backup.display().to_string());
    }

    if !args.titles_only {
        pipeline.normalize_database(&mut database, country);
    }
    pipeline.resolve_titles(&mut database, country);
    let failures = match cleaner {
        Some(cleaner) => pipeline.ai_cleanup(&mut database, country, cleaner, policy).failures,
        None => vec![Vec::new(); database.documents.len()],
    };

    report.document_count = database.documents.len();
    report.section_count = database.section_count();
    report.documents = database
        .documents
        .iter()
        .zip(failures)
        .map(|(document, cleanup_failures)| DocumentReport {
            cleanup_failures,
            ..DocumentReport::summary(document)
        })
        .collect();

    if args.dry_run {
        info!(country = %country, "dry run, database left untouched");
    } else {
        save_database(&path, &mut database)?;
        report.written = true;
    }
    Ok(report)
}
