use anyhow::Result;
use tracing::info;

use crate::assets::{AssetValidator, LocalFiles};
use crate::cli::RunArgs;
use crate::commands::common::{
    BackupKind, database_path, emit_report, finish, load_database, process_countries,
    save_database, write_backup,
};
use crate::model::Country;
use crate::pipeline::{Pipeline, fix_chapter_ids};
use crate::report::{CountryReport, RunReport};
use crate::tables::ReferenceTables;
use crate::util::now_utc_string;

pub fn run(args: RunArgs) -> Result<()> {
    let tables = ReferenceTables::load(args.tables_path.as_deref())?;
    let pipeline = Pipeline::new(tables, args.thresholds())?;

    let outcomes = process_countries(&args.country.countries(), |country| {
        run_country(&pipeline, &args, country)
    });

    let report = RunReport {
        generated_at: now_utc_string(),
        command: "run".to_string(),
        countries: outcomes.completed,
        failed_countries: outcomes.failed,
    };
    info!(
        countries = report.countries.len(),
        failed = report.failed_countries.len(),
        errors = report.error_count(),
        warnings = report.warning_count(),
        dry_run = args.dry_run,
        "pipeline finished"
    );
    emit_report(&report, args.json, args.verbose, args.report_path.as_deref())?;
    finish("run", &report.failed_countries, report.error_count())
}

fn run_country(pipeline: &Pipeline, args: &RunArgs, country: Country) -> Result<CountryReport> {
    let path = database_path(&args.data_root, country);
    let mut report = CountryReport::new(country, path.display().to_string());
    let mut database = load_database(&path, country)?;
    if !args.dry_run {
        let backup = write_backup(&args.data_root, country, BackupKind::Full)?;
        report.backup_path = Some(backup.display().to_string());
    }

    pipeline.normalize_database(&mut database, country);
    let reorganized = pipeline.reorganize_database(&mut database, country);
    pipeline.resolve_titles(&mut database, country);
    let renamed = database
        .documents
        .iter_mut()
        .map(|document| fix_chapter_ids(document, country))
        .sum::<usize>();
    if renamed > 0 {
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
    report.attach_notes(&reorganized.notes);

    if args.dry_run {
        info!(country = %country, "dry run, database left untouched");
    } else {
        save_database(&path, &mut database)?;
        report.written = true;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::cli::CountrySelector;
    use crate::util::sha256_file;

    const DATABASE: &str = r#"{
  "schema_version": "2.0",
  "metadata": { "country": "AT", "generated_at": "2025-01-01T00:00:00Z", "document_count": 3 },
  "documents": [
    {
      "id": "at-aschg",
      "abbreviation": "ASchG",
      "title": "ArbeitnehmerInnenschutzgesetz",
      "source": { "url": "https://www.ris.bka.gv.at/aschg", "authority": "RIS" },
      "sections": [
        { "number": "1", "title": "1", "text": "§ 1. Dieses Bundesgesetz gilt für die Beschäftigung von Arbeitnehmern.\nSeite drucken" },
        { "number": "3", "title": "3", "text": "§ 3. Arbeitgeber sind verpflichtet, für Sicherheit und Gesundheitsschutz zu sorgen." },
        { "number": "20", "title": "20", "text": "§ 20. Arbeitsstätten müssen sicher gestaltet sein." },
        { "number": "Anlage 1", "title": "Anlage 1", "text": "Anlage zum Bundesgesetz" }
      ]
    },
    {
      "id": "at-astv",
      "abbreviation": "AStV",
      "title": "Arbeitsstättenverordnung",
      "source": { "url": "https://www.ris.bka.gv.at/astv", "authority": "RIS" },
      "chapters": [
        {
          "id": "at-astv-ch1",
          "number": "1",
          "title": "Allgemeine Bestimmungen",
          "sections": [
            { "number": "1", "title": "§ 1", "text": "§ 1. Diese Verordnung gilt für Arbeitsstätten." },
            { "number": "2", "title": "§ 2", "text": "§ 2. Begriffsbestimmungen für Arbeitsstätten." },
            { "number": "3", "title": "§ 3", "text": "§ 3. Ausgänge und Verkehrswege." }
          ]
        }
      ]
    },
    {
      "id": "at-bauv",
      "abbreviation": "BauV",
      "source": { "url": "https://www.ris.bka.gv.at/bauv", "authority": "RIS" },
      "chapters": [
        {
          "id": "at-bauv-ch1",
          "number": "1",
          "title": "Allgemeines",
          "sections": [
            { "number": "1", "title": "§ 1", "text": "§ 1. Diese Verordnung gilt für Bauarbeiten." },
            { "number": "2", "title": "§ 2", "text": "§ 2. Begriffe." },
            { "number": "3", "title": "§ 3", "text": "§ 3. Absturzsicherungen." }
          ]
        }
      ]
    }
  ]
}
"#;

    fn args(data_root: &Path, dry_run: bool) -> RunArgs {
        RunArgs {
            country: CountrySelector::At,
            data_root: data_root.to_path_buf(),
            tables_path: None,
            dry_run,
            json: false,
            verbose: false,
            report_path: Some(data_root.join("report.json")),
            min_content_length: 10,
            min_section_count: 3,
        }
    }

    fn seed(data_root: &Path) -> std::path::PathBuf {
        let path = database_path(data_root, Country::At);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, DATABASE).expect("seed database");
        path
    }

    #[test]
    fn full_run_reports_the_one_invalid_document() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = seed(temp.path());
        let original_hash = sha256_file(&path).expect("hash");

        let result = run(args(temp.path(), false));

        assert!(result.is_err(), "a validation error must fail the run");

        let backup = temp.path().join("at/at_database_backup.json");
        assert_eq!(sha256_file(&backup).expect("hash"), original_hash);

        let report: serde_json::Value =
            serde_json::from_slice(&fs::read(temp.path().join("report.json")).expect("report"))
                .expect("report json");
        let documents = report["countries"][0]["documents"]
            .as_array()
            .expect("documents");
        assert_eq!(documents.len(), 3);
        let errors = documents
            .iter()
            .flat_map(|document| document["errors"].as_array().cloned().unwrap_or_default())
            .collect::<Vec<serde_json::Value>>();
        assert_eq!(errors, vec![serde_json::json!("missing required field: title")]);
        assert_eq!(documents[2]["valid"], serde_json::json!(false));
        assert!(report["failed_countries"].as_array().expect("failed").is_empty());

        let written = load_database(&path, Country::At).expect("reload");
        assert_eq!(written.documents.len(), 3);
        assert_eq!(written.section_count(), 10);
        assert_ne!(written.metadata.generated_at, "2025-01-01T00:00:00Z");

        let aschg = &written.documents[0];
        assert!(aschg.sections.is_empty());
        let chapter_ids = aschg
            .chapters
            .iter()
            .map(|chapter| chapter.id.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(chapter_ids, vec!["at-aschg-ch1", "at-aschg-ch2", "at-aschg-chx"]);
        let first = &aschg.chapters[0].sections[0];
        assert_eq!(first.title, "§ 1. Geltungsbereich");
        assert!(!first.text.contains("Seite drucken"));
    }

    #[test]
    fn legacy_chapters_without_ids_get_derived_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = database_path(temp.path(), Country::At);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(
            &path,
            r#"{
  "metadata": { "country": "AT", "document_count": 1 },
  "documents": [
    {
      "id": "at-astv",
      "abbreviation": "AStV",
      "title": "Arbeitsstättenverordnung",
      "chapters": [
        { "number": "1", "sections": [ { "number": "1", "title": "§ 1", "text": "§ 1. Geltungsbereich der Verordnung." } ] },
        { "number": "2", "sections": [
          { "number": "2", "title": "§ 2", "text": "§ 2. Begriffsbestimmungen." },
          { "number": "3", "title": "§ 3", "text": "§ 3. Ausgänge und Verkehrswege." }
        ] }
      ]
    }
  ]
}"#,
        )
        .expect("seed database");

        run(args(temp.path(), false)).expect("run without errors should succeed");

        let written = load_database(&path, Country::At).expect("reload");
        let ids = written.documents[0]
            .chapters
            .iter()
            .map(|chapter| chapter.id.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(ids, vec!["at-astv-ch1", "at-astv-ch2"]);
    }

    #[test]
    fn dry_run_leaves_every_file_untouched() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = seed(temp.path());

        let result = run(args(temp.path(), true));

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).expect("database"), DATABASE);
        assert!(!temp.path().join("at/at_database_backup.json").exists());
    }

    #[test]
    fn missing_database_fails_only_that_country() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        let mut args = args(temp.path(), true);
        args.country = CountrySelector::All;

        let result = run(args);

        assert!(result.is_err());
        let report: serde_json::Value =
            serde_json::from_slice(&fs::read(temp.path().join("report.json")).expect("report"))
                .expect("report json");
        assert_eq!(report["countries"].as_array().expect("countries").len(), 1);
        let failed = report["failed_countries"].as_array().expect("failed");
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0]["country"], serde_json::json!("DE"));
    }
}
