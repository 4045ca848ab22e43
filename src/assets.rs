//! Cross-checks `local_pdf_path` / `local_html_path` references against the
//! asset tree and reports files no document references.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::model::{Country, Document};

const DATA_ROOT_SEGMENT: &str = "eu_safety_laws";
const ASSET_DIRECTORIES: [&str; 2] = ["pdfs", "html"];

/// Filesystem access needed by the asset validator, swappable in tests.
pub trait FileAccess {
    fn exists(&self, path: &Path) -> bool;

    /// Every regular file below `dir`, recursively. A missing directory yields
    /// an empty list.
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

impl FileAccess for LocalFiles {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !dir.is_dir() {
            return Ok(files);
        }

        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let entries = fs::read_dir(&current)
                .with_context(|| format!("failed to read {}", current.display()))?;
            for entry in entries {
                let entry = entry
                    .with_context(|| format!("failed to read entry in {}", current.display()))?;
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .with_context(|| format!("failed to inspect file type: {}", path.display()))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
}

impl AssetReport {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.info.is_empty()
    }
}

/// Per-document checks accumulate the referenced set; `finish` runs the
/// orphan scan once the whole batch has been seen.
pub struct AssetValidator<'a, F: FileAccess> {
    data_root: PathBuf,
    files: &'a F,
    supplementary_markers: Vec<String>,
    referenced: BTreeSet<PathBuf>,
}

impl<'a, F: FileAccess> AssetValidator<'a, F> {
    pub fn new(data_root: &Path, files: &'a F, supplementary_markers: &[String]) -> Self {
        Self {
            data_root: data_root.to_path_buf(),
            files,
            supplementary_markers: supplementary_markers
                .iter()
                .map(|marker| marker.to_lowercase())
                .collect(),
            referenced: BTreeSet::new(),
        }
    }

    /// Resolves a stored reference against the data root. References written
    /// relative to the repository (`eu_safety_laws/pdfs/...`) are accepted too.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        let relative = Path::new(reference.trim());
        let relative = relative
            .strip_prefix(DATA_ROOT_SEGMENT)
            .or_else(|_| relative.strip_prefix(format!("/{DATA_ROOT_SEGMENT}")))
            .unwrap_or(relative);
        let relative = relative
            .components()
            .filter(|component| matches!(component, Component::Normal(_) | Component::ParentDir))
            .collect::<PathBuf>();
        self.data_root.join(relative)
    }

    pub fn is_supplementary(&self, document: &Document) -> bool {
        let haystack = format!(
            "{} {} {} {}",
            document.title, document.abbreviation, document.category, document.doc_type
        )
        .to_lowercase();
        let pdf_only_source = document.source.url.trim().to_lowercase().ends_with(".pdf");

        pdf_only_source
            || self
                .supplementary_markers
                .iter()
                .any(|marker| haystack.contains(marker.as_str()))
    }

    pub fn validate_document(&mut self, document: &Document, country: Country) -> AssetReport {
        let mut report = AssetReport::default();
        let source = &document.source;

        for (label, reference) in [
            ("local_pdf_path", source.local_pdf_path.as_deref()),
            ("local_html_path", source.local_html_path.as_deref()),
        ] {
            let Some(reference) = reference.filter(|value| !value.trim().is_empty()) else {
                continue;
            };
            let resolved = self.resolve(reference);
            if self.files.exists(&resolved) {
                report
                    .info
                    .push(format!("{label} ok: {}", resolved.display()));
            } else {
                report.errors.push(format!(
                    "{label} references a missing file: {} ({country})",
                    resolved.display()
                ));
            }
            self.referenced.insert(resolved);
        }

        let pdf_referenced = source
            .local_pdf_path
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty());
        if !pdf_referenced && self.is_supplementary(document) {
            report.errors.push(
                "supplementary source is expected to have a local PDF but local_pdf_path is not set"
                    .to_string(),
            );
        }

        report
    }

    /// Reports every file under `pdfs/{cc}` and `html/{cc}` that no validated
    /// document referenced.
    pub fn finish(self, country: Country) -> Result<AssetReport> {
        let mut report = AssetReport::default();
        for directory in ASSET_DIRECTORIES {
            let root = self.data_root.join(directory).join(country.code());
            for file in self.files.list_files(&root)? {
                if !self.referenced.contains(&file) {
                    report
                        .warnings
                        .push(format!("orphaned file: {}", file.display()));
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::model::Source;

    #[derive(Default)]
    struct FakeFiles {
        files: BTreeSet<PathBuf>,
    }

    impl FakeFiles {
        fn with(paths: &[&str]) -> Self {
            Self {
                files: paths.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl FileAccess for FakeFiles {
        fn exists(&self, path: &Path) -> bool {
            self.files.contains(path)
        }

        fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
            Ok(self
                .files
                .iter()
                .filter(|path| path.starts_with(dir))
                .cloned()
                .collect())
        }
    }

    fn markers() -> Vec<String> {
        vec!["merkblatt".to_string(), "dguv information".to_string()]
    }

    fn document(title: &str, pdf: Option<&str>, html: Option<&str>) -> Document {
        Document {
            id: "doc".to_string(),
            abbreviation: "DOC".to_string(),
            title: title.to_string(),
            source: Source {
                url: "https://example.org/law".to_string(),
                local_pdf_path: pdf.map(str::to_string),
                local_html_path: html.map(str::to_string),
                ..Source::default()
            },
            ..Document::default()
        }
    }

    #[test]
    fn existing_references_are_info_only() {
        let files = FakeFiles::with(&["root/pdfs/at/aschg.pdf", "root/html/at/aschg.html"]);
        let mut validator = AssetValidator::new(Path::new("root"), &files, &markers());

        let report = validator.validate_document(
            &document(
                "ASchG",
                Some("pdfs/at/aschg.pdf"),
                Some("eu_safety_laws/html/at/aschg.html"),
            ),
            Country::At,
        );

        assert!(report.errors.is_empty());
        assert_eq!(report.info.len(), 2);
    }

    #[test]
    fn missing_referenced_file_is_error() {
        let files = FakeFiles::default();
        let mut validator = AssetValidator::new(Path::new("root"), &files, &markers());

        let report = validator
            .validate_document(&document("ASchG", Some("pdfs/at/gone.pdf"), None), Country::At);

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("local_pdf_path"));
    }

    #[test]
    fn unset_reference_is_silent_unless_expected() {
        let files = FakeFiles::default();
        let mut validator = AssetValidator::new(Path::new("root"), &files, &markers());

        let statute = validator.validate_document(&document("ArbSchG", None, None), Country::De);
        assert!(statute.is_empty());

        let guidance = validator.validate_document(
            &document("DGUV Information 208-016 Leitern", None, None),
            Country::De,
        );
        assert_eq!(guidance.errors.len(), 1);
        assert!(guidance.errors[0].contains("supplementary"));
    }

    #[test]
    fn pdf_only_source_url_marks_supplementary() {
        let files = FakeFiles::default();
        let validator = AssetValidator::new(Path::new("root"), &files, &markers());
        let mut document = document("Checkliste", None, None);
        document.source.url = "https://auva.at/checkliste.PDF".to_string();

        assert!(validator.is_supplementary(&document));
    }

    #[test]
    fn orphan_scan_reports_unreferenced_files_after_batch() {
        let files = FakeFiles::with(&[
            "root/pdfs/at/aschg.pdf",
            "root/pdfs/at/old/merkblatt.pdf",
            "root/html/at/unused.html",
            "root/pdfs/de/arbschg.pdf",
        ]);
        let mut validator = AssetValidator::new(Path::new("root"), &files, &markers());
        validator.validate_document(&document("ASchG", Some("pdfs/at/aschg.pdf"), None), Country::At);

        let report = validator.finish(Country::At).expect("orphan scan should succeed");

        assert_eq!(
            report.warnings,
            vec![
                "orphaned file: root/pdfs/at/old/merkblatt.pdf",
                "orphaned file: root/html/at/unused.html",
            ]
        );
    }

    #[test]
    fn local_files_lists_nested_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let nested = temp.path().join("pdfs").join("at").join("sub");
        fs::create_dir_all(&nested).expect("create dirs");
        fs::write(nested.join("a.pdf"), b"%PDF").expect("write a");
        fs::write(temp.path().join("pdfs").join("at").join("b.pdf"), b"%PDF").expect("write b");

        let files = LocalFiles
            .list_files(&temp.path().join("pdfs").join("at"))
            .expect("listing should succeed");

        assert_eq!(files.len(), 2);
        assert!(LocalFiles.exists(&nested.join("a.pdf")));
        assert!(LocalFiles
            .list_files(&temp.path().join("html"))
            .expect("missing dir is fine")
            .is_empty());
    }
}
