//! Archive extraction for downloaded zip files.
//!
//! Every archive is unpacked into one shared output directory and the name of
//! each extracted file is appended to a running list, in archive order. A
//! failure on one archive is reported and the batch moves on.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

/// Errors that can occur while unpacking a single archive.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Archive not found: {0}")]
    Missing(PathBuf),

    #[error("Permission denied reading archive: {0}")]
    PermissionDenied(PathBuf),

    #[error("Failed to unpack {path}: {reason}")]
    Unpack { path: PathBuf, reason: String },
}

impl ExtractionError {
    fn unpack(path: &Path, reason: impl ToString) -> Self {
        Self::Unpack {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Archive the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Missing(path) | Self::PermissionDenied(path) => path,
            Self::Unpack { path, .. } => path,
        }
    }
}

/// Outcome of extracting a batch of archives.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Names of extracted files, relative to the output directory.
    pub entries: Vec<String>,
    /// Archives that could not be unpacked.
    pub failures: Vec<ExtractionError>,
}

/// Unpacks zip archives into a fixed output directory.
pub struct ArchiveExtractor {
    output_dir: PathBuf,
    entries: Vec<String>,
}

impl ArchiveExtractor {
    /// Create an extractor writing into `output_dir` (created if absent).
    pub fn new(output_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            entries: Vec::new(),
        })
    }

    /// Every entry extracted so far, in extraction order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Unpack one archive, appending its file entries to the running list.
    ///
    /// Returns the entries extracted from this archive. An archive either
    /// lands whole or not at all: on failure, files it already wrote are
    /// removed and the running list is left as it was before the call.
    pub fn extract(&mut self, archive_path: &Path) -> Result<Vec<String>, ExtractionError> {
        let start = self.entries.len();
        match self.unpack_archive(archive_path) {
            Ok(()) => Ok(self.entries[start..].to_vec()),
            Err(e) => {
                self.discard_from(start);
                Err(e)
            }
        }
    }

    fn unpack_archive(&mut self, archive_path: &Path) -> Result<(), ExtractionError> {
        let file = File::open(archive_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ExtractionError::Missing(archive_path.to_path_buf()),
            io::ErrorKind::PermissionDenied => {
                ExtractionError::PermissionDenied(archive_path.to_path_buf())
            }
            _ => ExtractionError::unpack(archive_path, e),
        })?;

        let mut archive =
            ZipArchive::new(file).map_err(|e| ExtractionError::unpack(archive_path, e))?;

        for i in 0..archive.len() {
            let mut zip_file = archive
                .by_index(i)
                .map_err(|e| ExtractionError::unpack(archive_path, e))?;

            // Reject entries like `../x` that would land outside the output dir
            let Some(relative) = zip_file.enclosed_name() else {
                return Err(ExtractionError::unpack(
                    archive_path,
                    format!("entry '{}' escapes the output directory", zip_file.name()),
                ));
            };
            let target = self.output_dir.join(&relative);

            if zip_file.is_dir() {
                fs::create_dir_all(&target).map_err(|e| ExtractionError::unpack(archive_path, e))?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| ExtractionError::unpack(archive_path, e))?;
            }
            let mut outfile =
                File::create(&target).map_err(|e| ExtractionError::unpack(archive_path, e))?;
            if let Err(e) = io::copy(&mut zip_file, &mut outfile) {
                drop(outfile);
                let _ = fs::remove_file(&target);
                return Err(ExtractionError::unpack(archive_path, e));
            }

            let name = zip_file.name().to_string();
            tracing::debug!("Extracted {} from {}", name, archive_path.display());
            self.entries.push(name);
        }

        Ok(())
    }

    /// Drop entries recorded since `start` and delete their files, unless an
    /// earlier archive produced the same name.
    fn discard_from(&mut self, start: usize) {
        let partial = self.entries.split_off(start);
        for name in partial {
            if self.entries.contains(&name) {
                continue;
            }
            let path = self.output_dir.join(&name);
            if let Err(e) = fs::remove_file(&path) {
                tracing::debug!("Could not remove partial entry {}: {}", path.display(), e);
            }
        }
    }

    /// Unpack a batch of archives in order.
    ///
    /// Failures are logged and collected; they never stop the batch.
    pub fn extract_all<P: AsRef<Path>>(&mut self, archives: &[P]) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        for archive_path in archives {
            let archive_path = archive_path.as_ref();
            match self.extract(archive_path) {
                Ok(entries) => {
                    tracing::info!(
                        "Extracted {} entries from {}",
                        entries.len(),
                        archive_path.display()
                    );
                    report.entries.extend(entries);
                }
                Err(e) => {
                    tracing::warn!("Skipping archive: {}", e);
                    report.failures.push(e);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_records_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("AC.zip");
        write_zip(&archive, &[("AC.csv", b"a,1\n"), ("AC2.csv", b"b,2\n")]);

        let mut extractor = ArchiveExtractor::new(dir.path().join("out")).unwrap();
        let entries = extractor.extract(&archive).unwrap();

        assert_eq!(entries, vec!["AC.csv", "AC2.csv"]);
        assert_eq!(extractor.entries(), &["AC.csv", "AC2.csv"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("out/AC.csv")).unwrap(),
            "a,1\n"
        );
    }

    #[test]
    fn test_extracting_twice_keeps_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("AC.zip");
        write_zip(&archive, &[("AC.csv", b"a,1\n")]);

        let mut extractor = ArchiveExtractor::new(dir.path().join("out")).unwrap();
        extractor.extract(&archive).unwrap();
        extractor.extract(&archive).unwrap();

        assert_eq!(extractor.entries(), &["AC.csv", "AC.csv"]);
    }

    #[test]
    fn test_nested_entries_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("AM.zip");
        {
            let mut writer = ZipWriter::new(File::create(&archive).unwrap());
            writer
                .add_directory("tables/", SimpleFileOptions::default())
                .unwrap();
            writer
                .start_file("tables/AM.csv", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"x,1\n").unwrap();
            writer.finish().unwrap();
        }

        let mut extractor = ArchiveExtractor::new(dir.path().join("out")).unwrap();
        let entries = extractor.extract(&archive).unwrap();

        assert_eq!(entries, vec!["tables/AM.csv"]);
        assert!(dir.path().join("out/tables/AM.csv").is_file());
    }

    #[test]
    fn test_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = ArchiveExtractor::new(dir.path().join("out")).unwrap();
        let err = extractor.extract(&dir.path().join("nope.zip")).unwrap_err();
        assert!(matches!(err, ExtractionError::Missing(_)));
    }

    #[test]
    fn test_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bad.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let mut extractor = ArchiveExtractor::new(dir.path().join("out")).unwrap();
        let err = extractor.extract(&archive).unwrap_err();
        assert!(matches!(err, ExtractionError::Unpack { .. }));
        assert_eq!(err.path(), archive.as_path());
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.zip");
        fs::write(&bad, b"garbage").unwrap();
        let good = dir.path().join("good.zip");
        write_zip(&good, &[("RO.csv", b"r,1\n")]);
        let missing = dir.path().join("missing.zip");

        let mut extractor = ArchiveExtractor::new(dir.path().join("out")).unwrap();
        let report = extractor.extract_all(&[bad.clone(), good, missing]);

        assert_eq!(report.entries, vec!["RO.csv"]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].path(), bad.as_path());
        assert!(matches!(report.failures[1], ExtractionError::Missing(_)));
    }

    #[test]
    fn test_escaping_entry_rolls_back_archive() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("AC.zip");
        write_zip(&first, &[("shared.csv", b"a,1\n")]);
        let mixed = dir.path().join("RO.zip");
        write_zip(
            &mixed,
            &[
                ("shared.csv", b"a,1\n"),
                ("ok.csv", b"b,2\n"),
                ("../evil.csv", b"c,3\n"),
            ],
        );

        let out = dir.path().join("out");
        let mut extractor = ArchiveExtractor::new(&out).unwrap();
        let report = extractor.extract_all(&[first, mixed.clone()]);

        assert_eq!(report.entries, vec!["shared.csv"]);
        assert_eq!(report.entries, extractor.entries());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path(), mixed.as_path());
        assert!(out.join("shared.csv").is_file());
        assert!(!out.join("ok.csv").exists());
        assert!(!dir.path().join("evil.csv").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_archive() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("locked.zip");
        write_zip(&archive, &[("x.csv", b"x,1\n")]);
        fs::set_permissions(&archive, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores file modes, nothing to assert there
        if File::open(&archive).is_ok() {
            return;
        }

        let mut extractor = ArchiveExtractor::new(dir.path().join("out")).unwrap();
        let err = extractor.extract(&archive).unwrap_err();
        assert!(matches!(err, ExtractionError::PermissionDenied(_)));
    }
}
