//! Input file discovery by filename keywords.
use crate::error::ReportError;
use glob::Pattern;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Raised when one or more dataset roles have no matching input file.
#[derive(Error, Debug)]
#[error("Missing input datasets in '{directory}': {}", format_missing(.missing))]
pub struct MissingDatasetsError {
    pub directory: String,
    pub missing: Vec<(String, Vec<String>)>,
}

fn format_missing(missing: &[(String, Vec<String>)]) -> String {
    missing
        .iter()
        .map(|(role, keywords)| format!("{role} {keywords:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Files resolved for each role, in the order the roles were given.
#[derive(Clone, Debug, Default)]
pub struct DetectedFiles {
    pub(crate) files: Vec<(String, Option<PathBuf>)>,
}

impl DetectedFiles {
    pub fn get(&self, role: &str) -> Option<&Path> {
        self.files
            .iter()
            .find(|(name, _)| name == role)
            .and_then(|(_, path)| path.as_deref())
    }

    /// Fails with every missing role and its keywords when any role is unresolved
    pub(crate) fn require_all(
        &self,
        directory: &Path,
        patterns: &[(String, Vec<String>)],
    ) -> Result<(), ReportError> {
        let missing: Vec<(String, Vec<String>)> = patterns
            .iter()
            .filter(|(role, _)| self.get(role).is_none())
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingDatasetsError {
                directory: directory.display().to_string(),
                missing,
            })?
        }
    }
}

/// Whether a file name contains a keyword, ASCII keywords compared case-insensitively
pub(crate) fn matches_keyword(file_name: &str, keyword: &str) -> bool {
    file_name.contains(keyword) || file_name.to_lowercase().contains(&keyword.to_lowercase())
}

/// Lists the files of `directory` with one of the given extensions, sorted by name.
pub(crate) fn list_files(directory: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, ReportError> {
    let pattern = format!("{}/*", Pattern::escape(&directory.to_string_lossy()));
    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase())
            .unwrap_or_default();
        if path.is_file() && extensions.contains(&extension.as_str()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Assigns input files to dataset roles by filename keywords.
///
/// Roles are tried in the given order and each file is given to the first
/// role whose keywords it contains; a role keeps the first file it receives.
pub fn detect_files(
    directory: &Path,
    patterns: &[(String, Vec<String>)],
    extensions: &[&str],
) -> Result<DetectedFiles, ReportError> {
    let mut detected = DetectedFiles {
        files: patterns.iter().map(|(role, _)| (role.to_owned(), None)).collect(),
    };
    for path in list_files(directory, extensions)? {
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        let role = patterns
            .iter()
            .position(|(_, keywords)| keywords.iter().any(|keyword| matches_keyword(&file_name, keyword)));
        if let Some(index) = role {
            let slot = &mut detected.files[index].1;
            if slot.is_none() {
                log::debug!("Detected '{}' as {}", file_name, patterns[index].0);
                *slot = Some(path);
            }
        }
    }
    Ok(detected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<(String, Vec<String>)> {
        [
            ("login", vec!["login", "ログイン"]),
            ("purchase", vec!["purchase", "購入"]),
            ("brand", vec!["brand", "ブランド", "販売"]),
            ("summary", vec!["summary", "サマリ"]),
        ]
        .into_iter()
        .map(|(role, keywords)| (role.to_owned(), keywords.into_iter().map(str::to_owned).collect()))
        .collect()
    }

    #[test]
    fn detects_by_keyword_and_reports_missing_roles() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Weekly_LOGIN.csv", "購入推移.csv", "ブランド別.xlsx", "notes.txt"] {
            std::fs::write(dir.path().join(name), "a\n").unwrap();
        }
        let detected = detect_files(dir.path(), &patterns(), &["csv", "xlsx"]).unwrap();
        assert!(detected.get("login").unwrap().ends_with("Weekly_LOGIN.csv"));
        assert!(detected.get("purchase").unwrap().ends_with("購入推移.csv"));
        assert!(detected.get("brand").unwrap().ends_with("ブランド別.xlsx"));
        assert!(detected.get("summary").is_none());

        let error = detected.require_all(dir.path(), &patterns()).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("summary"));
        assert!(message.contains("サマリ"));
        assert!(!message.contains("login"));
    }

    #[test]
    fn first_file_wins_for_a_role() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a_summary.csv", "b_summary.csv"] {
            std::fs::write(dir.path().join(name), "a\n").unwrap();
        }
        let detected = detect_files(dir.path(), &patterns(), &["csv"]).unwrap();
        assert!(detected.get("summary").unwrap().ends_with("a_summary.csv"));
    }

    #[test]
    fn lists_only_files_with_known_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.CSV", "a.xlsx", "c.txt"] {
            std::fs::write(dir.path().join(name), "a\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("d.csv")).unwrap();
        let files = list_files(dir.path(), &["csv", "xlsx"]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.xlsx", "b.CSV"]);
    }
}
