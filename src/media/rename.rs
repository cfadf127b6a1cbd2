//! Batch rename: name generation and per-file execution with collision checks

use crate::response::error_lines;
use rmcp::schemars::JsonSchema;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenameMode {
    /// `<prefix><number>`
    #[default]
    #[serde(alias = "前綴 + 序號")]
    PrefixNumber,
    /// `<number><suffix>`
    #[serde(alias = "序號 + 後綴")]
    NumberSuffix,
    /// `<prefix><original name>`
    #[serde(alias = "前綴 + 原檔名")]
    PrefixOriginal,
    /// `<original name><suffix>`
    #[serde(alias = "原檔名 + 後綴")]
    OriginalSuffix,
    /// `<YYYYMMDD_HHMMSS>_<number>`
    #[serde(alias = "日期時間 + 序號")]
    DatetimeNumber,
    /// `<prefix><number><suffix>`
    #[serde(alias = "自訂格式")]
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CaseTransform {
    #[default]
    None,
    Upper,
    Lower,
    /// First character upper, the rest lower
    Capitalize,
}

impl CaseTransform {
    pub fn apply(&self, name: &str) -> String {
        match self {
            CaseTransform::None => name.to_string(),
            CaseTransform::Upper => name.to_uppercase(),
            CaseTransform::Lower => name.to_lowercase(),
            CaseTransform::Capitalize => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => {
                        let rest = chars.as_str().to_lowercase();
                        first.to_uppercase().chain(rest.chars()).collect()
                    }
                    None => String::new(),
                }
            }
        }
    }
}

/// Naming rule for `batch_rename`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct PatternSettings {
    /// Naming mode (default: prefix_number)
    #[serde(default)]
    pub mode: RenameMode,
    /// Text placed before the number or original name (default: "IMG")
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Text placed after the number or original name
    #[serde(default)]
    pub suffix: String,
    /// First sequence number (default: 1)
    #[serde(default = "default_start_number")]
    pub start_number: u32,
    /// Zero-padded width of the sequence number (default: 3)
    #[serde(default = "default_digit_count")]
    pub digit_count: usize,
    /// Case transform applied to the new base name
    #[serde(default)]
    pub case: CaseTransform,
    /// Re-attach the original extension (default: true)
    #[serde(default = "default_true")]
    pub keep_extension: bool,
}

fn default_prefix() -> String {
    "IMG".to_string()
}

fn default_start_number() -> u32 {
    1
}

fn default_digit_count() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            mode: RenameMode::default(),
            prefix: default_prefix(),
            suffix: String::new(),
            start_number: default_start_number(),
            digit_count: default_digit_count(),
            case: CaseTransform::default(),
            keep_extension: true,
        }
    }
}

impl PatternSettings {
    /// New file name for the item at `index`. `stamp` is the batch
    /// timestamp used by [`RenameMode::DatetimeNumber`].
    pub fn new_name(&self, index: usize, original: &Path, stamp: &str) -> String {
        let stem = original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let number = format!(
            "{:0width$}",
            self.start_number as u64 + index as u64,
            width = self.digit_count.clamp(1, 10)
        );

        let base = match self.mode {
            RenameMode::PrefixNumber => format!("{}{}", self.prefix, number),
            RenameMode::NumberSuffix => format!("{}{}", number, self.suffix),
            RenameMode::PrefixOriginal => format!("{}{}", self.prefix, stem),
            RenameMode::OriginalSuffix => format!("{}{}", stem, self.suffix),
            RenameMode::DatetimeNumber => format!("{}_{}", stamp, number),
            RenameMode::Custom => format!("{}{}{}", self.prefix, number, self.suffix),
        };
        let mut name = self.case.apply(&base);

        if self.keep_extension {
            if let Some(ext) = original.extension() {
                name.push('.');
                name.push_str(&ext.to_string_lossy());
            }
        }
        name
    }
}

/// Aggregate result of a rename batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub renamed: Vec<(PathBuf, PathBuf)>,
    pub errors: Vec<String>,
}

impl RenameOutcome {
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Renamed {} file(s), {} failed",
            self.renamed.len(),
            self.errors.len()
        )];
        for (from, to) in &self.renamed {
            lines.push(format!("  {} → {}", file_name(from), file_name(to)));
        }
        lines.extend(error_lines(&self.errors));
        lines.join("\n")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Rename every file in place. Collisions and failures are recorded per
/// item; nothing already renamed is rolled back.
pub fn rename_all(paths: &[PathBuf], settings: &PatternSettings) -> RenameOutcome {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut outcome = RenameOutcome::default();

    for (index, path) in paths.iter().enumerate() {
        let label = format!("#{} {}", index + 1, file_name(path));
        if !path.is_file() {
            outcome.errors.push(format!("{}: file does not exist", label));
            continue;
        }

        let new_name = settings.new_name(index, path, &stamp);
        let target = match path.parent() {
            Some(parent) => parent.join(&new_name),
            None => PathBuf::from(&new_name),
        };
        if target == *path {
            outcome.renamed.push((path.clone(), target));
            continue;
        }
        if target.exists() {
            outcome
                .errors
                .push(format!("{}: target already exists: {}", label, new_name));
            continue;
        }

        match std::fs::rename(path, &target) {
            Ok(()) => outcome.renamed.push((path.clone(), target)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "rename failed");
                outcome.errors.push(format!("{}: {}", label, e));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(RenameMode::PrefixNumber, "IMG004.jpg")]
    #[case(RenameMode::NumberSuffix, "004_x.jpg")]
    #[case(RenameMode::PrefixOriginal, "IMGholiday.jpg")]
    #[case(RenameMode::OriginalSuffix, "holiday_x.jpg")]
    #[case(RenameMode::DatetimeNumber, "20240102_030405_004.jpg")]
    #[case(RenameMode::Custom, "IMG004_x.jpg")]
    fn test_new_name_modes(#[case] mode: RenameMode, #[case] expected: &str) {
        let settings = PatternSettings {
            mode,
            suffix: "_x".to_string(),
            ..PatternSettings::default()
        };
        let name = settings.new_name(3, Path::new("/a/holiday.jpg"), "20240102_030405");
        assert_eq!(name, expected);
    }

    #[rstest]
    #[case(CaseTransform::Upper, "img001.PNG", "IMG001.PNG")]
    #[case(CaseTransform::Lower, "IMG001.PNG", "img001.PNG")]
    #[case(CaseTransform::Capitalize, "IMG001.PNG", "Img001.PNG")]
    fn test_case_applies_to_base_only(
        #[case] case: CaseTransform,
        #[case] _label: &str,
        #[case] expected: &str,
    ) {
        let settings = PatternSettings {
            case,
            ..PatternSettings::default()
        };
        assert_eq!(settings.new_name(0, Path::new("x.PNG"), ""), expected);
    }

    #[test]
    fn test_drop_extension_and_padding() {
        let settings = PatternSettings {
            keep_extension: false,
            digit_count: 5,
            start_number: 98,
            ..PatternSettings::default()
        };
        assert_eq!(settings.new_name(3, Path::new("a.txt"), ""), "IMG00101");
    }

    #[test]
    fn test_settings_defaults_from_json() {
        let settings: PatternSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, PatternSettings::default());

        let settings: PatternSettings =
            serde_json::from_str(r#"{"mode": "原檔名 + 後綴", "suffix": "_v2"}"#).unwrap();
        assert_eq!(settings.mode, RenameMode::OriginalSuffix);
    }

    #[test]
    fn test_rename_all_collision_is_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| {
                let p = dir.path().join(format!("{}.jpg", n));
                std::fs::write(&p, n.as_bytes()).unwrap();
                p
            })
            .collect();
        std::fs::write(dir.path().join("IMG003.jpg"), b"existing").unwrap();

        let outcome = rename_all(&paths, &PatternSettings::default());
        assert_eq!(outcome.renamed.len(), 4);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("#3 c.jpg"));

        for (n, name) in [(1, "a"), (2, "b"), (4, "d"), (5, "e")] {
            let target = dir.path().join(format!("IMG{:03}.jpg", n));
            assert_eq!(std::fs::read(&target).unwrap(), name.as_bytes());
        }
        assert!(dir.path().join("c.jpg").exists());
        assert_eq!(
            std::fs::read(dir.path().join("IMG003.jpg")).unwrap(),
            b"existing"
        );
    }

    #[test]
    fn test_summary_caps_errors() {
        let outcome = RenameOutcome {
            renamed: vec![],
            errors: (1..=13).map(|i| format!("#{} failed", i)).collect(),
        };
        let summary = outcome.summary();
        assert!(summary.contains("#10 failed"));
        assert!(!summary.contains("#11 failed"));
        assert!(summary.contains("... and 3 more"));
    }
}
