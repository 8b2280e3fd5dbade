//! Trigger definition parsing
//!
//! A trigger definition is a single string:
//!
//! ```text
//! <path-and-filename>[|Initial][|<UNIT>:<integer>][|<dir1>[,<dir2>...]]
//! ```
//!
//! Segments may appear in any order. `<UNIT>` is one of MS, S, M, H, D.

use crate::error::TriggerError;
use crate::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::warn;

/// `<letters>:<digits>` as a whole token
static INTERVAL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+):(\d+)$").expect("interval pattern is valid"));

const INITIAL_KEYWORD: &str = "initial";

/// Parsed trigger definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    raw_first_segment: String,
    filename: String,
    candidate_directories: Vec<PathBuf>,
    initial_fire: bool,
    interval_millis: u64,
}

impl WatchSpec {
    /// Parse a trigger definition
    ///
    /// The first interval token is taken and removed wherever it appears.
    /// The first remaining path token names the file; its directory and
    /// every further path token become candidate directories, in order.
    pub fn parse(definition: &str) -> Result<Self> {
        let mut interval_millis = None;
        let mut initial_fire = false;
        let mut anchor: Option<(String, String)> = None;
        let mut candidate_directories = Vec::new();

        for segment in definition.split('|').map(str::trim).filter(|s| !s.is_empty()) {
            if segment.eq_ignore_ascii_case(INITIAL_KEYWORD) {
                initial_fire = true;
                continue;
            }

            let mut path_tokens = Vec::new();
            for token in segment.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                // Units are checked before the first-wins rule applies
                match parse_interval_token(token)? {
                    Some(millis) if interval_millis.is_none() => interval_millis = Some(millis),
                    Some(_) => warn!("Ignoring additional interval token '{}'", token),
                    None => path_tokens.push(token),
                }
            }

            let mut tokens = path_tokens.into_iter();
            if anchor.is_none() {
                let Some(first) = tokens.next() else {
                    continue;
                };
                let path = Path::new(first);
                let filename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| TriggerError::MissingFileName(definition.to_string()))?;
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    candidate_directories.push(dir.to_path_buf());
                }
                anchor = Some((first.to_string(), filename.to_string()));
            }
            candidate_directories.extend(tokens.map(PathBuf::from));
        }

        let (raw_first_segment, filename) =
            anchor.ok_or_else(|| TriggerError::MissingFileName(definition.to_string()))?;

        // A bare file name without any directory means the working directory
        if candidate_directories.is_empty() {
            candidate_directories.push(PathBuf::from("."));
        }

        Ok(Self {
            raw_first_segment,
            filename,
            candidate_directories,
            initial_fire,
            interval_millis: interval_millis.unwrap_or(0),
        })
    }

    /// Path token the file name was taken from, as written
    pub fn raw_first_segment(&self) -> &str {
        &self.raw_first_segment
    }

    /// Name of the watched file
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Directories to probe, in the order given
    pub fn candidate_directories(&self) -> &[PathBuf] {
        &self.candidate_directories
    }

    /// Fire once right after start
    pub fn initial_fire(&self) -> bool {
        self.initial_fire
    }

    /// Fallback interval in milliseconds, 0 if none
    pub fn interval_millis(&self) -> u64 {
        self.interval_millis
    }

    /// Fallback interval, if configured
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_millis > 0).then(|| Duration::from_millis(self.interval_millis))
    }
}

/// Convert `UNIT:value` to milliseconds
///
/// Returns `Ok(None)` for tokens that are not interval tokens at all.
fn parse_interval_token(token: &str) -> Result<Option<u64>> {
    let Some(caps) = INTERVAL_TOKEN.captures(token) else {
        return Ok(None);
    };

    let factor: u64 = match caps[1].to_ascii_uppercase().as_str() {
        "MS" => 1,
        "S" => 1_000,
        "M" => 60_000,
        "H" => 3_600_000,
        "D" => 86_400_000,
        _ => {
            return Err(TriggerError::InvalidIntervalUnit {
                unit: caps[1].to_string(),
                token: token.to_string(),
            })
        }
    };

    let value: u64 = caps[2]
        .parse()
        .map_err(|_| TriggerError::InvalidInterval(token.to_string()))?;

    value
        .checked_mul(factor)
        .map(Some)
        .ok_or_else(|| TriggerError::InvalidInterval(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs(spec: &WatchSpec) -> Vec<&str> {
        spec.candidate_directories()
            .iter()
            .map(|d| d.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_parse_full_definition() {
        let spec = WatchSpec::parse("./data/Testdatei.txt|Initial|S:30|/tmp,/srv/other").unwrap();

        assert_eq!(spec.raw_first_segment(), "./data/Testdatei.txt");
        assert_eq!(spec.filename(), "Testdatei.txt");
        assert_eq!(dirs(&spec), vec!["./data", "/tmp", "/srv/other"]);
        assert!(spec.initial_fire());
        assert_eq!(spec.interval_millis(), 30_000);
        assert_eq!(spec.interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_interval_position_does_not_matter() {
        let expected = WatchSpec::parse("/a/file.txt|Initial|M:2|/b").unwrap();

        for definition in [
            "M:2|/a/file.txt|Initial|/b",
            "/a/file.txt|M:2|Initial|/b",
            "/a/file.txt|Initial|/b|M:2",
            "/a/file.txt,M:2|Initial|/b",
            "/a/file.txt|Initial|/b, M:2",
        ] {
            let spec = WatchSpec::parse(definition).unwrap();
            assert_eq!(spec.interval_millis(), 120_000, "{}", definition);
            assert_eq!(spec.filename(), expected.filename(), "{}", definition);
            assert_eq!(dirs(&spec), dirs(&expected), "{}", definition);
        }
    }

    #[test]
    fn test_interval_units() {
        let cases = [
            ("MS:250", 250),
            ("S:3", 3_000),
            ("M:4", 240_000),
            ("H:1", 3_600_000),
            ("D:2", 172_800_000),
            ("s:5", 5_000),
            ("ms:7", 7),
        ];
        for (token, millis) in cases {
            let spec = WatchSpec::parse(&format!("/tmp/f.txt|{}", token)).unwrap();
            assert_eq!(spec.interval_millis(), millis, "{}", token);
        }
    }

    #[test]
    fn test_invalid_unit_is_an_error() {
        let err = WatchSpec::parse("/tmp/f.txt|X:30").unwrap_err();
        match err {
            TriggerError::InvalidIntervalUnit { unit, token } => {
                assert_eq!(unit, "X");
                assert_eq!(token, "X:30");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            WatchSpec::parse("W:1|/tmp/f.txt"),
            Err(TriggerError::InvalidIntervalUnit { .. })
        ));
    }

    #[test]
    fn test_interval_overflow_is_an_error() {
        let err = WatchSpec::parse("/tmp/f.txt|D:999999999999999999").unwrap_err();
        assert!(matches!(err, TriggerError::InvalidInterval(_)));
    }

    #[test]
    fn test_only_first_interval_is_honored() {
        let spec = WatchSpec::parse("/tmp/f.txt|S:10|M:5").unwrap();
        assert_eq!(spec.interval_millis(), 10_000);
        assert_eq!(dirs(&spec), vec!["/tmp"]);
    }

    #[test]
    fn test_bad_unit_after_valid_interval_is_an_error() {
        // Every interval token is validated, even ones that would be dropped
        let err = WatchSpec::parse("/tmp/f.txt|S:10|X:5").unwrap_err();
        assert!(matches!(
            err,
            TriggerError::InvalidIntervalUnit { ref unit, .. } if unit == "X"
        ));

        assert!(matches!(
            WatchSpec::parse("/tmp/f.txt,S:10,X:5"),
            Err(TriggerError::InvalidIntervalUnit { .. })
        ));
    }

    #[test]
    fn test_zero_interval_means_no_timer() {
        let spec = WatchSpec::parse("/tmp/f.txt|S:0").unwrap();
        assert_eq!(spec.interval_millis(), 0);
        assert_eq!(spec.interval(), None);

        let spec = WatchSpec::parse("/tmp/f.txt").unwrap();
        assert_eq!(spec.interval(), None);
        assert!(!spec.initial_fire());
    }

    #[test]
    fn test_initial_keyword_case_insensitive() {
        for keyword in ["Initial", "INITIAL", "initial", "  iNiTiAl  "] {
            let spec = WatchSpec::parse(&format!("/tmp/f.txt|{}", keyword)).unwrap();
            assert!(spec.initial_fire(), "{}", keyword);
            assert_eq!(dirs(&spec), vec!["/tmp"]);
        }
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let spec = WatchSpec::parse("||/tmp/f.txt|| |/var, ,/opt|").unwrap();
        assert_eq!(spec.filename(), "f.txt");
        assert_eq!(dirs(&spec), vec!["/tmp", "/var", "/opt"]);
    }

    #[test]
    fn test_first_segment_may_carry_extra_directories() {
        let spec = WatchSpec::parse("/a/f.txt,/b,/c|/d").unwrap();
        assert_eq!(spec.filename(), "f.txt");
        assert_eq!(dirs(&spec), vec!["/a", "/b", "/c", "/d"]);
    }

    #[test]
    fn test_later_segments_are_directories_not_files() {
        let spec = WatchSpec::parse("/a/f.txt|/b/other.txt").unwrap();
        assert_eq!(spec.filename(), "f.txt");
        assert_eq!(dirs(&spec), vec!["/a", "/b/other.txt"]);
    }

    #[test]
    fn test_bare_filename_uses_working_directory() {
        let spec = WatchSpec::parse("f.txt|Initial").unwrap();
        assert_eq!(spec.filename(), "f.txt");
        assert_eq!(dirs(&spec), vec!["."]);

        // Only when nothing else was given
        let spec = WatchSpec::parse("f.txt|/tmp").unwrap();
        assert_eq!(dirs(&spec), vec!["/tmp"]);
    }

    #[test]
    fn test_missing_filename() {
        assert!(matches!(
            WatchSpec::parse("Initial|S:5"),
            Err(TriggerError::MissingFileName(_))
        ));
        assert!(matches!(WatchSpec::parse(""), Err(TriggerError::MissingFileName(_))));
        assert!(matches!(WatchSpec::parse("/"), Err(TriggerError::MissingFileName(_))));
    }
}
