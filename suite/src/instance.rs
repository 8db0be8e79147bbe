// instance.rs — CNF benchmark import.
//
// Reads the DIMACS header of a benchmark file and derives the catalogue
// metadata: variable/clause counts, family (by filename pattern), difficulty
// band, size, and checksum. Only the problem line is parsed — body validity
// is the solver's concern.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::FamilyRule;

// ── Metadata ────────────────────────────────────────────────────────────

/// Parsed `p cnf` header counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeaderCounts {
    pub num_variables: u64,
    pub num_clauses: u64,
    /// Clause-to-variable ratio, 0 when the variable count is 0.
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Unknown,
}

/// Everything the catalogue stores about one benchmark file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceMeta {
    pub filename: String,
    pub path: PathBuf,
    pub family: String,
    pub difficulty: Difficulty,
    pub size_bytes: u64,
    pub header: Option<HeaderCounts>,
    /// SHA-256 of the file contents, lowercase hex.
    pub checksum: String,
}

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: malformed problem line: {text:?}")]
    MalformedHeader {
        path: PathBuf,
        line: usize,
        text: String,
    },
}

// ── Header parsing ──────────────────────────────────────────────────────

/// Scan for the `p cnf <V> <C>` problem line. Comment lines (`c …`) are
/// skipped; anything else before the problem line is ignored as well, which
/// matches how solvers treat sloppy headers. Returns `None` when no problem
/// line exists at all.
pub fn parse_header(path: &Path) -> Result<Option<HeaderCounts>, InstanceError> {
    let file = File::open(path).map_err(|source| InstanceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| InstanceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if !trimmed.starts_with("p ") {
            continue;
        }
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() < 4 || parts[1] != "cnf" {
            return Err(InstanceError::MalformedHeader {
                path: path.to_path_buf(),
                line: lineno + 1,
                text: trimmed.to_string(),
            });
        }
        let num_variables: u64 =
            parts[2]
                .parse()
                .map_err(|_| InstanceError::MalformedHeader {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    text: trimmed.to_string(),
                })?;
        let num_clauses: u64 = parts[3]
            .parse()
            .map_err(|_| InstanceError::MalformedHeader {
                path: path.to_path_buf(),
                line: lineno + 1,
                text: trimmed.to_string(),
            })?;
        let ratio = if num_variables > 0 {
            num_clauses as f64 / num_variables as f64
        } else {
            0.0
        };
        return Ok(Some(HeaderCounts {
            num_variables,
            num_clauses,
            ratio,
        }));
    }

    Ok(None)
}

// ── Classification ──────────────────────────────────────────────────────

/// Match the lowercased filename against the family table; first hit wins,
/// `"other"` otherwise. Invalid patterns in the table are skipped.
pub fn classify_family(filename: &str, rules: &[FamilyRule]) -> String {
    let lower = filename.to_lowercase();
    for rule in rules {
        let re = match RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
            Ok(re) => re,
            Err(_) => continue,
        };
        if re.is_match(&lower) {
            return rule.name.clone();
        }
    }
    "other".to_string()
}

/// Difficulty bands from (variables, ratio):
/// easy < 1000 vars or ratio < 3, medium < 10000 vars or ratio < 5, else hard.
pub fn estimate_difficulty(header: Option<&HeaderCounts>) -> Difficulty {
    let header = match header {
        Some(h) => h,
        None => return Difficulty::Unknown,
    };
    if header.num_variables < 1000 || header.ratio < 3.0 {
        Difficulty::Easy
    } else if header.num_variables < 10_000 || header.ratio < 5.0 {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}

fn checksum(path: &Path) -> Result<String, InstanceError> {
    let mut file = File::open(path).map_err(|source| InstanceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|source| InstanceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_string(&hasher.finalize()))
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

// ── Import ──────────────────────────────────────────────────────────────

/// Build the full catalogue metadata for one CNF file.
pub fn import(path: &Path, rules: &[FamilyRule]) -> Result<InstanceMeta, InstanceError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let header = parse_header(path)?;
    let meta = std::fs::metadata(path).map_err(|source| InstanceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(InstanceMeta {
        family: classify_family(&filename, rules),
        difficulty: estimate_difficulty(header.as_ref()),
        size_bytes: meta.len(),
        checksum: checksum(path)?,
        header,
        path: path.to_path_buf(),
        filename,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────
