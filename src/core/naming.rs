use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Day resolution, so reruns on the same day reuse the same remote name
const STAMP_FORMAT: &str = "%Y%m%d";

/// Names artifacts in the staging directory for a single run.
///
/// Stamp and host are fixed when the namer is created, so every artifact of a
/// run shares them. Names handed out through [`ArtifactNamer::claim`] are
/// unique within the namer's lifetime and never point at a file that already
/// exists in the staging directory, such as an artifact kept by an earlier run.
#[derive(Debug)]
pub struct ArtifactNamer {
    staging_dir: PathBuf,
    host: String,
    stamp: String,
    created_at: DateTime<Local>,
    claimed: HashSet<PathBuf>,
}

impl ArtifactNamer {
    pub fn new(staging_dir: impl Into<PathBuf>, host: &str) -> Self {
        Self::at(staging_dir, host, Local::now())
    }

    pub fn at(staging_dir: impl Into<PathBuf>, host: &str, now: DateTime<Local>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            host: encode_component(host),
            stamp: now.format(STAMP_FORMAT).to_string(),
            created_at: now,
            claimed: HashSet::new(),
        }
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    /// `<stamp>-<host>-<encoded-path>.tar.gz`
    pub fn archive_name(&self, source: &str) -> String {
        format!("{}-{}-{}.tar.gz", self.stamp, self.host, encode_path(source))
    }

    /// `<stamp>-<host>-<database>-dump.sql`
    pub fn dump_name(&self, database: &str) -> String {
        format!(
            "{}-{}-{}-dump.sql",
            self.stamp,
            self.host,
            encode_component(database)
        )
    }

    /// Reserve a staging path for `file_name`, adding a numeric suffix if
    /// another item of this run already took it or a file is already there.
    pub fn claim(&mut self, file_name: &str) -> PathBuf {
        let mut candidate = self.staging_dir.join(file_name);
        let mut n = 1;
        while self.is_taken(&candidate) {
            candidate = self.staging_dir.join(with_suffix(file_name, n));
            n += 1;
        }
        self.claimed.insert(candidate.clone());
        candidate
    }

    /// An unreadable entry counts as taken so it is never overwritten.
    fn is_taken(&self, candidate: &Path) -> bool {
        self.claimed.contains(candidate) || candidate.try_exists().unwrap_or(true)
    }
}

/// Filesystem-safe form of a source path: separators become `-`, leading and
/// trailing separators are dropped.
pub fn encode_path(path: &str) -> String {
    let encoded = encode_component(path.trim());
    let encoded = encoded.trim_matches('-');
    if encoded.is_empty() {
        "root".to_string()
    } else {
        encoded.to_string()
    }
}

fn encode_component(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Insert `-n` before the extension: `a.tar.gz` -> `a-1.tar.gz`
fn with_suffix(file_name: &str, n: usize) -> String {
    let ext_start = file_name
        .strip_suffix(".tar.gz")
        .map(str::len)
        .or_else(|| file_name.rfind('.'));
    match ext_start {
        Some(idx) => format!("{}-{}{}", &file_name[..idx], n, &file_name[idx..]),
        None => format!("{}-{}", file_name, n),
    }
}
