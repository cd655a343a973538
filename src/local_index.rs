//! # Local Record Index
//!
//! Records bundled with the deployment as `*.json.gz` files, each a gzip JSON
//! array of records. Everything is read once at startup into two
//! dictionaries: one keyed by mobile number, one by lower-cased email.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{error_logging, AppError, AppResult};
use crate::shard::Record;

/// Field holding the mobile number
pub const MOBILE_FIELD: &str = "Mobile No";

/// Field holding the email address
pub const EMAIL_FIELD: &str = "Email Contact";

const DATA_FILE_SUFFIX: &str = ".json.gz";

/// In-memory record dictionaries, populated once
#[derive(Debug, Default)]
pub struct LocalIndex {
    by_mobile: HashMap<String, Record>,
    by_email: HashMap<String, Record>,
    record_count: usize,
    files_loaded: usize,
}

impl LocalIndex {
    /// Load every `*.json.gz` file in `dir`.
    ///
    /// Files that cannot be read or parsed are logged and skipped, as are
    /// documents that are not JSON arrays. A missing directory yields an empty
    /// index.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut index = Self::default();

        let files = match data_files(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Data directory is not readable");
                return index;
            }
        };

        if files.is_empty() {
            warn!(dir = %dir.display(), "No data files found");
            return index;
        }

        for path in files {
            match read_records(&path) {
                Ok(records) => {
                    index.files_loaded += 1;
                    index.extend(records);
                }
                Err(e) => {
                    error_logging::log_filesystem_error(
                        &e,
                        "load_data_file",
                        Some(&path.display().to_string()),
                        None,
                    );
                }
            }
        }

        info!(
            records = index.record_count,
            files = index.files_loaded,
            mobiles = index.by_mobile.len(),
            emails = index.by_email.len(),
            "Successfully indexed local records"
        );
        index
    }

    /// Index records, later records replacing earlier ones with the same key
    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.record_count += 1;

            if let Some(mobile) = record.get(MOBILE_FIELD).and_then(field_text) {
                let mobile = mobile.trim().to_string();
                if !mobile.is_empty() {
                    self.by_mobile.insert(mobile, record.clone());
                }
            }

            if let Some(email) = record.get(EMAIL_FIELD).and_then(field_text) {
                let email = email.trim().to_lowercase();
                if !email.is_empty() {
                    self.by_email.insert(email, record);
                }
            }
        }
    }

    /// Exact match on the trimmed query
    pub fn find_by_mobile(&self, query: &str) -> Option<&Record> {
        self.by_mobile.get(query.trim())
    }

    /// Case-insensitive match on the trimmed query
    pub fn find_by_email(&self, query: &str) -> Option<&Record> {
        self.by_email.get(&query.trim().to_lowercase())
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn mobile_count(&self) -> usize {
        self.by_mobile.len()
    }

    pub fn email_count(&self) -> usize {
        self.by_email.len()
    }

    pub fn files_loaded(&self) -> usize {
        self.files_loaded
    }

    pub fn is_empty(&self) -> bool {
        self.by_mobile.is_empty() && self.by_email.is_empty()
    }
}

/// Render a scalar field as text; numbers lose no precision and carry no quotes
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn data_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(DATA_FILE_SUFFIX))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn read_records(path: &Path) -> AppResult<Vec<Record>> {
    let file = fs::File::open(path)?;
    let mut json = String::new();
    GzDecoder::new(file).read_to_string(&mut json)?;

    let document: Value = serde_json::from_str(&json)
        .map_err(|e| AppError::FileSystem(format!("{} is not valid JSON: {}", path.display(), e)))?;

    match document {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect()),
        _ => {
            warn!(path = %path.display(), "Data file is not a JSON array, skipping");
            Ok(Vec::new())
        }
    }
}
