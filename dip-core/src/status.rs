//! Deposit status tracker.
//!
//! Each successful deposit leaves a JSON record at
//! `<config-base>/deposit_status/<token>`, where the token is derived from the
//! receipt id by a [`TokenExtractor`]. Queries read those records back; this
//! is the only place that declares a deposit complete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DipError, DipResult, DIP_PENDING, DIP_SUCCESS};
use crate::manifest::write_atomic;
use crate::receipt::DepositReceipt;

pub const STATUS_DIR: &str = "deposit_status";

/// Derives the tracking token from a receipt.
pub trait TokenExtractor: Send + Sync {
    fn extract(&self, receipt: &DepositReceipt) -> DipResult<String>;
}

/// Takes the final `/`-separated segment of the receipt id.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastPathSegment;

impl TokenExtractor for LastPathSegment {
    fn extract(&self, receipt: &DepositReceipt) -> DipResult<String> {
        let id = receipt.id.as_deref().unwrap_or_default();
        let malformed = |reason: &str| DipError::MalformedIdentifier {
            id: id.to_string(),
            reason: reason.to_string(),
        };
        if id.is_empty() {
            return Err(malformed("receipt carries no identifier"));
        }
        let (_, segment) = id
            .rsplit_once('/')
            .ok_or_else(|| malformed("identifier has no path separator"))?;
        if segment.is_empty() {
            return Err(malformed("identifier ends with an empty segment"));
        }
        if !is_safe_token(segment) {
            return Err(malformed("final segment is not a safe file name"));
        }
        Ok(segment.to_string())
    }
}

/// Tokens name files directly, so they are restricted to URL-unreserved
/// characters and may not be `.` or `..`.
pub fn is_safe_token(token: &str) -> bool {
    !token.is_empty()
        && token != "."
        && token != ".."
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

/// Status line and headers of the deposit response. Headers are nested so
/// that no header name can collide with `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeaders {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// On-disk form of a recorded receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub token: String,
    pub title: Option<String>,
    pub id: Option<String>,
    pub updated: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub cont_iri: Option<String>,
    pub edit_iri: Option<String>,
    pub edit_media: Option<String>,
    pub se_iri: Option<String>,
    #[serde(default)]
    pub packaging: Vec<String>,
    #[serde(default)]
    pub in_progress: bool,
    pub recorded: DateTime<Utc>,
    pub response_headers: ResponseHeaders,
}

impl StatusRecord {
    fn from_receipt(token: String, receipt: &DepositReceipt) -> Self {
        StatusRecord {
            token,
            title: receipt.title.clone(),
            id: receipt.id.clone(),
            updated: receipt.updated.clone(),
            summary: receipt.summary.clone(),
            location: receipt.content_location().map(str::to_string),
            cont_iri: receipt.cont_iri.clone(),
            edit_iri: receipt.edit_iri.clone(),
            edit_media: receipt.edit_media.clone(),
            se_iri: receipt.se_iri.clone(),
            packaging: receipt.packaging.clone(),
            in_progress: receipt.in_progress,
            recorded: Utc::now(),
            response_headers: ResponseHeaders {
                status: receipt.status,
                headers: receipt.headers.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositStatus {
    /// Accepted by the server but not yet finished.
    Pending,
    Complete { location: Option<String> },
}

impl DepositStatus {
    pub fn status_code(&self) -> i32 {
        match self {
            DepositStatus::Pending => DIP_PENDING,
            DepositStatus::Complete { .. } => DIP_SUCCESS,
        }
    }
}

pub struct StatusTracker {
    dir: PathBuf,
    extractor: Box<dyn TokenExtractor>,
}

impl StatusTracker {
    /// Tracker storing records under `<config_base>/deposit_status`.
    pub fn new(config_base: &Path) -> Self {
        StatusTracker {
            dir: config_base.join(STATUS_DIR),
            extractor: Box::new(LastPathSegment),
        }
    }

    pub fn with_extractor(mut self, extractor: impl TokenExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn record_path(&self, token: &str) -> PathBuf {
        self.dir.join(token)
    }

    /// Persists `receipt` and returns its token.
    pub fn record_receipt(&self, receipt: &DepositReceipt) -> DipResult<String> {
        let token = self.extractor.extract(receipt)?;
        if !is_safe_token(&token) {
            return Err(DipError::MalformedIdentifier {
                id: receipt.id.clone().unwrap_or_default(),
                reason: format!("extracted token {token:?} is not a safe file name"),
            });
        }
        fs::create_dir_all(&self.dir).map_err(|e| DipError::io(&self.dir, e))?;

        let path = self.record_path(&token);
        if path.exists() {
            warn!(token = %token, "Replacing existing deposit status record");
        }
        let record = StatusRecord::from_receipt(token.clone(), receipt);
        let mut json = serde_json::to_vec_pretty(&record).map_err(|source| DipError::Json {
            path: path.clone(),
            source,
        })?;
        json.push(b'\n');
        write_atomic(&path, &json)?;
        info!(token = %token, path = %path.display(), in_progress = record.in_progress, "Recorded deposit receipt");
        Ok(token)
    }

    pub fn load(&self, token: &str) -> DipResult<StatusRecord> {
        let unknown = || DipError::UnknownToken {
            token: token.to_string(),
        };
        if !is_safe_token(token) {
            return Err(unknown());
        }
        let path = self.record_path(token);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(unknown()),
            Err(e) => return Err(DipError::io(&path, e)),
        };
        serde_json::from_slice(&raw).map_err(|source| DipError::Json { path, source })
    }

    pub fn query_status(&self, token: &str) -> DipResult<DepositStatus> {
        let record = self.load(token)?;
        let status = record.response_headers.status;
        debug!(token, status, in_progress = record.in_progress, "Loaded deposit status record");
        if !(200..300).contains(&status) {
            return Err(DipError::DepositFailed {
                status: Some(status),
                headers: record.response_headers.headers,
                message: String::new(),
            });
        }
        if record.in_progress {
            return Ok(DepositStatus::Pending);
        }
        Ok(DepositStatus::Complete {
            location: record.location,
        })
    }
}
