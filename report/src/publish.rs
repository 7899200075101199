//! # Publishing
//!
//! Copies a rendered report into a static site directory as the "latest" page, optionally keeps
//! the dated copy, and regenerates a plain `index.html` listing the history.

use crate::{
    error::{
        Error,
        Result,
    },
    templates::{
        self,
        INDEX_TEMPLATE,
    },
};
use chrono::{
    NaiveDate,
    SecondsFormat,
    Utc,
};
use serde::Serialize;
use std::{
    cmp::Reverse,
    fs,
    path::{
        Path,
        PathBuf,
    },
    time::SystemTime,
};
use url::Url;

pub const INDEX_FILENAME: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub source: PathBuf,
    pub latest: PathBuf,
    /// `None` when history is off or the report already carries the latest name.
    pub dated: Option<PathBuf>,
    pub index: Option<PathBuf>,
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn html_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(Error::io("Listing", dir))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(Error::io("Listing", dir))?.path();
        let matches = path.is_file()
            && path.extension().is_some_and(|e| e == "html")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix));
        if matches {
            files.push(path);
        }
    }
    Ok(files)
}

/// Most recently modified `report_*.html` in `out_dir`, falling back to any `*.html`.
pub fn find_latest_report(out_dir: &Path) -> Result<PathBuf> {
    if !out_dir.is_dir() {
        return Err(Error::ReportNotFound(out_dir.to_path_buf()));
    }
    let mut candidates = html_files(out_dir, "report_")?;
    if candidates.is_empty() {
        candidates = html_files(out_dir, "")?;
    }
    candidates
        .into_iter()
        .max_by_key(|p| modified(p))
        .ok_or_else(|| Error::ReportNotFound(out_dir.to_path_buf()))
}

fn validate_latest_filename(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidLatestFilename(name.to_string()));
    }
    Ok(if name.is_empty() {
        "latest.html".to_string()
    } else {
        name.to_string()
    })
}

pub fn publish_report(
    report: &Path,
    publish_dir: &Path,
    latest_filename: &str,
    keep_history: bool,
    generate_index: bool,
) -> Result<PublishResult> {
    if !report.is_file() {
        return Err(Error::ReportNotFound(report.to_path_buf()));
    }
    let latest_name = validate_latest_filename(latest_filename)?;
    fs::create_dir_all(publish_dir).map_err(Error::io("Creating", publish_dir))?;

    let latest = publish_dir.join(&latest_name);
    fs::copy(report, &latest).map_err(Error::io("Copying", &latest))?;
    info!(report = %report.display(), latest = %latest.display(), "Published latest report");

    let report_name = report.file_name().unwrap_or_default();
    let dated = if keep_history && report_name != latest_name.as_str() {
        let dated = publish_dir.join(report_name);
        fs::copy(report, &dated).map_err(Error::io("Copying", &dated))?;
        debug!(path = %dated.display(), "Published dated report");
        Some(dated)
    } else {
        None
    };

    let index = if generate_index {
        Some(write_index(publish_dir, &latest_name)?)
    } else {
        None
    };

    Ok(PublishResult {
        source: report.to_path_buf(),
        latest,
        dated,
        index,
    })
}

/// Date part of `report_YYYY-MM-DD_...`.
fn report_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    let mut parts = stem.splitn(3, '_');
    if parts.next()? != "report" {
        return None;
    }
    NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()
}

#[derive(Serialize)]
struct IndexView<'a> {
    latest: &'a str,
    generated: String,
    reports: Vec<&'a str>,
}

/// Static history page, newest report first.
pub fn write_index(publish_dir: &Path, latest_filename: &str) -> Result<PathBuf> {
    let mut reports = html_files(publish_dir, "report_")?;
    reports.sort_by_key(|p| Reverse((report_date(p).unwrap_or(NaiveDate::MIN), modified(p))));

    let names: Vec<&str> = reports
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .collect();
    let html = templates::render(
        INDEX_TEMPLATE,
        IndexView {
            latest: latest_filename,
            generated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            reports: names,
        },
    )?;

    let path = publish_dir.join(INDEX_FILENAME);
    fs::write(&path, html).map_err(Error::io("Writing", &path))?;
    debug!(path = %path.display(), reports = reports.len(), "Index written");
    Ok(path)
}

/// Joins `path` onto the public site root with exactly one `/` between them.
pub fn join_public_url(base: Option<&Url>, path: &str) -> String {
    let path = path.trim();
    let base = match base {
        Some(base) => base.as_str().trim(),
        None => return path.to_string(),
    };
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
