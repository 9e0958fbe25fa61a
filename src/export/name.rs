//! Export archive file naming.

use crate::export::kind::FilterSet;
use chrono::NaiveDate;

/// Builds `<prefix>-<tags>-<date>.<extension>`.
///
/// The date is a fixed numeric format so names come out identical across
/// platform locales. An empty tag list (empty filter) drops that segment.
pub fn export_file_name(
    prefix: &str,
    filter: &FilterSet,
    date: NaiveDate,
    extension: &str,
) -> String {
    let mut segments = vec![sanitize(prefix)];
    let tags = filter.tags();
    if !tags.is_empty() {
        segments.push(tags.join("-"));
    }
    segments.push(date.format("%Y%m%d").to_string());
    format!("{}.{}", segments.join("-"), extension)
}

/// Strips path separators and control characters so a display name can be
/// embedded in a file name. Falls back to "export" when nothing survives.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "export".to_string()
    } else {
        cleaned
    }
}
