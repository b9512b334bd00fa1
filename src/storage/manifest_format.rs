//! Human-readable manifest record format
//!
//! One file per category, checkbox-style, so a manifest can be reviewed and
//! edited in any text editor:
//!
//! ```text
//! # category: function
//! # source_path: /work/app
//! # generated_at: 2026-10-19T08:00:00+00:00
//! # total_count: 3
//! - [ ] parse | src/lib.rs:10 | pending
//! - [x] load | src/lib.rs:42 | documented
//! - [?] save | src/io.rs:7 | manual-review | source entity no longer detected
//! ```
//!
//! Fields are separated by ` | `. Literal `|`, `\` and line breaks inside a
//! field are backslash-escaped, so rendering then parsing is lossless.

use chrono::{DateTime, Utc};

use crate::types::{
    CategoryManifest, EntryStatus, LedgerError, Location, ManifestEntry, ManifestMetadata, Result,
};

const FIELD_SEPARATOR: &str = " | ";

pub fn render(manifest: &CategoryManifest) -> String {
    let mut out = String::new();
    push_header(&mut out, "category", &manifest.category);
    push_header(&mut out, "source_path", &manifest.metadata.source_path);
    push_header(
        &mut out,
        "generated_at",
        &manifest.metadata.generated_at.to_rfc3339(),
    );
    push_header(&mut out, "total_count", &manifest.entries.len().to_string());

    for entry in &manifest.entries {
        out.push_str("- [");
        out.push(entry.status.marker());
        out.push_str("] ");
        out.push_str(&escape(&entry.item_name));
        out.push_str(FIELD_SEPARATOR);
        out.push_str(&escape(&entry.location.to_string()));
        out.push_str(FIELD_SEPARATOR);
        out.push_str(entry.status.as_str());
        if let Some(reason) = &entry.reason {
            out.push_str(FIELD_SEPARATOR);
            out.push_str(&escape(reason));
        }
        out.push('\n');
    }

    out
}

fn push_header(out: &mut String, key: &str, value: &str) {
    out.push_str("# ");
    out.push_str(key);
    out.push_str(": ");
    out.push_str(&escape(value));
    out.push('\n');
}

pub fn parse(text: &str) -> Result<CategoryManifest> {
    let mut category: Option<String> = None;
    let mut source_path: Option<String> = None;
    let mut generated_at: Option<DateTime<Utc>> = None;
    let mut declared_total: Option<(usize, usize)> = None;
    let mut entries = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if line.trim().is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('#') {
            let Some((key, value)) = header.trim_start().split_once(": ") else {
                // Free-form comment
                continue;
            };
            let value = unescape_whole(value);
            match key.trim() {
                "category" => category = Some(value),
                "source_path" => source_path = Some(value),
                "generated_at" => {
                    let parsed = DateTime::parse_from_rfc3339(&value).map_err(|e| {
                        format_error(line_no, format!("invalid generated_at '{}': {}", value, e))
                    })?;
                    generated_at = Some(parsed.with_timezone(&Utc));
                }
                "total_count" => {
                    let total = value.parse().map_err(|_| {
                        format_error(line_no, format!("invalid total_count '{}'", value))
                    })?;
                    declared_total = Some((total, line_no));
                }
                _ => {}
            }
            continue;
        }

        let category = category
            .as_deref()
            .ok_or_else(|| format_error(line_no, "entry before '# category' header"))?;
        entries.push(parse_entry(category, line, line_no)?);
    }

    let category = category.ok_or_else(|| format_error(0, "missing '# category' header"))?;
    let generated_at =
        generated_at.ok_or_else(|| format_error(0, "missing '# generated_at' header"))?;

    if let Some((total, line_no)) = declared_total
        && total != entries.len()
    {
        return Err(format_error(
            line_no,
            format!(
                "total_count says {} but {} entries follow",
                total,
                entries.len()
            ),
        ));
    }

    Ok(CategoryManifest {
        category,
        metadata: ManifestMetadata {
            generated_at,
            source_path: source_path.unwrap_or_default(),
            total_count: entries.len(),
        },
        entries,
    })
}

fn parse_entry(category: &str, line: &str, line_no: usize) -> Result<ManifestEntry> {
    let rest = line
        .strip_prefix("- [")
        .ok_or_else(|| format_error(line_no, "expected '- [ ]' entry"))?;
    let mut chars = rest.chars();
    let marker = chars
        .next()
        .ok_or_else(|| format_error(line_no, "missing status marker"))?;
    let marker_status = EntryStatus::from_marker(marker)
        .ok_or_else(|| format_error(line_no, format!("unknown status marker '{}'", marker)))?;
    let body = chars
        .as_str()
        .strip_prefix("] ")
        .ok_or_else(|| format_error(line_no, "expected '] ' after status marker"))?;

    let fields = split_fields(body);
    if !(3..=4).contains(&fields.len()) {
        return Err(format_error(
            line_no,
            format!("expected 3 or 4 fields, found {}", fields.len()),
        ));
    }

    let location = Location::parse(&fields[1])
        .ok_or_else(|| format_error(line_no, format!("invalid location '{}'", fields[1])))?;

    let status: EntryStatus = fields[2]
        .parse()
        .map_err(|e: String| format_error(line_no, e))?;
    if status != marker_status {
        return Err(format_error(
            line_no,
            format!("marker '{}' disagrees with status '{}'", marker, status),
        ));
    }

    let reason = fields.get(3).cloned();
    if reason.is_some() && !status.requires_reason() {
        return Err(format_error(
            line_no,
            format!("status '{}' does not take a reason", status),
        ));
    }
    if status.requires_reason() && reason.as_deref().is_none_or(|r| r.trim().is_empty()) {
        return Err(format_error(
            line_no,
            format!("status '{}' needs a reason", status),
        ));
    }

    Ok(ManifestEntry {
        category: category.to_string(),
        item_name: fields[0].clone(),
        location,
        status,
        reason,
    })
}

fn format_error(line: usize, message: impl Into<String>) -> LedgerError {
    LedgerError::ManifestFormat {
        line,
        message: message.into(),
    }
}

// =============================================================================
// Escaping
// =============================================================================

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_char(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        other => other,
    }
}

fn unescape_whole(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(unescape_char(next));
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split on unescaped `|`, unescaping each field and trimming exactly the
/// single separator space on each side.
fn split_fields(body: &str) -> Vec<String> {
    let mut raw_fields = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                // Keep escapes intact until separator spaces are trimmed
                current.push('\\');
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '|' => raw_fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    raw_fields.push(current);

    let last = raw_fields.len() - 1;
    raw_fields
        .into_iter()
        .enumerate()
        .map(|(i, field)| {
            let mut field = field.as_str();
            if i > 0 {
                field = field.strip_prefix(' ').unwrap_or(field);
            }
            if i < last {
                field = field.strip_suffix(' ').unwrap_or(field);
            }
            unescape_whole(field)
        })
        .collect()
}
