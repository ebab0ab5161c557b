//! The session marker document (`active/task_plan.md`) and session naming.
//!
//! A session exists exactly when the marker exists and carries a task
//! header that is not the template placeholder.

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// File name of the marker inside the active-session directory.
pub const MARKER_FILE: &str = "task_plan.md";

/// Task name used by the blank template.
pub const PLACEHOLDER_NAME: &str = "[Your task name]";

/// Documents whose names start with this prefix are templates.
pub const TEMPLATE_PREFIX: &str = "TEMPLATE";

const TASK_HEADER: &str = "# Task:";
const SESSION_ID_FIELD: &str = "**Session ID:**";
const STARTED_FIELD: &str = "**Started:**";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
}

/// Identity of an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub name: String,
    pub session_id: String,
    pub started_at: Option<NaiveDateTime>,
    pub status: SessionStatus,
}

impl SessionDescriptor {
    /// New descriptor stamped with the current local time.
    pub fn new(name: impl Into<String>) -> Self {
        Self::started_at(name, Local::now().naive_local())
    }

    pub fn started_at(name: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            session_id: format!("sess_{}", at.format("%Y%m%d_%H%M%S")),
            started_at: Some(at),
            status: SessionStatus::Active,
        }
    }
}

/// Name from the first task header. A document that still carries the
/// template placeholder anywhere is not a session.
pub fn session_name(content: &str) -> Option<String> {
    if content.contains(PLACEHOLDER_NAME) {
        return None;
    }
    let name = content
        .lines()
        .find_map(|line| line.strip_prefix(TASK_HEADER))?
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Whether `content` denotes an active session.
pub fn is_well_formed(content: &str) -> bool {
    session_name(content).is_some()
}

fn field<'a>(content: &'a str, label: &str) -> Option<&'a str> {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Parse the descriptor fields out of a marker document. Markers written by
/// the init script may omit the id or timestamp.
pub fn parse(content: &str) -> Option<SessionDescriptor> {
    let name = session_name(content)?;
    let started_at = field(content, STARTED_FIELD)
        .and_then(|v| NaiveDateTime::parse_from_str(v, TIMESTAMP_FORMAT).ok());
    let session_id = field(content, SESSION_ID_FIELD)
        .map(str::to_string)
        .unwrap_or_default();

    Some(SessionDescriptor {
        name,
        session_id,
        started_at,
        status: SessionStatus::Active,
    })
}

/// Render a fresh marker document.
pub fn render(session: &SessionDescriptor, branch: Option<&str>) -> String {
    let started = session
        .started_at
        .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default();
    let goal = match branch {
        Some(branch) => format!("Auto-created session for branch: {}", branch),
        None => "Auto-created session".to_string(),
    };

    format!(
        "{TASK_HEADER} {name}
{SESSION_ID_FIELD} {id}
{STARTED_FIELD} {started}
**Status:** In Progress

## Goal
{goal}

## Phases
- [ ] Phase 1: Initial work

## Files Created/Modified
- [ ] (tracked automatically)

## Live Error Log
| Error | Attempt | Status | Solution | Knowledge Updated |
|-------|---------|--------|----------|-------------------|

## Next Steps
1. Continue working on current task

---
*Auto-generated by Context Engine*
",
        name = session.name,
        id = session.session_id,
    )
}

/// Normalize discouraged separators (`/`, `_`, whitespace) to `-`.
pub fn sanitize_name(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '_' || c.is_whitespace() { '-' } else { c })
        .collect();

    let mut out = String::with_capacity(mapped.len());
    for c in mapped.chars() {
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

/// Session name for a branch; trunk branches and missing VCS fall back to
/// `<project>-<YYYYMMDD>`.
pub fn derive_name(branch: Option<&str>, project: &str, today: NaiveDate) -> String {
    let candidate = branch.map(sanitize_name).filter(|b| !b.is_empty());
    match candidate.as_deref() {
        Some("main") | Some("master") | None => {
            format!("{}-{}", sanitize_name(project), today.format("%Y%m%d"))
        }
        Some(name) => name.to_string(),
    }
}

/// Whether a document file name denotes a template.
pub fn is_template(file_name: &str) -> bool {
    file_name.starts_with(TEMPLATE_PREFIX)
}
