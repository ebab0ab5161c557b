//! Session lifecycle over the active-session directory.
//!
//! ## Transitions
//!
//! ```text
//! NoSession ── create() ──► Active
//!   │                         │
//!   │  derive name from       ├─► summarize (best effort)
//!   │  branch or project      │
//!   │                         ├─► copy every non-template document
//!   └─► init script or        │
//!       in-process marker     ├─► delete the copied documents
//!                             │
//!            NoSession ◄──────┘  archive()
//! ```
//!
//! External scripts perform initialization and archiving when present; the
//! in-process implementations take over when they are missing or fail.

mod collaborators;
mod lifecycle;
mod marker;

pub use collaborators::{
    InProcessArchiver, InProcessInitializer, SUMMARY_FILE, ScriptArchiver, ScriptInitializer,
    ScriptSummaryGenerator, SessionArchiver, SessionInitializer, SummaryGenerator, archiver,
    initializer,
};
pub use lifecycle::*;
pub use marker::{
    MARKER_FILE, PLACEHOLDER_NAME, SessionDescriptor, SessionStatus, derive_name, is_template,
    sanitize_name,
};
