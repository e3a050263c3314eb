//! Supervisor assignment protocol
//!
//! The supervisor hands out work by writing tagged sections in free text:
//!
//! ```text
//! Good progress. Next steps:
//! [FRONTEND_TASK]
//! Build the login form.
//! [BACKEND_REWORK]
//! The /login handler returns 500 on bad passwords, fix it.
//! ```
//!
//! A section runs from the end of its tag to the start of the next
//! recognized tag or the end of the text. If a tag appears more than once the
//! first occurrence wins. Sections that are empty after trimming hand out no
//! work, but the bare tag still counts as present when deciding completion.

use serde::Serialize;

pub const FRONTEND_TASK_TAG: &str = "[FRONTEND_TASK]";
pub const BACKEND_TASK_TAG: &str = "[BACKEND_TASK]";
pub const FRONTEND_REWORK_TAG: &str = "[FRONTEND_REWORK]";
pub const BACKEND_REWORK_TAG: &str = "[BACKEND_REWORK]";
pub const COMPLETION_TAG: &str = "[PROJECT_COMPLETE]";

const ALL_TAGS: [&str; 5] = [
    FRONTEND_TASK_TAG,
    BACKEND_TASK_TAG,
    FRONTEND_REWORK_TAG,
    BACKEND_REWORK_TAG,
    COMPLETION_TAG,
];

/// Work handed out by one supervisor response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub frontend_task: Option<String>,
    pub backend_task: Option<String>,
    pub frontend_rework: Option<String>,
    pub backend_rework: Option<String>,
    /// Explicit `[PROJECT_COMPLETE]` marker was present
    pub completion_marker: bool,
    /// A `[..._TASK]` tag appeared, with or without a body
    #[serde(skip)]
    pub fresh_tag_present: bool,
    /// A `[..._REWORK]` tag appeared, with or without a body
    #[serde(skip)]
    pub rework_tag_present: bool,
}

/// A task resolved for one role, after rework has replaced fresh work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub text: String,
    pub rework: bool,
}

impl Assignment {
    /// True if any section hands out work
    pub fn has_work(&self) -> bool {
        self.frontend().is_some() || self.backend().is_some()
    }

    /// True if a fresh (non-rework) task tag is present, even with an empty body
    pub fn has_fresh_tasks(&self) -> bool {
        self.fresh_tag_present
    }

    /// Frontend work for this round; rework takes the place of a fresh task
    pub fn frontend(&self) -> Option<ResolvedTask> {
        resolve(&self.frontend_task, &self.frontend_rework)
    }

    /// Backend work for this round; rework takes the place of a fresh task
    pub fn backend(&self) -> Option<ResolvedTask> {
        resolve(&self.backend_task, &self.backend_rework)
    }

    /// Whether this response ends the orchestration
    ///
    /// Completion needs round 2 or later and the explicit marker, with no
    /// task or rework tag anywhere in the same response.
    pub fn signals_completion(&self, round: usize) -> bool {
        round >= 2
            && self.completion_marker
            && !self.has_fresh_tasks()
            && !self.rework_tag_present
            && !self.has_work()
    }
}

fn resolve(task: &Option<String>, rework: &Option<String>) -> Option<ResolvedTask> {
    match (rework, task) {
        (Some(text), _) => Some(ResolvedTask {
            text: text.clone(),
            rework: true,
        }),
        (None, Some(text)) => Some(ResolvedTask {
            text: text.clone(),
            rework: false,
        }),
        (None, None) => None,
    }
}

/// Parse a supervisor response into an assignment
pub fn parse_assignment(text: &str) -> Assignment {
    Assignment {
        frontend_task: section(text, FRONTEND_TASK_TAG),
        backend_task: section(text, BACKEND_TASK_TAG),
        frontend_rework: section(text, FRONTEND_REWORK_TAG),
        backend_rework: section(text, BACKEND_REWORK_TAG),
        completion_marker: text.contains(COMPLETION_TAG),
        fresh_tag_present: text.contains(FRONTEND_TASK_TAG) || text.contains(BACKEND_TASK_TAG),
        rework_tag_present: text.contains(FRONTEND_REWORK_TAG) || text.contains(BACKEND_REWORK_TAG),
    }
}

/// Supervisor text without any protocol tags or their sections
///
/// Used as the human-readable part of a completion summary.
pub fn strip_tags(text: &str) -> String {
    let first_tag = ALL_TAGS.iter().filter_map(|tag| text.find(tag)).min();
    let head = match first_tag {
        Some(at) => &text[..at],
        None => text,
    };
    head.trim().to_string()
}

fn section(text: &str, tag: &str) -> Option<String> {
    let start = text.find(tag)? + tag.len();
    let rest = &text[start..];
    let end = ALL_TAGS
        .iter()
        .filter_map(|other| rest.find(other))
        .min()
        .unwrap_or(rest.len());
    let body = rest[..end].trim();
    (!body.is_empty()).then(|| body.to_string())
}
