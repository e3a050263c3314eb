//! Prompts and context framing for the supervisor and its workers

use crate::protocol::assignment::{
    BACKEND_REWORK_TAG, BACKEND_TASK_TAG, COMPLETION_TAG, FRONTEND_REWORK_TAG, FRONTEND_TASK_TAG,
};
use crate::protocol::truncate_output;

use super::round::OrchestrationRound;

pub const DEFAULT_SUPERVISOR_PROMPT: &str = "You are the technical lead of a small software team with a frontend engineer and a backend engineer. \
You plan the work, hand out tasks and review what comes back. You never write code yourself.";

pub const DEFAULT_FRONTEND_PROMPT: &str = "You are the frontend engineer of a small software team. \
You build user interfaces: HTML, CSS, JavaScript and the client side of APIs.";

pub const DEFAULT_BACKEND_PROMPT: &str = "You are the backend engineer of a small software team. \
You build servers, APIs, data models and scripts.";

/// Supervisor system prompt; the assignment protocol is always appended
pub fn supervisor_system_prompt(role_prompt: Option<&str>) -> String {
    let role_prompt = role_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SUPERVISOR_PROMPT);
    format!(
        "{role_prompt}\n\n\
         ## How to assign work\n\n\
         Write each assignment after its tag, on its own line:\n\n\
         {FRONTEND_TASK_TAG}\n<new work for the frontend engineer>\n\
         {BACKEND_TASK_TAG}\n<new work for the backend engineer>\n\
         {FRONTEND_REWORK_TAG}\n<fixes the frontend engineer must make>\n\
         {BACKEND_REWORK_TAG}\n<fixes the backend engineer must make>\n\n\
         Leave out the tags for roles with nothing to do. Both engineers work at the same time, \
         so make their tasks independent.\n\n\
         When you have reviewed results and everything is finished, reply with {COMPLETION_TAG} \
         followed by a short summary, and no task tags."
    )
}

/// First-round supervisor input
pub fn initial_context(instruction: &str, project_context: Option<&str>) -> String {
    let mut out = format!("## Instruction\n{}\n", instruction.trim());
    if let Some(context) = project_context.map(str::trim).filter(|c| !c.is_empty()) {
        out.push_str(&format!("\n## Project context\n{context}\n"));
    }
    out.push_str("\nPlan the first round of work and assign it.");
    out
}

/// Supervisor input for rounds after the first
pub fn review_context(
    instruction: &str,
    project_context: Option<&str>,
    previous: &OrchestrationRound,
    result_limit: usize,
) -> String {
    let mut out = format!("## Instruction\n{}\n", instruction.trim());
    if let Some(context) = project_context.map(str::trim).filter(|c| !c.is_empty()) {
        out.push_str(&format!("\n## Project context\n{context}\n"));
    }
    out.push_str(&format!("\n## Results of round {}\n", previous.round));
    for (role, result) in [("Frontend", &previous.frontend_result), ("Backend", &previous.backend_result)] {
        match result {
            Some(text) => out.push_str(&format!(
                "\n### {role} engineer\n{}\n",
                truncate_output(text.trim(), result_limit)
            )),
            None => out.push_str(&format!("\n### {role} engineer\n(no task this round)\n")),
        }
    }
    out.push_str(&format!(
        "\nReview the results against the instruction. Assign further work or fixes, \
         or reply with {COMPLETION_TAG} if the project is done."
    ));
    out
}

/// Task text given to a frontend or backend agent
pub fn worker_task(
    instruction: &str,
    project_context: Option<&str>,
    task: &str,
    rework: bool,
) -> String {
    let mut out = format!("## Project\n{}\n", instruction.trim());
    if let Some(context) = project_context.map(str::trim).filter(|c| !c.is_empty()) {
        out.push_str(&format!("\n## Project context\n{context}\n"));
    }
    let heading = if rework {
        "Rework requested by your lead"
    } else {
        "Your task"
    };
    out.push_str(&format!("\n## {heading}\n{}\n", task.trim()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Assignment;

    #[test]
    fn test_supervisor_prompt_always_has_protocol() {
        let prompt = supervisor_system_prompt(Some("Lead a team."));
        assert!(prompt.starts_with("Lead a team."));
        assert!(prompt.contains(FRONTEND_TASK_TAG));
        assert!(prompt.contains(COMPLETION_TAG));
    }

    #[test]
    fn test_review_context_frames_both_roles() {
        let round = OrchestrationRound {
            round: 1,
            supervisor_output: String::new(),
            assignment: Assignment::default(),
            frontend_result: Some("built the form".to_string()),
            backend_result: None,
        };
        let ctx = review_context("make an app", Some("uses flask"), &round, 1000);
        assert!(ctx.contains("## Results of round 1"));
        assert!(ctx.contains("built the form"));
        assert!(ctx.contains("(no task this round)"));
        assert!(ctx.contains("uses flask"));
    }

    #[test]
    fn test_worker_task_marks_rework() {
        assert!(worker_task("app", None, "fix it", true).contains("Rework requested"));
        assert!(worker_task("app", None, "build it", false).contains("## Your task"));
    }
}
