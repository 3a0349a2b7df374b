//! Text the controller seeds and refreshes each session with.

use quest_core::Task;

use crate::session::Session;

/// System turn seeded at the start of every session.
pub fn system_prompt(tool_names: &[String]) -> String {
    let tools = if tool_names.is_empty() {
        "(none registered)".to_string()
    } else {
        tool_names.join(", ")
    };
    format!(
        "You drive a chain of remote data challenges to completion without human help.\n\
         \n\
         Available tools: {tools}.\n\
         \n\
         Working method:\n\
         - Open the current challenge page with render_page first. Instructions are often \
         hidden in scripts or base64 blobs (atob(...)); decode them before acting.\n\
         - Fetch any referenced files with download_file, then analyse them with run_code. \
         Install missing Python packages with add_dependencies.\n\
         - Submit with post_request to the endpoint named on the page, never a guessed one. \
         The payload is {{\"url\": <current challenge url>, \"answer\": <answer>}}; \
         email and secret are filled in for you.\n\
         - An answer may be a number, string, boolean, base64 data URI or JSON object.\n\
         - If the submission response carries a new url, continue with it. If it says the \
         answer was wrong, re-read the task and retry while time allows.\n\
         - Tool failures are reported back to you; adjust the arguments and try again.\n\
         - When no further challenge remains, reply with a short summary and no tool call.\n\
         \n\
         Time is limited. Prefer one decisive step over exploratory ones."
    )
}

/// User turn naming the initial target.
pub fn initial_request(task: &Task) -> String {
    format!("Solve the challenge starting at: {}", task.url)
}

/// Ephemeral per-step note. Sent after the log, never appended to it.
pub fn context_note(task: &Task, session: &Session) -> String {
    format!(
        "[context] email={} start_url={} step={}/{} elapsed={}s remaining={}s",
        task.email,
        session.target,
        session.step_count(),
        session.step_limit(),
        session.elapsed().as_secs(),
        session.remaining().as_secs(),
    )
}
