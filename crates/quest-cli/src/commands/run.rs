use quest_config::QuestConfig;
use quest_core::{Role, Task, TurnContent};

pub(super) async fn cmd_run(
    config: QuestConfig,
    url: String,
    email: Option<String>,
    transcript: bool,
) -> quest_core::Result<()> {
    quest_tools::prepare_dirs(&config.tools).await?;
    let controller = super::build_controller(&config)?;

    let task = Task {
        email: email.or_else(|| config.task.email.clone()).unwrap_or_default(),
        secret: config.task.secret.clone().unwrap_or_default(),
        url,
    };
    println!("Solving {} ...", task.url);
    let outcome = controller.run(&task).await;

    if transcript {
        for turn in &outcome.turns {
            // The system prompt is long and identical for every run.
            if turn.role == Role::System {
                continue;
            }
            let body = match &turn.content {
                TurnContent::Text { text } => text.clone(),
                _ => turn.summary(500),
            };
            println!("[{:>3}] {:<11} {}", turn.seq, turn.role.to_string(), body);
        }
        println!();
    }

    println!("Session  {}", outcome.session_id);
    println!("Status   {}", outcome.status);
    println!("Steps    {}", outcome.steps);
    println!("Elapsed  {:.1}s", outcome.elapsed.as_secs_f64());
    println!("Turns    {}", outcome.turns.len());
    if let Some(ref error) = outcome.error {
        println!("Error    {error}");
    }
    Ok(())
}
