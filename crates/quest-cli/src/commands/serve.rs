use tracing::{info, warn};

use quest_config::QuestConfig;
use quest_runtime::{Launcher, SessionTable};

pub(super) async fn cmd_serve(
    mut config: QuestConfig,
    listen: Option<String>,
) -> quest_core::Result<()> {
    if let Some(listen) = listen {
        config.server.listen = listen;
    }

    println!("Quest v{}", env!("CARGO_PKG_VERSION"));
    println!("   Model:    {} ({})", config.llm.model, config.llm.provider);
    println!(
        "   Budget:   {}s / {} steps per session",
        config.session.deadline_secs, config.session.step_limit
    );
    println!(
        "   Provider: {} calls per {}s",
        config.llm.requests_per_window, config.llm.window_secs
    );
    println!(
        "   Secret:   {}",
        if config.task.secret.is_some() {
            "configured"
        } else {
            "missing"
        }
    );
    println!("   Listen:   http://{}", config.server.listen);
    println!();

    if config.task.secret.is_none() {
        warn!("no task secret configured; every POST /solve will be refused");
    }

    quest_tools::prepare_dirs(&config.tools).await?;
    let controller = super::build_controller(&config)?;
    let launcher = Launcher::with_table(
        controller,
        SessionTable::with_retention(config.server.max_retained_sessions),
    );
    info!(
        tools = launcher.controller().registry().len(),
        retained = config.server.max_retained_sessions,
        "engine ready"
    );

    quest_server::start_server(&config.server, config.task.clone(), launcher).await
}
