use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use quest_core::{SessionId, Task};

use crate::controller::SessionController;
use crate::table::SessionTable;

/// Starts sessions as background tasks and keeps their records for inspection.
#[derive(Clone)]
pub struct Launcher {
    controller: Arc<SessionController>,
    table: SessionTable,
}

impl Launcher {
    pub fn new(controller: SessionController) -> Self {
        Self::with_table(controller, SessionTable::new())
    }

    /// Launch into `table`, e.g. one with a configured retention.
    pub fn with_table(controller: SessionController, table: SessionTable) -> Self {
        Self {
            controller: Arc::new(controller.with_table(table.clone())),
            table,
        }
    }

    /// Spawn a session for `task` and return its id without waiting on the outcome.
    pub fn launch(&self, task: Task) -> SessionId {
        let id = Uuid::new_v4();
        // Open the record before spawning so the id is inspectable immediately.
        self.table.open(id, &task.url);
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move {
            let outcome = controller.run_with_id(id, &task).await;
            info!(
                session = %outcome.session_id,
                status = %outcome.status,
                steps = outcome.steps,
                "background session done"
            );
        });
        id
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }
}
