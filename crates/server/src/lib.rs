use db::DBService;
use services::services::extractor::ExtractionService;
use services::services::task::TaskService;

pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;

/// Process-wide handles, read-only after startup; cloned into every
/// request handler.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    task_service: TaskService,
    extractor: ExtractionService,
}

impl AppState {
    pub fn new(db: DBService, extractor: ExtractionService) -> Self {
        Self {
            db,
            task_service: TaskService::new(),
            extractor,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn tasks(&self) -> &TaskService {
        &self.task_service
    }

    pub fn extractor(&self) -> &ExtractionService {
        &self.extractor
    }
}
