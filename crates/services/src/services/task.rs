use db::models::task::{CreateTask, Task, TaskBoard, TaskFilter, TaskPage, TaskPriority, TaskStatus};
use db::{ConnectionTrait, DbErr, SqlErr};
use serde::Deserialize;
use thiserror::Error;
use ts_rs::TS;
use utils::pagination::Pagination;
use uuid::Uuid;

use super::due_date::{self, DueDateError};
use super::extractor::DraftTask;

const TITLE_MIN: usize = 10;
const TITLE_MAX: usize = 250;
const DESCRIPTION_MIN: usize = 10;
const DESCRIPTION_MAX: usize = 500;
const TRANSCRIPT_MIN: usize = 10;
const TRANSCRIPT_MAX: usize = 1000;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum TaskServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("{0}")]
    ValidationError(String),
    #[error("A task with the same title and description already exists")]
    DuplicateTask,
    #[error("{0}")]
    InvalidPagination(String),
    #[error(transparent)]
    DueDate(#[from] DueDateError),
}

pub type Result<T> = std::result::Result<T, TaskServiceError>;

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TaskListRequest {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct BoardRequest {
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Clone, Default)]
pub struct TaskService;

impl TaskService {
    pub fn new() -> Self {
        Self
    }

    pub async fn create<C: ConnectionTrait>(
        &self,
        db: &C,
        payload: CreateTaskRequest,
    ) -> Result<Task> {
        self.create_inner(db, payload, true).await
    }

    /// Persists an extractor draft. The draft went through reconciliation,
    /// not validation, so the full pipeline still runs; the one concession
    /// is that a discarded due-date guess stores as none.
    pub async fn create_from_draft<C: ConnectionTrait>(
        &self,
        db: &C,
        draft: DraftTask,
        transcript: &str,
    ) -> Result<Task> {
        let payload = CreateTaskRequest {
            title: Some(draft.title),
            description: Some(draft.description),
            status: None,
            priority: Some(draft.priority.to_string()),
            due_date: draft.due_date,
            transcript: Some(transcript.to_string()),
        };
        self.create_inner(db, payload, false).await
    }

    async fn create_inner<C: ConnectionTrait>(
        &self,
        db: &C,
        payload: CreateTaskRequest,
        require_due_date: bool,
    ) -> Result<Task> {
        let title = require_text("title", payload.title.as_deref(), TITLE_MIN, TITLE_MAX)?;
        let description = require_text(
            "description",
            payload.description.as_deref(),
            DESCRIPTION_MIN,
            DESCRIPTION_MAX,
        )?;
        let status = match normalized(payload.status.as_deref()) {
            Some(raw) => parse_status(raw)?,
            None => TaskStatus::default(),
        };
        let priority = match normalized(payload.priority.as_deref()) {
            Some(raw) => parse_priority(raw)?,
            None => {
                return Err(TaskServiceError::ValidationError(
                    "priority is required".to_string(),
                ));
            }
        };
        let due_date = match normalized(payload.due_date.as_deref()) {
            Some(raw) => Some(due_date::parse(raw)?),
            None if require_due_date => {
                return Err(TaskServiceError::ValidationError(
                    "due_date is required".to_string(),
                ));
            }
            None => None,
        };
        let transcript = optional_text(
            "transcript",
            payload.transcript.as_deref(),
            TRANSCRIPT_MIN,
            TRANSCRIPT_MAX,
        )?;

        if Task::find_duplicate(db, &title, &description, None).await? {
            return Err(TaskServiceError::DuplicateTask);
        }

        let data = CreateTask {
            title,
            description,
            status,
            priority,
            due_date,
            transcript,
        };
        Task::create(db, &data, Uuid::new_v4())
            .await
            .map_err(map_write_err)
    }

    /// Partial merge over the loaded record: omitted fields keep their
    /// current values, provided fields re-validate.
    pub async fn update<C: ConnectionTrait>(
        &self,
        db: &C,
        existing: Task,
        payload: UpdateTaskRequest,
    ) -> Result<Task> {
        let title = match payload.title.as_deref() {
            Some(raw) => require_text("title", Some(raw), TITLE_MIN, TITLE_MAX)?,
            None => existing.title,
        };
        let description = match payload.description.as_deref() {
            Some(raw) => require_text(
                "description",
                Some(raw),
                DESCRIPTION_MIN,
                DESCRIPTION_MAX,
            )?,
            None => existing.description,
        };
        let status = match normalized(payload.status.as_deref()) {
            Some(raw) => parse_status(raw)?,
            None => existing.status,
        };
        let priority = match normalized(payload.priority.as_deref()) {
            Some(raw) => parse_priority(raw)?,
            None => existing.priority,
        };
        let due_date = match normalized(payload.due_date.as_deref()) {
            Some(raw) => Some(due_date::parse(raw)?),
            None => existing.due_date,
        };
        let transcript = match normalized(payload.transcript.as_deref()) {
            Some(raw) => optional_text("transcript", Some(raw), TRANSCRIPT_MIN, TRANSCRIPT_MAX)?,
            None => existing.transcript,
        };

        if Task::find_duplicate(db, &title, &description, Some(existing.id)).await? {
            return Err(TaskServiceError::DuplicateTask);
        }

        let data = CreateTask {
            title,
            description,
            status,
            priority,
            due_date,
            transcript,
        };
        Task::update(db, existing.id, &data)
            .await
            .map_err(map_write_err)
    }

    pub async fn delete<C: ConnectionTrait>(&self, db: &C, id: Uuid) -> Result<()> {
        let rows_affected = Task::delete(db, id).await?;
        if rows_affected == 0 {
            return Err(TaskServiceError::Database(DbErr::RecordNotFound(
                "Task not found".to_string(),
            )));
        }
        Ok(())
    }

    pub async fn list<C: ConnectionTrait>(
        &self,
        db: &C,
        request: TaskListRequest,
    ) -> Result<(TaskPage, Pagination)> {
        let (page, limit) = validate_page_params(request.page, request.limit)?;
        let filter = TaskFilter {
            status: match normalized(request.status.as_deref()) {
                Some(raw) => Some(parse_status(raw)?),
                None => None,
            },
            priority: match normalized(request.priority.as_deref()) {
                Some(raw) => Some(parse_priority(raw)?),
                None => None,
            },
            due_date: normalized(request.due_date.as_deref()).map(canonical_filter_date),
            search: normalized(request.search.as_deref()).map(str::to_string),
        };

        let page_data = Task::search(db, &filter, page, limit).await?;
        let pagination = Pagination::new(page, limit, page_data.total);
        Ok((page_data, pagination))
    }

    pub async fn board<C: ConnectionTrait>(
        &self,
        db: &C,
        request: BoardRequest,
    ) -> Result<(TaskBoard, Pagination)> {
        let (page, limit) = validate_page_params(request.page, request.limit)?;
        let filter = TaskFilter {
            status: None,
            priority: match normalized(request.priority.as_deref()) {
                Some(raw) => Some(parse_priority(raw)?),
                None => None,
            },
            due_date: normalized(request.due_date.as_deref()).map(canonical_filter_date),
            search: normalized(request.search.as_deref()).map(str::to_string),
        };

        let board = Task::board(db, &filter, page, limit).await?;

        let bucket_totals = [board.todo.total, board.in_progress.total, board.done.total];
        let total = bucket_totals.iter().sum();
        let total_pages = bucket_totals
            .iter()
            .map(|bucket| bucket.div_ceil(limit))
            .max()
            .unwrap_or(0);
        let pagination = Pagination {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        };

        Ok((board, pagination))
    }
}

fn map_write_err(err: DbErr) -> TaskServiceError {
    // The NOCASE unique index catches races the pre-insert check cannot.
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        TaskServiceError::DuplicateTask
    } else {
        TaskServiceError::Database(err)
    }
}

fn normalized(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn require_text(
    field: &str,
    value: Option<&str>,
    min: usize,
    max: usize,
) -> Result<String> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(TaskServiceError::ValidationError(format!(
            "{field} is required"
        )));
    }
    let length = value.chars().count();
    if length < min || length > max {
        return Err(TaskServiceError::ValidationError(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(value.to_string())
}

fn optional_text(
    field: &str,
    value: Option<&str>,
    min: usize,
    max: usize,
) -> Result<Option<String>> {
    let Some(value) = normalized(value) else {
        return Ok(None);
    };
    let length = value.chars().count();
    if length < min || length > max {
        return Err(TaskServiceError::ValidationError(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

fn parse_status(raw: &str) -> Result<TaskStatus> {
    raw.to_lowercase().parse::<TaskStatus>().map_err(|_| {
        TaskServiceError::ValidationError(
            "status must be one of: todo, inprogress, done".to_string(),
        )
    })
}

fn parse_priority(raw: &str) -> Result<TaskPriority> {
    raw.to_lowercase().parse::<TaskPriority>().map_err(|_| {
        TaskServiceError::ValidationError(
            "priority must be one of: low, medium, high, critical".to_string(),
        )
    })
}

fn validate_page_params(page: Option<i64>, limit: Option<i64>) -> Result<(u64, u64)> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if page < 1 {
        return Err(TaskServiceError::InvalidPagination(
            "page must be at least 1".to_string(),
        ));
    }
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(TaskServiceError::InvalidPagination(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok((page as u64, limit as u64))
}

fn canonical_filter_date(raw: &str) -> String {
    // A parseable filter is canonicalized so it can match stored text;
    // anything else is passed through and simply matches nothing.
    due_date::canonicalize(raw).unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use db::DBService;
    use db::models::task::TaskPriority;

    use super::*;
    use crate::services::extractor::DraftTask;

    async fn setup_db() -> DBService {
        DBService::new_with_url("sqlite::memory:").await.unwrap()
    }

    fn valid_payload(title: &str, description: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            status: None,
            priority: Some("medium".to_string()),
            due_date: Some("31-12-2099".to_string()),
            transcript: None,
        }
    }

    #[tokio::test]
    async fn create_trims_and_canonicalizes() {
        let db = setup_db().await;
        let service = TaskService::new();

        let mut payload = valid_payload(
            "  Review quarterly budget  ",
            "  Walk through every cost center with finance  ",
        );
        payload.due_date = Some("2099-12-31".to_string());

        let created = service.create(&db.connection, payload).await.unwrap();
        let fetched = Task::find_by_id(&db.connection, created.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.title, "Review quarterly budget");
        assert_eq!(
            fetched.description,
            "Walk through every cost center with finance"
        );
        assert_eq!(fetched.due_date.as_deref(), Some("31-12-2099"));
        assert_eq!(fetched.status, TaskStatus::Todo);
        assert_eq!(fetched.priority, TaskPriority::Medium);
    }

    #[tokio::test]
    async fn create_requires_priority_and_due_date() {
        let db = setup_db().await;
        let service = TaskService::new();

        let mut payload = valid_payload("Review quarterly budget", "Walk through cost centers");
        payload.priority = None;
        let err = service.create(&db.connection, payload).await.unwrap_err();
        assert!(matches!(err, TaskServiceError::ValidationError(msg) if msg.contains("priority")));

        let mut payload = valid_payload("Review quarterly budget", "Walk through cost centers");
        payload.due_date = None;
        let err = service.create(&db.connection, payload).await.unwrap_err();
        assert!(matches!(err, TaskServiceError::ValidationError(msg) if msg.contains("due_date")));
    }

    #[tokio::test]
    async fn create_rejects_out_of_bounds_text() {
        let db = setup_db().await;
        let service = TaskService::new();

        let err = service
            .create(&db.connection, valid_payload("too short", "Walk through cost centers"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskServiceError::ValidationError(msg) if msg.contains("title")));

        let err = service
            .create(
                &db.connection,
                valid_payload("Review quarterly budget", &"d".repeat(501)),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, TaskServiceError::ValidationError(msg) if msg.contains("description"))
        );
    }

    #[tokio::test]
    async fn create_rejects_unknown_enum_values() {
        let db = setup_db().await;
        let service = TaskService::new();

        let mut payload = valid_payload("Review quarterly budget", "Walk through cost centers");
        payload.status = Some("archived".to_string());
        let err = service.create(&db.connection, payload).await.unwrap_err();
        assert!(matches!(err, TaskServiceError::ValidationError(msg) if msg.contains("status")));

        let mut payload = valid_payload("Review quarterly budget", "Walk through cost centers");
        payload.priority = Some("urgent".to_string());
        let err = service.create(&db.connection, payload).await.unwrap_err();
        assert!(matches!(err, TaskServiceError::ValidationError(msg) if msg.contains("priority")));
    }

    #[tokio::test]
    async fn duplicate_detection_is_case_insensitive() {
        let db = setup_db().await;
        let service = TaskService::new();

        service
            .create(
                &db.connection,
                valid_payload("Review quarterly budget", "Walk through cost centers"),
            )
            .await
            .unwrap();

        let err = service
            .create(
                &db.connection,
                valid_payload("REVIEW QUARTERLY BUDGET", "Walk through cost centers"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskServiceError::DuplicateTask));
    }

    #[tokio::test]
    async fn update_merges_partially_and_respects_duplicates() {
        let db = setup_db().await;
        let service = TaskService::new();

        let first = service
            .create(
                &db.connection,
                valid_payload("Review quarterly budget", "Walk through cost centers"),
            )
            .await
            .unwrap();
        service
            .create(
                &db.connection,
                valid_payload("Prepare board deck", "Summarize the quarter for the board"),
            )
            .await
            .unwrap();

        // Keeping its own (title, description) pair is allowed.
        let updated = service
            .update(
                &db.connection,
                first.clone(),
                UpdateTaskRequest {
                    status: Some("inprogress".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(updated.title, first.title);

        // Colliding with another record's pair is not.
        let err = service
            .update(
                &db.connection,
                updated,
                UpdateTaskRequest {
                    title: Some("PREPARE BOARD DECK".to_string()),
                    description: Some("Summarize the quarter for the board".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskServiceError::DuplicateTask));
    }

    #[tokio::test]
    async fn list_paginates_with_boundaries() {
        let db = setup_db().await;
        let service = TaskService::new();

        for i in 0..7 {
            service
                .create(
                    &db.connection,
                    valid_payload(
                        &format!("Inventory count batch {i}"),
                        &format!("Count the items in storage room number {i}"),
                    ),
                )
                .await
                .unwrap();
        }

        let (page_data, pagination) = service
            .list(
                &db.connection,
                TaskListRequest {
                    page: Some(1),
                    limit: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page_data.tasks.len(), 3);
        assert_eq!(pagination.total, 7);
        assert_eq!(pagination.total_pages, 3);
        assert!(pagination.has_next);
        assert!(!pagination.has_prev);

        let (page_data, pagination) = service
            .list(
                &db.connection,
                TaskListRequest {
                    page: Some(3),
                    limit: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page_data.tasks.len(), 1);
        assert!(!pagination.has_next);
        assert!(pagination.has_prev);
    }

    #[tokio::test]
    async fn list_rejects_invalid_page_params() {
        let db = setup_db().await;
        let service = TaskService::new();

        let err = service
            .list(
                &db.connection,
                TaskListRequest {
                    page: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskServiceError::InvalidPagination(_)));

        let err = service
            .list(
                &db.connection,
                TaskListRequest {
                    limit: Some(101),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskServiceError::InvalidPagination(_)));
    }

    #[tokio::test]
    async fn list_filters_and_searches() {
        let db = setup_db().await;
        let service = TaskService::new();

        let mut payload = valid_payload("Review quarterly budget", "Walk through cost centers");
        payload.priority = Some("high".to_string());
        service.create(&db.connection, payload).await.unwrap();
        service
            .create(
                &db.connection,
                valid_payload("Prepare board deck", "Summarize the QUARTER for the board"),
            )
            .await
            .unwrap();

        let (page_data, _) = service
            .list(
                &db.connection,
                TaskListRequest {
                    priority: Some("high".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page_data.tasks.len(), 1);
        assert_eq!(page_data.tasks[0].title, "Review quarterly budget");

        // Case-insensitive substring over title OR description.
        let (page_data, pagination) = service
            .list(
                &db.connection,
                TaskListRequest {
                    search: Some("quarter".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(pagination.total, 2);
        assert_eq!(page_data.tasks.len(), 2);
    }

    #[tokio::test]
    async fn board_counts_and_pages_per_bucket() {
        let db = setup_db().await;
        let service = TaskService::new();

        for (i, status) in ["todo", "todo", "todo", "inprogress"].iter().enumerate() {
            let mut payload = valid_payload(
                &format!("Inventory count batch {i}"),
                &format!("Count the items in storage room number {i}"),
            );
            payload.status = Some(status.to_string());
            service.create(&db.connection, payload).await.unwrap();
        }

        let (board, pagination) = service
            .board(
                &db.connection,
                BoardRequest {
                    page: Some(1),
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(board.todo.total, 3);
        assert_eq!(board.in_progress.total, 1);
        assert_eq!(board.done.total, 0);
        assert_eq!(board.todo.tasks.len(), 2);
        assert_eq!(board.in_progress.tasks.len(), 1);
        assert!(board.done.tasks.is_empty());

        let counted: u64 = board.status_counts.values().sum();
        assert_eq!(counted, 4);
        assert_eq!(pagination.total, 4);
        // todo needs two pages at limit 2; the board reports the max.
        assert_eq!(pagination.total_pages, 2);
        assert!(pagination.has_next);
    }

    #[tokio::test]
    async fn draft_persists_transcript_verbatim() {
        let db = setup_db().await;
        let service = TaskService::new();

        let transcript = "remember to book the dentist appointment for the kids next month";
        let draft = DraftTask {
            title: "Book the dentist appointment".to_string(),
            description: transcript.to_string(),
            priority: TaskPriority::Medium,
            due_date: None,
        };

        let created = service
            .create_from_draft(&db.connection, draft, transcript)
            .await
            .unwrap();
        assert_eq!(created.transcript.as_deref(), Some(transcript));
        assert!(created.due_date.is_none());
        assert_eq!(created.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let db = setup_db().await;
        let service = TaskService::new();

        let created = service
            .create(
                &db.connection,
                valid_payload("Review quarterly budget", "Walk through cost centers"),
            )
            .await
            .unwrap();

        service.delete(&db.connection, created.id).await.unwrap();
        assert!(
            Task::find_by_id(&db.connection, created.id)
                .await
                .unwrap()
                .is_none()
        );

        let err = service.delete(&db.connection, created.id).await.unwrap_err();
        assert!(matches!(
            err,
            TaskServiceError::Database(DbErr::RecordNotFound(_))
        ));
    }
}
