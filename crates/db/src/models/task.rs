use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, ExprTrait, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::task;
pub use crate::types::{TaskPriority, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub transcript: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated write payload. Field constraints are enforced by the service
/// layer before anything reaches this struct.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct BoardColumn {
    pub tasks: Vec<Task>,
    pub total: u64,
}

/// Three fixed status columns, each independently paginated with the one
/// shared page/limit.
#[derive(Debug, Clone, Serialize, TS)]
pub struct TaskBoard {
    pub todo: BoardColumn,
    #[serde(rename = "inprogress")]
    pub in_progress: BoardColumn,
    pub done: BoardColumn,
    pub status_counts: HashMap<TaskStatus, u64>,
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn lower(column: task::Column) -> Expr {
    Expr::expr(Func::lower(Expr::col(column)))
}

impl TaskFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(status) = &self.status {
            condition = condition.add(task::Column::Status.eq(status.clone()));
        }
        if let Some(priority) = &self.priority {
            condition = condition.add(task::Column::Priority.eq(priority.clone()));
        }
        if let Some(due_date) = &self.due_date {
            condition = condition.add(task::Column::DueDate.eq(due_date.clone()));
        }
        if let Some(search) = &self.search {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            condition = condition.add(
                Condition::any()
                    .add(lower(task::Column::Title).like(LikeExpr::new(pattern.clone()).escape('\\')))
                    .add(lower(task::Column::Description).like(LikeExpr::new(pattern).escape('\\'))),
            );
        }
        condition
    }
}

impl Task {
    fn from_model(model: task::Model) -> Self {
        Self {
            id: model.uuid,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            due_date: model.due_date,
            transcript: model.transcript,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?;

        Ok(record.map(Self::from_model))
    }

    /// Case-insensitive match on the trimmed (title, description) pair.
    /// `exclude` skips the record being updated.
    pub async fn find_duplicate<C: ConnectionTrait>(
        db: &C,
        title: &str,
        description: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, DbErr> {
        let mut condition = Condition::all()
            .add(lower(task::Column::Title).eq(title.to_lowercase()))
            .add(lower(task::Column::Description).eq(description.to_lowercase()));
        if let Some(id) = exclude {
            condition = condition.add(task::Column::Uuid.ne(id));
        }

        let matches = task::Entity::find().filter(condition).count(db).await?;
        Ok(matches > 0)
    }

    pub async fn search<C: ConnectionTrait>(
        db: &C,
        filter: &TaskFilter,
        page: u64,
        limit: u64,
    ) -> Result<TaskPage, DbErr> {
        let condition = filter.condition();
        let total = task::Entity::find()
            .filter(condition.clone())
            .count(db)
            .await?;
        let models = task::Entity::find()
            .filter(condition)
            .order_by_desc(task::Column::CreatedAt)
            .offset((page - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        Ok(TaskPage {
            tasks: models.into_iter().map(Self::from_model).collect(),
            total,
        })
    }

    /// One count + one fetch per status bucket; the buckets paginate
    /// independently, so a single global pass cannot serve the board.
    pub async fn board<C: ConnectionTrait>(
        db: &C,
        filter: &TaskFilter,
        page: u64,
        limit: u64,
    ) -> Result<TaskBoard, DbErr> {
        let todo = Self::board_column(db, filter, TaskStatus::Todo, page, limit).await?;
        let in_progress = Self::board_column(db, filter, TaskStatus::InProgress, page, limit).await?;
        let done = Self::board_column(db, filter, TaskStatus::Done, page, limit).await?;

        let status_counts = HashMap::from([
            (TaskStatus::Todo, todo.total),
            (TaskStatus::InProgress, in_progress.total),
            (TaskStatus::Done, done.total),
        ]);

        Ok(TaskBoard {
            todo,
            in_progress,
            done,
            status_counts,
        })
    }

    async fn board_column<C: ConnectionTrait>(
        db: &C,
        filter: &TaskFilter,
        status: TaskStatus,
        page: u64,
        limit: u64,
    ) -> Result<BoardColumn, DbErr> {
        let condition = filter.condition().add(task::Column::Status.eq(status));
        let total = task::Entity::find()
            .filter(condition.clone())
            .count(db)
            .await?;
        let models = task::Entity::find()
            .filter(condition)
            .order_by_desc(task::Column::CreatedAt)
            .offset((page - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        Ok(BoardColumn {
            tasks: models.into_iter().map(Self::from_model).collect(),
            total,
        })
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = task::ActiveModel {
            uuid: Set(task_id),
            title: Set(data.title.clone()),
            description: Set(data.description.clone()),
            status: Set(data.status.clone()),
            priority: Set(data.priority.clone()),
            due_date: Set(data.due_date.clone()),
            transcript: Set(data.transcript.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &CreateTask,
    ) -> Result<Self, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;

        let mut active: task::ActiveModel = record.into();
        active.title = Set(data.title.clone());
        active.description = Set(data.description.clone());
        active.status = Set(data.status.clone());
        active.priority = Set(data.priority.clone());
        active.due_date = Set(data.due_date.clone());
        active.transcript = Set(data.transcript.clone());
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = task::Entity::delete_many()
            .filter(task::Column::Uuid.eq(id))
            .exec(db)
            .await?;

        Ok(result.rows_affected)
    }
}
