use chrono::{NaiveDate, Utc};
use db::models::task::TaskPriority;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::due_date;

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

const MAX_TRANSCRIPT_CHARS: usize = 5000;
const HEURISTIC_TITLE_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("{0}")]
    InvalidTranscript(String),
    #[error("Extraction service unreachable: {0}")]
    ServiceUnreachable(String),
}

/// Best-effort structured guess derived from a transcript. Not yet a valid
/// task: the write path still runs it through the standard validation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DraftTask {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ExtractedFields {
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    #[serde(rename = "dueDate")]
    due_date: Option<String>,
}

#[derive(Clone)]
pub struct ExtractionService {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl ExtractionService {
    pub fn new(api_key: Option<String>, model: String, endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
            model,
        }
    }

    /// Turns free text into a draft task. A garbled model response falls
    /// back to the keyword heuristic; only transport failures surface, so
    /// the caller can decide between 503 and the heuristic.
    pub async fn extract(&self, transcript: &str) -> Result<DraftTask, ExtractorError> {
        let trimmed = transcript.trim();
        if trimmed.is_empty() {
            return Err(ExtractorError::InvalidTranscript(
                "transcript must not be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_TRANSCRIPT_CHARS {
            return Err(ExtractorError::InvalidTranscript(format!(
                "transcript must not exceed {MAX_TRANSCRIPT_CHARS} characters"
            )));
        }

        let today = Utc::now().date_naive();
        let content = match self.request_completion(trimmed, today).await {
            Ok(Some(content)) => content,
            Ok(None) => return Ok(self.heuristic_draft(trimmed)),
            Err(err) => return Err(ExtractorError::ServiceUnreachable(err.to_string())),
        };

        match reconcile(&content, today) {
            Some(draft) => Ok(draft),
            None => {
                tracing::warn!("Extraction response did not contain usable fields, falling back");
                Ok(self.heuristic_draft(trimmed))
            }
        }
    }

    /// Local fallback: first 100 characters as title, full transcript as
    /// description, priority from keyword scan, no due date.
    pub fn heuristic_draft(&self, transcript: &str) -> DraftTask {
        let trimmed = transcript.trim();
        let lowered = trimmed.to_lowercase();
        let priority = if lowered.contains("critical") {
            TaskPriority::Critical
        } else if lowered.contains("high") {
            TaskPriority::High
        } else if lowered.contains("low") {
            TaskPriority::Low
        } else {
            TaskPriority::Medium
        };

        DraftTask {
            title: trimmed.chars().take(HEURISTIC_TITLE_CHARS).collect(),
            description: trimmed.to_string(),
            priority,
            due_date: None,
        }
    }

    async fn request_completion(
        &self,
        transcript: &str,
        today: NaiveDate,
    ) -> Result<Option<String>, reqwest::Error> {
        let prompt = build_prompt(transcript, today);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.0,
        };

        let mut builder = self.client.post(&self.endpoint);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }
        let response = builder.json(&request).send().await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(%status, "Extraction service returned an error response");
            return Ok(None);
        }

        let parsed: ChatResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("Failed to parse extraction response: {err}");
                return Ok(None);
            }
        };

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

fn build_prompt(transcript: &str, today: NaiveDate) -> String {
    format!(
        "You convert spoken task descriptions into structured task fields.\n\
         Today's date is {today}.\n\
         Respond with a single JSON object containing exactly these keys:\n\
         \"title\": short summary of the task, at least 10 characters\n\
         \"description\": full detail, at least 10 characters\n\
         \"priority\": one of \"low\", \"medium\", \"high\", \"critical\"\n\
         \"dueDate\": DD-MM-YYYY, or null when the text names no date\n\
         Do not wrap the JSON in markdown fences or add commentary.\n\n\
         Transcript:\n{transcript}",
        today = today.format(due_date::DUE_DATE_FORMAT),
    )
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    match rest.strip_suffix("```") {
        Some(inner) => inner.trim_end(),
        None => rest,
    }
}

/// Validates the model's guess against the task field rules: unknown
/// priorities become medium, due dates survive only under the strict
/// layout and only when current.
fn reconcile(content: &str, today: NaiveDate) -> Option<DraftTask> {
    let fields: ExtractedFields = serde_json::from_str(strip_code_fences(content)).ok()?;

    let title = fields.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    let description = fields
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())?;

    let priority = fields
        .priority
        .as_deref()
        .and_then(|raw| raw.trim().to_lowercase().parse::<TaskPriority>().ok())
        .unwrap_or(TaskPriority::Medium);

    let due_date = fields
        .due_date
        .as_deref()
        .and_then(|raw| due_date::parse_strict_with_today(raw.trim(), today));

    Some(DraftTask {
        title: title.to_string(),
        description: description.to_string(),
        priority,
        due_date,
    })
}
