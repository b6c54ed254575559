//! crates/docchat_core/src/completion.rs
//!
//! Fixed completion parameters, the failure taxonomy surfaced to callers and the
//! cooperative wall-clock budget for a chat turn.

use std::time::{Duration, Instant};

pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
pub const TEMPERATURE: f64 = 0.3;
pub const MAX_OUTPUT_TOKENS: u32 = 4000;

/// Wall-clock budget for one chat turn, matching a common serverless limit.
pub const DEFAULT_TURN_BUDGET: Duration = Duration::from_secs(55);

/// Why a completion failed, as far as the UI is concerned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("AI provider credential is missing or invalid")]
    Configuration,
    #[error("AI request timeout")]
    Timeout,
    #[error("AI provider rate limit reached")]
    RateLimit,
    #[error("AI provider denied access to the document")]
    AccessDenied,
    #[error("Document is too large for the model context")]
    DocumentTooLarge,
    #[error("Network failure while contacting the AI provider")]
    Network,
    #[error("Document not found")]
    DocumentNotFound,
    #[error("{0}")]
    Unknown(String),
}

// Checked top to bottom; the first group with a hit decides the kind.
const CONFIGURATION_MARKERS: &[&str] = &["api key", "api_key", "api-key", "authentication", "credential"];
const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "time budget"];
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "rate_limit"];
const ACCESS_MARKERS: &[&str] = &["access", "permission"];
const SIZE_MARKERS: &[&str] = &["context", "token"];
const NETWORK_MARKERS: &[&str] = &["network", "fetch"];
const NOT_FOUND_MARKERS: &[&str] = &["not found", "не найден"];

impl CompletionError {
    /// Maps free-form provider/transport error text onto the taxonomy by
    /// case-insensitive substring match.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let hit = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

        if hit(CONFIGURATION_MARKERS) {
            CompletionError::Configuration
        } else if hit(TIMEOUT_MARKERS) {
            CompletionError::Timeout
        } else if hit(RATE_LIMIT_MARKERS) {
            CompletionError::RateLimit
        } else if hit(ACCESS_MARKERS) {
            CompletionError::AccessDenied
        } else if hit(SIZE_MARKERS) {
            CompletionError::DocumentTooLarge
        } else if hit(NETWORK_MARKERS) {
            CompletionError::Network
        } else if hit(NOT_FOUND_MARKERS) {
            CompletionError::DocumentNotFound
        } else {
            CompletionError::Unknown(message.to_string())
        }
    }

    /// Stable machine-readable name of the kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Configuration => "CONFIGURATION_ERROR",
            CompletionError::Timeout => "TIMEOUT_ERROR",
            CompletionError::RateLimit => "RATE_LIMIT_ERROR",
            CompletionError::AccessDenied => "ACCESS_DENIED_ERROR",
            CompletionError::DocumentTooLarge => "DOCUMENT_TOO_LARGE_ERROR",
            CompletionError::Network => "NETWORK_ERROR",
            CompletionError::DocumentNotFound => "DOCUMENT_NOT_FOUND_ERROR",
            CompletionError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Localized text shown to the end user.
    pub fn user_message(&self) -> String {
        match self {
            CompletionError::Configuration => {
                "Сервис ИИ не настроен: отсутствует или неверен API-ключ.".to_string()
            }
            CompletionError::Timeout => {
                "Превышено время ожидания ответа. Попробуйте задать более короткий вопрос.".to_string()
            }
            CompletionError::RateLimit => {
                "Превышен лимит запросов к ИИ. Попробуйте через минуту.".to_string()
            }
            CompletionError::AccessDenied => {
                "Нет доступа к документу. Проверьте настройки доступа в Google Drive.".to_string()
            }
            CompletionError::DocumentTooLarge => {
                "Документ слишком большой для анализа.".to_string()
            }
            CompletionError::Network => {
                "Ошибка сети при обращении к ИИ. Проверьте подключение.".to_string()
            }
            CompletionError::DocumentNotFound => "Документ не найден.".to_string(),
            CompletionError::Unknown(message) => message.clone(),
        }
    }
}

/// Elapsed-time tracking for one chat turn. The check is cooperative: it runs
/// between steps and never interrupts an in-flight call.
#[derive(Debug, Clone, Copy)]
pub struct RequestBudget {
    started: Instant,
    limit: Duration,
}

impl RequestBudget {
    pub fn start(limit: Duration) -> Self {
        Self::started_at(Instant::now(), limit)
    }

    pub fn started_at(started: Instant, limit: Duration) -> Self {
        Self { started, limit }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Fails with `Timeout` once more than half the budget is gone, so the AI
    /// call is never started without room to finish.
    pub fn ensure_headroom(&self) -> Result<(), CompletionError> {
        if self.elapsed() > self.limit / 2 {
            Err(CompletionError::Timeout)
        } else {
            Ok(())
        }
    }
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self::start(DEFAULT_TURN_BUDGET)
    }
}
