//! crates/docchat_core/src/assembler.rs
//!
//! Builds the ordered message list sent to the completion API for one chat turn.
//!
//! Two mutually exclusive modes exist. Inline mode attaches the PDF bytes as a
//! base64 document block on the current user turn. URL-reference mode lists the
//! document links in the system prompt and attaches nothing.

use std::str::FromStr;

use crate::domain::{ChatMessage, Document, Role};

/// System prompt for inline mode.
pub const INLINE_SYSTEM_PROMPT: &str = "Вы внимательный ИИ-ассистент, отвечающий на вопросы по предоставленному PDF-документу. Ваши ответы должны быть точными, подробными и основываться исключительно на содержимом документа. Отвечайте на русском языке.";

const URL_FIRST_TURN_HEADER: &str = "# Анализ документов и ответ на вопросы\n\n## Документы для анализа:\n";

const URL_FIRST_TURN_INSTRUCTIONS: &str = r#"## Инструкции по анализу:
1. Внимательно изучите все предоставленные документы, обращая внимание на текст, таблицы, графики и изображения.
2. Проанализируйте содержимое каждого документа, выделяя ключевые факты, данные и информацию, относящуюся к вопросам.
3. Если в документах содержится противоречивая информация, укажите это и объясните различия.
4. Если вопрос требует сравнения информации из разных документов, выполните такое сравнение.
5. Если в документах недостаточно информации для полного ответа, честно укажите это.

## Правила ответа:
- Начинайте с краткого резюме (2-3 предложения)
- Структурируйте ответы с использованием подзаголовков для лучшей читаемости
- Используйте маркированные списки для перечисления ключевых пунктов
- При цитировании конкретных данных указывайте источник (номер документа)
- Завершайте ответ кратким заключением

Ваши ответы должны быть подробными, точными и основанными исключительно на содержимом предоставленных документов. Отвечайте на русском языке."#;

const URL_CONTINUATION_PREFIX: &str =
    "Вы помогаете анализировать документы и отвечать на вопросы о них на русском языке. Документы: ";

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Document bytes travel inside the request.
    Inline,
    /// Only document links travel, inside the system prompt.
    UrlReference,
}

impl FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" | "base64" => Ok(ChatMode::Inline),
            "url" | "url-reference" | "url_reference" => Ok(ChatMode::UrlReference),
            other => Err(format!("unknown chat mode '{}'", other)),
        }
    }
}

/// What the current turn carries about the document(s).
#[derive(Debug, Clone, Copy)]
pub enum Attachment<'a> {
    /// Base64 PDF data for exactly one document.
    Inline { data: &'a str },
    /// One or more documents referenced by title and link.
    References(&'a [Document]),
}

impl Attachment<'_> {
    pub fn mode(&self) -> ChatMode {
        match self {
            Attachment::Inline { .. } => ChatMode::Inline,
            Attachment::References(_) => ChatMode::UrlReference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Document { media_type: String, data: String },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    pub role: Role,
    pub content: MessageContent,
}

/// Everything the completion client needs for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<RequestMessage>,
    /// `None` selects the client's configured default model.
    pub model: Option<String>,
}

/// Assembles the request for one turn. Prior turns are kept in order as plain
/// text and the new question is always the last message.
pub fn build_request(
    attachment: Attachment<'_>,
    question: &str,
    prior_turns: &[ChatMessage],
    model: Option<String>,
) -> CompletionRequest {
    let mut messages: Vec<RequestMessage> = prior_turns
        .iter()
        .map(|turn| RequestMessage {
            role: turn.role,
            content: MessageContent::Text(turn.content.clone()),
        })
        .collect();

    let (system, current) = match attachment {
        Attachment::Inline { data } => (
            INLINE_SYSTEM_PROMPT.to_string(),
            MessageContent::Blocks(vec![
                ContentBlock::Document {
                    media_type: PDF_MEDIA_TYPE.to_string(),
                    data: data.to_string(),
                },
                ContentBlock::Text(question.to_string()),
            ]),
        ),
        Attachment::References(documents) => {
            // The long instructions go out once per session.
            let system = if prior_turns.is_empty() {
                first_turn_prompt(documents)
            } else {
                continuation_prompt(documents)
            };
            (system, MessageContent::Text(question.to_string()))
        }
    };

    messages.push(RequestMessage {
        role: Role::User,
        content: current,
    });

    CompletionRequest {
        system,
        messages,
        model,
    }
}

fn first_turn_prompt(documents: &[Document]) -> String {
    let listing = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("{}. **{}**: {}", i + 1, doc.title, doc.url))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{URL_FIRST_TURN_HEADER}{listing}\n\n{URL_FIRST_TURN_INSTRUCTIONS}")
}

fn continuation_prompt(documents: &[Document]) -> String {
    let listing = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("{}. {}: {}", i + 1, doc.title, doc.url))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{URL_CONTINUATION_PREFIX}{listing}.")
}
