//! crates/docchat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or serialization format.

use chrono::{DateTime, Utc};

/// A registered document link (usually a Google Drive share link).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A dashboard account, including the stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub login: String,
    /// Opaque credential (an argon2 PHC string for accounts created here).
    pub password: String,
    pub is_admin: bool,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

// The shape of a user that is safe to hand out over the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUser {
    pub id: String,
    pub login: String,
    pub is_admin: bool,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            login: user.login,
            is_admin: user.is_admin,
            email: user.email,
            full_name: user.full_name,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub theme: Option<Theme>,
}

/// The whole persisted state: every user, every document and the settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    pub users: Vec<User>,
    pub documents: Vec<Document>,
    pub settings: Settings,
}

impl Store {
    pub fn find_document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn find_user_by_login(&self, login: &str) -> Option<&User> {
        self.users.iter().find(|user| user.login == login)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a chat. Lives only in client memory; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// A Google Drive file identifier extracted from a shared link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileReference(String);

impl FileReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
