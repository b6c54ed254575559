//! services/api/src/adapters/json_store.rs
//!
//! This module contains the persistence adapter, which is the concrete implementation
//! of the `StoreService` port from the `core` crate. The whole store lives in one
//! pretty-printed JSON file that is rewritten on every mutation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docchat_core::domain::{Document, Settings, Store, Theme, User};
use docchat_core::ports::{PortError, PortResult, StoreMutation, StoreService};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use once_cell::sync::OnceCell;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::password::hash_password;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A file-backed store that implements the `StoreService` port.
///
/// `update` calls from this process are serialized; a second process writing
/// the same file can still lose updates.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    seed: OnceCell<Store>,
}

impl JsonFileStore {
    /// Creates a new `JsonFileStore`. The file is created lazily on first read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            seed: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The seeded defaults, hashed once per store.
    fn seed(&self) -> Store {
        self.seed.get_or_init(default_store).clone()
    }

    /// Loads the file, falling back to seeded defaults when it is missing
    /// (and writing them out) or unreadable (left untouched on disk).
    /// Callers hold `write_lock`.
    async fn load(&self) -> Store {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => match serde_json::from_str::<StoreRecord>(&text) {
                Ok(record) => record.to_domain(),
                Err(e) => {
                    error!(path = %self.path.display(), "Error parsing database file: {}", e);
                    warn!("Returning default store due to error.");
                    self.seed()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Database file not found, creating with default data");
                let store = self.seed();
                if let Err(e) = self.persist(&store).await {
                    error!("Failed to write default database: {}", e);
                }
                store
            }
            Err(e) => {
                error!(path = %self.path.display(), "Error reading database: {}", e);
                warn!("Returning default store due to error.");
                self.seed()
            }
        }
    }

    async fn persist(&self, store: &Store) -> PortResult<()> {
        let json = serde_json::to_string_pretty(&StoreRecord::from_domain(store))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            error!(path = %self.path.display(), "Error writing to database: {}", e);
            PortError::Unexpected(e.to_string())
        })
    }
}

/// The store a fresh installation starts with: one admin account, no
/// documents, dark theme.
pub fn default_store() -> Store {
    let now = Utc::now();
    let password = hash_password("admin123").unwrap_or_else(|e| {
        error!("Falling back to plaintext seed password: {}", e);
        "admin123".to_string()
    });
    Store {
        users: vec![User {
            id: "1".to_string(),
            login: "admin".to_string(),
            password,
            is_admin: true,
            email: "admin@example.com".to_string(),
            full_name: "Admin User".to_string(),
            created_at: now,
            last_login: now,
        }],
        documents: Vec::new(),
        settings: Settings {
            theme: Some(Theme::Dark),
        },
    }
}

//=========================================================================================
// On-disk Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize)]
struct StoreRecord {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    documents: Vec<DocumentRecord>,
    #[serde(default)]
    settings: SettingsRecord,
}
impl StoreRecord {
    fn to_domain(self) -> Store {
        Store {
            users: self.users.into_iter().map(UserRecord::to_domain).collect(),
            documents: self.documents.into_iter().map(DocumentRecord::to_domain).collect(),
            settings: self.settings.to_domain(),
        }
    }

    fn from_domain(store: &Store) -> Self {
        Self {
            users: store.users.iter().map(UserRecord::from_domain).collect(),
            documents: store.documents.iter().map(DocumentRecord::from_domain).collect(),
            settings: SettingsRecord::from_domain(&store.settings),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    id: String,
    login: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    email: String,
    #[serde(default)]
    full_name: String,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    last_login: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            login: self.login,
            password: self.password,
            is_admin: self.is_admin,
            email: self.email,
            full_name: self.full_name,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }

    fn from_domain(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            login: user.login.clone(),
            password: user.password.clone(),
            is_admin: user.is_admin,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRecord {
    id: String,
    title: String,
    url: String,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            title: self.title,
            url: self.url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn from_domain(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            url: doc.url.clone(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
struct SettingsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    theme: Option<String>,
}
impl SettingsRecord {
    fn to_domain(self) -> Settings {
        Settings {
            theme: self.theme.as_deref().and_then(parse_theme),
        }
    }

    fn from_domain(settings: &Settings) -> Self {
        Self {
            theme: settings.theme.map(|t| theme_name(t).to_string()),
        }
    }
}

pub fn parse_theme(name: &str) -> Option<Theme> {
    match name {
        "light" => Some(Theme::Light),
        "dark" => Some(Theme::Dark),
        "system" => Some(Theme::System),
        _ => None,
    }
}

pub fn theme_name(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
        Theme::System => "system",
    }
}

//=========================================================================================
// `StoreService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoreService for JsonFileStore {
    async fn read(&self) -> Store {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }

    async fn write(&self, store: Store) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        self.persist(&store).await
    }

    async fn update(&self, mutation: StoreMutation<'_>) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut store = self.load().await;
        mutation(&mut store)?;
        self.persist(&store).await
    }
}
