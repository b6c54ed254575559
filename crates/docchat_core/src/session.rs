//! crates/docchat_core/src/session.rs
//!
//! Explicit state for one chat session: selected document, chronological
//! history, the lifecycle of the local document copy and the single in-flight
//! send. State only changes through [`ChatSession::apply`], which returns the
//! side effects the caller must perform.

use std::path::{Path, PathBuf};

use crate::domain::ChatMessage;
use crate::ports::PortError;

/// Lifecycle of the downloaded copy backing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    None,
    Downloading,
    /// Present on disk and reused across turns.
    Ready(PathBuf),
    Deleted,
}

impl ArtifactState {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ArtifactState::Ready(path) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SelectDocument(String),
    DownloadStarted,
    DownloadSucceeded(PathBuf),
    DownloadFailed,
    SendStarted(String),
    ReplyReceived(String),
    SendFailed,
    /// "Clear chat": history and local copy go, the document stays selected.
    Reset,
    /// The chat view went away.
    Close,
}

/// Work the caller has to carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    DeleteArtifact(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no document selected")]
    NoDocument,
    #[error("a message is already being sent")]
    SendInFlight,
    #[error("no message is being sent")]
    NothingInFlight,
    #[error("cannot {event} while the document copy is {state}")]
    InvalidArtifactTransition {
        event: &'static str,
        state: &'static str,
    },
}

impl From<SessionError> for PortError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::SendInFlight => PortError::Conflict(err.to_string()),
            SessionError::NoDocument => PortError::Validation(err.to_string()),
            _ => PortError::Unexpected(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    document_id: Option<String>,
    history: Vec<ChatMessage>,
    artifact: ArtifactState,
    in_flight: bool,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            document_id: None,
            history: Vec::new(),
            artifact: ArtifactState::None,
            in_flight: false,
        }
    }

    /// Rebuilds a session from what a client sends with each turn: the document,
    /// the turns so far and an already-downloaded copy, if there is one.
    pub fn resume(
        document_id: impl Into<String>,
        history: Vec<ChatMessage>,
        artifact: Option<PathBuf>,
    ) -> Self {
        Self {
            document_id: Some(document_id.into()),
            history,
            artifact: artifact.map_or(ArtifactState::None, ArtifactState::Ready),
            in_flight: false,
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn artifact(&self) -> &ArtifactState {
        &self.artifact
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight
    }

    /// The question currently being sent.
    pub fn pending_question(&self) -> Option<&str> {
        if self.in_flight {
            self.history.last().map(|m| m.content.as_str())
        } else {
            None
        }
    }

    /// Turns that precede the question in flight (or all turns when idle).
    pub fn prior_turns(&self) -> &[ChatMessage] {
        if self.in_flight && !self.history.is_empty() {
            &self.history[..self.history.len() - 1]
        } else {
            &self.history
        }
    }

    pub fn apply(&mut self, event: SessionEvent) -> Result<Vec<Effect>, SessionError> {
        match event {
            SessionEvent::SelectDocument(id) => {
                if self.document_id.as_deref() == Some(id.as_str()) {
                    return Ok(Vec::new());
                }
                let effects = self.discard_artifact();
                self.history.clear();
                self.in_flight = false;
                self.artifact = ArtifactState::None;
                self.document_id = Some(id);
                Ok(effects)
            }
            SessionEvent::DownloadStarted => {
                if self.document_id.is_none() {
                    return Err(SessionError::NoDocument);
                }
                match self.artifact {
                    ArtifactState::None | ArtifactState::Deleted => {
                        self.artifact = ArtifactState::Downloading;
                        Ok(Vec::new())
                    }
                    _ => Err(self.invalid("start a download")),
                }
            }
            SessionEvent::DownloadSucceeded(path) => match self.artifact {
                ArtifactState::Downloading => {
                    self.artifact = ArtifactState::Ready(path);
                    Ok(Vec::new())
                }
                _ => Err(self.invalid("finish a download")),
            },
            SessionEvent::DownloadFailed => match self.artifact {
                // Back to square one; the next send retries.
                ArtifactState::Downloading => {
                    self.artifact = ArtifactState::None;
                    Ok(Vec::new())
                }
                _ => Err(self.invalid("fail a download")),
            },
            SessionEvent::SendStarted(question) => {
                if self.document_id.is_none() {
                    return Err(SessionError::NoDocument);
                }
                if self.in_flight {
                    return Err(SessionError::SendInFlight);
                }
                self.history.push(ChatMessage::user(question));
                self.in_flight = true;
                Ok(Vec::new())
            }
            SessionEvent::ReplyReceived(text) => {
                if !self.in_flight {
                    return Err(SessionError::NothingInFlight);
                }
                self.history.push(ChatMessage::assistant(text));
                self.in_flight = false;
                Ok(Vec::new())
            }
            SessionEvent::SendFailed => {
                if !self.in_flight {
                    return Err(SessionError::NothingInFlight);
                }
                // Drop the unanswered question so user/assistant turns keep alternating.
                self.history.pop();
                self.in_flight = false;
                Ok(Vec::new())
            }
            SessionEvent::Reset => {
                let effects = self.discard_artifact();
                self.history.clear();
                self.in_flight = false;
                Ok(effects)
            }
            SessionEvent::Close => {
                let effects = self.discard_artifact();
                self.history.clear();
                self.in_flight = false;
                self.document_id = None;
                Ok(effects)
            }
        }
    }

    fn discard_artifact(&mut self) -> Vec<Effect> {
        match std::mem::replace(&mut self.artifact, ArtifactState::Deleted) {
            ArtifactState::Ready(path) => vec![Effect::DeleteArtifact(path)],
            ArtifactState::None => {
                self.artifact = ArtifactState::None;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn invalid(&self, event: &'static str) -> SessionError {
        let state = match self.artifact {
            ArtifactState::None => "absent",
            ArtifactState::Downloading => "downloading",
            ArtifactState::Ready(_) => "ready",
            ArtifactState::Deleted => "deleted",
        };
        SessionError::InvalidArtifactTransition { event, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn ready_session() -> ChatSession {
        ChatSession::resume("doc-1", Vec::new(), Some(PathBuf::from("temp/doc.pdf")))
    }

    #[test]
    fn download_lifecycle_reaches_ready() {
        let mut session = ChatSession::new();
        assert_eq!(session.apply(SessionEvent::DownloadStarted), Err(SessionError::NoDocument));

        session.apply(SessionEvent::SelectDocument("doc-1".into())).unwrap();
        session.apply(SessionEvent::DownloadStarted).unwrap();
        assert_eq!(session.artifact(), &ArtifactState::Downloading);

        session
            .apply(SessionEvent::DownloadSucceeded(PathBuf::from("temp/doc.pdf")))
            .unwrap();
        assert_eq!(session.artifact().path(), Some(Path::new("temp/doc.pdf")));
    }

    #[test]
    fn failed_download_is_retryable() {
        let mut session = ChatSession::resume("doc-1", Vec::new(), None);
        session.apply(SessionEvent::DownloadStarted).unwrap();
        session.apply(SessionEvent::DownloadFailed).unwrap();
        assert_eq!(session.artifact(), &ArtifactState::None);
        assert!(session.apply(SessionEvent::DownloadStarted).is_ok());
    }

    #[test]
    fn ready_copy_cannot_be_downloaded_again() {
        let mut session = ready_session();
        assert!(matches!(
            session.apply(SessionEvent::DownloadStarted),
            Err(SessionError::InvalidArtifactTransition { state: "ready", .. })
        ));
    }

    #[test]
    fn only_one_send_in_flight() {
        let mut session = ready_session();
        session.apply(SessionEvent::SendStarted("q1".into())).unwrap();
        assert_eq!(
            session.apply(SessionEvent::SendStarted("q2".into())),
            Err(SessionError::SendInFlight)
        );
        assert_eq!(session.pending_question(), Some("q1"));
        assert!(session.prior_turns().is_empty());

        session.apply(SessionEvent::ReplyReceived("a1".into())).unwrap();
        assert!(!session.is_sending());
        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(session.prior_turns().len(), 2);
    }

    #[test]
    fn failed_send_drops_the_unanswered_question() {
        let mut session = ready_session();
        session.apply(SessionEvent::SendStarted("q1".into())).unwrap();
        session.apply(SessionEvent::SendFailed).unwrap();
        assert!(session.history().is_empty());
        assert_eq!(session.apply(SessionEvent::SendFailed), Err(SessionError::NothingInFlight));
    }

    #[test]
    fn reset_deletes_copy_and_keeps_document() {
        let mut session = ready_session();
        session.apply(SessionEvent::SendStarted("q".into())).unwrap();
        session.apply(SessionEvent::ReplyReceived("a".into())).unwrap();

        let effects = session.apply(SessionEvent::Reset).unwrap();
        assert_eq!(effects, vec![Effect::DeleteArtifact(PathBuf::from("temp/doc.pdf"))]);
        assert_eq!(session.artifact(), &ArtifactState::Deleted);
        assert!(session.history().is_empty());
        assert_eq!(session.document_id(), Some("doc-1"));

        // Nothing left to delete the second time.
        assert!(session.apply(SessionEvent::Reset).unwrap().is_empty());
        // A deleted copy can be fetched again.
        assert!(session.apply(SessionEvent::DownloadStarted).is_ok());
    }

    #[test]
    fn switching_documents_discards_the_old_copy() {
        let mut session = ready_session();
        assert!(session
            .apply(SessionEvent::SelectDocument("doc-1".into()))
            .unwrap()
            .is_empty());

        let effects = session.apply(SessionEvent::SelectDocument("doc-2".into())).unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(session.document_id(), Some("doc-2"));
        assert_eq!(session.artifact(), &ArtifactState::None);
    }

    #[test]
    fn close_clears_everything() {
        let mut session = ready_session();
        let effects = session.apply(SessionEvent::Close).unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(session.document_id(), None);
        assert_eq!(
            session.apply(SessionEvent::SendStarted("q".into())),
            Err(SessionError::NoDocument)
        );
    }
}
