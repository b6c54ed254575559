pub mod assembler;
pub mod completion;
pub mod domain;
pub mod ports;
pub mod resolver;
pub mod session;

pub use assembler::{build_request, Attachment, ChatMode, CompletionRequest};
pub use completion::{CompletionError, RequestBudget};
pub use domain::{ChatMessage, Document, FileReference, PublicUser, Role, Settings, Store, Theme, User};
pub use ports::{
    update_with, ArtifactStore, CompletionService, PortError, PortResult, StoreMutation, StoreService,
};
pub use session::{ArtifactState, ChatSession, Effect, SessionError, SessionEvent};
