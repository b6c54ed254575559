pub mod claude;
pub mod json_store;
pub mod scratch;

pub use claude::ClaudeAdapter;
pub use json_store::JsonFileStore;
pub use scratch::ScratchDir;
