// Adapters layer: concrete clients for the cloud services and artifact storage.

pub mod chat;
pub mod content_safety;
pub mod document;
pub mod http;
pub mod language;
pub mod storage;
pub mod video;
pub mod vision;

pub use chat::ChatClient;
pub use content_safety::ContentSafetyClient;
pub use document::DocumentClient;
pub use language::LanguageClient;
pub use storage::LocalArtifactStore;
pub use video::VideoIndexerClient;
pub use vision::VisionClient;
