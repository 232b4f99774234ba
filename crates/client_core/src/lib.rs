//! Client core for the DramaBench continuation workbench: settings, credential
//! handling, asset loading, the completion client and the session state machine.

pub mod assets;
pub mod completion;
pub mod config;
pub mod continuation;
pub mod credential;
pub mod session;

pub use assets::{AssetError, AssetLoader, AssetLocation, LocalAssetLoader, PromptTemplate};
pub use completion::{CompletionBackend, CompletionClient, GenerationError, GenerationRequest};
pub use config::{load_settings, Settings};
pub use continuation::extract_continuation;
pub use credential::{
    validate_credential, CredentialError, CredentialStore, MemoryCredentialStore,
    SqliteCredentialStore,
};
pub use session::{
    ResultView, SessionController, SessionError, SessionPhase, SessionState, StatusKind,
    StatusMessage,
};
