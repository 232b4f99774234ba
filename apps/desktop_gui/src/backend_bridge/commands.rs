//! Backend commands queued from UI to backend worker.

use client_core::GenerationRequest;

pub enum BackendCommand {
    /// Restore the stored credential, then load the template and dataset.
    Startup,
    SaveCredential {
        key: String,
    },
    ClearCredential,
    Generate {
        request: GenerationRequest,
    },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::SaveCredential { .. } => "save_credential",
            Self::ClearCredential => "clear_credential",
            Self::Generate { .. } => "generate",
        }
    }
}
