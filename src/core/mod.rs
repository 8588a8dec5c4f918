pub mod nls;
pub mod relay;

// Re-export commonly used types for convenience
pub use nls::{
    AudioBlob, ConnectionState, NlsData, NlsError, NlsResult, NlsSession, PacingConfig,
    RecognitionParams, SessionConfig, StartOptions, SynthesisParams, TaskType, TransportMode,
    UploadReport,
};

pub use relay::{RelayClient, RelayRequest, RelayResponse};
