pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod settings;
pub mod signer;

pub use errors::{ErrorBody, ErrorSeverity, IntoErrorResponse};
pub use events::{EventKind, EventRecord, Notifier, DEFAULT_EVENT_CAPACITY};
pub use logging::init_logging;
pub use registry::{
    GameSession, Lifecycle, RegistryError, SessionId, SessionInfo, SessionRegistry, SessionResult,
    SessionView,
};
pub use scheduler::{Scheduler, TaskId};
pub use server::{AppContext, ServerError, ServerHandle, WebServer};
pub use settings::{Settings, SettingsError};
pub use signer::{ResultPayload, SignerClient, SignerError};
