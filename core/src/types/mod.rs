pub mod identity;
pub mod session;

pub use identity::{Role, SessionKey, WorkerIdentity};
pub use session::{SessionInfo, StartOptions};
