mod auth;
mod backup;
mod origin;
mod state;

pub use auth::TokenManager;
pub use backup::{BackupError, BackupManager, parse_backup};
pub use origin::{OriginManager, StateError};
pub use state::{
    AUTH_STATE_SWEEP_INTERVAL, AUTH_STATE_TTL, AuthStateStatus, AuthStateStore, AuthStateSweeper,
};
