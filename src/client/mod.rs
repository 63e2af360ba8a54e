//! Viewer-side sync: the convergence engine and a WebSocket session driver.

pub mod session;
pub mod sync_engine;

pub use session::{PlayerSurface, SessionConfig, SessionEvent, SyncSession};
pub use sync_engine::{
    ControlIntent, Observation, SyncEngine, APPLY_QUIESCENCE, DRIFT_THRESHOLD_SECS, EMIT_DEBOUNCE,
};
