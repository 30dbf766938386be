//! Session identity, admission control, and durable recording for the
//! investigation runtime.
//!
//! [`SessionRegistry`] owns the active and recent-cache collections and
//! binds each session to the [`inv_orchestrator::OrchestratorRuntime`] task
//! that drives its turns; [`SessionStore`] is the durable persistence seam
//! behind it.

pub mod registry;
pub mod store;

pub use registry::SessionRegistry;
pub use store::{JsonFileSessionStore, SessionStore};
