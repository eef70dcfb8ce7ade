//! Request pipeline hooks
//!
//! `stamper` runs before every send, `guard` inspects every response and
//! `coordinator` owns the single-flight refresh state.

pub mod coordinator;
pub mod guard;
pub mod request;
pub mod stamper;

pub use coordinator::RefreshCoordinator;
pub use guard::{AuthRoutes, PassReason, ResponseGuard, Verdict};
pub use request::RetryableRequest;
