//! HTTP adapter for licensing endpoints.
//!
//! Exposes entitlement resolution, the License lifecycle, usage tracking
//! and module requests via REST API. See [`routes::licensing_router`] for
//! the route table.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{AuthenticatedUser, LicensingApiError, LicensingAppState};
pub use routes::licensing_router;
