//! Business logic services.
//!
//! [`ActivityService`] exposes the five read operations; [`ActivityRequest`]
//! routes request paths onto them.

mod activity;
mod route;

pub use activity::{ActivityService, ServiceOptions};
pub use route::{ACTIVITIES_SEGMENT, ActivityRequest, ActivityResponse};
