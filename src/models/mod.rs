// SPDX-License-Identifier: MIT

//! Data models.

pub mod site_visit;
pub mod user;

pub use site_visit::{normalize_transport_required, SiteVisit, SiteVisitStatus};
pub use user::{AuthProvider, PublicUser, User};
