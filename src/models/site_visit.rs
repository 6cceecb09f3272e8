// SPDX-License-Identifier: MIT

//! Site-visit booking model.

use serde::{Deserialize, Serialize};

/// Lifecycle of a booking request. New records always start as `Requested`;
/// there is no update path after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteVisitStatus {
    Requested,
    Confirmed,
    Cancelled,
}

/// A site-visit booking stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteVisit {
    /// Document ID (uuid v4)
    pub id: String,
    pub project: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    /// Preferred date/time as supplied by the client (naive wall-clock or
    /// offset-carrying string)
    pub preferred_date: String,
    /// Normalized to `Yes`/`No`
    pub transport_required: String,
    pub pickup_address: Option<String>,
    pub pickup_mode: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub notes: Option<String>,
    pub status: SiteVisitStatus,
    pub created_at: String,
}

/// Normalize the transport flag: `no`/`false`/`0` mean No, anything else
/// (including absent) means Yes.
pub fn normalize_transport_required(value: Option<&str>) -> &'static str {
    match value.unwrap_or("").trim().to_lowercase().as_str() {
        "no" | "false" | "0" => "No",
        _ => "Yes",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_normalization() {
        assert_eq!(normalize_transport_required(Some("No")), "No");
        assert_eq!(normalize_transport_required(Some(" FALSE ")), "No");
        assert_eq!(normalize_transport_required(Some("0")), "No");
        assert_eq!(normalize_transport_required(Some("yes")), "Yes");
        assert_eq!(normalize_transport_required(Some("anything")), "Yes");
        assert_eq!(normalize_transport_required(None), "Yes");
    }
}
