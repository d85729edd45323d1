//! Admin dashboard counters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub users: i64,
    pub admins: i64,
    pub contacts_total: i64,
    pub contacts_new: i64,
    pub bookings_total: i64,
    pub bookings_pending: i64,
    pub bookings_confirmed: i64,
    pub bookings_upcoming: i64,
    pub portfolio_items: i64,
    pub portfolio_published: i64,
}
