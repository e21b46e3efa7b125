use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery-driver profile, 1:1 with a user account. Cumulative totals are
/// maintained by the store when a delivery reaches `delivered`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_online: bool,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub rating: f64,
    pub total_deliveries: u32,
    pub total_earnings: f64,
    pub updated_at: DateTime<Utc>,
}
