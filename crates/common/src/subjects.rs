//! NATS subject layout shared by producers and consumers.
//!
//! Status updates travel on `orders.status.{order_id}`; workers and the
//! gateway agree on these helpers so neither hardcodes the other's format.

use uuid::Uuid;

/// Subject the job queue stream captures.
pub const JOB_SUBJECT: &str = "orders.jobs";

/// JetStream stream name for the durable job queue.
pub const JOB_STREAM: &str = "ORDERS";

/// Durable consumer name shared by the worker pool.
pub const JOB_CONSUMER: &str = "order-workers";

/// Wildcard pattern covering every order's status subject.
pub const STATUS_WILDCARD: &str = "orders.status.>";

/// Build the status subject for one order.
pub fn status_subject(order_id: &Uuid) -> String {
    format!("orders.status.{}", order_id)
}

/// Extract the order id from a status subject.
/// Returns `None` for subjects outside the status namespace.
pub fn parse_status_subject(subject: &str) -> Option<Uuid> {
    let parts: Vec<&str> = subject.split('.').collect();
    if parts.len() == 3 && parts[0] == "orders" && parts[1] == "status" {
        Uuid::parse_str(parts[2]).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_subject_roundtrip() {
        let id = Uuid::new_v4();
        let subject = status_subject(&id);
        assert_eq!(parse_status_subject(&subject), Some(id));
    }

    #[test]
    fn test_parse_rejects_foreign_subjects() {
        assert!(parse_status_subject("orders.jobs").is_none());
        assert!(parse_status_subject("orders.status.not-a-uuid").is_none());
        assert!(parse_status_subject("market.status.123").is_none());
    }
}
