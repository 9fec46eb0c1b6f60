use common::KeepaliveStatus;
use model::entities::user;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};
use tracing::{debug, error};

/// Minimal query that keeps an idle hosted database from being paused.
/// Reports failure in the result instead of returning an error.
pub async fn ping_database(db: &DatabaseConnection) -> KeepaliveStatus {
    match user::Entity::find().count(db).await {
        Ok(count) => {
            debug!("Database keepalive ok, {} users", count);
            KeepaliveStatus::Ok { count }
        }
        Err(e) => {
            error!("Database keepalive failed: {}", e);
            KeepaliveStatus::Error {
                message: e.to_string(),
            }
        }
    }
}
