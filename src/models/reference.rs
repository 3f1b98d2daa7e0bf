use serde::{Deserialize, Serialize};
use std::future::Future;
use uuid::Uuid;

use crate::errors::ServiceError;

/// A reference to another record: either just its id, or the record itself.
///
/// Serialized untagged, so clients see a bare UUID string or the full object.
/// References are resolved once, in the service that builds the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef<T> {
    Id(Uuid),
    Resolved(T),
}

impl<T> EntityRef<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, EntityRef::Resolved(_))
    }

    /// Loads the record through `load` when `expand` is set, otherwise keeps
    /// the bare id. A record the loader cannot find stays a bare id.
    pub async fn resolve<F, Fut>(id: Uuid, expand: bool, load: F) -> Result<Self, ServiceError>
    where
        F: FnOnce(Uuid) -> Fut,
        Fut: Future<Output = Result<Option<T>, ServiceError>>,
    {
        if !expand {
            return Ok(EntityRef::Id(id));
        }
        Ok(load(id).await?.map_or(EntityRef::Id(id), EntityRef::Resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vehicle_queue_entry::{self, QueueKind, QueueStatus};
    use chrono::Utc;
    use std::future::ready;

    fn entry() -> vehicle_queue_entry::Model {
        vehicle_queue_entry::Model {
            id: Uuid::new_v4(),
            branch_id: "SBY".into(),
            vehicle_id: "L-1234-AB".into(),
            queue_kind: QueueKind::Delivery,
            driver_id: Uuid::new_v4(),
            helper_id: None,
            urutan: 1,
            status: QueueStatus::Waiting,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unexpanded_reference_is_a_bare_id_and_skips_the_loader() {
        let id = Uuid::new_v4();
        let reference: EntityRef<vehicle_queue_entry::Model> =
            EntityRef::resolve(id, false, |_| {
                ready(Err(ServiceError::InternalError("loader ran".into())))
            })
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&reference).unwrap(),
            serde_json::json!(id.to_string())
        );
        assert!(!reference.is_resolved());
    }

    #[tokio::test]
    async fn expanded_reference_serializes_as_object() {
        let model = entry();
        let id = model.id;
        let reference = EntityRef::resolve(id, true, |_| ready(Ok(Some(model))))
            .await
            .unwrap();
        assert!(reference.is_resolved());
        let value = serde_json::to_value(&reference).unwrap();
        assert_eq!(value["id"], id.to_string());
        assert_eq!(value["vehicle_id"], "L-1234-AB");
        assert_eq!(value["status"], "WAITING");
    }

    #[tokio::test]
    async fn missing_record_stays_a_bare_id() {
        let id = Uuid::new_v4();
        let reference: EntityRef<vehicle_queue_entry::Model> =
            EntityRef::resolve(id, true, |_| ready(Ok(None))).await.unwrap();
        assert_eq!(reference, EntityRef::Id(id));
    }

    #[test]
    fn bare_id_deserializes_to_id_variant() {
        let id = Uuid::new_v4();
        let parsed: EntityRef<vehicle_queue_entry::Model> =
            serde_json::from_value(serde_json::json!(id.to_string())).unwrap();
        assert_eq!(parsed, EntityRef::Id(id));
    }
}
