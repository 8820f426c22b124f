//! In-memory repositories for tests and service wiring that does not need
//! a database. Semantics mirror the SQL implementations, including the
//! compare-and-swap transition write.

use std::collections::HashMap;
use std::sync::RwLock;

use trainhub_core::domain::notification::Notification;
use trainhub_core::domain::request::{RequestId, RequestStatus, TrainingRequest};
use trainhub_core::domain::user::{User, UserId};
use trainhub_core::workflow::TransitionOutcome;

use super::{
    NotificationRepository, RepositoryError, RequestRepository, UserRepository,
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| RepositoryError::Decode("user store lock poisoned".to_string()))?;
        Ok(users.get(&id.0).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| RepositoryError::Decode("user store lock poisoned".to_string()))?;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(all)
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| RepositoryError::Decode("user store lock poisoned".to_string()))?;
        users.insert(user.id.0.clone(), user);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, TrainingRequest>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<TrainingRequest>, RepositoryError> {
        let requests = self
            .requests
            .read()
            .map_err(|_| RepositoryError::Decode("request store lock poisoned".to_string()))?;
        Ok(requests.get(&id.0).cloned())
    }

    async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<TrainingRequest>, RepositoryError> {
        let requests = self
            .requests
            .read()
            .map_err(|_| RepositoryError::Decode("request store lock poisoned".to_string()))?;
        let mut matching: Vec<TrainingRequest> =
            requests.values().filter(|request| request.status == status).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn list_for_requester(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<TrainingRequest>, RepositoryError> {
        let requests = self
            .requests
            .read()
            .map_err(|_| RepositoryError::Decode("request store lock poisoned".to_string()))?;
        let mut matching: Vec<TrainingRequest> = requests
            .values()
            .filter(|request| &request.requester_id == requester_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn save(&self, request: TrainingRequest) -> Result<(), RepositoryError> {
        let mut requests = self
            .requests
            .write()
            .map_err(|_| RepositoryError::Decode("request store lock poisoned".to_string()))?;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn save_guarded(&self, request: TrainingRequest) -> Result<(), RepositoryError> {
        let mut requests = self
            .requests
            .write()
            .map_err(|_| RepositoryError::Decode("request store lock poisoned".to_string()))?;

        match requests.get(&request.id.0) {
            Some(stored) if stored.version == request.version - 1 => {
                requests.insert(request.id.0.clone(), request);
                Ok(())
            }
            _ => Err(RepositoryError::Conflict(format!(
                "request {} changed underneath this update",
                request.id.0
            ))),
        }
    }

    async fn apply_transition(
        &self,
        updated: &TrainingRequest,
        outcome: &TransitionOutcome,
    ) -> Result<(), RepositoryError> {
        let mut requests = self
            .requests
            .write()
            .map_err(|_| RepositoryError::Decode("request store lock poisoned".to_string()))?;

        let stored = requests.get(&updated.id.0).ok_or_else(|| {
            RepositoryError::Conflict(format!("request {} does not exist", updated.id.0))
        })?;

        let current_matches = stored.status == outcome.from
            && stored.current_approval_level == outcome.previous_level
            && stored.version == updated.version - 1;
        if !current_matches {
            return Err(RepositoryError::Conflict(format!(
                "request {} changed underneath this transition",
                updated.id.0
            )));
        }
        let already_stamped = stored
            .steps
            .get(outcome.stamped_level)
            .map(|step| step.decision.is_some())
            .unwrap_or(true);
        if already_stamped {
            return Err(RepositoryError::Conflict(format!(
                "step {} of request {} was already decided",
                outcome.stamped_level, updated.id.0
            )));
        }

        requests.insert(updated.id.0.clone(), updated.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<Vec<Notification>>,
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = self
            .notifications
            .read()
            .map_err(|_| RepositoryError::Decode("notification store lock poisoned".to_string()))?;
        let mut matching: Vec<Notification> = notifications
            .iter()
            .filter(|notification| &notification.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut notifications = self
            .notifications
            .write()
            .map_err(|_| RepositoryError::Decode("notification store lock poisoned".to_string()))?;
        notifications.push(notification);
        Ok(())
    }

    async fn mark_read(&self, id: &str) -> Result<(), RepositoryError> {
        let mut notifications = self
            .notifications
            .write()
            .map_err(|_| RepositoryError::Decode("notification store lock poisoned".to_string()))?;
        for notification in notifications.iter_mut() {
            if notification.id == id {
                notification.read = true;
            }
        }
        Ok(())
    }
}
