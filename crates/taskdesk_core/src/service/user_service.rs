//! User use-case service.
//!
//! # Responsibility
//! - Register, update and remove accounts through the user repository.
//! - Emit user change events for interested listeners.

use crate::events::{EventBus, ListenerResult, ServiceEvent, SubscriptionId};
use crate::model::user::{NewUser, User, UserPatch};
use crate::repo::user_repo::{UserQuery, UserRepository, UserStatistics};
use crate::service::{ServiceError, ServiceResult};
use log::{info, warn};
use std::rc::Rc;

/// Account orchestration over the user repository.
pub struct UserService {
    users: Rc<UserRepository>,
    events: EventBus<ServiceEvent>,
}

impl UserService {
    pub fn new(users: Rc<UserRepository>) -> Self {
        Self {
            users,
            events: EventBus::new("user_service"),
        }
    }

    pub fn repository(&self) -> &UserRepository {
        &self.users
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&ServiceEvent) -> ListenerResult + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    /// Registers a user.
    ///
    /// # Errors
    /// - `ServiceError::Validation` for malformed username/email.
    /// - Repository `Duplicate` when the username or email is taken.
    pub fn create_user(&self, draft: NewUser) -> ServiceResult<User> {
        self.guard("createUser", || {
            let user = User::create(draft, self.users.now())?;
            let created = self.users.create(user)?;
            info!(
                "event=user_created module=service status=ok user_id={} role={}",
                created.id(),
                created.role()
            );
            self.events.emit(&ServiceEvent::UserCreated(created.clone()));
            Ok(created)
        })
    }

    pub fn get_user(&self, user_id: &str) -> ServiceResult<Option<User>> {
        self.guard("getUser", || Ok(self.users.find_by_id(user_id)?))
    }

    pub fn update_user(
        &self,
        user_id: &str,
        patches: Vec<UserPatch>,
    ) -> ServiceResult<Option<User>> {
        self.guard("updateUser", || {
            let updated = self.users.update(user_id, patches)?;
            if let Some(user) = updated.as_ref() {
                self.events.emit(&ServiceEvent::UserUpdated(user.clone()));
            }
            Ok(updated)
        })
    }

    pub fn delete_user(&self, user_id: &str) -> ServiceResult<bool> {
        self.guard("deleteUser", || {
            let deleted = self.users.delete(user_id)?;
            if deleted {
                self.events.emit(&ServiceEvent::UserDeleted {
                    user_id: user_id.to_string(),
                });
            }
            Ok(deleted)
        })
    }

    /// Stamps `last_login_at`; `Ok(None)` for unknown users.
    pub fn record_login(&self, user_id: &str) -> ServiceResult<Option<User>> {
        self.update_user(user_id, vec![UserPatch::RecordLogin])
    }

    pub fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        self.guard("findByUsername", || Ok(self.users.find_by_username(username)?))
    }

    pub fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        self.guard("findByEmail", || Ok(self.users.find_by_email(email)?))
    }

    pub fn search_users(&self, query: &str) -> ServiceResult<Vec<User>> {
        self.guard("searchUsers", || Ok(self.users.search(query)?))
    }

    pub fn list_users(&self, options: &UserQuery) -> ServiceResult<Vec<User>> {
        self.guard("listUsers", || Ok(self.users.find_all(options)?))
    }

    pub fn get_user_stats(&self) -> ServiceResult<UserStatistics> {
        self.guard("getUserStats", || Ok(self.users.get_statistics()?))
    }

    fn guard<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce() -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        body().map_err(|err| {
            if !matches!(err, ServiceError::Repo(_)) {
                warn!(
                    "event=user_service_failed module=service status=error \
                     operation={operation} error_kind={} error={err}",
                    err.kind()
                );
            }
            self.events.emit(&ServiceEvent::Error {
                operation,
                kind: err.kind(),
                error: err.to_string(),
            });
            err
        })
    }
}
