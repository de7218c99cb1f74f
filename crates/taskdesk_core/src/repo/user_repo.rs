//! User repository finders and statistics.
//!
//! # Invariants
//! - `username` and `email` are unique across the collection; both are
//!   compared in their normalized (lowercase) form.

use crate::model::user::{normalize_email, normalize_username, Role, User, UserPatch};
use crate::model::validation::ValidationResult;
use crate::repo::query::{QueryOptions, Queryable, SortValue};
use crate::repo::{Entity, RepoResult, Repository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const USERS_COLLECTION: &str = "users";

pub type UserRepository = Repository<User>;
pub type UserQuery = QueryOptions<UserFilter, UserSortField>;

/// Equality filter over one user field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    Role(Role),
    Active(bool),
    Verified(bool),
    /// Compared after normalization.
    Username(String),
    /// Compared after normalization.
    Email(String),
}

/// Sortable user field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSortField {
    Username,
    Email,
    DisplayName,
    Role,
    CreatedAt,
    UpdatedAt,
    LastLoginAt,
}

impl Queryable for User {
    type Filter = UserFilter;
    type SortField = UserSortField;

    fn matches_filter(&self, filter: &UserFilter) -> bool {
        match filter {
            UserFilter::Role(role) => self.role() == *role,
            UserFilter::Active(active) => self.is_active() == *active,
            UserFilter::Verified(verified) => self.is_verified() == *verified,
            UserFilter::Username(username) => self.username() == normalize_username(username),
            UserFilter::Email(email) => self.email() == normalize_email(email),
        }
    }

    fn sort_value(&self, field: UserSortField) -> SortValue<'_> {
        match field {
            UserSortField::Username => SortValue::Text(self.username()),
            UserSortField::Email => SortValue::Text(self.email()),
            UserSortField::DisplayName => SortValue::Text(self.display_name()),
            UserSortField::Role => SortValue::Text(self.role().as_str()),
            UserSortField::CreatedAt => SortValue::Timestamp(Some(self.created_at())),
            UserSortField::UpdatedAt => SortValue::Timestamp(Some(self.updated_at())),
            UserSortField::LastLoginAt => SortValue::Timestamp(self.last_login_at()),
        }
    }
}

impl Entity for User {
    type Patch = UserPatch;

    const COLLECTION: &'static str = USERS_COLLECTION;

    fn id(&self) -> &str {
        User::id(self)
    }

    fn assign_id(&mut self, id: String) {
        User::assign_id(self, id);
    }

    fn validate(&self) -> ValidationResult<()> {
        User::validate(self)
    }

    fn apply_patch(&mut self, patch: UserPatch, now: DateTime<Utc>) -> ValidationResult<()> {
        User::apply_patch(self, patch, now)
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![
            ("username", self.username().to_string()),
            ("email", self.email().to_string()),
        ]
    }
}

/// Aggregated user counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub total: usize,
    pub active: usize,
    pub verified: usize,
    pub by_role: BTreeMap<Role, usize>,
}

impl Repository<User> {
    pub fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let query = UserQuery::new().filter(UserFilter::Username(username.to_string()));
        Ok(self.find_all(&query)?.into_iter().next())
    }

    pub fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let query = UserQuery::new().filter(UserFilter::Email(email.to_string()));
        Ok(self.find_all(&query)?.into_iter().next())
    }

    pub fn find_active(&self) -> RepoResult<Vec<User>> {
        self.find_all(&UserQuery::new().filter(UserFilter::Active(true)))
    }

    pub fn find_by_role(&self, role: Role) -> RepoResult<Vec<User>> {
        self.find_all(&UserQuery::new().filter(UserFilter::Role(role)))
    }

    /// Case-insensitive substring search over username, display, first and
    /// last name and email; a blank query matches nothing.
    pub fn search(&self, query: &str) -> RepoResult<Vec<User>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .find_all(&UserQuery::new())?
            .into_iter()
            .filter(|user| user.matches_text(&needle))
            .collect())
    }

    pub fn get_statistics(&self) -> RepoResult<UserStatistics> {
        let mut stats = UserStatistics::default();
        for user in self.find_all(&UserQuery::new())? {
            stats.total += 1;
            if user.is_active() {
                stats.active += 1;
            }
            if user.is_verified() {
                stats.verified += 1;
            }
            *stats.by_role.entry(user.role()).or_insert(0) += 1;
        }
        Ok(stats)
    }
}
