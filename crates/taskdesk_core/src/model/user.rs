//! User domain model.
//!
//! # Responsibility
//! - Define the canonical user record and role capabilities.
//! - Normalize and validate the unique keys (`username`, `email`).
//!
//! # Invariants
//! - `id` and `created_at` never change after construction.
//! - `username` and `email` are stored lowercase; uniqueness across the
//!   collection is enforced by the repository.

use crate::model::validation::{require_max_len, require_text, ValidationError, ValidationResult};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub type UserId = String;

pub const NAME_MAX_CHARS: usize = 100;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_.\-]{3,32}$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});

/// Capability granted by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// View and administer other users' accounts.
    ManageUsers,
    /// Modify any task regardless of ownership.
    ManageAllTasks,
}

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "member" | "user" => Some(Self::Member),
            _ => None,
        }
    }

    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Self::Admin => &[Permission::ManageUsers, Permission::ManageAllTasks],
            Self::Manager => &[Permission::ManageUsers],
            Self::Member => &[],
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creation draft for a user account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub id: Option<UserId>,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            ..Self::default()
        }
    }
}

/// One closed, validated mutation of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserPatch {
    Username(String),
    Email(String),
    DisplayName(String),
    FirstName(String),
    LastName(String),
    Role(Role),
    Active(bool),
    Verified(bool),
    RecordLogin,
}

/// Canonical user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: UserId,
    username: String,
    email: String,
    display_name: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    role: Role,
    is_active: bool,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Builds a validated, active, unverified user from a draft.
    pub fn create(draft: NewUser, now: DateTime<Utc>) -> ValidationResult<Self> {
        let username = normalize_username(&draft.username);
        let display_name = draft
            .display_name
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| username.clone());
        let user = Self {
            id: draft.id.map(|id| id.trim().to_string()).unwrap_or_default(),
            email: normalize_email(&draft.email),
            username,
            display_name,
            first_name: draft.first_name.trim().to_string(),
            last_name: draft.last_name.trim().to_string(),
            role: draft.role,
            is_active: true,
            is_verified: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        user.validate()?;
        Ok(user)
    }

    pub fn validate(&self) -> ValidationResult<()> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        require_text("displayName", &self.display_name)?;
        require_max_len("displayName", &self.display_name, NAME_MAX_CHARS)?;
        require_max_len("firstName", &self.first_name, NAME_MAX_CHARS)?;
        require_max_len("lastName", &self.last_name, NAME_MAX_CHARS)?;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_verified(&self) -> bool {
        self.is_verified
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.permissions().contains(&permission)
    }

    /// First + last name, falling back to the display name.
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.display_name.clone()
        } else {
            full.to_string()
        }
    }

    /// Case-insensitive substring match over identity and contact fields.
    ///
    /// `needle` must already be lowercase.
    pub fn matches_text(&self, needle: &str) -> bool {
        self.username.contains(needle)
            || self.display_name.to_lowercase().contains(needle)
            || self.first_name.to_lowercase().contains(needle)
            || self.last_name.to_lowercase().contains(needle)
            || self.email.contains(needle)
    }

    pub fn set_username(&mut self, username: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let username = normalize_username(username);
        validate_username(&username)?;
        self.username = username;
        self.touch(now);
        Ok(())
    }

    pub fn set_email(&mut self, email: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let email = normalize_email(email);
        validate_email(&email)?;
        self.email = email;
        self.touch(now);
        Ok(())
    }

    pub fn set_display_name(&mut self, value: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let value = value.trim();
        require_text("displayName", value)?;
        require_max_len("displayName", value, NAME_MAX_CHARS)?;
        self.display_name = value.to_string();
        self.touch(now);
        Ok(())
    }

    pub fn set_first_name(&mut self, value: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let value = value.trim();
        require_max_len("firstName", value, NAME_MAX_CHARS)?;
        self.first_name = value.to_string();
        self.touch(now);
        Ok(())
    }

    pub fn set_last_name(&mut self, value: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let value = value.trim();
        require_max_len("lastName", value, NAME_MAX_CHARS)?;
        self.last_name = value.to_string();
        self.touch(now);
        Ok(())
    }

    pub fn set_role(&mut self, role: Role, now: DateTime<Utc>) {
        self.role = role;
        self.touch(now);
    }

    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        self.is_active = active;
        self.touch(now);
    }

    pub fn set_verified(&mut self, verified: bool, now: DateTime<Utc>) {
        self.is_verified = verified;
        self.touch(now);
    }

    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.last_login_at = Some(now);
        self.touch(now);
    }

    /// Routes one patch to its dedicated mutator.
    pub fn apply_patch(&mut self, patch: UserPatch, now: DateTime<Utc>) -> ValidationResult<()> {
        match patch {
            UserPatch::Username(value) => self.set_username(&value, now)?,
            UserPatch::Email(value) => self.set_email(&value, now)?,
            UserPatch::DisplayName(value) => self.set_display_name(&value, now)?,
            UserPatch::FirstName(value) => self.set_first_name(&value, now)?,
            UserPatch::LastName(value) => self.set_last_name(&value, now)?,
            UserPatch::Role(role) => self.set_role(role, now),
            UserPatch::Active(value) => self.set_active(value, now),
            UserPatch::Verified(value) => self.set_verified(value, now),
            UserPatch::RecordLogin => self.record_login(now),
        }
        Ok(())
    }

    /// Sets the id only while it is still empty.
    pub(crate) fn assign_id(&mut self, id: UserId) {
        if self.id.is_empty() {
            self.id = id;
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::milliseconds(1)
        };
    }
}

pub fn normalize_username(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

fn validate_username(value: &str) -> ValidationResult<()> {
    require_text("username", value)?;
    if !USERNAME_RE.is_match(value) {
        return Err(ValidationError::InvalidValue {
            field: "username",
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_email(value: &str) -> ValidationResult<()> {
    require_text("email", value)?;
    if !EMAIL_RE.is_match(value) {
        return Err(ValidationError::InvalidValue {
            field: "email",
            value: value.to_string(),
        });
    }
    Ok(())
}
