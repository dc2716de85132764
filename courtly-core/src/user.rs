use crate::verification::{random_salt, salted_digest};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Member,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_salt: String,
    pub password_digest: String,
    pub wallet_balance: i64,
    pub role: UserRole,
    pub created_at: DateTime<FixedOffset>,
}

/// Account view safe to hand to API callers: no credential material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub wallet_balance: i64,
    pub role: UserRole,
}

impl User {
    pub fn new(
        name: String,
        email: String,
        phone: Option<String>,
        password: &str,
        role: UserRole,
        now: DateTime<FixedOffset>,
    ) -> Self {
        let salt = random_salt();
        let digest = salted_digest(&salt, password);
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            phone,
            password_salt: salt,
            password_digest: digest,
            wallet_balance: 0,
            role,
            created_at: now,
        }
    }

    pub fn verify_password(&self, password: &str) -> bool {
        salted_digest(&self.password_salt, password) == self.password_digest
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            wallet_balance: self.wallet_balance,
            role: self.role,
        }
    }
}
