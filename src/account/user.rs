use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Gate;
use crate::progression::Progression;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_SPIRITUAL_LEVEL: &str = "Beginner";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub name: String,
    pub password_hash: String,
    /// Display label only; nothing derives it from progression.
    pub spiritual_level: String,
    pub contemplation_streak: u32,
    pub progression: Progression,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn highest_gate_unlocked(&self) -> Gate {
        self.progression.highest_gate_unlocked
    }

    pub fn profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            name: self.name.clone(),
            spiritual_level: self.spiritual_level.clone(),
            contemplation_streak: self.contemplation_streak,
            total_insights: self.progression.total_insights,
            highest_gate_unlocked: self.progression.highest_gate_unlocked,
            created_at: self.created_at,
        }
    }
}

/// The user as shown back to its owner; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub name: String,
    pub spiritual_level: String,
    pub contemplation_streak: u32,
    pub total_insights: u32,
    pub highest_gate_unlocked: Gate,
    pub created_at: DateTime<Utc>,
}

/// Raw sign-up input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub username: String,
    pub name: String,
}

/// A validated account ready to be stored.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub name: String,
    pub password_hash: String,
}

pub fn validate_registration(registration: &Registration) -> Result<(), String> {
    let fields = [
        registration.email.trim(),
        registration.password.as_str(),
        registration.username.trim(),
        registration.name.trim(),
    ];
    if fields.iter().any(|field| field.is_empty()) {
        return Err("All fields are required".to_string());
    }
    if registration.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(password: &str) -> Registration {
        Registration {
            email: "seeker@example.com".to_string(),
            password: password.to_string(),
            username: "seeker".to_string(),
            name: "Seeker".to_string(),
        }
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_registration(&registration("12345")).is_err());
        assert!(validate_registration(&registration("123456")).is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut reg = registration("secret-words");
        reg.username = "   ".to_string();
        assert_eq!(
            validate_registration(&reg),
            Err("All fields are required".to_string())
        );
    }
}
