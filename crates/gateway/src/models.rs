use billboard_protocol::{ReportView, Role, UserProfile, Violations};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// A user about to be inserted. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: Uuid,
    /// Relative keys inside the upload directory, in submission order.
    pub image_keys: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub category: String,
    pub violations: Violations,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Report fields supplied by the submitter; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub image_keys: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub category: String,
    pub violations: Violations,
    pub created_by: Uuid,
}

impl NewReport {
    pub fn into_report(self, id: Uuid, created_at: DateTime<Utc>) -> Report {
        Report {
            id,
            image_keys: self.image_keys,
            latitude: self.latitude,
            longitude: self.longitude,
            description: self.description,
            category: self.category,
            violations: self.violations,
            created_by: self.created_by,
            created_at,
        }
    }
}

impl Report {
    /// Resolve image keys against the origin the request came in on, e.g. `http://10.0.2.2:5000`.
    pub fn to_view(&self, origin: &str) -> ReportView {
        let origin = origin.trim_end_matches('/');
        let image_urls: Vec<String> = self
            .image_keys
            .iter()
            .map(|key| format!("{}/uploads/{}", origin, key))
            .collect();

        ReportView {
            id: self.id,
            image_url: image_urls.first().cloned().unwrap_or_default(),
            image_urls,
            latitude: self.latitude,
            longitude: self.longitude,
            description: self.description.clone(),
            category: self.category.clone(),
            violations: self.violations.clone(),
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// The identity the access gate attaches to an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

// ── DATABASE ROWS ─────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| AppError::Internal(format!("user {} has {}", row.id, e)))?;
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub image_keys: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub category: String,
    pub violations: sqlx::types::Json<Violations>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        Report {
            id: row.id,
            image_keys: row.image_keys,
            latitude: row.latitude,
            longitude: row.longitude,
            description: row.description,
            category: row.category,
            violations: row.violations.0,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report(keys: &[&str]) -> Report {
        Report {
            id: Uuid::new_v4(),
            image_keys: keys.iter().map(|k| k.to_string()).collect(),
            latitude: Some(12.97),
            longitude: Some(77.59),
            description: Some("Oversized hoarding".into()),
            category: "Other".into(),
            violations: Violations::default(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn view_mirrors_first_image_into_legacy_field() {
        let report = sample_report(&["1700000000000.jpg", "1700000000001.png"]);
        let view = report.to_view("http://10.0.2.2:5000/");

        assert_eq!(
            view.image_urls,
            vec![
                "http://10.0.2.2:5000/uploads/1700000000000.jpg".to_string(),
                "http://10.0.2.2:5000/uploads/1700000000001.png".to_string(),
            ]
        );
        assert_eq!(view.image_url, view.image_urls[0]);
        assert_eq!(view.created_by, report.created_by);
    }

    #[test]
    fn unknown_role_in_row_is_an_internal_error() {
        let row = UserRow {
            id: Uuid::new_v4(),
            username: "ghost".into(),
            password_hash: "x".into(),
            role: "superuser".into(),
            created_at: Utc::now(),
        };
        assert!(matches!(User::try_from(row), Err(AppError::Internal(_))));
    }
}
