use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialStore, ReportStore};
use crate::error::{AppError, Result};
use crate::models::{NewReport, NewUser, Report, User};

/// In-memory implementation of both stores. Vectors keep insertion order.
#[derive(Clone, Default)]
pub struct ReferenceStore {
    users: Arc<Mutex<Vec<User>>>,
    reports: Arc<Mutex<Vec<Report>>>,
}

#[cfg(test)]
impl ReferenceStore {
    /// Insert a fully formed report, keeping its id and timestamp.
    pub(crate) async fn seed_report(&self, report: Report) {
        self.reports.lock().await.push(report);
    }
}

#[async_trait]
impl CredentialStore for ReferenceStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let mut users = self.users.lock().await;
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.lock().await.clone())
    }
}

#[async_trait]
impl ReportStore for ReferenceStore {
    async fn insert_report(&self, report: NewReport) -> Result<Report> {
        let created = report.into_report(Uuid::new_v4(), Utc::now());
        self.reports.lock().await.push(created.clone());
        Ok(created)
    }

    async fn find_page(&self, skip: u64, limit: u64) -> Result<(Vec<Report>, u64)> {
        let reports = self.reports.lock().await;
        // Reverse first so that equal timestamps still come out newest-inserted first.
        let mut ordered: Vec<&Report> = reports.iter().rev().collect();
        ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let page = ordered.into_iter().skip(skip).take(limit).cloned().collect();
        Ok((page, reports.len() as u64))
    }

    async fn find_report(&self, id: Uuid) -> Result<Option<Report>> {
        let reports = self.reports.lock().await;
        Ok(reports.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_report(&self, id: Uuid) -> Result<bool> {
        let mut reports = self.reports.lock().await;
        let before = reports.len();
        reports.retain(|r| r.id != id);
        Ok(reports.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billboard_protocol::{Role, Violations};
    use chrono::Duration;

    fn new_report(owner: Uuid, description: &str) -> NewReport {
        NewReport {
            image_keys: vec!["1.jpg".into()],
            latitude: None,
            longitude: None,
            description: Some(description.into()),
            category: "Other".into(),
            violations: Violations::default(),
            created_by: owner,
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = ReferenceStore::default();
        let user = NewUser {
            username: "ravi".into(),
            password_hash: "h".into(),
            role: Role::User,
        };
        store.insert_user(user.clone()).await.unwrap();
        let err = store.insert_user(user).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn password_update_on_missing_user_reports_false() {
        let store = ReferenceStore::default();
        assert!(!store.update_password_hash(Uuid::new_v4(), "h").await.unwrap());
    }

    #[tokio::test]
    async fn pages_are_newest_first_with_total() {
        let store = ReferenceStore::default();
        let owner = Uuid::new_v4();
        let base = Utc::now();
        for i in 0..25 {
            let report = new_report(owner, &format!("report {i}"))
                .into_report(Uuid::new_v4(), base + Duration::seconds(i));
            store.seed_report(report).await;
        }

        let (page, total) = store.find_page(0, 10).await.unwrap();
        assert_eq!(total, 25);
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].description.as_deref(), Some("report 24"));
        assert!(page.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let (last, _) = store.find_page(20, 10).await.unwrap();
        assert_eq!(last.len(), 5);
        assert_eq!(last[4].description.as_deref(), Some("report 0"));
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = ReferenceStore::default();
        let report = store.insert_report(new_report(Uuid::new_v4(), "x")).await.unwrap();
        assert!(store.delete_report(report.id).await.unwrap());
        assert!(!store.delete_report(report.id).await.unwrap());
        assert!(store.find_report(report.id).await.unwrap().is_none());
    }
}
