use std::sync::Arc;

use billboard_protocol::Violations;
use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Identity, NewReport, Report};
use crate::store::ReportStore;
use crate::uploads::UploadStore;

pub const MAX_IMAGES: usize = 5;
pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;
pub const DEFAULT_CATEGORY: &str = "Other";

/// One file from the `images` multipart field.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// Text fields of a submission, exactly as they arrived.
#[derive(Debug, Clone, Default)]
pub struct ReportFields {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub violations: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Lenient parsing of `?page=&limit=`: junk and values below one fall back
    /// to the defaults, and `limit` is capped at [`MAX_LIMIT`].
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let positive = |raw: Option<&str>| {
            raw.and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v >= 1)
        };
        Self {
            page: positive(page).unwrap_or(DEFAULT_PAGE),
            limit: positive(limit).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct ReportPage {
    pub reports: Vec<Report>,
    pub total_pages: u64,
    pub current_page: u64,
    pub total: u64,
}

#[derive(Clone)]
pub struct ReportService {
    reports: Arc<dyn ReportStore>,
    uploads: UploadStore,
}

impl ReportService {
    pub fn new(reports: Arc<dyn ReportStore>, uploads: UploadStore) -> Self {
        Self { reports, uploads }
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    pub async fn create(
        &self,
        identity: Identity,
        fields: ReportFields,
        images: Vec<ImageUpload>,
    ) -> Result<Report> {
        if images.is_empty() {
            return Err(AppError::Validation("At least one image required".to_string()));
        }
        if images.len() > MAX_IMAGES {
            return Err(AppError::Validation(format!(
                "At most {} images are allowed",
                MAX_IMAGES
            )));
        }

        let mut image_keys = Vec::with_capacity(images.len());
        for image in &images {
            match self.uploads.save(image.file_name.as_deref(), &image.bytes).await {
                Ok(key) => image_keys.push(key),
                Err(e) => {
                    self.discard_files(&image_keys).await;
                    return Err(e);
                }
            }
        }

        let new_report = NewReport {
            image_keys: image_keys.clone(),
            latitude: parse_coordinate(fields.latitude.as_deref()),
            longitude: parse_coordinate(fields.longitude.as_deref()),
            description: fields.description,
            category: fields
                .category
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            violations: parse_violations(fields.violations.as_deref()),
            created_by: identity.user_id,
        };

        match self.reports.insert_report(new_report).await {
            Ok(report) => {
                info!(
                    "Report {} saved by {} with {} image(s)",
                    report.id,
                    report.created_by,
                    report.image_keys.len()
                );
                Ok(report)
            }
            Err(e) => {
                self.discard_files(&image_keys).await;
                Err(e)
            }
        }
    }

    pub async fn list(&self, page: PageRequest) -> Result<ReportPage> {
        let (reports, total) = self.reports.find_page(page.skip(), page.limit).await?;
        Ok(ReportPage {
            reports,
            total_pages: total.div_ceil(page.limit),
            current_page: page.page,
            total,
        })
    }

    /// Owner or admin only. The record goes first; image files are removed
    /// afterwards and failures there are logged, never returned.
    pub async fn delete(&self, identity: Identity, report_id: &str) -> Result<()> {
        let not_found = || AppError::NotFound("Report not found".to_string());

        let id = Uuid::parse_str(report_id).map_err(|_| not_found())?;
        let report = self.reports.find_report(id).await?.ok_or_else(not_found)?;

        if !identity.is_admin() && report.created_by != identity.user_id {
            return Err(AppError::Forbidden(
                "Not authorized to delete this report".to_string(),
            ));
        }

        if !self.reports.delete_report(id).await? {
            return Err(not_found());
        }
        info!("Report {} deleted by {}", id, identity.user_id);

        for key in &report.image_keys {
            if let Err(e) = self.uploads.remove(key).await {
                error!("Failed to delete image {} of report {}: {}", key, id, e);
            }
        }
        Ok(())
    }

    async fn discard_files(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.uploads.remove(key).await {
                warn!("Failed to discard orphaned upload {}: {}", key, e);
            }
        }
    }
}

fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Malformed metadata never fails a submission. Unparseable JSON (or JSON that
/// is not an object) is replaced by the default; inside an object, each field
/// with a missing or mistyped value falls back on its own.
pub fn parse_violations(raw: Option<&str>) -> Violations {
    let Some(payload) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Violations::default();
    };
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(fields)) => violations_from_object(&fields),
        Ok(other) => {
            warn!("Ignoring violations payload that is not an object: {}", other);
            Violations::default()
        }
        Err(e) => {
            warn!("Ignoring unparseable violations payload: {}", e);
            Violations::default()
        }
    }
}

fn violations_from_object(fields: &Map<String, Value>) -> Violations {
    let text = |key: &str| match fields.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    Violations {
        has_violations: fields
            .get("hasViolations")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        violated_words: fields
            .get("violatedWords")
            .and_then(Value::as_array)
            .map(|words| {
                words
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        detected_text: text("detectedText"),
        violation_type: text("violationType"),
        severity: text("severity"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReferenceStore;
    use billboard_protocol::Role;
    use tempfile::TempDir;

    struct Fixture {
        service: ReportService,
        store: ReferenceStore,
        dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = ReferenceStore::default();
        let service = ReportService::new(Arc::new(store.clone()), UploadStore::new(dir.path()));
        Fixture { service, store, dir }
    }

    fn citizen() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role: Role::User,
        }
    }

    fn images(n: usize) -> Vec<ImageUpload> {
        (0..n)
            .map(|i| ImageUpload {
                file_name: Some(format!("board{i}.jpg")),
                bytes: Bytes::from(vec![0xFF, 0xD8, i as u8]),
            })
            .collect()
    }

    #[tokio::test]
    async fn create_without_images_is_rejected() {
        let fx = fixture();
        let err = fx
            .service
            .create(citizen(), ReportFields::default(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(fx.store.find_page(0, 10).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn create_rejects_a_sixth_image_before_writing_anything() {
        let fx = fixture();
        let err = fx
            .service
            .create(citizen(), ReportFields::default(), images(6))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(std::fs::read_dir(fx.dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn create_stores_every_image_and_stamps_the_owner() {
        let fx = fixture();
        let who = citizen();
        for n in 1..=MAX_IMAGES {
            let report = fx
                .service
                .create(who, ReportFields::default(), images(n))
                .await
                .unwrap();
            assert_eq!(report.image_keys.len(), n);
            assert_eq!(report.created_by, who.user_id);
            assert_eq!(report.category, DEFAULT_CATEGORY);
            for key in &report.image_keys {
                assert!(fx.dir.path().join(key).is_file());
            }
        }
    }

    #[tokio::test]
    async fn create_keeps_text_fields() {
        let fx = fixture();
        let fields = ReportFields {
            latitude: Some("12.9716".into()),
            longitude: Some("not-a-number".into()),
            description: Some("Blocks the junction".into()),
            category: Some("Unauthorized".into()),
            violations: Some(
                r#"{"hasViolations":true,"violatedWords":["LIQUOR"],"detectedText":"LIQUOR SALE","violationType":"BANNED_CONTENT","severity":"HIGH"}"#
                    .into(),
            ),
        };
        let report = fx.service.create(citizen(), fields, images(1)).await.unwrap();

        assert_eq!(report.latitude, Some(12.9716));
        assert_eq!(report.longitude, None);
        assert_eq!(report.category, "Unauthorized");
        assert!(report.violations.has_violations);
        assert_eq!(report.violations.severity.as_deref(), Some("HIGH"));

        let stored = fx.store.find_report(report.id).await.unwrap().unwrap();
        assert_eq!(stored, report);
    }

    #[tokio::test]
    async fn malformed_violations_fall_back_to_default() {
        let fx = fixture();
        for raw in ["{not json", "42", "null", ""] {
            let fields = ReportFields {
                violations: Some(raw.into()),
                ..Default::default()
            };
            let report = fx.service.create(citizen(), fields, images(1)).await.unwrap();
            assert_eq!(report.violations, Violations::default(), "payload {raw:?}");
        }
    }

    #[test]
    fn mistyped_violation_fields_keep_the_rest() {
        let v = parse_violations(Some(
            r#"{"hasViolations":true,"violatedWords":null,"detectedText":"LIQUOR","severity":"HIGH"}"#,
        ));
        assert!(v.has_violations);
        assert!(v.violated_words.is_empty());
        assert_eq!(v.detected_text.as_deref(), Some("LIQUOR"));
        assert_eq!(v.severity.as_deref(), Some("HIGH"));

        let v = parse_violations(Some(
            r#"{"hasViolations":true,"violatedWords":["GUTKA",7],"severity":3,"violationType":{}}"#,
        ));
        assert!(v.has_violations);
        assert_eq!(v.violated_words, vec!["GUTKA".to_string()]);
        assert_eq!(v.severity.as_deref(), Some("3"));
        assert_eq!(v.violation_type, None);
    }

    #[test]
    fn page_request_defaults_and_clamps() {
        assert_eq!(PageRequest::from_query(None, None), PageRequest::default());
        assert_eq!(
            PageRequest::from_query(Some("abc"), Some("0")),
            PageRequest { page: 1, limit: 10 }
        );
        assert_eq!(
            PageRequest::from_query(Some("-3"), Some("5")),
            PageRequest { page: 1, limit: 5 }
        );
        assert_eq!(PageRequest::from_query(Some("2"), Some("100000")).limit, MAX_LIMIT);
        assert_eq!(PageRequest { page: 3, limit: 10 }.skip(), 20);
    }

    #[tokio::test]
    async fn list_reports_page_metadata() {
        let fx = fixture();
        for _ in 0..25 {
            fx.service
                .create(citizen(), ReportFields::default(), images(1))
                .await
                .unwrap();
        }

        let page = fx.service.list(PageRequest::default()).await.unwrap();
        assert_eq!(page.reports.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 1);
        assert!(page
            .reports
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at));

        let last = fx.service.list(PageRequest { page: 3, limit: 10 }).await.unwrap();
        assert_eq!(last.reports.len(), 5);

        let beyond = fx.service.list(PageRequest { page: 9, limit: 10 }).await.unwrap();
        assert!(beyond.reports.is_empty());
        assert_eq!(beyond.total_pages, 3);
    }

    #[tokio::test]
    async fn empty_store_has_zero_pages() {
        let fx = fixture();
        let page = fx.service.list(PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn strangers_cannot_delete() {
        let fx = fixture();
        let report = fx
            .service
            .create(citizen(), ReportFields::default(), images(2))
            .await
            .unwrap();

        let err = fx
            .service
            .delete(citizen(), &report.id.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(fx.store.find_report(report.id).await.unwrap().is_some());
        for key in &report.image_keys {
            assert!(fx.dir.path().join(key).is_file());
        }
    }

    #[tokio::test]
    async fn owner_delete_removes_record_and_files() {
        let fx = fixture();
        let owner = citizen();
        let report = fx
            .service
            .create(owner, ReportFields::default(), images(3))
            .await
            .unwrap();

        fx.service.delete(owner, &report.id.to_string()).await.unwrap();
        assert!(fx.store.find_report(report.id).await.unwrap().is_none());
        for key in &report.image_keys {
            assert!(!fx.dir.path().join(key).exists());
        }
    }

    #[tokio::test]
    async fn admin_delete_succeeds_even_when_files_are_gone() {
        let fx = fixture();
        let report = fx
            .service
            .create(citizen(), ReportFields::default(), images(2))
            .await
            .unwrap();
        for key in &report.image_keys {
            std::fs::remove_file(fx.dir.path().join(key)).unwrap();
        }

        let admin = Identity {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        };
        fx.service.delete(admin, &report.id.to_string()).await.unwrap();
        assert!(fx.store.find_report(report.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_unknown_or_malformed_ids_is_not_found() {
        let fx = fixture();
        for id in [Uuid::new_v4().to_string(), "not-an-id".to_string()] {
            let err = fx.service.delete(citizen(), &id).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }
    }
}
