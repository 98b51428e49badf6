pub mod auth;
pub mod reports;

pub use auth::{AdminBootstrap, AuthService, Session};
pub use reports::{ImageUpload, PageRequest, ReportFields, ReportPage, ReportService};
