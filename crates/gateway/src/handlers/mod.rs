use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::HeaderMap,
};

use crate::error::AppError;

pub mod admin;
pub mod auth;
pub mod reports;

/// `Json` whose rejections come back in the usual `{success, message}` envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Query` with the same envelope on rejection.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `Multipart` with the same envelope on rejection.
pub struct ApiMultipart(pub Multipart);

#[async_trait]
impl<S> FromRequest<S> for ApiMultipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        Ok(Self(multipart))
    }
}

/// `{scheme}://{host}` as seen by the client, used to build public image URLs.
/// `host` comes from axum's `Host` extractor (forwarded headers, `Host`, then the URI authority).
pub fn request_origin(host: Option<&str>, headers: &HeaderMap) -> String {
    let host = host.filter(|h| !h.is_empty()).unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|p| *p == "http" || *p == "https")
        .unwrap_or("http");
    format!("{}://{}", scheme, host)
}
