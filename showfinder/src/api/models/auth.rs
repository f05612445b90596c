//! Registration and login submissions.
//!
//! Browsers post `application/x-www-form-urlencoded` (or `multipart/form-data` when a profile
//! image is attached); scripted clients post JSON. The extractors here accept all of them and
//! normalise into one struct per form. Every field is optional: a missing field, an explicit
//! JSON `null` and an empty string are all "not provided", and it is the handler's job to
//! decide what that means.

use axum::{
    Form, Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Username/password pair from the login form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// Both fields, if both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.username)?, non_empty(&self.password)?))
    }
}

/// Text fields of the registration form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterFields {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// An image attached to the registration form, held in memory until the submission has been
/// validated.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A complete registration submission.
#[derive(Debug, Clone, Default)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub image: Option<ImageUpload>,
}

impl RegisterRequest {
    /// Both fields, if both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.username)?, non_empty(&self.password)?))
    }
}

impl From<RegisterFields> for RegisterRequest {
    fn from(fields: RegisterFields) -> Self {
        Self {
            username: fields.username,
            password: fields.password,
            image: None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn content_type(req: &Request) -> String {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Deserialize a form body as JSON or urlencoded, depending on its content type.
async fn form_or_json<T, S>(req: Request, state: &S) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned + Send,
    S: Send + Sync,
{
    if content_type(&req).starts_with("application/json") {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| Error::BadRequest {
            message: format!("Invalid JSON body: {e}"),
        })?;
        Ok(value)
    } else {
        let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| Error::BadRequest {
            message: format!("Invalid form body: {e}"),
        })?;
        Ok(value)
    }
}

impl<S> FromRequest<S> for LoginRequest
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        form_or_json(req, state).await
    }
}

impl<S> FromRequest<S> for RegisterRequest
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !content_type(&req).starts_with("multipart/form-data") {
            let fields: RegisterFields = form_or_json(req, state).await?;
            return Ok(fields.into());
        }

        let mut multipart = Multipart::from_request(req, state).await.map_err(|e| Error::BadRequest {
            message: format!("Invalid multipart body: {e}"),
        })?;

        let mut request = RegisterRequest::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to parse multipart data: {e}"),
        })? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "username" | "password" => {
                    let value = field.text().await.map_err(|e| Error::BadRequest {
                        message: format!("Failed to read field {name}: {e}"),
                    })?;
                    if name == "username" {
                        request.username = Some(value);
                    } else {
                        request.password = Some(value);
                    }
                }
                "file" => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
                        message: format!("Failed to read uploaded file: {e}"),
                    })?;
                    // Browsers send an empty part when no file was chosen
                    if bytes.is_empty() && file_name.as_deref().unwrap_or_default().is_empty() {
                        continue;
                    }
                    request.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                other => {
                    tracing::debug!(field = other, "Ignoring unexpected registration field");
                }
            }
        }

        Ok(request)
    }
}
