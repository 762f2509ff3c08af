use axum::extract::Multipart;
use bytes::Bytes;
use tracing::debug;

use crate::errors::AppError;
use crate::models::application::NewApplication;
use crate::notify::Attachment;

/// Multipart field carrying the résumé.
pub const CV_FIELD: &str = "cv";

/// The uploaded résumé, held in memory for the lifetime of the request only.
#[derive(Debug, Clone)]
pub struct CvUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Raw form contents as received, before validation.
#[derive(Debug, Default)]
pub struct ApplicationForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub cv: Option<CvUpload>,
}

impl ApplicationForm {
    /// Drains the multipart stream. Unknown fields are skipped.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ApplicationForm::default();

        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or("").to_string();
            match field_name.as_str() {
                "name" => form.name = Some(field.text().await?),
                "email" => form.email = Some(field.text().await?),
                "phone" => form.phone = Some(field.text().await?),
                "position" => form.position = Some(field.text().await?),
                CV_FIELD => {
                    let file_name = field.file_name().unwrap_or("").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;

                    // Browsers send an unnamed part when no file was picked.
                    // A named file is accepted even when it is empty.
                    if file_name.is_empty() {
                        continue;
                    }
                    if form.cv.is_some() {
                        return Err(AppError::Validation(
                            "Only one CV file may be uploaded.".to_string(),
                        ));
                    }
                    form.cv = Some(CvUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                other => debug!("Ignoring unexpected form field '{other}'"),
            }
        }

        Ok(form)
    }

    /// Checks that every applicant field and the CV are present.
    pub fn validate(self) -> Result<(NewApplication, CvUpload), AppError> {
        match (
            present(self.name),
            present(self.email),
            present(self.phone),
            present(self.position),
            self.cv,
        ) {
            (Some(name), Some(email), Some(phone), Some(position), Some(cv)) => Ok((
                NewApplication {
                    name,
                    email,
                    phone,
                    position,
                },
                cv,
            )),
            _ => Err(AppError::missing_fields()),
        }
    }
}

impl From<CvUpload> for Attachment {
    fn from(cv: CvUpload) -> Self {
        Attachment {
            file_name: cv.file_name,
            content_type: cv.content_type,
            content: cv.bytes,
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
