//! Input validation: checks run before any record is written.

use crate::error::ValidationError;
use crate::records::{AgreementAcceptance, DocumentUpload, ProfileFields};

/// Accepted upload formats, matched against the MIME subtype or the file
/// extension.
pub const ALLOWED_FILE_TYPES: [&str; 4] = ["pdf", "jpg", "jpeg", "png"];

/// All three agreements must be checked.
pub fn validate_acceptance(acceptance: &AgreementAcceptance) -> Result<(), ValidationError> {
    let missing = acceptance.missing();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::AgreementsNotAccepted(missing))
    }
}

/// First name, last name and phone must be supplied and non-blank.
pub fn validate_profile(fields: &ProfileFields) -> Result<(), ValidationError> {
    let missing = fields.missing_required();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields(missing))
    }
}

/// Size, type and name checks for a document upload.
pub fn validate_upload(upload: &DocumentUpload, max_bytes: u64) -> Result<(), ValidationError> {
    validate_file_name(&upload.file_name)?;

    if upload.file_size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if upload.file_size > max_bytes {
        return Err(ValidationError::FileTooLarge {
            size: upload.file_size,
            max: max_bytes,
        });
    }

    let kind = file_kind(&upload.file_type, &upload.file_name);
    if !kind
        .as_deref()
        .is_some_and(|k| ALLOWED_FILE_TYPES.contains(&k))
    {
        let reported = if upload.file_type.trim().is_empty() {
            upload.file_name.clone()
        } else {
            upload.file_type.clone()
        };
        return Err(ValidationError::UnsupportedFileType {
            file_type: reported,
            allowed: ALLOWED_FILE_TYPES.join(", "),
        });
    }

    Ok(())
}

fn validate_file_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidFileName("file name is empty".into()));
    }
    if trimmed.contains(['/', '\\']) || trimmed.contains("..") {
        return Err(ValidationError::InvalidFileName(format!(
            "{trimmed} must not contain path separators"
        )));
    }
    Ok(())
}

/// Lowercase format from a MIME type (`image/png` → `png`), falling back to
/// the file extension when no type was reported.
fn file_kind(file_type: &str, file_name: &str) -> Option<String> {
    let file_type = file_type.trim();
    if !file_type.is_empty() {
        let subtype = file_type.rsplit('/').next()?;
        // Drop parameters like "; charset=binary"
        let subtype = subtype.split(';').next()?.trim();
        return Some(subtype.to_ascii_lowercase());
    }
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::DocumentType;

    const MAX: u64 = 5 * 1024 * 1024;

    fn upload(file_name: &str, file_type: &str, file_size: u64) -> DocumentUpload {
        DocumentUpload {
            document_type: DocumentType::Resume,
            file_name: file_name.into(),
            file_type: file_type.into(),
            file_size,
        }
    }

    #[test]
    fn acceptance_requires_every_box() {
        assert!(validate_acceptance(&AgreementAcceptance::all()).is_ok());
        let partial = AgreementAcceptance {
            terms: true,
            privacy: false,
            confidentiality: true,
        };
        assert_eq!(
            validate_acceptance(&partial),
            Err(ValidationError::AgreementsNotAccepted(vec!["privacy".into()]))
        );
    }

    #[test]
    fn profile_requires_names_and_phone() {
        let fields = ProfileFields {
            first_name: Some("Ada".into()),
            last_name: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(
            validate_profile(&fields),
            Err(ValidationError::MissingFields(vec![
                "last_name".into(),
                "phone".into()
            ]))
        );
    }

    #[test]
    fn accepts_allowed_types() {
        assert!(validate_upload(&upload("cv.pdf", "application/pdf", 1024), MAX).is_ok());
        assert!(validate_upload(&upload("scan.JPG", "image/jpeg", 1024), MAX).is_ok());
        assert!(validate_upload(&upload("photo.png", "", 1024), MAX).is_ok());
        assert!(validate_upload(&upload("x.pdf", "application/pdf; charset=binary", 1), MAX).is_ok());
    }

    #[test]
    fn rejects_other_types() {
        let err = validate_upload(&upload("cv.docx", "application/msword", 1024), MAX).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedFileType { .. }));
        assert!(validate_upload(&upload("README", "", 1024), MAX).is_err());
    }

    #[test]
    fn enforces_size_limits() {
        assert_eq!(
            validate_upload(&upload("cv.pdf", "application/pdf", MAX + 1), MAX),
            Err(ValidationError::FileTooLarge {
                size: MAX + 1,
                max: MAX
            })
        );
        assert!(validate_upload(&upload("cv.pdf", "application/pdf", MAX), MAX).is_ok());
        assert_eq!(
            validate_upload(&upload("cv.pdf", "application/pdf", 0), MAX),
            Err(ValidationError::EmptyFile)
        );
    }

    #[test]
    fn rejects_path_like_names() {
        for name in ["", "  ", "../cv.pdf", "a/b.pdf", "a\\b.pdf"] {
            assert!(
                matches!(
                    validate_upload(&upload(name, "application/pdf", 10), MAX),
                    Err(ValidationError::InvalidFileName(_))
                ),
                "{name:?} should be rejected"
            );
        }
    }
}
