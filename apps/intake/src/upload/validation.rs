use serde::Serialize;

use crate::models::upload::{FileDescriptor, PendingFile};

/// 10 MiB. A file of exactly this size is accepted.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// PDF, DOC, DOCX and plain text.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    SizeLimit { size: u64, limit: u64 },
    UnsupportedType { content_type: String },
    Duplicate,
    Empty,
}

impl Violation {
    pub fn message(&self, file_name: &str) -> String {
        match self {
            Violation::SizeLimit { size, limit } => format!(
                "\"{file_name}\" is {:.1} MB and exceeds the {} MB size limit",
                *size as f64 / (1024.0 * 1024.0),
                limit / (1024 * 1024)
            ),
            Violation::UnsupportedType { content_type } => {
                let shown = if content_type.is_empty() {
                    "unknown"
                } else {
                    content_type.as_str()
                };
                format!(
                    "\"{file_name}\" has unsupported type '{shown}'. Upload a PDF, DOC, DOCX or TXT file"
                )
            }
            Violation::Duplicate => format!("\"{file_name}\" is already selected"),
            Violation::Empty => format!("\"{file_name}\" is empty"),
        }
    }
}

/// Classification of one candidate file.
#[derive(Debug, Clone, Serialize)]
pub struct FileVerdict {
    pub name: String,
    pub size: u64,
    pub accepted: bool,
    pub violations: Vec<Violation>,
    pub messages: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub verdicts: Vec<FileVerdict>,
    /// Files that passed, in selection order. Not yet part of any selection.
    #[serde(skip)]
    pub accepted: Vec<PendingFile>,
}

impl ValidationReport {
    pub fn all_accepted(&self) -> bool {
        self.verdicts.iter().all(|v| v.accepted)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &FileVerdict> {
        self.verdicts.iter().filter(|v| !v.accepted)
    }
}

/// Strips parameters (`; charset=...`) and case from a declared content type.
fn canonical_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Checks a single file. Every rule is evaluated; all violations are returned.
pub fn check_file(file: &PendingFile, pending: &[FileDescriptor], max_bytes: u64) -> Vec<Violation> {
    let mut violations = Vec::new();

    if file.size == 0 {
        violations.push(Violation::Empty);
    }

    if file.size > max_bytes {
        violations.push(Violation::SizeLimit {
            size: file.size,
            limit: max_bytes,
        });
    }

    let content_type = canonical_content_type(&file.content_type);
    if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
        violations.push(Violation::UnsupportedType {
            content_type: file.content_type.clone(),
        });
    }

    let descriptor = file.descriptor();
    if pending.contains(&descriptor) {
        violations.push(Violation::Duplicate);
    }

    violations
}

/// Classifies a batch of candidate files against the current pending
/// selection. Files accepted earlier in the same batch count as pending for
/// the duplicate rule. Pure: nothing is recorded anywhere.
pub fn validate_files(
    files: Vec<PendingFile>,
    pending: &[FileDescriptor],
    max_bytes: u64,
) -> ValidationReport {
    let mut seen = pending.to_vec();
    let mut report = ValidationReport::default();

    for file in files {
        let violations = check_file(&file, &seen, max_bytes);
        let messages = violations.iter().map(|v| v.message(&file.name)).collect();
        let accepted = violations.is_empty();

        report.verdicts.push(FileVerdict {
            name: file.name.clone(),
            size: file.size,
            accepted,
            violations,
            messages,
        });

        if accepted {
            seen.push(file.descriptor());
            report.accepted.push(file);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    /// Builds a file with a declared size without allocating its content.
    fn file(name: &str, size: u64, content_type: &str) -> PendingFile {
        PendingFile {
            name: name.to_string(),
            size,
            content_type: content_type.to_string(),
            content: bytes::Bytes::new(),
        }
    }

    fn descriptor(name: &str, size: u64) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            size,
        }
    }

    #[test]
    fn test_accepts_each_supported_type() {
        for content_type in ACCEPTED_CONTENT_TYPES {
            assert!(check_file(&file("cv", 100, content_type), &[], MAX_FILE_BYTES).is_empty());
        }
    }

    #[test]
    fn test_content_type_parameters_ignored() {
        let f = file("cv.txt", 100, "Text/Plain; charset=utf-8");
        assert!(check_file(&f, &[], MAX_FILE_BYTES).is_empty());
    }

    #[test]
    fn test_exactly_ten_mib_is_accepted() {
        let f = file("cv.pdf", MAX_FILE_BYTES, "application/pdf");
        assert!(check_file(&f, &[], MAX_FILE_BYTES).is_empty());
    }

    #[test]
    fn test_one_byte_over_limit_is_rejected() {
        let f = file("cv.pdf", MAX_FILE_BYTES + 1, "application/pdf");
        let v = check_file(&f, &[], MAX_FILE_BYTES);
        assert!(matches!(v.as_slice(), [Violation::SizeLimit { .. }]));
        assert!(v[0].message("cv.pdf").contains("size limit"));
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let v = check_file(&file("cv.png", 100, "image/png"), &[], MAX_FILE_BYTES);
        assert_eq!(
            v,
            vec![Violation::UnsupportedType {
                content_type: "image/png".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_content_type_rejected() {
        let v = check_file(&file("cv", 100, ""), &[], MAX_FILE_BYTES);
        assert!(v[0].message("cv").contains("unknown"));
    }

    #[test]
    fn test_duplicate_rejected_even_with_bad_type() {
        let pending = vec![descriptor("cv.png", 100)];
        let v = check_file(&file("cv.png", 100, "image/png"), &pending, MAX_FILE_BYTES);
        assert!(v.contains(&Violation::Duplicate));
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_same_name_different_size_is_not_duplicate() {
        let pending = vec![descriptor("cv.pdf", 100)];
        let v = check_file(&file("cv.pdf", 101, "application/pdf"), &pending, MAX_FILE_BYTES);
        assert!(v.is_empty());
    }

    #[test]
    fn test_all_violations_reported() {
        let pending = vec![descriptor("big.png", MAX_FILE_BYTES + 5)];
        let v = check_file(
            &file("big.png", MAX_FILE_BYTES + 5, "image/png"),
            &pending,
            MAX_FILE_BYTES,
        );
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn test_empty_file_rejected() {
        let v = check_file(&file("cv.pdf", 0, "application/pdf"), &[], MAX_FILE_BYTES);
        assert_eq!(v, vec![Violation::Empty]);
    }

    #[test]
    fn test_batch_accepts_pdf_and_rejects_oversized_docx() {
        let report = validate_files(
            vec![
                file("a.pdf", 5 * 1024 * 1024, "application/pdf"),
                file("b.docx", 11 * 1024 * 1024, DOCX),
            ],
            &[],
            MAX_FILE_BYTES,
        );
        assert!(!report.all_accepted());
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].name, "a.pdf");

        let rejected: Vec<_> = report.rejected().collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].name, "b.docx");
        assert!(rejected[0].messages[0].contains("size limit"));
    }

    #[test]
    fn test_batch_repeats_are_duplicates() {
        let report = validate_files(
            vec![
                file("a.pdf", 10, "application/pdf"),
                file("a.pdf", 10, "application/pdf"),
            ],
            &[],
            MAX_FILE_BYTES,
        );
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.verdicts[1].violations, vec![Violation::Duplicate]);
    }

    #[test]
    fn test_empty_batch() {
        let report = validate_files(vec![], &[], MAX_FILE_BYTES);
        assert!(report.all_accepted());
        assert!(report.accepted.is_empty());
    }
}
