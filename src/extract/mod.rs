//! Content extraction
//!
//! Unified text extraction for the formats the organizer tracks: PDF,
//! plain text, markdown, CSV and common source/config file types.
//! Extraction never brings the pipeline down: unreadable content is an
//! `ExtractError` the caller downgrades to a logged skip.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use crate::core::error::ExtractError;

/// Rich-format document types with a dedicated extraction path
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "txt", "text", "md", "markdown", "rst", "csv"];

/// Plain-text source, config and markup types read as raw text
const CODE_EXTENSIONS: &[&str] = &[
    // Programming languages
    "py", "js", "mjs", "jsx", "ts", "tsx", "java", "kt", "c", "h", "cpp", "cc", "hpp", "cs", "go",
    "rs", "rb", "php", "scala", "r", "lua", "pl", "dart", "zig", "nim", "ex", "exs", "clj", "hs",
    "erl", "ml", "jl", "swift", "vue", "svelte",
    // Web / markup
    "html", "htm", "css", "scss", "less", "xml", "svg",
    // Data / config
    "json", "yaml", "yml", "toml", "ini", "cfg", "env", "properties",
    // Shell / script
    "sh", "bash", "zsh", "fish", "ps1", "bat",
    // Docs / other text
    "sql", "graphql", "proto", "tex", "bib", "log", "org", "adoc", "diff", "patch",
];

/// Extensionless names treated as plain text
const PLAIN_TEXT_NAMES: &[&str] = &[
    "makefile",
    "dockerfile",
    "vagrantfile",
    "gemfile",
    "rakefile",
    "procfile",
    "justfile",
    ".gitignore",
    ".gitattributes",
    ".dockerignore",
    ".editorconfig",
];

fn supported_extensions() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        DOCUMENT_EXTENSIONS
            .iter()
            .chain(CODE_EXTENSIONS.iter())
            .copied()
            .collect()
    })
}

/// Result of extracting one file
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub text: String,
    pub word_count: u64,
    pub file_type: String,
    pub content_hash: String,
    pub size_bytes: u64,
}

/// Whether the organizer tracks this path at all
pub fn is_supported(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name.starts_with('.') {
        // Known dotfile names are still tracked
        return PLAIN_TEXT_NAMES.contains(&name.as_str());
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    supported_extensions().contains(ext.as_str()) || PLAIN_TEXT_NAMES.contains(&name.as_str())
}

/// BLAKE3 content hash of a file
pub fn compute_hash(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| read_error(path, e))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Extract text content from a file.
///
/// Returns `UnsupportedFormat` for untracked types and `FileNotFound`
/// when the file disappeared between discovery and processing.
pub fn extract(path: &Path) -> Result<ExtractionResult, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    if !is_supported(path) {
        return Err(ExtractError::UnsupportedFormat {
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string(),
        });
    }

    let metadata = std::fs::metadata(path).map_err(|e| read_error(path, e))?;
    let size_bytes = metadata.len();

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let text = match ext.as_str() {
        "pdf" => extract_pdf(path)?,
        "md" | "markdown" => extract_markdown(path)?,
        "csv" => extract_csv(path)?,
        _ => extract_text(path)?,
    };

    let bytes = std::fs::read(path).map_err(|e| read_error(path, e))?;
    let content_hash = blake3::hash(&bytes).to_hex().to_string();
    let word_count = text.split_whitespace().count() as u64;

    Ok(ExtractionResult {
        text,
        word_count,
        file_type: ext,
        content_hash,
        size_bytes,
    })
}

fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    pdf_extract::extract_text(path).map_err(|e| ExtractError::ParseFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let raw = std::fs::read(path).map_err(|e| read_error(path, e))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Strip the most common markdown syntax so embeddings see prose, not markup
fn extract_markdown(path: &Path) -> Result<String, ExtractError> {
    let raw = extract_text(path)?;
    let stripped: String = raw
        .lines()
        .map(|line| line.trim_start_matches(['#', '>', ' ']).trim_start_matches("- "))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(stripped.replace(['*', '`'], ""))
}

/// Summarize a CSV as its header plus a sample of rows
fn extract_csv(path: &Path) -> Result<String, ExtractError> {
    let raw = extract_text(path)?;
    let mut lines = raw.lines();
    let header = lines.next().unwrap_or("").to_string();
    let sample: Vec<&str> = lines.take(50).collect();

    let mut out = String::new();
    out.push_str(&format!("Columns: {}\n", header.replace(',', ", ")));
    out.push_str(&format!("Rows sampled: {}\n", sample.len()));
    out.push_str(&sample.join("\n"));
    Ok(out)
}

fn read_error(path: &Path, e: std::io::Error) -> ExtractError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ExtractError::FileNotFound {
            path: path.display().to_string(),
        }
    } else {
        ExtractError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("/a/notes.md")));
        assert!(is_supported(Path::new("/a/report.PDF")));
        assert!(is_supported(Path::new("/a/main.rs")));
        assert!(is_supported(Path::new("/a/Makefile")));
        assert!(is_supported(Path::new("/a/.gitignore")));

        assert!(!is_supported(Path::new("/a/photo.jpg")));
        assert!(!is_supported(Path::new("/a/.hidden_state")));
        assert!(!is_supported(Path::new("/a/archive.zip")));
    }

    #[test]
    fn test_extract_plain_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.txt");
        fs::write(&path, "hello semantic world").unwrap();

        let result = extract(&path).unwrap();
        assert_eq!(result.text, "hello semantic world");
        assert_eq!(result.word_count, 3);
        assert_eq!(result.file_type, "txt");
        assert_eq!(result.size_bytes, 20);
        assert_eq!(result.content_hash.len(), 64);
    }

    #[test]
    fn test_extract_markdown_strips_syntax() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.md");
        fs::write(&path, "# Title\n\n- item one\n*emphasis* and `code`").unwrap();

        let result = extract(&path).unwrap();
        assert!(!result.text.contains('#'));
        assert!(!result.text.contains('*'));
        assert!(result.text.contains("Title"));
        assert!(result.text.contains("item one"));
    }

    #[test]
    fn test_extract_csv_reports_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "name,age\nalice,30\nbob,25").unwrap();

        let result = extract(&path).unwrap();
        assert!(result.text.contains("Columns: name, age"));
        assert!(result.text.contains("alice,30"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = extract(Path::new("/nonexistent/file.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        fs::write(&path, [0u8, 1, 2]).unwrap();

        let err = extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_same_content_same_hash() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "identical").unwrap();
        fs::write(&b, "identical").unwrap();

        assert_eq!(compute_hash(&a).unwrap(), compute_hash(&b).unwrap());
    }
}
