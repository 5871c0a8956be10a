use chrono::{DateTime, Local};
use std::{io, path::Path, path::PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use super::PageRecord;

/// Rule written under each record's URL line
const HEADER_RULE: &str = "==================================================";

/// Rule closing each record
const FOOTER_RULE: &str = "--------------------------------------------------";

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory corpus files are written to
    pub base_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("data/scraped_data"),
        }
    }
}

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed corpus record {index}: {reason}")]
    Malformed { index: usize, reason: String },
}

type Result<T> = std::result::Result<T, StorageError>;

/// Corpus writer and reader for crawl runs
#[derive(Debug, Clone)]
pub struct Storage {
    config: StorageConfig,
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage {
    /// Create a new storage with default configuration
    pub fn new() -> Self {
        Self {
            config: StorageConfig::default(),
        }
    }

    /// Create a new storage with custom configuration
    pub fn with_config(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Directory corpus files land in
    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// File name of a corpus written at `at`
    pub fn corpus_filename(at: DateTime<Local>) -> String {
        format!("dataset_{}.txt", at.format("%Y%m%d_%H%M%S"))
    }

    /// Creates necessary directories for storage
    async fn ensure_directories(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Persists records as a timestamped corpus file
    ///
    /// Returns the full path of the written file.
    pub async fn persist(&self, records: &[PageRecord]) -> Result<PathBuf> {
        self.persist_as(&Self::corpus_filename(Local::now()), records)
            .await
    }

    /// Persists records under an explicit file name
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn persist_as(&self, filename: &str, records: &[PageRecord]) -> Result<PathBuf> {
        let path = self.config.base_path.join(filename);
        self.ensure_directories(&path).await?;
        fs::write(&path, render_corpus(records)).await?;
        info!(path = %path.display(), "Corpus saved");
        Ok(path)
    }

    /// Loads the records of a corpus file
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<Vec<PageRecord>> {
        let text = fs::read_to_string(path).await?;
        parse_corpus(&text)
    }
}

/// Renders records in the fixed corpus block format, in the given order
pub fn render_corpus(records: &[PageRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "URL: {}\n{}\n{}\n\n{}\n\n",
            record.url, HEADER_RULE, record.content, FOOTER_RULE
        ));
    }
    out
}

/// Parses text produced by [`render_corpus`] back into records
pub fn parse_corpus(text: &str) -> Result<Vec<PageRecord>> {
    let terminator = format!("\n\n{}\n\n", FOOTER_RULE);
    let mut records = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let index = records.len();
        let malformed = |reason: &str| StorageError::Malformed {
            index,
            reason: reason.to_string(),
        };

        let (block, tail) = rest
            .split_once(terminator.as_str())
            .ok_or_else(|| malformed("missing closing rule"))?;
        let block = block
            .strip_prefix("URL: ")
            .ok_or_else(|| malformed("missing URL line"))?;
        let (url, body) = block
            .split_once('\n')
            .ok_or_else(|| malformed("missing header rule"))?;
        let content = body
            .strip_prefix(HEADER_RULE)
            .and_then(|body| body.strip_prefix('\n'))
            .ok_or_else(|| malformed("missing header rule"))?;

        records.push(PageRecord {
            url: url.to_string(),
            content: content.to_string(),
        });
        rest = tail;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn records() -> Vec<PageRecord> {
        vec![
            PageRecord {
                url: "https://example.com/a".to_string(),
                content: "First page content line\nSecond line of content".to_string(),
            },
            PageRecord {
                url: "https://example.com/b".to_string(),
                content: "Another page with enough content".to_string(),
            },
        ]
    }

    #[test]
    fn test_render_is_bit_exact() {
        let rendered = render_corpus(&records()[..1]);
        assert_eq!(
            rendered,
            "URL: https://example.com/a\n\
             ==================================================\n\
             First page content line\nSecond line of content\n\
             \n\
             --------------------------------------------------\n\
             \n"
        );
    }

    #[test]
    fn test_corpus_filename() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(Storage::corpus_filename(at), "dataset_20240309_140507.txt");
    }

    #[test]
    fn test_parse_rejects_truncated_file() {
        let mut text = render_corpus(&records());
        text.truncate(text.len() - 10);
        match parse_corpus(&text) {
            Err(StorageError::Malformed { index, .. }) => assert_eq!(index, 1),
            other => panic!("Expected Malformed error, got {:?}", other),
        }
    }

    #[test]
    fn test_storage_with_custom_config() {
        let config = StorageConfig {
            base_path: PathBuf::from("/custom/path"),
        };
        let storage = Storage::with_config(config);

        assert_eq!(storage.base_path(), Path::new("/custom/path"));
        assert_eq!(Storage::new().base_path(), Path::new("data/scraped_data"));
    }

    #[tokio::test]
    async fn test_persist_creates_directory_and_loads_back() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::with_config(StorageConfig {
            base_path: dir.path().join("nested").join("scraped"),
        });

        let path = storage.persist(&records()).await.unwrap();
        assert!(path.starts_with(dir.path().join("nested").join("scraped")));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("dataset_") && name.ends_with(".txt"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("URL: ").count(), 2);

        let loaded = storage.load(&path).await.unwrap();
        assert_eq!(loaded, records());
    }

    #[tokio::test]
    async fn test_persist_propagates_io_failure() {
        let dir = TempDir::new().unwrap();
        // A file where the directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let storage = Storage::with_config(StorageConfig {
            base_path: blocker.join("scraped"),
        });
        let result = storage.persist(&records()).await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
