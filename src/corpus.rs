//! Prompt corpus loading.
//!
//! One prompt per non-blank line. Lines that look like a JSON array are
//! parsed as chat turns; anything else is a plain-text prompt.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::HarnessError;

/// One role/content turn of a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// An ordered unit of input, identified by its 0-based position in the
/// corpus. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Text(String),
    Chat(Vec<ChatTurn>),
}

/// Load the corpus, filtering blank lines.
///
/// When `cap > 0` and smaller than the corpus size, truncates to the first
/// `cap` entries so repeated runs see the same prompt set.
pub fn load_corpus(path: &Path, cap: usize) -> Result<Vec<Prompt>, HarnessError> {
    let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => HarnessError::CorpusNotFound(path.to_path_buf()),
        _ => HarnessError::Internal(anyhow::Error::new(e).context("reading corpus")),
    })?;

    let mut prompts: Vec<Prompt> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect();

    if prompts.is_empty() {
        return Err(HarnessError::EmptyCorpus(path.to_path_buf()));
    }

    if cap > 0 && cap < prompts.len() {
        prompts.truncate(cap);
    }

    tracing::info!(count = prompts.len(), path = %path.display(), "Loaded prompt corpus");
    Ok(prompts)
}

/// A line that parses as a JSON array of chat turns becomes a chat prompt;
/// a malformed JSON-looking line is kept as plain text rather than rejected.
fn parse_line(line: &str) -> Prompt {
    if line.starts_with('[') {
        if let Ok(turns) = serde_json::from_str::<Vec<ChatTurn>>(line) {
            if !turns.is_empty() {
                return Prompt::Chat(turns);
            }
        }
    }
    Prompt::Text(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_corpus(content: &str) -> tempdir::TempCorpus {
        tempdir::TempCorpus::new(content)
    }

    // Minimal temp-file helper; std only, cleaned up on drop.
    mod tempdir {
        use std::path::PathBuf;

        pub struct TempCorpus {
            pub path: PathBuf,
        }

        impl TempCorpus {
            pub fn new(content: &str) -> Self {
                let path = std::env::temp_dir().join(format!(
                    "inferload-corpus-{}-{}.txt",
                    std::process::id(),
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap()
                        .as_nanos()
                ));
                std::fs::write(&path, content).unwrap();
                Self { path }
            }
        }

        impl Drop for TempCorpus {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn test_load_filters_blank_lines() {
        let corpus = write_corpus("first\n\n  \nsecond\n");
        let prompts = load_corpus(&corpus.path, 0).unwrap();
        assert_eq!(
            prompts,
            vec![
                Prompt::Text("first".to_string()),
                Prompt::Text("second".to_string())
            ]
        );
    }

    #[test]
    fn test_cap_truncates_deterministically() {
        let corpus = write_corpus("a\nb\nc\nd\n");
        let prompts = load_corpus(&corpus.path, 2).unwrap();
        assert_eq!(
            prompts,
            vec![Prompt::Text("a".to_string()), Prompt::Text("b".to_string())]
        );

        // Cap larger than the corpus keeps everything.
        let prompts = load_corpus(&corpus.path, 100).unwrap();
        assert_eq!(prompts.len(), 4);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_corpus(Path::new("/nonexistent/prompts.txt"), 0).unwrap_err();
        assert!(matches!(err, HarnessError::CorpusNotFound(_)));
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        let corpus = write_corpus("\n   \n\n");
        let err = load_corpus(&corpus.path, 0).unwrap_err();
        assert!(matches!(err, HarnessError::EmptyCorpus(_)));
    }

    #[test]
    fn test_chat_line_parses_as_turns() {
        let corpus = write_corpus(
            r#"[{"role":"user","content":"hello"},{"role":"assistant","content":"hi"}]
plain question
"#,
        );
        let prompts = load_corpus(&corpus.path, 0).unwrap();
        assert_eq!(prompts.len(), 2);
        match &prompts[0] {
            Prompt::Chat(turns) => {
                assert_eq!(turns.len(), 2);
                assert_eq!(turns[0].role, "user");
                assert_eq!(turns[0].content, "hello");
            }
            other => panic!("expected chat prompt, got {:?}", other),
        }
        assert_eq!(prompts[1], Prompt::Text("plain question".to_string()));
    }

    #[test]
    fn test_malformed_json_line_falls_back_to_text() {
        let corpus = write_corpus("[not actually json\n");
        let prompts = load_corpus(&corpus.path, 0).unwrap();
        assert_eq!(prompts[0], Prompt::Text("[not actually json".to_string()));
    }

    #[test]
    fn test_load_is_idempotent() {
        let corpus = write_corpus("x\ny\n");
        let first = load_corpus(&corpus.path, 0).unwrap();
        let second = load_corpus(&corpus.path, 0).unwrap();
        assert_eq!(first, second);
    }
}
