use crate::common::error::UerError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// # Ordered vocabulary
/// Token ids are line numbers of the vocabulary file. Tokens are unique.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, usize>,
}

impl Vocabulary {
    /// Builds a vocabulary from ordered tokens, rejecting duplicates.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Vocabulary, UerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocabulary = Vocabulary::default();
        for token in tokens {
            vocabulary.push(token.into()).map_err(|(token, first)| {
                UerError::VocabLoadError(format!(
                    "duplicate token `{}` at position {} (first seen at {})",
                    token,
                    vocabulary.len(),
                    first
                ))
            })?;
        }
        Ok(vocabulary)
    }

    /// Reads a newline-delimited vocabulary file.
    ///
    /// The token of a line is its first whitespace-separated field; a line made of whitespace only
    /// is kept verbatim (e.g. a space token). `\r\n` line endings are accepted.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_uer::convert::Vocabulary;
    ///
    /// # fn main() -> Result<(), rust_uer::UerError> {
    /// let vocab = Vocabulary::from_file("path/to/google_zh_vocab.txt")?;
    /// println!("{} tokens", vocab.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Vocabulary, UerError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            UerError::VocabLoadError(format!("could not read {}: {}", path.display(), e))
        })?;
        let vocabulary = Vocabulary::parse(&content).map_err(|message| {
            UerError::VocabLoadError(format!("{}: {}", path.display(), message))
        })?;
        tracing::debug!(path = %path.display(), tokens = vocabulary.len(), "loaded vocabulary");
        Ok(vocabulary)
    }

    fn parse(content: &str) -> Result<Vocabulary, String> {
        let mut vocabulary = Vocabulary::default();
        for (line_number, line) in content.lines().enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let token = line.split_whitespace().next().unwrap_or(line);
            vocabulary.push(token.to_string()).map_err(|(token, first)| {
                format!(
                    "duplicate token `{}` on line {} (first seen on line {})",
                    token,
                    line_number + 1,
                    first + 1
                )
            })?;
        }
        if vocabulary.is_empty() {
            return Err("vocabulary file is empty".to_string());
        }
        Ok(vocabulary)
    }

    /// Appends a token, returning the token and its existing id if already present.
    fn push(&mut self, token: String) -> Result<usize, (String, usize)> {
        if let Some(&existing) = self.ids.get(&token) {
            return Err((token, existing));
        }
        let id = self.tokens.len();
        self.ids.insert(token.clone(), id);
        self.tokens.push(token);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn id(&self, token: &str) -> Option<usize> {
        self.ids.get(token).copied()
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_number_is_token_id() -> Result<(), String> {
        let vocab = Vocabulary::parse("[PAD]\n[UNK]\r\n的 12345\n \n中\n")?;
        assert_eq!(vocab.len(), 5);
        assert_eq!(vocab.id("[UNK]"), Some(1));
        assert_eq!(vocab.id("的"), Some(2));
        assert_eq!(vocab.id(" "), Some(3));
        assert_eq!(vocab.token(4), Some("中"));
        assert!(!vocab.contains("12345"));
        Ok(())
    }

    #[test]
    fn duplicates_and_empty_files_are_rejected() {
        let error = Vocabulary::parse("a\nb\na\n").unwrap_err();
        assert!(error.contains("line 3"));
        assert!(error.contains("line 1"));
        assert!(Vocabulary::parse("").is_err());
        assert!(matches!(
            Vocabulary::from_tokens(["x", "y", "x"]),
            Err(UerError::VocabLoadError(_))
        ));
    }

    #[test]
    fn missing_file_is_a_vocab_error() {
        assert!(matches!(
            Vocabulary::from_file("/nonexistent/vocab.txt"),
            Err(UerError::VocabLoadError(_))
        ));
    }
}
