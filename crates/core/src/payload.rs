//! The batch file uploaded at submission time.
//!
//! One item per line; blank lines are ignored, matching how the scanning
//! service parses the upload.

use crate::error::CoreError;

/// File name used when a payload is built without one.
pub const DEFAULT_FILE_NAME: &str = "items.txt";

/// A validated batch file ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    file_name: String,
    bytes: Vec<u8>,
    item_count: usize,
}

impl Payload {
    /// Build a payload from raw file contents.
    ///
    /// Fails with [`CoreError::EmptyPayload`] when the contents hold no
    /// non-blank line, so nothing is sent for a file the service would
    /// reject anyway.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, CoreError> {
        let mut file_name = file_name.into();
        if file_name.trim().is_empty() {
            file_name = DEFAULT_FILE_NAME.to_string();
        }

        let item_count = count_items(&bytes);
        if item_count == 0 {
            return Err(CoreError::EmptyPayload { file_name });
        }

        Ok(Self {
            file_name,
            bytes,
            item_count,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of non-blank lines.
    pub fn item_count(&self) -> usize {
        self.item_count
    }
}

fn count_items(bytes: &[u8]) -> usize {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn counts_non_blank_lines() {
        let payload =
            Payload::from_bytes("domains.txt", b"a.com\n\n  b.org  \r\n\t\nc.net".to_vec()).unwrap();
        assert_eq!(payload.item_count(), 3);
        assert_eq!(payload.file_name(), "domains.txt");
    }

    #[test]
    fn blank_file_is_rejected() {
        assert_matches!(
            Payload::from_bytes("empty.txt", b"\n  \n\t".to_vec()),
            Err(CoreError::EmptyPayload { file_name }) if file_name == "empty.txt"
        );
        assert_matches!(
            Payload::from_bytes("none.txt", Vec::new()),
            Err(CoreError::EmptyPayload { .. })
        );
    }

    #[test]
    fn missing_file_name_gets_default() {
        let payload = Payload::from_bytes("", b"a.com".to_vec()).unwrap();
        assert_eq!(payload.file_name(), DEFAULT_FILE_NAME);
    }
}
