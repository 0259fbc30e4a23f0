//! Source text with stable identities and a precomputed line-start table.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Dense index of a source within a [`SourceMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub u32);

/// A position in a source. Line and column are 1-based; `offset` is the
/// byte offset of the start and `length` the byte length of the spanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub source: SourceId,
    pub line: usize,
    pub column: usize,
    pub length: usize,
    pub offset: usize,
}

impl SourcePosition {
    pub fn new(source: SourceId, line: usize, column: usize, length: usize, offset: usize) -> Self {
        Self {
            source,
            line,
            column,
            length,
            offset,
        }
    }

    /// A zero-width position at the very start of a source.
    pub fn start_of(source: SourceId) -> Self {
        Self::new(source, 1, 1, 0, 0)
    }
}

/// Immutable source text plus its line-start table and content fingerprint.
#[derive(Debug, Clone)]
pub struct Source {
    id: SourceId,
    name: String,
    fingerprint: String,
    text: String,
    line_starts: Vec<usize>,
}

impl Source {
    fn new(id: SourceId, name: String, text: String) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let fingerprint = format!("sha256:{:x}", hasher.finalize());
        Self {
            id,
            name,
            fingerprint,
            text,
            line_starts,
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable content identity, `"sha256:<hex>"`.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// The text of a 1-based line, without its trailing newline.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .map(|s| s - 1)
            .unwrap_or(self.text.len());
        self.text.get(start..end)
    }

    /// Whether a position points into this source: the line exists and the
    /// column is at most one past the end of that line.
    pub fn contains(&self, pos: &SourcePosition) -> bool {
        if pos.source != self.id || pos.line == 0 || pos.column == 0 {
            return false;
        }
        match self.line_text(pos.line) {
            Some(text) => pos.column <= text.len() + 1,
            None => false,
        }
    }

    /// The spanned text, if the position is in bounds.
    pub fn slice(&self, pos: &SourcePosition) -> Option<&str> {
        self.text.get(pos.offset..pos.offset + pos.length)
    }
}

/// Append-only store of sources; ids are stable for the life of the map.
#[derive(Debug, Default)]
pub struct SourceMap {
    sources: Vec<Source>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, text: impl Into<String>) -> SourceId {
        let id = SourceId(self.sources.len() as u32);
        self.sources.push(Source::new(id, name.into(), text.into()));
        id
    }

    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_starts_and_text() {
        let mut map = SourceMap::new();
        let id = map.add("test.bg", "fn main\nregion R\n");
        let src = map.get(id).unwrap();
        assert_eq!(src.line_count(), 3);
        assert_eq!(src.line_text(1), Some("fn main"));
        assert_eq!(src.line_text(2), Some("region R"));
        assert_eq!(src.line_text(3), Some(""));
        assert_eq!(src.line_text(4), None);
    }

    #[test]
    fn fingerprint_is_stable() {
        let mut map = SourceMap::new();
        let a = map.add("a.bg", "region R { }");
        let b = map.add("b.bg", "region R { }");
        let (a, b) = (map.get(a).unwrap(), map.get(b).unwrap());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().starts_with("sha256:"));
    }

    #[test]
    fn position_bounds() {
        let mut map = SourceMap::new();
        let id = map.add("test.bg", "let v = 1;\n");
        let src = map.get(id).unwrap();
        assert!(src.contains(&SourcePosition::new(id, 1, 1, 3, 0)));
        // One past the end of the line is still addressable.
        assert!(src.contains(&SourcePosition::new(id, 1, 11, 0, 10)));
        assert!(!src.contains(&SourcePosition::new(id, 1, 12, 0, 10)));
        assert!(!src.contains(&SourcePosition::new(id, 3, 1, 0, 0)));
        assert!(!src.contains(&SourcePosition::new(id, 0, 1, 0, 0)));
    }
}
