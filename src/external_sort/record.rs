use std::cmp::Ordering;

/// One line of the input document together with its 0-based line index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    content: String,
    position: u64,
}

impl Record {
    pub fn new(content: impl Into<String>, position: u64) -> Self {
        Self {
            content: content.into(),
            position,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

/// The two total orders a pipeline pass can sort by. A pass never mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ordinal (byte-wise) order on the line text. Equal lines are not ordered by position.
    Content,
    /// Numeric order on the original line index.
    Position,
}

impl SortOrder {
    pub fn compare(self, a: &Record, b: &Record) -> Ordering {
        match self {
            SortOrder::Content => a.content.as_bytes().cmp(b.content.as_bytes()),
            SortOrder::Position => a.position.cmp(&b.position),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SortOrder::Content => "content",
            SortOrder::Position => "position",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
