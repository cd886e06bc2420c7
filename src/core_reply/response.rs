use std::collections::VecDeque;
use std::fmt;

/// One complete server reply: the reply code of its first line plus every
/// line read for it, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpResponse {
    code: u16,
    lines: VecDeque<String>,
}

impl FtpResponse {
    pub fn new<I, S>(code: u16, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// The first line of the reply, code included.
    pub fn message(&self) -> &str {
        self.lines.front().map(String::as_str).unwrap_or("")
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// All lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_any(&self, codes: &[u16]) -> bool {
        codes.contains(&self.code)
    }
}

impl fmt::Display for FtpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
