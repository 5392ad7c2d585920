//! Captured tool output.

use chrono::{DateTime, Utc};

/// Output line from a tool invocation.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub content: String,
    pub line_number: u32,
    pub timestamp: DateTime<Utc>,
}

/// Output stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// All output of one invocation, interleaved in arrival order.
#[derive(Debug, Clone, Default)]
pub struct CapturedLog {
    lines: Vec<OutputLine>,
}

impl CapturedLog {
    pub fn push(&mut self, line: OutputLine) {
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    pub fn text(&self) -> String {
        Self::join(&self.lines)
    }

    /// The last `n` lines.
    pub fn tail(&self, n: usize) -> String {
        let start = self.lines.len().saturating_sub(n);
        Self::join(&self.lines[start..])
    }

    fn join(lines: &[OutputLine]) -> String {
        lines
            .iter()
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u32) -> OutputLine {
        OutputLine {
            stream: OutputStream::Stdout,
            content: format!("line {n}"),
            line_number: n,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_tail() {
        let mut log = CapturedLog::default();
        for n in 1..=5 {
            log.push(line(n));
        }
        assert_eq!(log.tail(2), "line 4\nline 5");
        assert_eq!(log.tail(50), log.text());
        assert_eq!(log.tail(0), "");
    }
}
