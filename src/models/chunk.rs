/// A line-aligned slice of the input file.
///
/// Lines are stored without their terminator. `first_line` is the 1-based
/// line number of `lines[0]` in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: u64,
    pub first_line: u64,
    pub lines: Vec<String>,
}

impl Chunk {
    pub fn new(index: u64, first_line: u64, lines: Vec<String>) -> Self {
        Self {
            index,
            first_line,
            lines,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines paired with their 1-based file line numbers.
    pub fn numbered_lines(&self) -> impl Iterator<Item = (u64, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(move |(offset, line)| (self.first_line + offset as u64, line.as_str()))
    }
}

/// Unit of work on the chunk queue.
#[derive(Debug)]
pub enum WorkItem {
    Chunk(Chunk),
    /// Termination marker; exactly one is enqueued per worker.
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_lines_offsets_from_first_line() {
        let chunk = Chunk::new(3, 41, vec!["a;1.0".to_string(), "b;2.0".to_string()]);
        let numbered: Vec<_> = chunk.numbered_lines().collect();

        assert_eq!(numbered, vec![(41, "a;1.0"), (42, "b;2.0")]);
        assert_eq!(chunk.len(), 2);
        assert!(!chunk.is_empty());
    }
}
