use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Original position of a single line of the flattened source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Origin {
    file: usize,
    line: u32,
}

/// Maps lines of the preprocessed buffer back to the file they were read from
///
/// Lines are 1-based, matching the line numbers the lexer attaches to tokens.
#[derive(Debug, Default, Clone)]
pub struct SourceMap {
    files: Vec<PathBuf>,
    lines: Vec<Origin>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source file, returning the id used by `push_line`
    pub fn add_file<P: Into<PathBuf>>(&mut self, path: P) -> usize {
        self.files.push(path.into());
        self.files.len() - 1
    }

    /// Records that the next flattened line is `line` of file `file`
    pub fn push_line(&mut self, file: usize, line: u32) {
        self.lines.push(Origin { file, line });
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn locate(&self, line: u32) -> Option<Location> {
        let index = (line as usize).checked_sub(1)?;

        // a token on the line after a trailing newline has no entry of its own
        let origin = match self.lines.get(index) {
            Some(origin) => *origin,
            None => {
                let last = self.lines.last()?;
                Origin {
                    file: last.file,
                    line: last.line + 1,
                }
            }
        };

        Some(Location {
            file: self.files[origin.file].clone(),
            line: origin.line,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
}

impl Location {
    pub fn new<P: Into<PathBuf>>(file: P, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}
