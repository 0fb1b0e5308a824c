use crate::{Diagnostic, Diagnostics, Location, Severity, SourceMap};

/// State owned by a single compilation and threaded through every stage
///
/// The preprocessor fills in `sources`; any stage may append to `diagnostics`.
/// Nothing here is shared between compilations.
#[derive(Debug, Default)]
pub struct Session {
    pub sources: SourceMap,
    pub diagnostics: Diagnostics,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locate(&self, line: Option<u32>) -> Option<Location> {
        line.and_then(|line| self.sources.locate(line))
    }

    pub fn warn<S: Into<String>>(&mut self, line: Option<u32>, message: S) {
        self.report(Severity::Warning, line, message.into());
    }

    pub fn error<S: Into<String>>(&mut self, line: Option<u32>, message: S) {
        self.report(Severity::Error, line, message.into());
    }

    fn report(&mut self, severity: Severity, line: Option<u32>, message: String) {
        let location = self.locate(line);

        self.diagnostics.push(Diagnostic {
            severity,
            location,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_resolve_through_source_map() {
        let mut session = Session::new();
        let file = session.sources.add_file("prog.wake");
        session.sources.push_line(file, 1);
        session.sources.push_line(file, 2);

        session.warn(Some(2), "something odd");

        let rendered = session.diagnostics.render();
        assert_eq!(rendered, "warning: prog.wake:2: something odd");
        assert!(!session.diagnostics.has_errors());
    }
}
