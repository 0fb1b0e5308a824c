use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use thiserror::Error;

use diagnostics::Session;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("include file \"{target}\" not found")]
    IncludeNotFound { target: String, line: u32 },
    #[error("include of \"{target}\" forms a cycle: {}", show_chain(.chain))]
    IncludeCycle {
        target: String,
        chain: Vec<PathBuf>,
        line: u32,
    },
    #[error("expected a quoted path after '{directive}'")]
    MalformedDirective { directive: String, line: u32 },
    #[error("unable to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
        /// `None` when the file that could not be read is the root file
        line: Option<u32>,
    },
}

impl PreprocessError {
    /// Line in the flattened buffer holding the offending directive
    pub fn line(&self) -> Option<u32> {
        match self {
            PreprocessError::IncludeNotFound { line, .. }
            | PreprocessError::IncludeCycle { line, .. }
            | PreprocessError::MalformedDirective { line, .. } => Some(*line),
            PreprocessError::Io { line, .. } => *line,
        }
    }
}

fn show_chain(chain: &[PathBuf]) -> String {
    chain.iter().map(|p| p.display()).join(" -> ")
}

/// Directories searched for include targets after the including file's own directory
#[derive(Debug, Default, Clone)]
pub struct IncludePaths {
    dirs: Vec<PathBuf>,
}

impl IncludePaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a search directory, ignoring duplicates and paths that are not directories
    pub fn add<P: Into<PathBuf>>(&mut self, dir: P) {
        let dir = dir.into();
        if dir.is_dir() && !self.dirs.contains(&dir) {
            self.dirs.push(dir);
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

/// MicroASM text pulled in with `#M_include`, copied to the output untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Wake source with every `#include` expanded in place
    pub text: String,
    /// `#M_include` bodies in the order they were first seen
    pub headers: Vec<Header>,
}

const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    Wake,
    Masm,
}

impl DirectiveKind {
    fn name(self) -> &'static str {
        match self {
            DirectiveKind::Wake => "#include",
            DirectiveKind::Masm => "#M_include",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            DirectiveKind::Wake => ".wake",
            DirectiveKind::Masm => ".masm",
        }
    }
}

/// Reads `path` and expands its includes
pub fn preprocess_file(
    path: &Path,
    search: &IncludePaths,
    session: &mut Session,
) -> Result<Preprocessed, PreprocessError> {
    let source = fs::read_to_string(path).map_err(|source| PreprocessError::Io {
        path: path.to_path_buf(),
        source,
        line: None,
    })?;

    preprocess_source(&source, path, search, session)
}

/// Expands includes in `source`, which is treated as the contents of `origin`
///
/// `origin` does not need to exist on disk; it names the file in diagnostics and
/// anchors relative include paths.
pub fn preprocess_source(
    source: &str,
    origin: &Path,
    search: &IncludePaths,
    session: &mut Session,
) -> Result<Preprocessed, PreprocessError> {
    let mut preprocessor = Preprocessor {
        search,
        session,
        stack: vec![],
        included: HashSet::new(),
        header_paths: HashSet::new(),
        headers: vec![],
        text: String::with_capacity(source.len()),
    };

    preprocessor.expand(source, origin)?;

    Ok(Preprocessed {
        text: preprocessor.text,
        headers: preprocessor.headers,
    })
}

struct Preprocessor<'a> {
    search: &'a IncludePaths,
    session: &'a mut Session,
    /// Canonical paths of the files currently being expanded, outermost first
    stack: Vec<PathBuf>,
    included: HashSet<PathBuf>,
    header_paths: HashSet<PathBuf>,
    headers: Vec<Header>,
    text: String,
}

impl Preprocessor<'_> {
    fn expand(&mut self, source: &str, path: &Path) -> Result<(), PreprocessError> {
        let key = canonical(path);
        let file = self.session.sources.add_file(path);
        let source = source.strip_prefix(BYTE_ORDER_MARK).unwrap_or(source);

        self.stack.push(key.clone());
        self.included.insert(key);

        for (index, line) in source.lines().enumerate() {
            self.session.sources.push_line(file, index as u32 + 1);
            let flat_line = self.session.sources.line_count() as u32;

            match parse_directive(line, flat_line)? {
                Some((kind, target)) => {
                    // the directive line itself stays behind as a blank line
                    self.text.push('\n');
                    self.include(kind, target, path, flat_line)?;
                }
                None => {
                    self.text.push_str(line);
                    self.text.push('\n');
                }
            }
        }

        self.stack.pop();
        Ok(())
    }

    fn include(
        &mut self,
        kind: DirectiveKind,
        target: &str,
        current: &Path,
        line: u32,
    ) -> Result<(), PreprocessError> {
        let resolved = self
            .resolve(target, current, kind)
            .ok_or_else(|| PreprocessError::IncludeNotFound {
                target: target.to_string(),
                line,
            })?;
        let key = canonical(&resolved);

        match kind {
            DirectiveKind::Wake => {
                if self.stack.contains(&key) {
                    let mut chain = self.stack.clone();
                    chain.push(key);
                    return Err(PreprocessError::IncludeCycle {
                        target: target.to_string(),
                        chain,
                        line,
                    });
                }

                if self.included.contains(&key) {
                    return Ok(());
                }

                let source = read(&resolved, line)?;
                self.expand(&source, &resolved)
            }
            DirectiveKind::Masm => {
                if !self.header_paths.insert(key) {
                    return Ok(());
                }

                let contents = read(&resolved, line)?;
                self.headers.push(Header {
                    path: resolved,
                    contents,
                });
                Ok(())
            }
        }
    }

    /// Tries the including file's directory, then every search directory,
    /// then both again with the directive's default extension appended
    fn resolve(&self, target: &str, current: &Path, kind: DirectiveKind) -> Option<PathBuf> {
        let mut candidates = vec![target.to_string()];
        if !target.to_lowercase().ends_with(kind.extension()) {
            candidates.push(format!("{target}{}", kind.extension()));
        }

        let bases: Vec<&Path> = current
            .parent()
            .into_iter()
            .chain(self.search.dirs().iter().map(PathBuf::as_path))
            .collect();

        candidates.iter().find_map(|candidate| {
            bases
                .iter()
                .map(|base| base.join(candidate))
                .find(|path| path.is_file())
        })
    }
}

fn read(path: &Path, line: u32) -> Result<String, PreprocessError> {
    fs::read_to_string(path).map_err(|source| PreprocessError::Io {
        path: path.to_path_buf(),
        source,
        line: Some(line),
    })
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Recognises `#include "x"` and `#M_include "x"`; any other line is left to the lexer
fn parse_directive(
    line: &str,
    flat_line: u32,
) -> Result<Option<(DirectiveKind, &str)>, PreprocessError> {
    let trimmed = line.trim_start();

    let (kind, rest) = if let Some(rest) = trimmed.strip_prefix(DirectiveKind::Masm.name()) {
        (DirectiveKind::Masm, rest)
    } else if let Some(rest) = trimmed.strip_prefix(DirectiveKind::Wake.name()) {
        (DirectiveKind::Wake, rest)
    } else {
        return Ok(None);
    };

    let malformed = || PreprocessError::MalformedDirective {
        directive: kind.name().to_string(),
        line: flat_line,
    };

    let rest = rest.trim_start().strip_prefix('"').ok_or_else(malformed)?;
    let (target, tail) = rest.split_once('"').ok_or_else(malformed)?;
    let tail = tail.trim();

    if target.is_empty() || !(tail.is_empty() || tail.starts_with("//")) {
        return Err(malformed());
    }

    Ok(Some((kind, target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fresh scratch directory unique to this test process
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wake-pp-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn no_directives_passes_through() {
        let mut session = Session::new();
        let src = "void main() {\n    hlt();\n}";

        let out = preprocess_source(src, Path::new("main.wake"), &IncludePaths::new(), &mut session)
            .unwrap();

        assert_eq!(out.text, "void main() {\n    hlt();\n}\n");
        assert!(out.headers.is_empty());
        assert_eq!(session.sources.line_count(), 3);
    }

    #[test]
    fn include_is_expanded_in_place() {
        let dir = scratch("expand");
        fs::write(dir.join("lib.wake"), "void helper() {\n    ret();\n}").unwrap();
        let main = dir.join("main.wake");
        let src = "#include \"lib.wake\"\nvoid main() {\n    call(helper);\n}";

        let mut session = Session::new();
        let out = preprocess_source(src, &main, &IncludePaths::new(), &mut session).unwrap();

        assert_eq!(
            out.text,
            "\nvoid helper() {\n    ret();\n}\nvoid main() {\n    call(helper);\n}\n"
        );

        // line 5 of the flattened buffer is line 2 of main.wake
        let location = session.sources.locate(5).unwrap();
        assert_eq!(location.file, main);
        assert_eq!(location.line, 2);

        let location = session.sources.locate(3).unwrap();
        assert_eq!(location.file, dir.join("lib.wake"));
        assert_eq!(location.line, 2);
    }

    #[test]
    fn wake_extension_is_optional() {
        let dir = scratch("extension");
        fs::write(dir.join("util.wake"), "void util() { ret(); }").unwrap();

        let mut session = Session::new();
        let main = dir.join("main.wake");
        let out = preprocess_source("#include \"util\"", &main, &IncludePaths::new(), &mut session)
            .unwrap();

        assert!(out.text.contains("void util()"));
    }

    #[test]
    fn search_paths_are_consulted() {
        let dir = scratch("search");
        let lib_dir = dir.join("include");
        fs::create_dir_all(&lib_dir).unwrap();
        fs::write(lib_dir.join("std.wake"), "void std_exit() { hlt(); }").unwrap();

        let mut search = IncludePaths::new();
        search.add(&lib_dir);

        let mut session = Session::new();
        let main = dir.join("main.wake");
        let out = preprocess_source("#include \"std.wake\"", &main, &search, &mut session).unwrap();

        assert!(out.text.contains("void std_exit()"));
    }

    #[test]
    fn masm_include_is_collected_verbatim() {
        let dir = scratch("masm");
        fs::write(dir.join("io.masm"), "lbl print\n    OUT 1 RAX\n    RET\n").unwrap();
        let src = "#M_include \"io.masm\"\n#M_include \"io.masm\"\nvoid main() { hlt(); }";

        let mut session = Session::new();
        let main = dir.join("main.wake");
        let out = preprocess_source(src, &main, &IncludePaths::new(), &mut session).unwrap();

        assert_eq!(out.headers.len(), 1);
        assert_eq!(out.headers[0].path, dir.join("io.masm"));
        assert_eq!(out.headers[0].contents, "lbl print\n    OUT 1 RAX\n    RET\n");
        assert!(!out.text.contains("lbl print"));
        assert_eq!(out.text, "\n\nvoid main() { hlt(); }\n");
    }

    #[test]
    fn missing_include() {
        let dir = scratch("missing");
        let mut session = Session::new();

        let main = dir.join("main.wake");
        let src = "\n#include \"nope.wake\"";
        let err = preprocess_source(src, &main, &IncludePaths::new(), &mut session).unwrap_err();

        assert!(matches!(err, PreprocessError::IncludeNotFound { line: 2, .. }));
    }

    #[test]
    fn include_cycle() {
        let dir = scratch("cycle");
        fs::write(dir.join("a.wake"), "#include \"b.wake\"").unwrap();
        fs::write(dir.join("b.wake"), "#include \"a.wake\"").unwrap();

        let mut session = Session::new();
        let err = preprocess_file(&dir.join("a.wake"), &IncludePaths::new(), &mut session)
            .unwrap_err();

        assert!(matches!(err, PreprocessError::IncludeCycle { .. }));
        assert!(err.to_string().contains("a.wake"));
    }

    #[test]
    fn diamond_include_expands_once() {
        let dir = scratch("diamond");
        fs::write(dir.join("common.wake"), "void common() { ret(); }").unwrap();
        fs::write(dir.join("left.wake"), "#include \"common.wake\"").unwrap();
        fs::write(dir.join("right.wake"), "#include \"common.wake\"").unwrap();
        let src = "#include \"left.wake\"\n#include \"right.wake\"";

        let mut session = Session::new();
        let main = dir.join("main.wake");
        let out = preprocess_source(src, &main, &IncludePaths::new(), &mut session).unwrap();

        assert_eq!(out.text.matches("void common()").count(), 1);
    }

    #[test]
    fn byte_order_mark_is_dropped() {
        let dir = scratch("bom");
        fs::write(dir.join("lib.wake"), "\u{feff}void helper() { ret(); }\n").unwrap();
        let main = dir.join("main.wake");
        fs::write(&main, "\u{feff}#include \"lib.wake\"\nvoid main() { hlt(); }\n").unwrap();

        let mut session = Session::new();
        let out = preprocess_file(&main, &IncludePaths::new(), &mut session).unwrap();

        assert_eq!(out.text, "\nvoid helper() { ret(); }\nvoid main() { hlt(); }\n");
    }

    #[test]
    fn unreadable_root_has_no_line() {
        let dir = scratch("no-root");
        let mut session = Session::new();

        let err = preprocess_file(&dir.join("absent.wake"), &IncludePaths::new(), &mut session)
            .unwrap_err();

        assert!(matches!(err, PreprocessError::Io { line: None, .. }));
        assert_eq!(err.line(), None);
    }

    #[test]
    fn malformed_directive() {
        let mut session = Session::new();
        let main = Path::new("main.wake");
        let err = preprocess_source("#include lib.wake", main, &IncludePaths::new(), &mut session)
            .unwrap_err();

        assert!(matches!(err, PreprocessError::MalformedDirective { line: 1, .. }));
    }

    #[test]
    fn trailing_comment_after_directive() {
        assert!(matches!(
            parse_directive("  #include \"x.wake\" // helpers", 1),
            Ok(Some((DirectiveKind::Wake, "x.wake")))
        ));
        assert!(matches!(parse_directive("mov(RAX, 1);", 1), Ok(None)));
    }
}
