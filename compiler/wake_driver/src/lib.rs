use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Args, Parser as ClapParser};
use thiserror::Error;

use codegen::{gen_masm, CodegenError};
use diagnostics::{Location, Session};
use emission::{output, render};
use lexer::{lex, LexError};
use parser::{ParseError, Parser};
use preprocessor::{preprocess_file, preprocess_source, IncludePaths, PreprocessError, Preprocessed};

pub use diagnostics;

/// Extension given to the output file when `-o` is not passed
pub const OUTPUT_EXTENSION: &str = "masm";

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = "Compiles Wake source into MicroASM")]
struct CLI {
    /// Path to Wake source file
    path: PathBuf,

    /// Output file, defaults to the input path with a ".masm" extension
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Extra directory to search for included files, may be repeated
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Report progress of each stage on stderr
    #[arg(short, long)]
    verbose: bool,

    /// "Specifies a point in compilation process to stop, only one(1) option can be specified at a time"
    #[command(flatten)]
    stage_options: StageOptions,
}

/// Run Wake compiler with optional arguments
#[derive(Args, Debug)]
#[group(required = false, multiple = false)]
struct StageOptions {
    /// Stop after lexer
    #[arg(long)]
    lex: bool,

    /// Stop after parser
    #[arg(long)]
    parse: bool,

    /// Stop after MicroASM generation, without writing output
    #[arg(long)]
    codegen: bool,
}

/// Which stage the compiler should stop at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStage {
    Lexer,
    Parser,
    CodeGen,
}

impl StopStage {
    fn from_args(options: &StageOptions) -> Option<StopStage> {
        if options.lex {
            Some(StopStage::Lexer)
        } else if options.parse {
            Some(StopStage::Parser)
        } else if options.codegen {
            Some(StopStage::CodeGen)
        } else {
            None
        }
    }
}

/// Settings for one compilation
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Searched, in order, after the including file's own directory
    pub include_dirs: Vec<PathBuf>,
    pub verbose: bool,
}

impl CompileOptions {
    fn include_paths(&self) -> IncludePaths {
        let mut paths = IncludePaths::new();
        for dir in &self.include_dirs {
            paths.add(dir);
        }
        paths
    }
}

#[derive(Error, Debug)]
pub enum CompileErr {
    #[error("{}{error}", at(.location))]
    Preprocessor {
        location: Option<Location>,
        error: PreprocessError,
    },
    #[error("{}{error}", at(.location))]
    Lexer {
        location: Option<Location>,
        error: LexError,
    },
    #[error("{}{error}", at(.location))]
    Parser {
        location: Option<Location>,
        error: ParseError,
    },
    #[error("{}{error}", at(.location))]
    CodeGen {
        location: Option<Location>,
        error: CodegenError,
    },
    #[error("{}: {error}", .path.display())]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
}

impl CompileErr {
    pub fn location(&self) -> Option<&Location> {
        match self {
            CompileErr::Preprocessor { location, .. }
            | CompileErr::Lexer { location, .. }
            | CompileErr::Parser { location, .. }
            | CompileErr::CodeGen { location, .. } => location.as_ref(),
            CompileErr::Io { .. } => None,
        }
    }
}

fn at(location: &Option<Location>) -> String {
    match location {
        Some(location) => format!("{location}: "),
        None => String::new(),
    }
}

pub fn main() -> Result<()> {
    let args = CLI::parse();

    let stop_stage = StopStage::from_args(&args.stage_options);

    let mut options = CompileOptions {
        include_dirs: args.include,
        verbose: args.verbose,
    };
    options.include_dirs.extend(default_include_dirs());

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.path));

    let mut session = Session::new();
    let result = run_driver(&args.path, &output, stop_stage, &options, &mut session);

    if !session.diagnostics.is_empty() {
        eprintln!("{}", session.diagnostics.render());
    }

    match result {
        // already rendered above
        Err(_) if session.diagnostics.has_errors() => {
            Err(anyhow!("could not compile {}", args.path.display()))
        }
        result => Ok(result?),
    }
}

/// Directory of the executable, its `include` subdirectory, then the working directory
fn default_include_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));

    if let Some(exe_dir) = exe_dir {
        dirs.push(exe_dir.join("include"));
        dirs.insert(0, exe_dir);
    }

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }

    dirs
}

/// `input` with its extension replaced by `.masm`
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension(OUTPUT_EXTENSION)
}

/// Compiles `input` and writes MicroASM to `output`
///
/// Nothing is written unless every stage succeeds.
pub fn compile_file(
    input: &Path,
    output: &Path,
    options: &CompileOptions,
    session: &mut Session,
) -> Result<(), CompileErr> {
    run_driver(input, output, None, options, session)
}

/// Compiles in-memory source named `origin` and returns the MicroASM text
pub fn compile_source(
    source: &str,
    origin: &Path,
    options: &CompileOptions,
    session: &mut Session,
) -> Result<String, CompileErr> {
    let preprocessed = preprocess_source(source, origin, &options.include_paths(), session)
        .map_err(|error| preprocess_failure(session, error))?;

    let program = compile(preprocessed, None, options, session)?.unwrap_or_default();

    render(&program).map_err(|error| io_failure(session, origin, error))
}

fn run_driver(
    input: &Path,
    output_path: &Path,
    stop_stage: Option<StopStage>,
    options: &CompileOptions,
    session: &mut Session,
) -> Result<(), CompileErr> {
    let preprocessed = preprocess_file(input, &options.include_paths(), session)
        .map_err(|error| preprocess_failure(session, error))?;

    let program = match compile(preprocessed, stop_stage, options, session)? {
        Some(program) if stop_stage.is_none() => program,
        _ => return Ok(()),
    };

    if let Some(dir) = output_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(|error| io_failure(session, dir, error))?;
        }
    }

    output(output_path, &program).map_err(|error| io_failure(session, output_path, error))?;

    if options.verbose {
        eprintln!("wrote {}", output_path.display());
    }

    Ok(())
}

/// Actually run our compiler stages: Lexer, Parser, Codegen
/// Returns `None` when a StopStage ends compilation before code generation
fn compile(
    preprocessed: Preprocessed,
    stop_stage: Option<StopStage>,
    options: &CompileOptions,
    session: &mut Session,
) -> Result<Option<masm::Program>, CompileErr> {
    if options.verbose {
        eprintln!("preprocessed {} file(s)", session.sources.files().len());
        for header in &preprocessed.headers {
            eprintln!("header: {}", header.path.display());
        }
    }

    let tokens = lex(&preprocessed.text).map_err(|error| {
        let location = report(session, Some(error.line()), &error);
        CompileErr::Lexer { location, error }
    })?;

    if options.verbose {
        eprintln!("lexed {} token(s)", tokens.len());
    }

    if let Some(StopStage::Lexer) = stop_stage {
        return Ok(None);
    }

    let ast = Parser::new(tokens).parse().map_err(|error| {
        let location = report(session, Some(error.line()), &error);
        CompileErr::Parser { location, error }
    })?;

    if options.verbose {
        for func in &ast.funcs {
            eprintln!("found function: {}", func.ident);
        }
    }

    if let Some(StopStage::Parser) = stop_stage {
        return Ok(None);
    }

    let headers = preprocessed.headers.into_iter().map(|h| h.contents).collect();

    let program = gen_masm(&ast, headers, session).map_err(|error| {
        let location = report(session, Some(error.line()), &error);
        CompileErr::CodeGen { location, error }
    })?;

    if options.verbose {
        eprintln!(
            "generated {} block(s), {} instruction(s)",
            program.blocks.len(),
            program.instruction_count()
        );
    }

    Ok(Some(program))
}

/// An unreadable root file is reported as plain I/O, not as an include failure
fn preprocess_failure(session: &mut Session, error: PreprocessError) -> CompileErr {
    match error {
        PreprocessError::Io {
            path,
            source,
            line: None,
        } => io_failure(session, &path, source),
        error => {
            let location = report(session, error.line(), &error);
            CompileErr::Preprocessor { location, error }
        }
    }
}

fn io_failure(session: &mut Session, path: &Path, error: std::io::Error) -> CompileErr {
    let error = CompileErr::Io {
        path: path.to_path_buf(),
        error,
    };
    session.error(None, error.to_string());
    error
}

/// Records a fatal error in the session and resolves where it happened
fn report<E: std::fmt::Display>(
    session: &mut Session,
    line: Option<u32>,
    error: &E,
) -> Option<Location> {
    session.error(line, error.to_string());
    session.locate(line)
}
