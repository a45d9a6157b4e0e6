//! External compiler process
//!
//! Runs a configured compiler executable in a scratch directory: the source is
//! written to a file, the command is run, and the artifact is read back.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, instrument};

use crate::compiler::{CompileFailure, Compiler, CompilerError};
use crate::config::CompilerConfig;

/// A [`Compiler`] backed by an external executable
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    config: CompilerConfig,
    program: PathBuf,
}

impl CommandCompiler {
    /// Resolve the configured compiler so it is ready to be invoked
    ///
    /// This is the one asynchronous step of setting up the pipeline.
    #[instrument(skip_all, fields(command = ?config.command.first()))]
    pub async fn prepare(config: &CompilerConfig) -> Result<Self, CompilerError> {
        let name = config
            .command
            .first()
            .filter(|name| !name.is_empty())
            .ok_or(CompilerError::EmptyCommand)?;

        let program = resolve_program(name).await?;
        debug!(?program, "compiler resolved");

        Ok(Self {
            config: config.clone(),
            program,
        })
    }

    /// Absolute path of the compiler executable
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn invoke(&self, source: &str) -> Result<Vec<u8>, CompileFailure> {
        let scratch = tempfile::Builder::new()
            .prefix("halcyon-")
            .tempdir()
            .map_err(|e| CompileFailure::new(format!("failed to create scratch directory: {e}")))?;

        let source_path = scratch.path().join(&self.config.source_name);
        let output_path = scratch.path().join(&self.config.output_name);
        std::fs::write(&source_path, source)
            .map_err(|e| CompileFailure::new(format!("failed to write source file: {e}")))?;

        let args = self.config.expanded_command();
        let output = Command::new(&self.program)
            .args(&args[1..])
            .current_dir(scratch.path())
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                CompileFailure::new(format!(
                    "failed to start compiler {}: {e}",
                    self.program.display()
                ))
            })?;

        debug!(status = ?output.status, "compiler process exited");

        if !output.status.success() {
            return Err(failure_payload(&output));
        }

        std::fs::read(&output_path).map_err(|e| {
            CompileFailure::new(format!(
                "compiler did not produce {}: {e}",
                self.config.output_name
            ))
        })
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, source: &str) -> Result<Vec<u8>, CompileFailure> {
        self.invoke(source)
    }
}

/// Pick the message of a failed compiler process: stderr, then stdout, then the exit status
fn failure_payload(output: &std::process::Output) -> CompileFailure {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return CompileFailure::new(stderr.into_owned());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        return CompileFailure::new(stdout.into_owned());
    }
    CompileFailure::new(format!("compiler exited with {}", output.status))
}

/// Resolve a program name to an absolute path using the host's PATH.
///
/// Names that already contain a `/` are checked as given.
pub async fn resolve_program(name: &str) -> Result<PathBuf, CompilerError> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(tokio::fs::canonicalize(&path).await?),
            Ok(_) => Err(CompilerError::NotAFile(name.to_owned())),
            Err(_) => Err(CompilerError::NotFound(name.to_owned())),
        };
    }

    let path_var = std::env::var("PATH").unwrap_or_default();
    for dir in path_var.split(':').filter(|dir| !dir.is_empty()) {
        let candidate = Path::new(dir).join(name);
        if let Ok(meta) = tokio::fs::metadata(&candidate).await
            && meta.is_file()
        {
            return Ok(tokio::fs::canonicalize(&candidate)
                .await
                .unwrap_or(candidate));
        }
    }

    Err(CompilerError::NotFound(name.to_owned()))
}
