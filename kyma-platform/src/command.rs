//! External program execution
//!
//! Every process-backed collaborator runs its programs through a
//! [`CommandRunner`]. Captured output is always logged at debug level; the
//! [`ToolOutput`] sink decides whether it is also shown to the operator, so
//! noisy provider tooling can be silenced without touching global logging.

use kyma_core::ExternalError;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tracing::{debug, error};

/// Where the output of external tools goes besides the debug log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolOutput {
    /// Drop it
    #[default]
    Discard,
    /// Echo it on stderr
    Stderr,
}

impl ToolOutput {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose { Self::Stderr } else { Self::Discard }
    }

    fn emit(&self, program: &str, text: &str) {
        if let ToolOutput::Stderr = self {
            let mut stderr = std::io::stderr().lock();
            for line in text.lines() {
                let _ = writeln!(stderr, "[{}] {}", program, line);
            }
        }
    }
}

/// Runs external programs and maps failures into [`ExternalError`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRunner {
    output: ToolOutput,
}

impl CommandRunner {
    pub fn new(output: ToolOutput) -> Self {
        Self { output }
    }

    /// Runs the command to completion
    ///
    /// # Returns
    /// The captured stdout
    ///
    /// # Errors
    /// Returns an error if the program cannot be started or exits unsuccessfully
    pub fn run(&self, command: &mut Command) -> Result<String, ExternalError> {
        let program = program_name(command);
        debug!("Running {} {:?}", program, command.get_args().collect::<Vec<_>>());

        let output = command
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExternalError::Spawn {
                program: program.clone(),
                source,
            })?;

        self.finish(&program, output)
    }

    /// Runs the command with `input` written to its stdin
    pub fn run_with_input(&self, command: &mut Command, input: &str) -> Result<String, ExternalError> {
        let program = program_name(command);
        debug!(
            "Running {} {:?} with {} bytes of input",
            program,
            command.get_args().collect::<Vec<_>>(),
            input.len()
        );

        let spawn_error = |source: std::io::Error| ExternalError::Spawn {
            program: program.clone(),
            source,
        };

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExternalError::Parse(format!("stdin of `{}` is not available", program)))?;

        // Feed stdin from a separate thread so a chatty child cannot block on full pipes
        let output = std::thread::scope(|scope| {
            scope.spawn(|| {
                if let Err(err) = stdin.write_all(input.as_bytes()) {
                    debug!("Failed to write stdin of {}: {}", program, err);
                }
                drop(stdin);
            });
            child.wait_with_output()
        })
        .map_err(spawn_error)?;

        self.finish(&program, output)
    }

    fn finish(&self, program: &str, output: Output) -> Result<String, ExternalError> {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !stdout.trim().is_empty() {
            debug!("{} stdout: {}", program, stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", program, stderr.trim());
            self.output.emit(program, &stderr);
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            error!("{} failed: exit_code={}, stderr='{}'", program, code, stderr.trim());
            return Err(ExternalError::Command {
                program: program.to_string(),
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

fn program_name(command: &Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}
