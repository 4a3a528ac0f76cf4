//! The bulk extract/load subprocess contract (spec §6, §9): adapters
//! invoke the target engine's native client binary rather than streaming
//! rows one at a time over the driver connection. A command is treated as
//! failed if it exits non-zero *or* writes anything to stderr, since the
//! native clients this shells out to (`mysql`, `psql`) often emit warnings
//! on stderr with a zero exit status.
//!
//! Arguments are passed straight to `tokio::process::Command` as argv
//! elements rather than through a shell, so there is no shell-quoting
//! concern to get wrong in the first place.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::DbError;

pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

/// Runs `cmd`, capturing stdout. Fails on non-zero exit status or any
/// non-empty stderr, per spec §9's load-bearing failure rule.
pub async fn run_capturing_stdout(cmd: ShellCommand) -> Result<Vec<u8>, DbError> {
    let mut child = Command::new(&cmd.program)
        .args(&cmd.args)
        .stdin(if cmd.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(DbError::Io)?;

    if let Some(input) = cmd.stdin {
        let mut stdin = child.stdin.take().expect("stdin was piped");
        stdin
            .write_all(input.as_bytes())
            .await
            .map_err(DbError::Io)?;
        drop(stdin);
    }

    let output = child.wait_with_output().await.map_err(DbError::Io)?;
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() || !stderr.trim().is_empty() {
        return Err(DbError::Subprocess(format!(
            "`{}`: exit={:?} stderr={}",
            cmd.program,
            output.status.code(),
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Same contract as [`run_capturing_stdout`], but for commands that write
/// their own output file and only need stdout/stderr checked.
pub async fn run_checked(cmd: ShellCommand) -> Result<(), DbError> {
    run_capturing_stdout(cmd).await.map(|_| ())
}

pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), DbError> {
    tokio::fs::write(path, bytes).await.map_err(DbError::Io)
}
