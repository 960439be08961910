//! Child processes with stdout and stderr merged into one stream.
//!
//! A non-zero exit status is returned to the caller, not treated as an
//! error: for analysis tools it means "findings". Only failing to start and
//! dying to a signal are errors.

use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::{Error, Result};

/// Output captured from a finished tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedOutput {
    pub code: i32,
    pub output: String,
}

impl CombinedOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run `cmd` to completion and capture its interleaved output.
pub fn run_combined(cmd: Command, tool: &str) -> Result<CombinedOutput> {
    let mut buf = Vec::new();
    let code = stream_combined(cmd, tool, &mut buf)?;
    Ok(CombinedOutput {
        code,
        output: String::from_utf8_lossy(&buf).into_owned(),
    })
}

/// Run `cmd`, copying its interleaved output into `sink` as it arrives.
/// Returns the exit code.
pub fn stream_combined<W: Write + ?Sized>(mut cmd: Command, tool: &str, sink: &mut W) -> Result<i32> {
    log::debug!("running {:?}", cmd);
    let (mut reader, writer) = io::pipe()?;
    let writer_err = writer.try_clone()?;
    cmd.stdout(Stdio::from(writer)).stderr(Stdio::from(writer_err));

    let mut child = cmd.spawn().map_err(|source| Error::ToolSpawn {
        tool: tool.to_string(),
        source,
    })?;
    // The command holds the parent's copy of the write end until dropped.
    drop(cmd);

    io::copy(&mut reader, sink)?;
    sink.flush()?;
    let status = child.wait()?;
    exit_code(status, tool)
}

fn exit_code(status: ExitStatus, tool: &str) -> Result<i32> {
    let code = status.code().ok_or_else(|| Error::ToolSignaled {
        tool: tool.to_string(),
    })?;
    log::debug!("{} exited with status {}", tool, code);
    Ok(code)
}
