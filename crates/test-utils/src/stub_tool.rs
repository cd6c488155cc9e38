//! A scriptable stand-in for external command-line raster tools.
//!
//! The stub is a POSIX shell script written into a scratch directory. Every
//! invocation appends its argv to a log file (one argument per line, calls
//! separated by a `--` line) so tests can assert on the exact arguments.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const CALL_SEPARATOR: &str = "--";

/// What the stub does after logging its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBehavior {
    /// Create the output file (last argument) and exit 0.
    Succeed,
    /// Print a diagnostic to stderr and exit 1 without creating output.
    Fail,
    /// Exit 0 without creating the output file.
    SkipOutput,
    /// Sleep far longer than any test timeout.
    Hang,
}

/// Handle to a stub tool on disk.
#[derive(Debug, Clone)]
pub struct StubTool {
    path: PathBuf,
    log: PathBuf,
}

impl StubTool {
    /// Write an executable stub named `name` into `dir`.
    pub fn install(dir: &Path, name: &str, behavior: StubBehavior) -> Self {
        let path = dir.join(name);
        let log = dir.join(format!("{name}.calls"));

        let action = match behavior {
            StubBehavior::Succeed => "printf 'stub raster' > \"$last\"\nexit 0",
            StubBehavior::Fail => "echo \"ERROR 4: $last: cannot open input\" >&2\nexit 1",
            StubBehavior::SkipOutput => "exit 0",
            StubBehavior::Hang => "sleep 30\nexit 0",
        };

        let script = format!(
            "#!/bin/sh\n\
             printf '%s\\n' \"$@\" >> '{log}'\n\
             echo '{sep}' >> '{log}'\n\
             for last; do :; done\n\
             echo \"Input file size is 830, 830\"\n\
             {action}\n",
            log = log.display(),
            sep = CALL_SEPARATOR,
            action = action,
        );

        fs::write(&path, script).expect("Failed to write stub tool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to mark stub tool executable");

        Self { path, log }
    }

    /// Path to pass as the tool executable.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments of every recorded invocation, oldest first.
    pub fn invocations(&self) -> Vec<Vec<String>> {
        let Ok(content) = fs::read_to_string(&self.log) else {
            return Vec::new();
        };

        let mut calls = Vec::new();
        let mut current = Vec::new();
        for line in content.lines() {
            if line == CALL_SEPARATOR {
                calls.push(std::mem::take(&mut current));
            } else {
                current.push(line.to_string());
            }
        }
        calls
    }

    /// Whether the stub has been run at least once.
    pub fn was_called(&self) -> bool {
        !self.invocations().is_empty()
    }
}
