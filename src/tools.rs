use crate::error::{Error, Result};
use itertools::Itertools;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::process::{Command, Stdio};

pub const DEFAULT_BIGWIG_TO_BEDGRAPH: &str = "bigWigToBedGraph";
pub const DEFAULT_BEDGRAPH_TO_BIGWIG: &str = "bedGraphToBigWig";
pub const BIGWIG_TO_BEDGRAPH_ENV: &str = "BIGWIG_TO_BEDGRAPH";
pub const BEDGRAPH_TO_BIGWIG_ENV: &str = "BEDGRAPH_TO_BIGWIG";

/// An external program, either a name looked up on `$PATH` or a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: String,
}

impl ExternalTool {
    pub fn new(program: &str) -> ExternalTool {
        ExternalTool {
            program: program.to_string(),
        }
    }

    /// Whether the program can be started at all; its exit status is ignored.
    pub fn is_available(&self) -> Result<bool> {
        let probe = Command::new(&self.program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match probe {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied) => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn command(&self) -> ToolCommand {
        ToolCommand {
            program: self.program.clone(),
            args: Vec::new(),
        }
    }
}

/// Check every tool up front, logging each one that is missing.
pub fn ensure_available(tools: &[&ExternalTool]) -> Result<()> {
    let mut missing = Vec::new();
    for tool in tools {
        if !tool.is_available()? {
            log::error!("{} is not in the $PATH", tool.program);
            missing.push(tool.program.as_str());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingExternalTool {
            tools: missing.join(", "),
        })
    }
}

/// An explicit argument list for one tool run, never passed through a shell.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> ToolCommand {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> ToolCommand
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Run to completion; a non-zero exit becomes [`Error::ExternalToolFailed`].
    pub fn run(&self) -> Result<()> {
        log::info!("Running: {}", self);
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::MissingExternalTool {
                    tools: self.program.clone(),
                },
                _ => Error::Io(e),
            })?;
        if !output.status.success() {
            return Err(Error::ExternalToolFailed {
                tool: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.program,
            self.args.iter().map(|a| a.to_string_lossy()).join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool() {
        let tool = ExternalTool::new("rcv-no-such-tool-on-any-path");
        assert!(!tool.is_available().unwrap());
        let err = ensure_available(&[&tool]).err().unwrap();
        assert!(matches!(err, Error::MissingExternalTool { tools } if tools == "rcv-no-such-tool-on-any-path"));
        let err = tool.command().arg("x").run().err().unwrap();
        assert!(matches!(err, Error::MissingExternalTool { .. }));
    }

    #[test]
    fn test_builder_keeps_arguments_separate() {
        let cmd = ExternalTool::new("echo")
            .command()
            .arg("a b")
            .args(["-chrom=chr1", "-start=0"]);
        assert_eq!(cmd.get_args().len(), 3);
        assert_eq!(cmd.to_string(), "echo a b -chrom=chr1 -start=0");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_tool() {
        let err = ExternalTool::new("false").command().run().err().unwrap();
        assert!(matches!(err, Error::ExternalToolFailed { .. }));
        assert!(ExternalTool::new("true").command().run().is_ok());
    }
}
