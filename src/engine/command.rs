// src/engine/command.rs

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::process::Command;
use toml::Value;
use tracing::{debug, info};

use crate::engine::compiler::{
    Artifact, CompileFuture, CompileRequest, Compiler, CompilerEnv, Diagnostic, Severity,
};
use crate::errors::CompileError;

/// Matches `path/to/file.ext:12:3: message` and `path/to/file.ext:12: message`,
/// optionally prefixed with `warning:` / `error:`.
const DIAGNOSTIC_PATTERN: &str = r"^(?:(?P<sev>(?i:warning|error))\s*:\s*)?(?P<file>[^\s:]+\.[A-Za-z0-9_]+):(?P<line>\d+)(?::(?P<col>\d+))?:?\s*(?P<msg>.*)$";

/// Compiler backend that runs the shell command from the `command` compiler
/// option.
///
/// The command sees the build through environment variables:
///
/// | variable                   | value                                  |
/// |----------------------------|----------------------------------------|
/// | `BUILDWATCH_BUILD_ID`      | build id                               |
/// | `BUILDWATCH_INPUTS`        | input files, one per line              |
/// | `BUILDWATCH_OUTPUT_TO`     | artifact path                          |
/// | `BUILDWATCH_OUTPUT_DIR`    | output directory                       |
/// | `BUILDWATCH_OPTIONS`       | all compiler options, as TOML          |
/// | `BUILDWATCH_INVOCATION`    | 1-based count of compiles of this build |
///
/// A non-zero exit status is a compile error. Lines of stdout/stderr that look
/// like `file:line[:col]: message` become diagnostics.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    diagnostic_re: Regex,
}

impl CommandCompiler {
    pub fn new() -> Result<Self> {
        let diagnostic_re =
            Regex::new(DIAGNOSTIC_PATTERN).context("compiling diagnostic pattern")?;
        Ok(Self { diagnostic_re })
    }

    /// Extract diagnostics from compiler output. Lines that do not carry file
    /// context are ignored here.
    pub fn parse_diagnostics(&self, output: &str, default: Severity) -> Vec<Diagnostic> {
        output
            .lines()
            .filter_map(|line| self.diagnostic_re.captures(line.trim_end()))
            .map(|caps| {
                let severity = match caps.name("sev").map(|m| m.as_str().to_lowercase()) {
                    Some(s) if s == "warning" => Severity::Warning,
                    Some(_) => Severity::Error,
                    None => default,
                };
                let message = caps.name("msg").map(|m| m.as_str()).unwrap_or("").to_string();
                let line = caps.name("line").and_then(|m| m.as_str().parse().ok());
                let column = caps.name("col").and_then(|m| m.as_str().parse().ok());
                let diag = match severity {
                    Severity::Warning => Diagnostic::warning(message),
                    Severity::Error => Diagnostic::error(message),
                };
                diag.at(PathBuf::from(&caps["file"]), line, column)
            })
            .collect()
    }

    async fn run(
        &self,
        request: CompileRequest<'_>,
        env: &mut CompilerEnv,
    ) -> Result<Artifact, CompileError> {
        let Some(Value::String(command)) = request.options.get("command") else {
            return Err(CompileError::message(format!(
                "build '{}' has no `command` in its [compiler] options",
                request.id
            )));
        };

        let inputs = request
            .inputs
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        let options = toml::to_string(request.options).unwrap_or_default();

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };

        cmd.env("BUILDWATCH_BUILD_ID", request.id)
            .env("BUILDWATCH_INPUTS", inputs)
            .env("BUILDWATCH_OUTPUT_TO", request.output_to)
            .env("BUILDWATCH_OUTPUT_DIR", request.output_dir)
            .env("BUILDWATCH_OPTIONS", options)
            .env("BUILDWATCH_INVOCATION", (env.invocations() + 1).to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        info!(build = %request.id, cmd = %command, inputs = request.inputs.len(), "running compiler");

        let output = cmd.output().await.map_err(|err| {
            CompileError::message(format!("spawning compiler for build '{}': {err}", request.id))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            debug!(build = %request.id, "compiler: {}", line);
        }

        if output.status.success() {
            let mut warnings = self.parse_diagnostics(&stdout, Severity::Warning);
            warnings.extend(self.parse_diagnostics(&stderr, Severity::Warning));
            return Ok(Artifact {
                output: request.output_to.to_path_buf(),
                warnings,
            });
        }

        let mut diagnostics = self.parse_diagnostics(&stderr, Severity::Error);
        diagnostics.extend(self.parse_diagnostics(&stdout, Severity::Error));
        if !diagnostics.iter().any(|d| d.severity == Severity::Error) {
            let code = output.status.code().unwrap_or(-1);
            let tail = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no output");
            diagnostics.push(Diagnostic::error(format!(
                "compiler exited with status {code}: {tail}"
            )));
        }
        Err(CompileError::new(diagnostics))
    }
}

impl Compiler for CommandCompiler {
    fn build<'a>(
        &'a self,
        request: CompileRequest<'a>,
        env: &'a mut CompilerEnv,
    ) -> CompileFuture<'a> {
        Box::pin(self.run(request, env))
    }
}
