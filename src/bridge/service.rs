//! Evaluation services the expression bridge delegates to

use crate::config::BridgeConfig;
use crate::core::types::{Address, MemoryError, MemoryResult, ProcessId};
use crate::memory::MemoryAccessor;
use crate::process::ProcessHandle;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of evaluating one expression: the rendered value, or the
/// service's own diagnostic text
pub type Evaluation = Result<String, String>;

/// A debugger able to evaluate expressions in the inferior.
///
/// The outer `MemoryResult` fails only when the service as a whole cannot
/// be reached for this call; per-expression failures are reported inside.
pub trait EvalService {
    /// Process the service is attached to
    fn pid(&self) -> ProcessId;

    /// Evaluates several expressions in one round trip
    fn evaluate_batch(&self, expressions: &[String]) -> MemoryResult<Vec<Evaluation>>;

    fn evaluate(&self, expression: &str) -> MemoryResult<Evaluation> {
        let mut results = self.evaluate_batch(&[expression.to_string()])?;
        results
            .pop()
            .ok_or_else(|| MemoryError::ProtocolError(format!("no result for '{}'", expression)))
    }

    /// Reads raw bytes from the inferior's memory file
    fn read_memory(&self, address: Address, length: usize) -> MemoryResult<Vec<u8>>;
}

const MARKER: &str = "@@memscope:";

/// Runs `gdb` in batch mode against a live pid, one debugger invocation
/// per batch.
#[derive(Debug, Clone)]
pub struct GdbService {
    pid: ProcessId,
    debugger: PathBuf,
    timeout: Duration,
    accessor: MemoryAccessor,
}

impl GdbService {
    pub fn new(pid: ProcessId, config: &BridgeConfig) -> Self {
        GdbService {
            pid,
            debugger: PathBuf::from(&config.debugger),
            timeout: Duration::from_millis(config.timeout_ms),
            accessor: MemoryAccessor::default(),
        }
    }

    pub fn with_accessor(mut self, accessor: MemoryAccessor) -> Self {
        self.accessor = accessor;
        self
    }

    /// Arguments for one batch: each expression is printed between markers
    /// so results can be matched back to their expression
    fn batch_args(&self, expressions: &[String]) -> Vec<String> {
        let mut args = vec![
            "-q".to_string(),
            "-batch".to_string(),
            "-nx".to_string(),
            "-p".to_string(),
            self.pid.to_string(),
        ];
        for (i, expression) in expressions.iter().enumerate() {
            args.push("-ex".to_string());
            args.push(format!("echo {}{}\\n", MARKER, i));
            args.push("-ex".to_string());
            args.push(format!("print {}", expression));
        }
        args.push("-ex".to_string());
        args.push(format!("echo {}end\\n", MARKER));
        args
    }

    /// Runs the debugger with stderr folded into stdout, so diagnostics
    /// stay next to the marker of the expression that caused them
    fn run(&self, args: &[String]) -> MemoryResult<String> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(r#"exec "$0" "$@" 2>&1"#)
            .arg(&self.debugger)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                MemoryError::ServiceUnavailable(format!("{}: {}", self.debugger.display(), e))
            })?;

        let output = drain(child.stdout.take());
        self.wait(&mut child)?;
        Ok(output.join().unwrap_or_default())
    }

    fn wait(&self, child: &mut Child) -> MemoryResult<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(pid = self.pid, timeout = ?self.timeout, "debugger timed out");
                let _ = child.kill();
                let _ = child.wait();
                return Err(MemoryError::ServiceUnavailable(format!(
                    "{} did not answer within {:?}",
                    self.debugger.display(),
                    self.timeout
                )));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let mut bytes = Vec::new();
            if pipe.read_to_end(&mut bytes).is_ok() {
                text = String::from_utf8_lossy(&bytes).into_owned();
            }
        }
        text
    })
}

impl EvalService for GdbService {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn evaluate_batch(&self, expressions: &[String]) -> MemoryResult<Vec<Evaluation>> {
        if expressions.is_empty() {
            return Ok(Vec::new());
        }
        debug!(pid = self.pid, count = expressions.len(), "evaluating batch");
        let output = self.run(&self.batch_args(expressions))?;
        parse_batch_output(&output, expressions.len())
    }

    fn read_memory(&self, address: Address, length: usize) -> MemoryResult<Vec<u8>> {
        let handle = ProcessHandle::open_for_read(self.pid)?;
        self.accessor.read(&handle, address, length)
    }
}

/// Matches gdb batch output (stdout and stderr interleaved) back to the
/// expressions of a batch.
///
/// Everything between marker `i` and the next marker belongs to expression
/// `i`. A `$N = value` line there means it succeeded; otherwise its
/// diagnostic is the last line of the section that is not a warning.
pub fn parse_batch_output(output: &str, count: usize) -> MemoryResult<Vec<Evaluation>> {
    if let Some(line) = output.lines().find(|l| l.trim_start().starts_with("ptrace:")) {
        return Err(MemoryError::ServiceUnavailable(line.trim().to_string()));
    }

    let mut sections: Vec<Option<Vec<&str>>> = vec![None; count];
    let mut current: Option<usize> = None;
    let mut finished = false;
    for line in output.lines() {
        if let Some(tag) = line.trim().strip_prefix(MARKER) {
            if tag == "end" {
                finished = true;
                current = None;
                continue;
            }
            current = tag.parse::<usize>().ok().filter(|&i| i < count);
            if let Some(i) = current {
                sections[i] = Some(Vec::new());
            }
            continue;
        }
        if let Some(lines) = current.and_then(|i| sections[i].as_mut()) {
            lines.push(line);
        }
    }

    if !finished {
        let reason = output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .unwrap_or("no output");
        return Err(MemoryError::ServiceUnavailable(format!(
            "debugger exited early: {}",
            reason
        )));
    }

    let mut results = Vec::with_capacity(count);
    for (i, section) in sections.into_iter().enumerate() {
        let lines = section.ok_or_else(|| {
            MemoryError::ProtocolError(format!("missing output section {}", i))
        })?;
        match value_of(&lines) {
            Some(value) => results.push(Ok(value)),
            None => results.push(Err(diagnostic_of(&lines))),
        }
    }
    Ok(results)
}

/// Last non-warning line of a failed section
fn diagnostic_of(lines: &[&str]) -> String {
    lines
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && !l.starts_with("warning:"))
        .unwrap_or("evaluation failed")
        .to_string()
}

/// Value text of a `$N = value` result, continuation lines included
fn value_of(lines: &[&str]) -> Option<String> {
    let start = lines.iter().position(|l| is_history_line(l))?;
    let first = lines[start];
    let (_, value) = first.split_once(" = ")?;
    let mut text = value.to_string();
    for line in &lines[start + 1..] {
        text.push('\n');
        text.push_str(line);
    }
    Some(text.trim_end().to_string())
}

fn is_history_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('$') else {
        return false;
    };
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && rest[digits..].starts_with(" = ")
}
