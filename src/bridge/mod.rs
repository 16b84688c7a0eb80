//! Expression bridge to an external debugger
//!
//! Turns user-entered expressions (`$rsp+8`, `main`, `&player->hp`) into
//! addresses with an optional symbol annotation, and builds register
//! snapshots. All evaluation is delegated to an [`EvalService`].

pub mod registers;
pub mod service;

pub use registers::{
    flags_from_word, Architecture, RegisterGroup, RegisterSnapshot, FLAGS, FLAG_DEFAULT,
};
pub use service::{parse_batch_output, EvalService, Evaluation, GdbService};

use crate::core::types::{Address, MemoryError, MemoryResult};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

lazy_static! {
    /// `0x401136 <main+4>`: an address optionally followed by a symbol
    static ref ADDRESS_WITH_SYMBOL: Regex =
        Regex::new(r"(0x[0-9a-fA-F]+)(?:\s+<(.+)>)?").expect("valid address pattern");
}

/// Address an expression evaluated to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolved {
    pub address: Address,
    pub symbol: Option<String>,
}

/// Parses a service rendering of a `void *` value
pub fn parse_resolved(text: &str) -> Option<Resolved> {
    let captures = ADDRESS_WITH_SYMBOL.captures(text)?;
    let address = captures.get(1)?.as_str().parse::<Address>().ok()?;
    Some(Resolved {
        address,
        symbol: captures.get(2).map(|m| m.as_str().to_string()),
    })
}

/// Debug session over an evaluation service.
///
/// The inferior's architecture is probed once when the bridge is opened and
/// cached until [`close`](Self::close).
pub struct ExpressionBridge<S: EvalService> {
    service: S,
    arch: Architecture,
}

impl<S: EvalService> ExpressionBridge<S> {
    /// Opens the bridge and probes the architecture: `$rax` renders as
    /// `void` on a 32-bit inferior
    pub fn open(service: S) -> MemoryResult<Self> {
        let arch = match service.evaluate("$rax")? {
            Ok(text) if text.trim() == "void" => Architecture::X86,
            Ok(_) => Architecture::X64,
            Err(message) => {
                warn!(%message, "architecture probe failed, assuming 64-bit");
                Architecture::X64
            }
        };
        info!(pid = service.pid(), ?arch, "expression bridge opened");
        Ok(ExpressionBridge { service, arch })
    }

    /// Uses a known architecture instead of probing
    pub fn with_architecture(service: S, arch: Architecture) -> Self {
        ExpressionBridge { service, arch }
    }

    pub fn architecture(&self) -> Architecture {
        self.arch
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Resolves an expression to an address.
    ///
    /// Evaluation errors keep the service's text unmodified in
    /// [`MemoryError::UnresolvableExpression`].
    pub fn resolve(&self, expression: &str) -> MemoryResult<Resolved> {
        let evaluation = self.service.evaluate(&as_pointer(expression))?;
        interpret(expression, evaluation)
    }

    /// Resolves several expressions in one round trip; each keeps its own
    /// outcome
    pub fn resolve_batch(&self, expressions: &[&str]) -> MemoryResult<Vec<MemoryResult<Resolved>>> {
        let requests: Vec<String> = expressions.iter().map(|e| as_pointer(e)).collect();
        let evaluations = self.service.evaluate_batch(&requests)?;
        if evaluations.len() != expressions.len() {
            return Err(MemoryError::ProtocolError(format!(
                "asked for {} results, got {}",
                expressions.len(),
                evaluations.len()
            )));
        }
        Ok(expressions
            .iter()
            .zip(evaluations)
            .map(|(expression, evaluation)| interpret(expression, evaluation))
            .collect())
    }

    /// Values of one register group.
    ///
    /// A register that cannot be evaluated shows up as a missing entry (a
    /// `"0"` for flags); only an unreachable service fails the snapshot.
    pub fn register_snapshot(&self, group: RegisterGroup) -> MemoryResult<RegisterSnapshot> {
        debug!(%group, arch = ?self.arch, "register snapshot");
        match group {
            RegisterGroup::General | RegisterGroup::Segment => self.address_registers(group),
            RegisterGroup::Flags => {
                let word = match self.service.evaluate("(unsigned long)$eflags")? {
                    Ok(text) => Some(text),
                    Err(message) => {
                        warn!(%message, "cannot read eflags");
                        None
                    }
                };
                Ok(flags_from_word(word.as_deref()))
            }
            RegisterGroup::Float => self.float_registers(),
        }
    }

    fn address_registers(&self, group: RegisterGroup) -> MemoryResult<RegisterSnapshot> {
        let names = group.registers(self.arch);
        let expressions: Vec<String> = names.iter().map(|n| format!("${}", n)).collect();
        let refs: Vec<&str> = expressions.iter().map(String::as_str).collect();
        let resolved = self.resolve_batch(&refs)?;

        let mut snapshot = RegisterSnapshot::new(group);
        for (name, outcome) in names.into_iter().zip(resolved) {
            let value = match outcome {
                Ok(resolved) => Some(resolved.address.to_string()),
                Err(e) => {
                    debug!(register = name, error = %e, "register unavailable");
                    None
                }
            };
            snapshot.insert(name, value);
        }
        Ok(snapshot)
    }

    fn float_registers(&self) -> MemoryResult<RegisterSnapshot> {
        let names = RegisterGroup::Float.registers(self.arch);
        let expressions: Vec<String> = names
            .iter()
            .map(|n| {
                if n.starts_with("xmm") {
                    format!("${}.v4_float", n)
                } else {
                    format!("${}", n)
                }
            })
            .collect();
        let evaluations = self.service.evaluate_batch(&expressions)?;

        let mut snapshot = RegisterSnapshot::new(RegisterGroup::Float);
        for (i, name) in names.into_iter().enumerate() {
            snapshot.insert(name, evaluations.get(i).cloned().and_then(Result::ok));
        }
        Ok(snapshot)
    }

    /// Reads raw bytes from the inferior through the service
    pub fn read_memory(&self, address: Address, length: usize) -> MemoryResult<Vec<u8>> {
        self.service.read_memory(address, length)
    }

    /// Ends the session, handing the service back
    pub fn close(self) -> S {
        debug!(pid = self.service.pid(), "expression bridge closed");
        self.service
    }
}

fn as_pointer(expression: &str) -> String {
    format!("(void *)({})", expression)
}

fn interpret(expression: &str, evaluation: Evaluation) -> MemoryResult<Resolved> {
    match evaluation {
        Ok(text) => parse_resolved(&text).ok_or(MemoryError::ProtocolError(text)),
        Err(message) => Err(MemoryError::unresolvable(expression, message)),
    }
}
