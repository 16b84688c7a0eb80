//! Register groups and snapshots

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// General purpose register width of the inferior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    X86,
    X64,
}

impl Architecture {
    /// Get pointer size for this architecture
    pub fn pointer_size(&self) -> usize {
        match self {
            Architecture::X86 => 4,
            Architecture::X64 => 8,
        }
    }
}

pub const GENERAL_64: [&str; 17] = [
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15", "rip",
];

pub const GENERAL_32: [&str; 9] = ["eax", "ebx", "ecx", "edx", "esi", "edi", "ebp", "esp", "eip"];

pub const SEGMENT: [&str; 6] = ["cs", "ss", "ds", "es", "fs", "gs"];

pub const FLOAT_ST: [&str; 8] = ["st0", "st1", "st2", "st3", "st4", "st5", "st6", "st7"];

pub const FLOAT_XMM: [&str; 8] = [
    "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7",
];

/// Flag names and their bit offsets in `$eflags`
pub const FLAGS: [(&str, u32); 9] = [
    ("cf", 0),
    ("pf", 2),
    ("af", 4),
    ("zf", 6),
    ("sf", 7),
    ("tf", 8),
    ("if", 9),
    ("df", 10),
    ("of", 11),
];

/// Value reported for a flag whose bit cannot be read
pub const FLAG_DEFAULT: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterGroup {
    General,
    Segment,
    Flags,
    Float,
}

impl RegisterGroup {
    pub const ALL: [RegisterGroup; 4] = [
        RegisterGroup::General,
        RegisterGroup::Segment,
        RegisterGroup::Flags,
        RegisterGroup::Float,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RegisterGroup::General => "general",
            RegisterGroup::Segment => "segment",
            RegisterGroup::Flags => "flags",
            RegisterGroup::Float => "float",
        }
    }

    /// Register names of this group, in display order
    pub fn registers(&self, arch: Architecture) -> Vec<&'static str> {
        match self {
            RegisterGroup::General => match arch {
                Architecture::X64 => GENERAL_64.to_vec(),
                Architecture::X86 => GENERAL_32.to_vec(),
            },
            RegisterGroup::Segment => SEGMENT.to_vec(),
            RegisterGroup::Flags => FLAGS.iter().map(|(name, _)| *name).collect(),
            RegisterGroup::Float => FLOAT_ST.iter().chain(FLOAT_XMM.iter()).copied().collect(),
        }
    }
}

impl fmt::Display for RegisterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RegisterGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegisterGroup::ALL
            .into_iter()
            .find(|group| group.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown register group '{}'", s))
    }
}

/// Ordered register values of one group.
///
/// A register the service could not evaluate is present with `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub group: RegisterGroup,
    pub entries: IndexMap<String, Option<String>>,
}

impl RegisterSnapshot {
    pub fn new(group: RegisterGroup) -> Self {
        RegisterSnapshot {
            group,
            entries: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        self.entries.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// Names of registers that could not be evaluated
    pub fn missing(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Splits an `eflags` word into the named single-bit flags.
///
/// `bits` is the flags word as printed by the debugger; `None` (or text that
/// is not a number) yields the default for every flag.
pub fn flags_from_word(bits: Option<&str>) -> RegisterSnapshot {
    let word = bits.and_then(parse_word);
    let mut snapshot = RegisterSnapshot::new(RegisterGroup::Flags);
    for (name, bit) in FLAGS {
        let value = match word {
            Some(word) => word
                .checked_shr(bit)
                .map(|v| (v & 1).to_string())
                .unwrap_or_else(|| FLAG_DEFAULT.to_string()),
            None => FLAG_DEFAULT.to_string(),
        };
        snapshot.insert(name, Some(value));
    }
    snapshot
}

fn parse_word(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
