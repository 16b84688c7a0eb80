//! Command-line front end

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use memscope::bridge::{ExpressionBridge, GdbService, RegisterGroup};
use memscope::codec::{from_descriptor, with_count, ValueCodec, ValueType};
use memscope::config::Config;
use memscope::memory::regions::filter::presets;
use memscope::memory::{get_filtered_regions, MemoryAccessor};
use memscope::process::ProcessHandle;
use memscope::scan::{ScanCriteria, ScanRegion, ScanSession};
use memscope::{parse_address, MemoryResult, ScanType};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "memscope")]
#[command(about = "Inspect, scan and patch the memory of a Linux process")]
#[command(version)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "memscope.toml", global = true)]
    pub config: PathBuf,

    /// Also write logs to the configured log file
    #[arg(long, global = true)]
    pub log_to_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a value descriptor such as `String_UTF16[15],NZT`
    Descriptor {
        text: String,
        /// Replace the element count
        #[arg(long)]
        count: Option<usize>,
    },
    /// Read and decode a value
    Read {
        #[arg(short, long)]
        pid: u32,
        #[arg(short, long)]
        address: String,
        #[arg(short = 't', long = "type", default_value = "4 Bytes")]
        value_type: String,
    },
    /// Encode and write a value
    Write {
        #[arg(short, long)]
        pid: u32,
        #[arg(short, long)]
        address: String,
        #[arg(short = 't', long = "type", default_value = "4 Bytes")]
        value_type: String,
        #[arg(short, long)]
        value: String,
    },
    /// List memory mappings
    Regions {
        #[arg(short, long)]
        pid: u32,
        #[arg(short, long)]
        writable: bool,
    },
    /// Interactive value scan
    Scan {
        #[arg(short, long)]
        pid: u32,
        #[arg(short = 't', long = "type", default_value = "4 Bytes")]
        value_type: String,
        /// Keep only addresses holding this value on the first scan
        #[arg(long)]
        value: Option<String>,
        /// Scan writable mappings only
        #[arg(short, long)]
        writable: bool,
    },
    /// Dump registers through gdb
    Regs {
        #[arg(short, long)]
        pid: u32,
        #[arg(short, long)]
        group: Option<RegisterGroup>,
    },
}

pub async fn run(args: Args, config: Config) -> Result<()> {
    match args.command {
        Commands::Descriptor { text, count } => descriptor(&text, count),
        Commands::Read {
            pid,
            address,
            value_type,
        } => read(&config, pid, &address, &value_type),
        Commands::Write {
            pid,
            address,
            value_type,
            value,
        } => write(&config, pid, &address, &value_type, &value),
        Commands::Regions { pid, writable } => regions(pid, writable),
        Commands::Scan {
            pid,
            value_type,
            value,
            writable,
        } => scan(config, pid, &value_type, value.as_deref(), writable).await,
        Commands::Regs { pid, group } => regs(config, pid, group).await,
    }
}

fn descriptor(text: &str, count: Option<usize>) -> Result<()> {
    let text = match count {
        Some(n) => match with_count(text, n) {
            Some(updated) => updated,
            None => bail!("{} has no element count", text),
        },
        None => text.to_string(),
    };
    let parsed = from_descriptor(&text)?;
    let ty = ValueType::from(parsed);

    println!("descriptor:      {}", ty);
    println!("kind:            {}", parsed.kind.label());
    println!("count:           {}", display_opt(parsed.count));
    println!("zero terminated: {}", display_opt(parsed.zero_terminated));
    println!("byte length:     {}", display_opt(parsed.byte_length));
    Ok(())
}

fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-1".to_string(), |v| v.to_string())
}

fn read(config: &Config, pid: u32, address: &str, value_type: &str) -> Result<()> {
    let ty: ValueType = value_type.parse()?;
    let address = parse_address(address)?;
    let handle = ProcessHandle::open_for_read(pid)?;
    let accessor = MemoryAccessor::from_config(&config.memory);
    let codec = ValueCodec::from_config(&config.codec);

    let value = accessor.read_value(&handle, address, &ty, &codec)?;
    println!("{} {} = {}", address, ty, value);
    Ok(())
}

fn write(config: &Config, pid: u32, address: &str, value_type: &str, text: &str) -> Result<()> {
    let ty: ValueType = value_type.parse()?;
    let address = parse_address(address)?;
    let handle = ProcessHandle::open_for_read_write(pid)?;
    let accessor = MemoryAccessor::from_config(&config.memory);
    let codec = ValueCodec::from_config(&config.codec);

    let value = codec.parse_value(text, &ty)?;
    let written = accessor.write_value(&handle, address, &value, &ty, &codec)?;
    info!(%address, written, "value written");
    println!("wrote {} bytes at {}", written, address);
    Ok(())
}

fn regions(pid: u32, writable: bool) -> Result<()> {
    let criteria = if writable {
        presets::scannable_data()
    } else {
        presets::all_readable()
    };
    for region in get_filtered_regions(pid, criteria)? {
        println!(
            "{:>16x}-{:<16x} {}{}{}{} {:>10} {}",
            region.base_address,
            region.end_address(),
            if region.readable { 'r' } else { '-' },
            if region.writable { 'w' } else { '-' },
            if region.executable { 'x' } else { '-' },
            if region.shared { 's' } else { 'p' },
            region.size,
            region.path.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// One line typed at the scan prompt
#[derive(Debug, Clone, PartialEq)]
pub enum ScanCommand {
    Narrow(ScanCriteria),
    List,
    Reset,
    Save(PathBuf),
    Quit,
}

pub fn parse_scan_command(line: &str, ty: &ValueType, codec: &ValueCodec) -> Result<ScanCommand> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let value = |text: &str| codec.parse_value(text, ty);

    let criteria = match (head, rest) {
        ("list", "") => return Ok(ScanCommand::List),
        ("reset", "") => return Ok(ScanCommand::Reset),
        ("quit", "") | ("q", "") => return Ok(ScanCommand::Quit),
        ("save", path) if !path.is_empty() => return Ok(ScanCommand::Save(PathBuf::from(path))),
        ("=", v) if !v.is_empty() => ScanCriteria::with_value(ScanType::Exact, value(v)?)?,
        ("+", "") => ScanCriteria::new(ScanType::Increased)?,
        ("-", "") => ScanCriteria::new(ScanType::Decreased)?,
        ("+", v) => ScanCriteria::with_value(ScanType::IncreasedBy, value(v)?)?,
        ("-", v) => ScanCriteria::with_value(ScanType::DecreasedBy, value(v)?)?,
        ("!", "") => ScanCriteria::new(ScanType::Changed)?,
        ("~", "") => ScanCriteria::new(ScanType::Unchanged)?,
        (">", v) if !v.is_empty() => ScanCriteria::with_value(ScanType::BiggerThan, value(v)?)?,
        ("<", v) if !v.is_empty() => ScanCriteria::with_value(ScanType::SmallerThan, value(v)?)?,
        ("between", v) => match v.split_whitespace().collect::<Vec<_>>().as_slice() {
            [low, high] => ScanCriteria::between(value(*low)?, value(*high)?)?,
            _ => bail!("usage: between <low> <high>"),
        },
        _ => bail!("unknown command '{}'", line),
    };
    Ok(ScanCommand::Narrow(criteria))
}

/// Runs one blocking pass on a worker thread; Ctrl-C cancels it
async fn run_pass<F>(session: ScanSession, pass: F) -> Result<(ScanSession, MemoryResult<usize>)>
where
    F: FnOnce(&mut ScanSession) -> MemoryResult<usize> + Send + 'static,
{
    let control = session.control();
    let mut task = tokio::task::spawn_blocking(move || {
        let mut session = session;
        let result = pass(&mut session);
        (session, result)
    });

    tokio::select! {
        joined = &mut task => Ok(joined?),
        _ = tokio::signal::ctrl_c() => {
            warn!("cancelling scan");
            control.cancel();
            Ok(task.await?)
        }
    }
}

async fn scan(
    config: Config,
    pid: u32,
    value_type: &str,
    initial: Option<&str>,
    writable: bool,
) -> Result<()> {
    let ty: ValueType = value_type.parse()?;
    let codec = ValueCodec::from_config(&config.codec);
    let handle = Arc::new(ProcessHandle::open_for_read(pid)?);

    let criteria = if writable {
        presets::scannable_data()
    } else {
        presets::all_readable()
    };
    let region = ScanRegion::from_regions(&get_filtered_regions(pid, criteria)?);
    let first = match initial {
        Some(text) => Some(ScanCriteria::with_value(ScanType::Exact, codec.parse_value(text, &ty)?)?),
        None => None,
    };
    info!(pid, %ty, bytes = region.total_size(), "scan region ready");

    let mut session = ScanSession::from_config(&config);
    session = first_pass(session, &handle, &region, ty, first.clone()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_scan_command(&line, &ty, &codec) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            ScanCommand::Quit => break,
            ScanCommand::List => {
                for result in session.results().take(100) {
                    println!("{} {}", result.address, result.value);
                }
                if session.match_count() > 100 {
                    println!("... {} more", session.match_count() - 100);
                }
            }
            ScanCommand::Reset => {
                session = first_pass(session, &handle, &region, ty, first.clone()).await?;
            }
            ScanCommand::Save(path) => {
                let json = session.snapshot()?.to_json()?;
                std::fs::write(&path, json)
                    .with_context(|| format!("cannot write {}", path.display()))?;
                println!("saved {} candidates to {}", session.match_count(), path.display());
            }
            ScanCommand::Narrow(criteria) => {
                let target = Arc::clone(&handle);
                let (returned, result) = run_pass(session, move |s| {
                    s.next_scan_with(target.as_ref(), &criteria)
                })
                .await?;
                session = returned;
                match result {
                    Ok(count) => println!("{} matches", count),
                    Err(e) => println!("{}", e),
                }
            }
        }
    }
    Ok(())
}

async fn first_pass(
    session: ScanSession,
    handle: &Arc<ProcessHandle>,
    region: &ScanRegion,
    ty: ValueType,
    criteria: Option<ScanCriteria>,
) -> Result<ScanSession> {
    let target = Arc::clone(handle);
    let region = region.clone();
    let (session, result) = run_pass(session, move |s| match &criteria {
        Some(criteria) => s.start_scan_filtered(target.as_ref(), &region, ty, criteria),
        None => s.start_scan(target.as_ref(), &region, ty),
    })
    .await?;
    match result {
        Ok(count) => println!("{} matches", count),
        Err(e) => println!("{}", e),
    }
    Ok(session)
}

async fn regs(config: Config, pid: u32, group: Option<RegisterGroup>) -> Result<()> {
    let groups: Vec<RegisterGroup> = match group {
        Some(group) => vec![group],
        None => RegisterGroup::ALL.to_vec(),
    };

    let snapshots = tokio::task::spawn_blocking(move || -> MemoryResult<_> {
        let bridge = ExpressionBridge::open(GdbService::new(pid, &config.bridge))?;
        let snapshots = groups
            .into_iter()
            .map(|group| bridge.register_snapshot(group))
            .collect::<MemoryResult<Vec<_>>>()?;
        bridge.close();
        Ok(snapshots)
    })
    .await??;

    for snapshot in snapshots {
        println!("[{}]", snapshot.group);
        for (name, value) in snapshot.iter() {
            println!("  {:<6} {}", name, value.unwrap_or("<unavailable>"));
        }
    }
    Ok(())
}
