use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dolphin_memory::config::{load_config, Config};
use dolphin_memory::core::types::{
    format_console_address, parse_console_address, parse_pointer_offset, ConsoleAddress, MemBase,
    MemType, ScanFilter, ScanSettings, Signedness, StringEncoding,
};
use dolphin_memory::memory::{MemScanner, MemWatchEntry, WatchListDocument};
use dolphin_memory::process::{platform_process, DolphinAccessor, DolphinProcess, DolphinStatus};
use dolphin_memory::SnapshotProcess;

/// dolphin-memory - search, watch and edit the RAM of a running GameCube/Wii emulator
#[derive(Debug, Parser)]
#[command(name = "dolphin-memory", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
struct GlobalOptions {
    /// Configuration file (defaults to dolphin-memory.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read MEM1 from a raw dump instead of a live emulator.
    #[arg(long, global = true, value_name = "FILE")]
    mem1_dump: Option<PathBuf>,

    /// Read MEM2 from a raw dump. Requires --mem1-dump.
    #[arg(long, global = true, value_name = "FILE", requires = "mem1_dump")]
    mem2_dump: Option<PathBuf>,

    /// Write logs to the file named in the configuration instead of stderr.
    #[arg(long, global = true)]
    log_to_file: bool,

    /// Enable debug-level logging output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Element type and display options of a value.
#[derive(Debug, Clone, clap::Args)]
struct ValueOptions {
    /// Element type.
    #[arg(short = 't', long = "type", value_enum, default_value = "word")]
    ty: TypeArg,

    /// Length in characters for strings, bytes for byte arrays.
    #[arg(short, long, default_value_t = 1)]
    length: usize,

    /// Base used to parse and display the value.
    #[arg(short, long, value_enum, default_value = "decimal")]
    base: BaseArg,

    /// Treat integers as unsigned.
    #[arg(short, long)]
    unsigned: bool,
}

impl ValueOptions {
    fn signedness(&self) -> Signedness {
        if self.unsigned {
            Signedness::Unsigned
        } else {
            Signedness::Signed
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TypeArg {
    Byte,
    Halfword,
    Word,
    Float,
    Double,
    Doubleword,
    String,
    Utf16,
    Utf32,
    Bytes,
}

impl From<TypeArg> for MemType {
    fn from(ty: TypeArg) -> Self {
        match ty {
            TypeArg::Byte => MemType::Byte,
            TypeArg::Halfword => MemType::Halfword,
            TypeArg::Word => MemType::Word,
            TypeArg::Float => MemType::Float,
            TypeArg::Double => MemType::Double,
            TypeArg::Doubleword => MemType::Doubleword,
            TypeArg::String => MemType::String(StringEncoding::Utf8),
            TypeArg::Utf16 => MemType::String(StringEncoding::Utf16),
            TypeArg::Utf32 => MemType::String(StringEncoding::Utf32),
            TypeArg::Bytes => MemType::ByteArray,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BaseArg {
    Decimal,
    Hexadecimal,
    Octal,
    Binary,
}

impl From<BaseArg> for MemBase {
    fn from(base: BaseArg) -> Self {
        match base {
            BaseArg::Decimal => MemBase::Decimal,
            BaseArg::Hexadecimal => MemBase::Hexadecimal,
            BaseArg::Octal => MemBase::Octal,
            BaseArg::Binary => MemBase::Binary,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Hook the emulator and report its state and RAM layout.
    Status,

    /// Read a value at a console address.
    Read {
        /// Console address in hex (e.g. 80001234).
        #[arg(value_parser = parse_address)]
        address: ConsoleAddress,

        /// Pointer offsets in hex, applied in order (e.g. 1C,-8).
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, value_parser = parse_offset)]
        offsets: Vec<i32>,

        #[command(flatten)]
        value: ValueOptions,
    },

    /// Write a value at a console address.
    Write {
        /// Console address in hex.
        #[arg(value_parser = parse_address)]
        address: ConsoleAddress,

        /// Value text, parsed with the given type and base.
        #[arg(allow_hyphen_values = true)]
        text: String,

        /// Pointer offsets in hex, applied in order.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, value_parser = parse_offset)]
        offsets: Vec<i32>,

        #[command(flatten)]
        value: ValueOptions,
    },

    /// Run a first scan, then optional next scans separated by a delay.
    Scan {
        /// First scan filter: exact, unknown, between, bigger, smaller.
        filter: ScanFilter,

        /// First term.
        #[arg(allow_hyphen_values = true)]
        term: Option<String>,

        /// Second term (between).
        #[arg(allow_hyphen_values = true)]
        second: Option<String>,

        /// Next scan step as FILTER[:TERM[:TERM]], e.g. increased-by:5. Repeatable.
        #[arg(long = "next", value_name = "STEP", value_parser = parse_step)]
        next: Vec<ScanStep>,

        /// Delay before each next scan.
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,

        /// First address of the scan range, in hex.
        #[arg(long, value_parser = parse_address)]
        begin: Option<ConsoleAddress>,

        /// One past the last address of the scan range, in hex.
        #[arg(long, value_parser = parse_address)]
        end: Option<ConsoleAddress>,

        /// Consider every byte offset instead of naturally aligned addresses.
        #[arg(long)]
        unaligned: bool,

        #[command(flatten)]
        value: ValueOptions,
    },

    /// Poll a saved watch list until Ctrl+C.
    Watch {
        /// Watch list JSON file.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Keep the entry with this label at its current value. Repeatable.
        #[arg(long = "lock", value_name = "LABEL")]
        locks: Vec<String>,
    },
}

#[derive(Debug, Clone)]
struct ScanStep {
    filter: ScanFilter,
    term: Option<String>,
    second: Option<String>,
}

fn parse_address(s: &str) -> Result<ConsoleAddress, String> {
    parse_console_address(s).map_err(|e| e.to_string())
}

fn parse_offset(s: &str) -> Result<i32, String> {
    parse_pointer_offset(s).map_err(|e| e.to_string())
}

fn parse_step(s: &str) -> Result<ScanStep, String> {
    let mut parts = s.splitn(3, ':');
    let filter = parts
        .next()
        .unwrap_or_default()
        .parse::<ScanFilter>()
        .map_err(|e| e.to_string())?;
    Ok(ScanStep {
        filter,
        term: parts.next().map(str::to_string),
        second: parts.next().map(str::to_string),
    })
}

fn init_logging(global: &GlobalOptions, config: &Config) -> Result<()> {
    let level = if global.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if global.log_to_file {
        let file = File::create(&config.logging.file)
            .with_context(|| format!("cannot open log file {}", config.logging.file))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

fn open_backend(global: &GlobalOptions, config: &Config) -> Result<Box<dyn DolphinProcess>> {
    match &global.mem1_dump {
        Some(mem1) => {
            let process = SnapshotProcess::from_dump(mem1, global.mem2_dump.as_deref())
                .with_context(|| format!("cannot load RAM dump {}", mem1.display()))?;
            Ok(Box::new(process))
        }
        None => Ok(platform_process(
            config.process.names.clone(),
            config.memory.layout(),
        )),
    }
}

fn hook(global: &GlobalOptions, config: &Config) -> Result<DolphinAccessor> {
    let mut accessor = DolphinAccessor::new(open_backend(global, config)?);
    match accessor.hook() {
        DolphinStatus::Hooked => Ok(accessor),
        status => bail!("cannot hook: {}", status),
    }
}

fn build_entry(address: ConsoleAddress, offsets: Vec<i32>, value: &ValueOptions) -> MemWatchEntry {
    MemWatchEntry::new(
        format_console_address(address),
        address,
        value.ty.into(),
        value.length,
        value.base.into(),
        value.signedness(),
    )
    .with_pointer_offsets(offsets)
}

fn run_status(accessor: &DolphinAccessor) {
    let layout = accessor.layout();
    println!("Status:      {}", accessor.status());
    if let Some(pid) = accessor.pid() {
        println!("PID:         {}", pid);
    }
    println!("Console:     {:?}", accessor.console());
    if let Some(id) = accessor.game_id() {
        println!("Game ID:     {}", id);
    }
    println!("MEM1 size:   0x{:X}", layout.mem1_size);
    if accessor.is_mem2_enabled() {
        println!("MEM2 size:   0x{:X}", layout.mem2_size);
    }
    println!("ARAM:        {}", accessor.is_aram_accessible());
}

fn run_scan(
    accessor: &mut DolphinAccessor,
    config: &Config,
    command: &Command,
) -> Result<()> {
    let Command::Scan {
        filter,
        term,
        second,
        next,
        delay_ms,
        begin,
        end,
        unaligned,
        value,
    } = command
    else {
        return Ok(());
    };

    let mut scanner = MemScanner::from_config(&config.scanner);
    let range = match (begin, end) {
        (None, None) => None,
        (begin, end) => Some((
            begin.unwrap_or(0),
            end.unwrap_or(ConsoleAddress::MAX),
        )),
    };
    scanner.set_settings(ScanSettings {
        mem_type: value.ty.into(),
        length: value.length,
        base: value.base.into(),
        signedness: value.signedness(),
        enforce_alignment: !unaligned && config.scanner.enforce_alignment,
        range,
    })?;

    let count = scanner.first_scan(accessor, *filter, term.as_deref(), second.as_deref())?;
    info!("First scan kept {} addresses", count);

    for step in next {
        std::thread::sleep(Duration::from_millis(*delay_ms));
        let count = scanner.next_scan(
            accessor,
            step.filter,
            step.term.as_deref(),
            step.second.as_deref(),
        )?;
        info!("{:?} kept {} addresses", step.filter, count);
    }

    let snapshot = accessor.snapshot_or_refresh()?;
    println!("{} results", scanner.result_count());
    let shown = scanner.result_count().min(config.scanner.max_displayed_results);
    for index in 0..shown {
        if let Some(address) = scanner.result_at(index) {
            println!(
                "{}  {:>16}  {:>16}",
                format_console_address(address),
                scanner.formatted_scanned_value_at(index),
                scanner.formatted_current_value_at(index, &snapshot)
            );
        }
    }
    if shown < scanner.result_count() {
        println!("... {} more", scanner.result_count() - shown);
    }
    Ok(())
}

async fn run_watch(
    accessor: &mut DolphinAccessor,
    config: &Config,
    file: &Path,
    locks: &[String],
) -> Result<()> {
    let document = WatchListDocument::load(file)?;
    let mut entries = document.to_entries()?;

    let snapshot = accessor.refresh_cache()?;
    for entry in entries.iter_mut() {
        if let Err(e) = entry.read_memory_from_cache(&snapshot) {
            warn!("{}: {}", entry.label(), e);
        }
        if locks.iter().any(|l| l == entry.label()) {
            entry.set_lock(true);
            info!("Locked {} at {}", entry.label(), entry.string_from_memory());
        }
    }

    let mut poll = tokio::time::interval(Duration::from_millis(config.watch.poll_interval_ms));
    let mut freeze = tokio::time::interval(Duration::from_millis(config.watch.freeze_interval_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let snapshot = accessor.refresh_cache()?;
                for entry in entries.iter_mut() {
                    // Unresolved chains show as unknown
                    let _ = entry.read_memory_from_cache(&snapshot);
                    let name = match entry.group() {
                        Some(group) => format!("{}/{}", group, entry.label()),
                        None => entry.label().to_string(),
                    };
                    println!("{:<24} {}", name, entry.string_from_memory());
                }
                println!();
            }
            _ = freeze.tick() => {
                for entry in entries.iter_mut().filter(|e| e.is_locked()) {
                    if let Err(e) = entry.freeze(accessor) {
                        if e.is_operation_failed() {
                            return Err(e.into());
                        }
                    }
                }
            }
            _ = &mut ctrl_c => {
                info!("Stopping watch");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.global.config.as_deref())?;
    init_logging(&cli.global, &config)?;

    info!("dolphin-memory v{}", env!("CARGO_PKG_VERSION"));

    let mut accessor = hook(&cli.global, &config)?;

    match &cli.command {
        Command::Status => run_status(&accessor),
        Command::Read {
            address,
            offsets,
            value,
        } => {
            let mut entry = build_entry(*address, offsets.clone(), value);
            entry.read_memory_from_ram(&accessor)?;
            let resolved = entry.resolve(&accessor)?;
            println!(
                "{} = {}",
                format_console_address(resolved),
                entry.string_from_memory()
            );
        }
        Command::Write {
            address,
            text,
            offsets,
            value,
        } => {
            let mut entry = build_entry(*address, offsets.clone(), value);
            entry.write_memory_from_string(&mut accessor, text)?;
            info!("Wrote {} to {}", text, format_console_address(entry.resolve(&accessor)?));
        }
        command @ Command::Scan { .. } => run_scan(&mut accessor, &config, command)?,
        Command::Watch { file, locks } => run_watch(&mut accessor, &config, file, locks).await?,
    }

    Ok(())
}
