use std::borrow::Cow;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anna_ensemble::asm::encoding::{BinaryFormat, ImageFormat, MemFormat};
use anna_ensemble::asm::{assemble, MemImage};
use anna_ensemble::ast::asm::{render, SourceNode};
use anna_ensemble::ast::Operand;
use anna_ensemble::opt::{optimize, OptFlags};
use anna_ensemble::parse::parse_source;
use anna_ensemble::sim::io::{parse_inputs, ChannelOutput, NullOutput};
use anna_ensemble::sim::{Cpu, StopReason};
use ariadne::{Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log more (-v for debug, -vv for trace). RUST_LOG is used when this is not set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command
}
#[derive(Subcommand)]
enum Command {
    /// Assembles a program into a memory image.
    Assemble {
        input: PathBuf,
        /// Output path (defaults to the input with a .mem or .bin extension).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Runs the peephole optimizer before assembling.
        #[arg(long)]
        optimize: bool,
        /// Writes the binary image format instead of .mem text.
        #[arg(long)]
        binary: bool,
    },
    /// Runs a program (.asm source, or a .mem image).
    Run {
        input: PathBuf,
        /// Values for the input queue (decimal, 0x hex, or 0b binary).
        #[arg(long = "input", num_args = 1.., allow_negative_numbers = true)]
        inputs: Vec<String>,
        /// Maximum number of instructions to execute.
        #[arg(long, default_value_t = 1_000_000)]
        max_cycles: u64,
        /// Addresses to pause at. Each pause prints the registers and resumes.
        #[arg(long = "break", value_parser = parse_addr)]
        breaks: Vec<u16>,
        /// Runs the peephole optimizer before assembling.
        #[arg(long)]
        optimize: bool,
    },
    /// Prints a program after peephole optimization.
    Optimize {
        input: PathBuf,
        /// Leaves a comment explaining each rewrite.
        #[arg(long)]
        annotate: bool,
        /// Writes to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

struct SourceMetadata<'fp> {
    name: Cow<'fp, str>,
    src: String,
}

fn main() -> ExitCode {
    let Args { verbose, cmd } = Args::parse();
    init_logging(verbose);

    let result = match cmd {
        Command::Assemble { input, output, optimize, binary } => cmd_assemble(&input, output, optimize, binary),
        Command::Run { input, inputs, max_cycles, breaks, optimize } => cmd_run(&input, &inputs, max_cycles, &breaks, optimize),
        Command::Optimize { input, annotate, output } => cmd_optimize(&input, annotate, output.as_deref()),
    };

    match result {
        Ok(_)  => ExitCode::SUCCESS,
        Err(e) => e,
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_addr(s: &str) -> Result<u16, String> {
    let value = Operand::parse(s)
        .and_then(|op| op.as_int())
        .map_err(|e| e.to_string())?;
    u16::try_from(value).map_err(|_| format!("{value} is not an address"))
}

macro_rules! handle {
    ($e:expr, $meta:expr) => {
        match $e {
            Ok(t) => t,
            Err(e) => {
                let _ = report_error(e, $meta);
                return Err(ExitCode::FAILURE);
            }
        }
    }
}

/// Parses (and optionally optimizes) the source file.
fn load_source(meta: &SourceMetadata, opt: Option<OptFlags>) -> Result<Vec<SourceNode>, ExitCode> {
    let mut nodes = handle!(parse_source(&meta.src), meta);
    if let Some(flags) = opt {
        let rewrites = optimize(&mut nodes, flags);
        tracing::debug!(rewrites, "optimized {}", meta.name);
    }
    Ok(nodes)
}

fn cmd_assemble(input: &Path, output: Option<PathBuf>, opt: bool, binary: bool) -> Result<(), ExitCode> {
    let meta = SourceMetadata {
        name: input.to_string_lossy(),
        src: handle_read(input, std::fs::read_to_string)?,
    };

    let mut nodes = load_source(&meta, opt.then(OptFlags::default))?;
    let image = handle!(assemble(&mut nodes), &meta);

    let output = output.unwrap_or_else(|| input.with_extension(if binary { "bin" } else { "mem" }));
    let bytes = match binary {
        true  => BinaryFormat::serialize(&image),
        false => MemFormat::serialize(&image).into_bytes(),
    };
    handle_write(&output, &bytes)?;
    tracing::debug!(words = image.word_count(), "wrote {}", output.display());

    Ok(())
}

fn cmd_run(input: &Path, inputs: &[String], max_cycles: u64, breaks: &[u16], opt: bool) -> Result<(), ExitCode> {
    let meta = SourceMetadata {
        name: input.to_string_lossy(),
        src: handle_read(input, std::fs::read_to_string)?,
    };

    let image: MemImage = match input.extension().and_then(|e| e.to_str()) {
        Some("mem") => handle!(MemFormat::deserialize(&meta.src), &meta),
        _ => {
            let mut nodes = load_source(&meta, opt.then(OptFlags::default))?;
            handle!(assemble(&mut nodes), &meta)
        },
    };
    let inputs = handle!(parse_inputs(inputs), &SourceMetadata { name: "--input".into(), src: inputs.join(" ") });

    let mut cpu = Cpu::new(Default::default());
    cpu.load_image(&image);
    for &addr in breaks {
        cpu.set_breakpoint(addr);
    }
    cpu.reset(inputs);

    let (tx, rx) = ChannelOutput::channel();
    cpu.set_output(tx);
    let printer = std::thread::spawn(move || {
        let mut stdout = std::io::stdout().lock();
        for out in rx {
            let _ = write!(stdout, "{out}");
            let _ = stdout.flush();
        }
    });

    let mut remaining = max_cycles;
    let result = loop {
        let start = cpu.cycles();
        let stop = cpu.run(remaining);
        remaining -= cpu.cycles() - start;

        match stop {
            Ok(StopReason::Breakpoint) => {
                let label = image.symbol_table().rev_lookup_label(cpu.pc)
                    .map(|l| format!(" ({l})"))
                    .unwrap_or_default();
                let regs: Vec<_> = cpu.reg_file.iter()
                    .enumerate()
                    .map(|(i, w)| format!("r{i}={}", w.as_signed()))
                    .collect();
                eprintln!("break at 0x{:04X}{label}: {}", cpu.pc, regs.join(" "));
            },
            r => break r,
        }
    };

    // close the channel so the printer finishes
    cpu.set_output(NullOutput);
    let _ = printer.join();
    println!();

    match result {
        Ok(StopReason::Halted) => {
            eprintln!("halted after {} cycles", cpu.cycles());
            Ok(())
        },
        Ok(_) => {
            eprintln!("stopped: exceeded {max_cycles} cycles (pc = 0x{:04X})", cpu.pc);
            Err(ExitCode::FAILURE)
        },
        Err(e) => {
            let _ = report_runtime_error(&e, &cpu, &image);
            Err(ExitCode::FAILURE)
        },
    }
}

fn cmd_optimize(input: &Path, annotate: bool, output: Option<&Path>) -> Result<(), ExitCode> {
    let meta = SourceMetadata {
        name: input.to_string_lossy(),
        src: handle_read(input, std::fs::read_to_string)?,
    };

    let nodes = load_source(&meta, Some(OptFlags { annotate }))?;
    let text = render(&nodes);
    match output {
        Some(path) => handle_write(path, text.as_bytes()),
        None => {
            print!("{text}");
            Ok(())
        },
    }
}

fn handle_read<'p, T>(input: &'p Path, read: impl FnOnce(&'p Path) -> std::io::Result<T>) -> Result<T, ExitCode> {
    read(input).map_err(|e| report_io_error(input, e))
}
fn handle_write(output: &Path, bytes: &[u8]) -> Result<(), ExitCode> {
    std::fs::write(output, bytes).map_err(|e| report_io_error(output, e))
}
fn report_io_error(path: &Path, e: std::io::Error) -> ExitCode {
    let _ = Report::<Range<_>>::build(ReportKind::Error, (), 0)
        .with_message(format!("{}: {e}", path.display()))
        .finish()
        .eprint(Source::from(""));

    ExitCode::FAILURE
}

/// Converts an error's location into a character range of the whole source.
fn source_range<E: anna_ensemble::err::Error>(err: &E, src: &str) -> Option<Range<usize>> {
    let line = err.line()?;
    let mut start = 0;
    let mut line_text = None;
    for (i, text) in src.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            line_text = Some(text.trim_end_matches(['\r', '\n']));
            break;
        }
        start += text.chars().count();
    }
    let line_text = line_text?;

    let chars = |end: usize| line_text.get(..end).map_or(0, |s| s.chars().count());
    Some(match err.span() {
        Some(span) => start + chars(span.start) .. start + chars(span.end),
        None => start .. start + line_text.chars().count(),
    })
}

fn report_error<E: anna_ensemble::err::Error>(err: E, meta: &SourceMetadata) -> std::io::Result<()> {
    let name = &*meta.name;

    match source_range(&err, &meta.src) {
        Some(range) => {
            let mut label = Label::new((name, range.clone()));
            if let Some(help) = err.help() {
                label = label.with_message(help);
            }

            Report::build(ReportKind::Error, name, range.start)
                .with_message(&err)
                .with_label(label)
                .finish()
                .eprint((name, Source::from(meta.src.as_str())))
        },
        None => {
            let mut report = Report::build(ReportKind::Error, name, 0)
                .with_message(&err);

            if let Some(help) = err.help() {
                report = report
                    .with_label(Label::new((name, 0..0)))
                    .with_help(help)
            };

            report
                .finish()
                .eprint((name, Source::from("")))
        },
    }
}

fn report_runtime_error(err: &anna_ensemble::err::SimErr, cpu: &Cpu, image: &MemImage) -> std::io::Result<()> {
    use anna_ensemble::err::Error;

    let location = match image.symbol_table().rev_lookup_label(cpu.pc) {
        Some(label) => format!("0x{:04X} ({label})", cpu.pc),
        None => format!("0x{:04X}", cpu.pc),
    };
    let mut report = Report::<Range<_>>::build(ReportKind::Error, (), 0)
        .with_message(format!("{err} at {location}"));
    if let Some(help) = err.help() {
        report = report.with_help(help);
    }
    report.finish().eprint(Source::from(""))
}
