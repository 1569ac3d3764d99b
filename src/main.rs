//! # Recode CLI - Character Set Converter
//!
//! Command-line interface for iconv-style character set conversion between
//! files and standard streams.

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::io::{self, Read, Write};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use anyhow::{Context, Result, bail};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use serde::Serialize;

#[cfg(feature = "cli")]
use recode::Handle;

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features disabled. Enable with --features cli");
    std::process::exit(1);
}

/// Recode: iconv-style character set converter
#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "recode")]
#[command(version, about, long_about = None)]
#[command(author = "Recode Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Convert data between character encodings
    Convert(ConvertArgs),

    /// Resolve an encoding identifier to its canonical name
    Resolve(ResolveArgs),
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON output
    Json,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ConvertArgs {
    /// Source encoding
    #[arg(short = 'f', long = "from")]
    from: String,

    /// Target encoding (may carry //TRANSLIT or //IGNORE)
    #[arg(short = 't', long = "to")]
    to: String,

    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Substitute ? for characters the target cannot represent
    #[arg(long, conflicts_with = "ignore")]
    translit: bool,

    /// Drop invalid and unconvertible units instead of failing
    #[arg(long)]
    ignore: bool,

    /// Ceiling on converted output size in bytes
    #[arg(long)]
    max_output: Option<usize>,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ResolveArgs {
    /// Encoding identifier to look up
    label: String,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct Resolution<'a> {
    label: &'a str,
    canonical: Option<&'static str>,
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Convert(args) => run_convert(&args),
        Commands::Resolve(args) => run_resolve(&args, cli.format),
    }
}

#[cfg(feature = "cli")]
fn run_convert(args: &ConvertArgs) -> Result<()> {
    // Modifier flags become identifier suffixes; the codec interprets them.
    let mut to = args.to.clone();
    if args.translit {
        to.push_str("//TRANSLIT");
    } else if args.ignore {
        to.push_str("//IGNORE");
    }

    let mut handle = match args.max_output {
        Some(limit) => Handle::open_with_limit(&to, &args.from, limit),
        None => Handle::open(&to, &args.from),
    }
    .with_context(|| format!("opening conversion {} -> {}", args.from, to))?;

    let src = match &args.input {
        Some(path) => fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };

    let converted = handle
        .convert_borrowed(&src)
        .with_context(|| format!("converting {} -> {}", args.from, to))?;

    match &args.output {
        Some(path) => {
            fs::write(path, converted).with_context(|| format!("writing {}", path.display()))?
        }
        None => io::stdout()
            .write_all(converted)
            .context("writing stdout")?,
    }

    handle.close().context("closing handle")?;
    Ok(())
}

#[cfg(feature = "cli")]
fn run_resolve(args: &ResolveArgs, format: OutputFormat) -> Result<()> {
    let canonical = recode::canonical_name(&args.label);
    match format {
        OutputFormat::Text => match canonical {
            Some(name) => println!("{}", name),
            None => bail!("unknown encoding {:?}", args.label),
        },
        OutputFormat::Json => {
            let resolution = Resolution {
                label: &args.label,
                canonical,
            };
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
    }
    Ok(())
}
