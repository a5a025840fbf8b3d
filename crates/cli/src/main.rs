//! `transcode`: convert a document between interchange formats.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use interchange::{Codec, CodecError, CodecRegistry, Transform, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Parser, Debug)]
#[command(name = "transcode", version, about, long_about = None)]
struct Args {
    /// Source format: codec name, media type or file name. Defaults to the
    /// input file name.
    #[arg(long, env = "TRANSCODE_FROM")]
    from: Option<String>,

    /// Target format, resolved like --from. Defaults to the output file name.
    #[arg(long, env = "TRANSCODE_TO")]
    to: Option<String>,

    /// Write the target format's human-readable rendering
    #[arg(long, conflicts_with = "stream")]
    print: bool,

    /// Decode and re-encode chunk by chunk with the streaming codecs
    #[arg(long)]
    stream: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Input file; stdin when omitted
    input: Option<PathBuf>,

    /// Output file; stdout when omitted
    output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot determine the {side} format, pass --{side}")]
    MissingFormat { side: &'static str },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Codec names take precedence over media types and file names.
fn resolve(registry: &CodecRegistry, query: &str) -> Result<Arc<dyn Codec>, CodecError> {
    match registry.by_name(query) {
        Some(codec) => Ok(Arc::clone(codec)),
        None => registry.resolve(query).map(Arc::clone),
    }
}

fn pick(
    registry: &CodecRegistry,
    flag: Option<&str>,
    path: Option<&Path>,
    side: &'static str,
) -> Result<Arc<dyn Codec>, CliError> {
    let query = match (flag, path) {
        (Some(flag), _) => flag.to_owned(),
        (None, Some(path)) => path.to_string_lossy().into_owned(),
        (None, None) => return Err(CliError::MissingFormat { side }),
    };
    Ok(resolve(registry, &query)?)
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>, CliError> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(File::open(path).map_err(|source| {
            CliError::File {
                path: path.to_path_buf(),
                source,
            }
        })?)),
        None => Box::new(io::stdin().lock()),
    })
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, CliError> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|source| {
            CliError::File {
                path: path.to_path_buf(),
                source,
            }
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn convert(
    source: &dyn Codec,
    target: &dyn Codec,
    print: bool,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<(), CliError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let value = source.decode(&bytes)?;
    debug!(kind = value.kind(), bytes = bytes.len(), "input decoded");
    if print {
        output.write_all(target.print(&value)?.as_bytes())?;
    } else {
        output.write_all(&target.encode(&value)?)?;
    }
    Ok(())
}

/// Pipes input chunks through `source`'s streaming decoder into `target`'s
/// streaming encoder.
fn convert_stream(
    source: &dyn Codec,
    target: &dyn Codec,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<(), CliError> {
    let mut decoder = source.decoder().ok_or(CodecError::UnsupportedOperation {
        codec: source.name(),
        operation: "decoder",
    })?;
    let mut encoder = target.encoder().ok_or(CodecError::UnsupportedOperation {
        codec: target.name(),
        operation: "encoder",
    })?;
    let mut values: VecDeque<Value> = VecDeque::new();
    let mut chunks: VecDeque<Vec<u8>> = VecDeque::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut count = 0usize;
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            decoder.finish(&mut values)?;
        } else {
            decoder.push(buf[..n].to_vec(), &mut values)?;
        }
        for value in values.drain(..) {
            count += 1;
            encoder.push(value, &mut chunks)?;
        }
        if n == 0 {
            encoder.finish(&mut chunks)?;
        }
        for chunk in chunks.drain(..) {
            output.write_all(&chunk)?;
        }
        if n == 0 {
            break;
        }
    }
    debug!(values = count, "stream converted");
    Ok(())
}

fn run(args: &Args) -> Result<(), CliError> {
    let registry = CodecRegistry::with_defaults();
    let source = pick(&registry, args.from.as_deref(), args.input.as_deref(), "from")?;
    let target = pick(&registry, args.to.as_deref(), args.output.as_deref(), "to")?;
    info!(from = source.name(), to = target.name(), stream = args.stream, "transcoding");

    let mut input = open_input(args.input.as_deref())?;
    let mut output = open_output(args.output.as_deref())?;
    if args.stream {
        convert_stream(source.as_ref(), target.as_ref(), &mut input, &mut output)?;
    } else {
        convert(source.as_ref(), target.as_ref(), args.print, &mut input, &mut output)?;
    }
    output.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("transcode: {err}");
            ExitCode::FAILURE
        }
    }
}
