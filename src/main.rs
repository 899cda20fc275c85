#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use log::{error, info};
use structopt::StructOpt;

use chunkzip::{DEFAULT_BLOCK_SIZE, DEFAULT_MAX_CHUNK_LEN};

////////////////////////////////////////////////////////////////////////////////

#[derive(StructOpt, Debug)]
#[structopt(about = "LZO1X chunk streams and streaming gzip/pkzip inflation")]
struct Opts {
    /// Increase logging verbosity (repeatable)
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Silence all log output
    #[structopt(short, long)]
    quiet: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Compress into a chunk stream
    Pack {
        #[structopt(long)]
        block_size: Option<usize>,
        #[structopt(parse(from_os_str))]
        input: Option<PathBuf>,
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Decompress a chunk stream
    Unpack {
        #[structopt(long)]
        max_chunk: Option<usize>,
        #[structopt(parse(from_os_str))]
        input: Option<PathBuf>,
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Inflate a gzip file or single-entry zip archive
    Inflate {
        /// Bytes handed to the decompressor per call
        #[structopt(long, default_value = "65536")]
        fragment_size: usize,
        #[structopt(parse(from_os_str))]
        input: Option<PathBuf>,
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
}

////////////////////////////////////////////////////////////////////////////////

fn open_input(path: &Option<PathBuf>) -> Result<(Box<dyn Read>, Option<u64>)> {
    match path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            let len = file.metadata()?.len();
            let reader: Box<dyn Read> = Box::new(BufReader::new(file));
            Ok((reader, Some(len)))
        }
        None => {
            let reader: Box<dyn Read> = Box::new(io::stdin());
            Ok((reader, None))
        }
    }
}

fn open_output(path: &Option<PathBuf>) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(writer)
}

fn inflate(input: impl Read, output: impl Write, fragment_size: usize) -> Result<()> {
    let input = BufReader::with_capacity(fragment_size, input);
    chunkzip::decompress(input, output).context("inflate failed")?;
    info!("inflated stream");
    Ok(())
}

fn run(opts: Opts) -> Result<()> {
    match opts.command {
        Command::Pack {
            block_size,
            input,
            output,
        } => {
            let block_size = block_size.unwrap_or(DEFAULT_BLOCK_SIZE);
            ensure!(block_size > 0, "block size must be positive");
            let (input, len) = open_input(&input)?;
            let total_hint = len.and_then(|len| u32::try_from(len).ok()).unwrap_or(0);
            let total = chunkzip::pack(input, open_output(&output)?, block_size, total_hint)?;
            info!("packed {} bytes", total);
        }
        Command::Unpack {
            max_chunk,
            input,
            output,
        } => {
            let (input, _) = open_input(&input)?;
            let max_chunk = max_chunk.unwrap_or(DEFAULT_MAX_CHUNK_LEN);
            let total = chunkzip::unpack(input, open_output(&output)?, max_chunk)?;
            info!("unpacked {} bytes", total);
        }
        Command::Inflate {
            fragment_size,
            input,
            output,
        } => {
            ensure!(fragment_size > 0, "fragment size must be positive");
            let (input, _) = open_input(&input)?;
            inflate(input, open_output(&output)?, fragment_size)?;
        }
    }
    Ok(())
}

fn main() {
    let opts = Opts::from_args();
    if let Err(err) = stderrlog::new()
        .module(module_path!())
        .quiet(opts.quiet)
        .verbosity(opts.verbose + 1)
        .init()
    {
        eprintln!("failed to set up logging: {}", err);
    }

    if let Err(err) = run(opts) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

////////////////////////////////////////////////////////////////////////////////
