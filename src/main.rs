use blsd::dump::{dump, BlsFile, DumpReport};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blsd", version, about = "Dump the shader source embedded in a BLS shader container")]
struct Cli {
    /// BLS container to read
    input: PathBuf,
    /// Print the container header and decode statistics to stderr
    #[arg(long)]
    info: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        // Wrong argument count is not a failure: show usage and do nothing.
        Err(_) => {
            eprintln!("{}", Cli::command().render_usage());
            return ExitCode::SUCCESS;
        }
    };

    init_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let bls = BlsFile::open(&cli.input)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let report = dump(&bls, &mut out)?;
    out.flush()?;

    if cli.info {
        print_info(cli, &report);
    }
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_info(cli: &Cli, report: &DumpReport) {
    let h = &report.header;
    eprintln!("── BLS container ────────────────────────────────────────");
    eprintln!("  Path              {}", cli.input.display());
    eprintln!("  Magic             {}", h.magic_fourcc());
    eprintln!("  Version           {:#x} ({})", h.version, h.format_version());
    eprintln!("  Permutations      {}", h.permutation_count);
    eprintln!("  Shaders declared  {}", h.n_shaders);
    eprintln!("  Chunk table       {} entries at +{}", h.n_compressed_chunks, h.ofs_compressed_chunks);
    eprintln!("  Data offset       {}", h.ofs_compressed_data);
    eprintln!("  Compressed        {} B", report.compressed_len);
    eprintln!("  Decompressed      {} B in {} stream(s)", report.inflated_len, report.streams);
    let truncated = if report.summary.truncated { " (+1 truncated)" } else { "" };
    eprintln!("  Shaders found     {}{}", report.summary.fragments, truncated);
    if let Some(fault) = &report.fault {
        eprintln!("  Decode stopped    {fault}");
    }
}
