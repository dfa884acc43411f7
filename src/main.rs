use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use ironshard::verify::{Expectations, Mismatch};
use ironshard::{IngestOptions, LineSink, PlacementPolicy, ResultSink, RouterOptions, run_pipeline};

#[derive(Parser, Debug)]
#[command(name = "ironshard", version, about = "Sharded key/value placement router")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Route every record of a data file through the shard pool.
  Run(RunArgs),
  /// Verify an output file against the data file that produced it.
  Check(CheckArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
  /// Number of shards.
  #[arg(short = 'n', long = "num", value_parser = clap::value_parser!(u16).range(1..))]
  num: u16,

  /// Input data file.
  #[arg(short = 'f', long = "data", value_name = "FILE")]
  data: PathBuf,

  /// Write results here instead of stdout.
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,

  /// Ingestion buffer size in bytes. Must exceed the longest record.
  #[arg(long, default_value_t = IngestOptions::default().buffer_size)]
  buffer_size: usize,

  /// Keep objects on their first shard instead of re-placing every write.
  #[arg(long)]
  sticky: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
  /// Input data file.
  #[arg(short = 'f', long = "data", value_name = "FILE")]
  data: PathBuf,

  /// Output file produced by `run`.
  #[arg(short, long, value_name = "FILE")]
  output: PathBuf,

  /// Number of heaviest shards to list.
  #[arg(long, default_value_t = 10)]
  top: usize,
}

fn init_log() {
  use tracing::level_filters::LevelFilter;
  use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .with(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("IRONSHARD_LOG")
        .from_env_lossy(),
    )
    .init();
}

fn run(args: RunArgs) -> ironshard::Result<ExitCode> {
  tracing::info!("Bucket num = {} Data file = {}", args.num, args.data.display());

  let input = File::open(&args.data)?;
  let sink: Box<dyn ResultSink> = match &args.output {
    Some(path) => Box::new(LineSink::new(File::create(path)?)),
    None => Box::new(LineSink::new(io::stdout())),
  };

  let mut router_options = RouterOptions::new(args.num);
  if args.sticky {
    router_options.placement = PlacementPolicy::Sticky;
  }
  let mut ingest_options = IngestOptions::default();
  ingest_options.buffer_size = args.buffer_size;

  let report = run_pipeline(input, router_options, ingest_options, sink)?;
  tracing::info!("Time cost in seconds = {:.3}", report.elapsed.as_secs_f64());

  Ok(ExitCode::SUCCESS)
}

fn check(args: CheckArgs) -> ironshard::Result<ExitCode> {
  let expectations = Expectations::load(BufReader::new(File::open(&args.data)?))?;
  let report = expectations.check(BufReader::new(File::open(&args.output)?))?;

  for mismatch in &report.mismatches {
    match mismatch {
      Mismatch::WrongValue {
        request_id,
        expected,
        actual,
      } => println!("read response wrong for {}, required {}, got {}", request_id, expected, actual),
      Mismatch::InvalidShard { request_id, payload } => {
        println!("write response for {} is not a shard id: {}", request_id, payload)
      }
      Mismatch::UnknownRequest { request_id } => println!("unexpected request id {}", request_id),
      Mismatch::MalformedLine { line } => println!("malformed output line {:?}", line),
    }
  }
  if report.input_count != report.output_count {
    println!(
      "output count mismatch, required {}, got {}",
      report.input_count, report.output_count
    );
  }

  println!("top buckets:");
  for (shard_id, bytes) in report.heaviest(args.top) {
    println!("\t{}\t{}", shard_id, bytes);
  }

  Ok(if report.is_clean() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_log();

  let outcome = match cli.command {
    Commands::Run(args) => run(args),
    Commands::Check(args) => check(args),
  };

  match outcome {
    Ok(code) => code,
    Err(e) => {
      tracing::error!("{}", e);
      ExitCode::FAILURE
    }
  }
}
