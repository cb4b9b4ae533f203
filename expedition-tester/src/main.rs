mod logic;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use expedition_engine::{ConfigSource, EncounterConfig, FileConfigSource, format_transcript};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use logic::{BatchPlan, BatchTester, SeedReport, resolve_seed_inputs, split_csv};

#[derive(Debug, Parser)]
#[command(name = "expedition-tester", version = "0.1.0")]
#[command(
    about = "Batch QA runs for the expedition engine: determinism, termination and ending rates"
)]
struct Args {
    /// Encounter configuration JSON (defaults to the bundled configuration)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seeds to run (comma-separated, ranges as start..end)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Members in each synthetic party
    #[arg(long, default_value_t = 3)]
    party_size: usize,

    /// Runs per seed; each run offsets the seed by its index
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Append the transcript of the first seed's run to the report
    #[arg(long)]
    transcript: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    announce_banner();

    let start_time = Instant::now();
    let config = load_config(&args)?;
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let tester = BatchTester::new(config, args.verbose);
    let plan = BatchPlan {
        party_size: args.party_size,
        iterations: args.iterations,
    };

    log::info!(
        "encounter config {} with {} encounters",
        tester.config().version,
        tester.config().encounters.len()
    );
    log::info!(
        "running {} seeds x {} iterations with party size {}",
        seeds.len(),
        plan.iterations,
        plan.party_size
    );
    let results = tester.run_seeds(&seeds, plan);

    let mut output_target = OutputTarget::new(args.output.clone())?;
    write_reports(&mut output_target, &args, &results, start_time)?;
    if args.transcript {
        write_transcript(&mut output_target, &tester, &args, &seeds)?;
    }
    output_target.flush_inner()?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

/// Goes to stderr so report output on stdout stays machine-readable.
fn announce_banner() {
    eprintln!("{}", "🧭 Expedition Batch Tester".bright_cyan().bold());
    eprintln!("{}", "==========================".cyan());
}

fn load_config(args: &Args) -> Result<EncounterConfig> {
    match &args.config {
        Some(path) => FileConfigSource::new(path)
            .load_encounter_config()
            .with_context(|| format!("failed to load encounter config {}", path.display())),
        None => EncounterConfig::bundled().context("bundled encounter config is invalid"),
    }
}

fn write_reports(
    output_target: &mut OutputTarget,
    args: &Args,
    results: &[SeedReport],
    start_time: Instant,
) -> Result<()> {
    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(output_target.writer(), results)?,
        "markdown" => logic::reports::generate_markdown_report(output_target.writer(), results)?,
        _ => {
            let duration = start_time.elapsed();
            logic::reports::generate_console_report(output_target.writer(), results, duration)?;
            writeln!(output_target.writer())?;
            writeln!(output_target.writer(), "🏁 Total time: {duration:?}")?;
        }
    }
    Ok(())
}

fn write_transcript(
    output_target: &mut OutputTarget,
    tester: &BatchTester,
    args: &Args,
    seeds: &[u64],
) -> Result<()> {
    let Some(&seed) = seeds.first() else {
        bail!("no seed available for a transcript");
    };
    let result = tester
        .simulate(args.party_size, seed)
        .with_context(|| format!("failed to simulate transcript run for seed {seed}"))?;
    writeln!(output_target.writer())?;
    writeln!(output_target.writer(), "Transcript (seed {seed}):")?;
    write!(output_target.writer(), "{}", format_transcript(&result))?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            config: None,
            seeds: "1337".to_string(),
            party_size: 3,
            iterations: 2,
            report: "json".to_string(),
            output: None,
            transcript: false,
            verbose: false,
        }
    }

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("expedition-tester-{name}-{}", std::process::id()))
    }

    fn run_to_file(args: &Args, path: &PathBuf) -> String {
        let config = load_config(args).unwrap();
        let seeds = resolve_seed_inputs(&split_csv(&args.seeds)).unwrap();
        let tester = BatchTester::new(config, false);
        let plan = BatchPlan {
            party_size: args.party_size,
            iterations: args.iterations,
        };
        let results = tester.run_seeds(&seeds, plan);
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        write_reports(&mut target, args, &results, Instant::now()).unwrap();
        if args.transcript {
            write_transcript(&mut target, &tester, args, &seeds).unwrap();
        }
        target.flush_inner().unwrap();
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn bundled_config_loads_without_a_path() {
        let config = load_config(&base_args()).unwrap();
        assert!(!config.encounters.is_empty());
    }

    #[test]
    fn missing_config_path_reports_context() {
        let args = Args {
            config: Some(PathBuf::from("/definitely/not/here.json")),
            ..base_args()
        };
        let err = load_config(&args).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load encounter config"));
    }

    #[test]
    fn json_report_lists_every_seed() {
        let path = temp_file("report.json");
        let args = Args {
            seeds: "4,5".to_string(),
            ..base_args()
        };
        let content = run_to_file(&args, &path);
        let parsed: Vec<SeedReport> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.iter().map(|r| r.seed).collect::<Vec<_>>(), vec![4, 5]);
        assert!(parsed.iter().all(|r| r.passed));
    }

    #[test]
    fn markdown_report_with_transcript() {
        let path = temp_file("report.md");
        let args = Args {
            report: "markdown".to_string(),
            transcript: true,
            ..base_args()
        };
        let content = run_to_file(&args, &path);
        assert!(content.contains("# Expedition Batch Results"));
        assert!(content.contains("Transcript (seed 1337):"));
        assert!(content.contains("Rewards:"));
    }

    #[test]
    fn console_report_includes_total_time() {
        let path = temp_file("report.txt");
        let args = Args {
            report: "console".to_string(),
            ..base_args()
        };
        let content = run_to_file(&args, &path);
        assert!(content.contains("Expedition Batch Summary"));
        assert!(content.contains("Total time"));
    }

    #[test]
    fn output_target_stdout_writes() {
        let mut target = OutputTarget::new(None).unwrap();
        target.writer().write_all(b"ok").unwrap();
        target.flush_inner().unwrap();
    }
}
