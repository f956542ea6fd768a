use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use clinmeta::config::RunConfig;
use clinmeta::llm::{build_client, preflight};
use clinmeta::pipeline::{counter_from_config, PipelineError, PipelineRunner, RunSummary};
use clinmeta::sources::InputBundle;
use clinmeta::translate::build_translator;

#[derive(Parser, Debug)]
#[command(about = "Extract structured oncology metadata from hospital record exports", version)]
struct Args {
    /// Input bundle (JSON, one array per source).
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Run configuration (JSON). Defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Skip the per-date other-cancers report.
    #[arg(long)]
    no_other_cancers: bool,

    /// Override the configured LLM model.
    #[arg(long, value_name = "NAME")]
    model: Option<String>,
}

fn load_config(args: &Args) -> Result<RunConfig, PipelineError> {
    let mut config = RunConfig::load(args.config.as_deref())?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if args.no_other_cancers {
        config.other_cancers_report = false;
    }
    config.validate()?;
    Ok(config)
}

fn run(config: &RunConfig, args: &Args) -> Result<RunSummary, PipelineError> {
    let bundle = InputBundle::load(&args.input)?;

    let client = build_client(&config.llm)?;
    preflight(client.as_ref(), &config.llm.model);

    let counter = counter_from_config(config)?;
    let translator = build_translator(&config.translation, client.as_ref(), &config.llm.model)?;

    PipelineRunner::new(config, client.as_ref(), counter.as_ref(), translator.as_ref()).run(&bundle)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = clinmeta::init_tracing(config.log_file.as_deref()) {
        eprintln!("Cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    match run(&config, &args) {
        Ok(summary) => {
            println!(
                "{} rows written to {}",
                summary.rows_written,
                summary.main_report.display()
            );
            if let Some(path) = &summary.other_cancers_report {
                println!(
                    "{} other-cancers rows written to {}",
                    summary.other_cancer_rows,
                    path.display()
                );
            }
            println!(
                "{} patients skipped, {} of {} LLM requests failed",
                summary.patients_skipped, summary.requests_failed, summary.requests_sent
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Pipeline run failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
