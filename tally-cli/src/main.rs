mod cli;
mod config;
mod error;
mod output;

use crate::{
    cli::{Args, OutputFormat},
    config::AppConfig,
    error::Result,
    output::{OutputManager, write_output},
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use std::process;
use tally::{CancellationToken, JsonLinesSource, ProgressReporter, StreamSampler};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

fn main() {
    let args = Args::parse();
    let output_format = args.output;

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            process::exit(1);
        }
    };

    let result = runtime.block_on(run(args));
    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_background();

    if let Err(e) = result {
        if output_format.is_json() {
            let error_json = serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            });
            println!("{error_json}");
        } else {
            error!("Application error: {}", e);
            #[cfg(feature = "colored-output")]
            {
                eprintln!("{} {}", "Error:".red().bold(), e);
            }
            #[cfg(not(feature = "colored-output"))]
            {
                eprintln!("Error: {}", e);
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_args(&args);
    debug!("Effective configuration: {:?}", config);

    if args.show_config {
        println!("{}", config.show()?);
        return Ok(());
    }

    let output = OutputManager::new(!args.no_color && args.output_file.is_none())
        .with_repeat_threshold(config.report.repeat_threshold);

    let source = if args.input == "-" {
        JsonLinesSource::stdin()
    } else {
        JsonLinesSource::open(&args.input).await?
    };
    let sampler = StreamSampler::new(source).with_phrase_rule(config.phrase_rule());

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, finishing the report");
                cancel.cancel();
            }
        })
    };

    let reporter_cancel = cancel.child_token();
    let reporter = config.report_interval().map(|period| {
        ProgressReporter::new(sampler.counters(), period).spawn(reporter_cancel.clone())
    });

    if args.output == OutputFormat::Pretty {
        eprint!("{}", output.banner(&config.term));
    }

    let run = sampler
        .run(&config.term, config.sample_duration(), cancel)
        .await;

    reporter_cancel.cancel();
    if let Some(reporter) = reporter
        && let Err(e) = reporter.await
    {
        warn!("Progress reporter ended abnormally: {}", e);
    }
    ctrl_c.abort();

    let run = run?;
    let report = run.result.build_report(&config.report);
    let content = output.format_run(&run, &report, args.output)?;
    write_output(&content, args.output_file.as_deref())?;

    if let Some(path) = &args.output_file {
        info!("Report written to {}", path.display());
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
}
