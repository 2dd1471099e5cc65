use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use std::sync::mpsc::channel;

use imgcheck::cli::{self, Commands};
use imgcheck::launcher::CheckerConfig;
use imgcheck::runner::{self, CheckerEvent};
use imgcheck::transcript::Transcript;
use imgcheck::tui::{App, run_tui};
use imgcheck::{Origin, RunRequest, classify, stats};

fn main() -> Result<()> {
    let args = cli::parse_args();

    let config = CheckerConfig {
        program: args.checker.clone(),
        wsl: args.wsl,
    };

    match args.command {
        None => {
            let app = App::new(config, args.image, args.verbose, args.repair);
            run_tui(app)?;
        }
        Some(Commands::Run(run_args)) => {
            let mut request = RunRequest::new(run_args.image);
            request.verbose = args.verbose;
            request.repair = args.repair;
            handle_run(config, request)?;
        }
        Some(Commands::Stats(stats_args)) => {
            handle_stats(&stats_args.file)?;
        }
    }

    Ok(())
}

/// Handle the headless run command: stream the checker's output to the
/// terminal and print the pass/fail summary at the end.
///
/// Exits non-zero when any `[FAIL]` marker was seen. The child's own exit
/// code does not feed into the accounting; only the textual markers do.
fn handle_run(config: CheckerConfig, request: RunRequest) -> Result<()> {
    if !request.image_exists() {
        bail!("not a valid image file: {}", request.image.display());
    }

    let (tx, rx) = channel();
    let _handle = runner::start(config, request, tx);

    let mut transcript = Transcript::new();
    loop {
        // The drainer always ends the stream with a completion event.
        let event = rx.recv().context("checker output channel closed early")?;
        match event {
            CheckerEvent::Stdout(line) => {
                println!("{}", line.trim_end());
                transcript.push(classify::classify(Origin::Stdout, &line), &line);
            }
            CheckerEvent::Stderr(line) => {
                eprintln!("{}", line.trim_end());
                transcript.push(classify::classify(Origin::Stderr, &line), &line);
            }
            CheckerEvent::Exited { .. } => break,
        }
    }

    let summary = stats::scan(&transcript.text());
    println!();
    println!("{}", stats::render(summary));

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Handle the stats command: re-scan a saved transcript and print the summary.
fn handle_stats(file: &Path) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read transcript {}", file.display()))?;

    println!("{}", stats::render(stats::scan(&text)));
    Ok(())
}
