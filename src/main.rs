/*!
 * Command-line interface for treegen
 */

use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;

use treegen::config::{Args, Config};
use treegen::error::Result;
use treegen::report::{Reporter, ScanReport};
use treegen::scanner::Scanner;
use treegen::session::SessionStore;
use treegen::utils::count_files;
use treegen::writer::TemplateWriter;

fn main() {
    let args = Args::parse();

    if let Some(shell) = args.generate {
        let mut command = Args::command();
        generate(shell, &mut command, "treegen", &mut io::stdout());
        return;
    }

    setup_logging(args.quiet, args.verbose);

    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            if e.is_config() {
                2
            } else {
                1
            }
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run(args: Args) -> Result<()> {
    let interactive = !args.cli;
    let quiet = args.quiet;
    let load_session = args.load_session;
    let save_session = args.save_session;
    let session_file = args.session.clone();

    let mut config = Config::from_args(args);
    let store = SessionStore::in_root(&config.root, &session_file);

    let reuse = load_session
        || (interactive
            && store.exists()
            && confirm(&format!(
                "Reuse the saved session from {}?",
                store.path().display()
            ))?);
    if reuse {
        store.restore_into(&mut config)?;
    }

    config.validate()?;

    if let Err(e) = ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()
    {
        log::warn!("Failed to set thread pool size: {}", e);
    }

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white} {pos}/{len} ({percent}%) Elapsed: {elapsed_precise}")
    {
        progress.set_style(style);
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_prefix("Setup");
    progress.set_message(format!("Scanning directory: {}", config.root.display()));

    let total_files = count_files(&config);
    progress.set_length(total_files);
    progress.set_prefix("Processing");

    let scanner = Scanner::new(config.clone(), Arc::new(progress.clone()));
    let writer = TemplateWriter::new(config.clone());

    let start_time = Instant::now();
    let root_node = scanner.scan()?;
    writer.write(&root_node)?;
    let duration = start_time.elapsed();

    progress.finish_and_clear();

    let stats = scanner.get_statistics();
    if !quiet {
        let report = ScanReport {
            output: config
                .output_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<stdout>".to_string()),
            duration,
            directories: stats.directories,
            files_listed: stats.files_listed,
            files_included: stats.files_included,
            excluded_entries: stats.excluded_entries,
            total_lines: stats.total_lines,
            total_chars: stats.total_chars,
            file_details: stats.file_details,
            diagnostics: stats.diagnostics,
        };
        Reporter::new().print_report(&report);
    }

    let save = save_session
        || (interactive
            && confirm(&format!(
                "Save this configuration to {}?",
                store.path().display()
            ))?);
    if save {
        store.save(&config)?;
    }

    Ok(())
}

/// Ask a yes/no question on stderr; anything but "y" means no
fn confirm(question: &str) -> io::Result<bool> {
    eprint!("{} [y/N] ", question);
    io::stderr().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}
