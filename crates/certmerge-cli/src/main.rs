// CLI tool has display-oriented conversions and long command handlers.
#![allow(
    clippy::too_many_lines,         // command handlers read top to bottom
    clippy::cast_possible_truncation // row counts fit progress-bar u64s
)]

//! certmerge - batch certificate generator.
//!
//! Reads an Excel roster, substitutes `<<Name>>` markers into a DOCX
//! template, and emits one PDF per recipient plus an optional combined
//! PDF. Fatal input problems (no template, no roster, missing required
//! column) abort the run; individual recipient failures are logged and
//! the batch continues.

mod config;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use certmerge_core::{marker_token, Journal, ReplacementMap};
use certmerge_docx::{
    build_certificate, check_template_placeholders, default_builders, find_template_file,
    DocxPackage,
};
use certmerge_pdf::{combined_pdf_name, merge_pdfs, PdfConverter};
use certmerge_roster::{find_roster_file, load_roster};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use config::{ConfigFile, Settings};

/// Marker names always fed from the roster and certificate settings.
const STANDARD_MARKERS: [&str; 7] = [
    "Ho_va_ten",
    "Phap_danh",
    "Nam_sinh",
    "Don_vi",
    "Do",
    "Tai",
    "Ngay",
];

#[derive(Parser)]
#[command(
    name = "certmerge",
    version,
    about = "Batch certificate generator: Excel roster + DOCX template -> PDF"
)]
struct Args {
    /// Configuration file (default: ./certmerge.toml merged over ~/.certmerge.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Working folder containing input/, templates/, output/
    #[arg(long, global = true, default_value = ".", value_name = "DIR")]
    base_dir: PathBuf,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate certificates for every roster row
    Generate {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Keep the intermediate DOCX files next to the PDFs
        #[arg(long)]
        keep_docx: bool,

        /// Show the fallback document host window for manual inspection
        #[arg(long)]
        host_ui: bool,
    },
    /// Scan the template and report its placeholders
    Check,
    /// Print the parsed roster
    Roster,
}

/// The working folders of one run, all under the base directory.
struct Folders {
    input: PathBuf,
    templates: PathBuf,
    output: PathBuf,
    temp: PathBuf,
    logs: PathBuf,
}

impl Folders {
    fn at(base: &Path) -> Self {
        Self {
            input: base.join("input"),
            templates: base.join("templates"),
            output: base.join("output"),
            temp: base.join("temp"),
            logs: base.join("logs"),
        }
    }

    fn create(&self) -> io::Result<()> {
        for dir in [&self.input, &self.templates, &self.output, &self.temp, &self.logs] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.quiet, args.verbose);

    let (config, sources) = ConfigFile::discover(args.config.as_deref(), &args.base_dir)?;
    for source in &sources {
        log::info!("loaded configuration from {}", source.display());
    }
    let settings = config.resolve();

    match &args.command {
        Commands::Generate {
            yes,
            keep_docx,
            host_ui,
        } => cmd_generate(&args, &settings, *yes, *keep_docx, *host_ui),
        Commands::Check => cmd_check(&args, &settings),
        Commands::Roster => cmd_roster(&args, &settings),
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

/// Every marker token a run can resolve: the standard vocabulary plus the
/// configured custom placeholders.
fn mapped_tokens(settings: &Settings) -> BTreeSet<String> {
    STANDARD_MARKERS
        .iter()
        .map(|name| marker_token(name))
        .chain(settings.placeholders.keys().map(|key| marker_token(key)))
        .collect()
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn cmd_generate(
    args: &Args,
    settings: &Settings,
    yes: bool,
    keep_docx: bool,
    host_ui: bool,
) -> Result<()> {
    let folders = Folders::at(&args.base_dir);
    folders.create().context("failed to create working folders")?;
    let journal = Journal::open(&folders.logs);

    let (template, extra_templates) = find_template_file(&folders.templates)?;
    if extra_templates > 0 {
        journal.warn(format!(
            "{extra_templates} extra template(s) ignored, using {}",
            template.display()
        ));
    }
    journal.info(format!("using template {}", template.display()));

    let roster_path = find_roster_file(&folders.input)?;
    journal.info(format!("reading roster {}", roster_path.display()));
    let recipients = load_roster(&roster_path, &settings.roster, &journal)?;
    if recipients.is_empty() {
        anyhow::bail!("roster contains no usable rows");
    }

    // Pre-flight: warn about markers the run cannot resolve.
    let found = {
        let package = DocxPackage::open(&template)?;
        check_template_placeholders(&package)
    };
    let mapped = mapped_tokens(settings);
    for token in found.iter().filter(|token| !mapped.contains(*token)) {
        journal.warn(format!("template marker {token} has no mapped value"));
        eprintln!(
            "{} {token} appears in the template but has no value",
            "Warning:".yellow().bold()
        );
    }

    if !yes
        && !confirm(&format!(
            "Generate {} certificates? [y/N] ",
            recipients.len()
        ))?
    {
        eprintln!("Cancelled.");
        return Ok(());
    }

    let builders = default_builders(host_ui);
    let converter = PdfConverter::locate();
    if converter.is_none() {
        journal.warn("no PDF converter on PATH, keeping DOCX outputs");
        eprintln!(
            "{} no PDF converter found, outputs stay as DOCX",
            "Warning:".yellow().bold()
        );
    }

    let total = recipients.len();
    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut succeeded = 0usize;
    let mut pdf_files: Vec<PathBuf> = Vec::new();

    for recipient in &recipients {
        progress.set_message(recipient.full_name.clone());
        let map =
            ReplacementMap::for_recipient(recipient, &settings.certificate, &settings.placeholders);
        let stem = recipient.file_stem();
        let temp_docx = folders.temp.join(format!("{stem}.docx"));

        let result = build_certificate(&builders, &template, &map, &temp_docx, &journal).and_then(
            |outcome| {
                journal.debug(format!(
                    "{stem} built via {} ({} regions)",
                    outcome.engine, outcome.regions_replaced
                ));
                match &converter {
                    Some(converter) => converter.convert(&temp_docx, &folders.output).map(Some),
                    None => {
                        fs::copy(&temp_docx, folders.output.join(format!("{stem}.docx")))?;
                        Ok(None)
                    }
                }
            },
        );

        match result {
            Ok(Some(pdf)) => {
                succeeded += 1;
                journal.info(format!("done: {}", pdf.display()));
                progress.println(format!("  {} {}", "✓".green(), recipient.full_name));
                pdf_files.push(pdf);
            }
            Ok(None) => {
                succeeded += 1;
                journal.info(format!("done: {stem}.docx (no converter)"));
                progress.println(format!(
                    "  {} {} {}",
                    "✓".green(),
                    recipient.full_name,
                    "(DOCX kept)".dimmed()
                ));
            }
            Err(error) => {
                journal.error(format!("{} failed: {error}", recipient.full_name));
                let line = format!("  {} {} ({error})", "✗".red(), recipient.full_name);
                if args.quiet {
                    eprintln!("{line}");
                } else {
                    progress.println(line);
                }
            }
        }

        if keep_docx && temp_docx.is_file() {
            let _ = fs::copy(&temp_docx, folders.output.join(format!("{stem}.docx")));
        }
        let _ = fs::remove_file(&temp_docx);
        progress.inc(1);
    }
    progress.finish_and_clear();

    if settings.create_combined_pdf && !pdf_files.is_empty() {
        pdf_files.sort();
        let stem = combined_pdf_name(&settings.combined_pdf_name, &Local::now());
        let target = folders.output.join(format!("{stem}.pdf"));
        match merge_pdfs(&pdf_files, &target) {
            Ok(pages) => {
                journal.info(format!("combined PDF: {} ({pages} pages)", target.display()));
                eprintln!(
                    "{} {} ({pages} pages)",
                    "Combined:".green().bold(),
                    target.display()
                );
            }
            Err(error) => {
                // Per-recipient PDFs are kept; only the extra is skipped.
                journal.warn(format!("combined PDF failed: {error}"));
                eprintln!(
                    "{} could not build combined PDF: {error}",
                    "Warning:".yellow().bold()
                );
            }
        }
    }

    if let Ok(entries) = fs::read_dir(&folders.temp) {
        for entry in entries.flatten() {
            let _ = fs::remove_file(entry.path());
        }
    }

    let failed = total - succeeded;
    if !args.quiet {
        eprintln!("\n{}", "=== Generation Summary ===".bold());
        eprintln!("  Total:     {total}");
        eprintln!("  Succeeded: {}", succeeded.to_string().green());
        eprintln!(
            "  Failed:    {}",
            if failed > 0 {
                failed.to_string().red()
            } else {
                failed.to_string().normal()
            }
        );
        eprintln!("  Output:    {}", folders.output.display());
    }
    journal.info(format!("run finished: {succeeded}/{total} succeeded"));
    journal.flush();

    // Recipient failures are reported, not fatal.
    Ok(())
}

fn cmd_check(args: &Args, settings: &Settings) -> Result<()> {
    let folders = Folders::at(&args.base_dir);
    let (template, _) = find_template_file(&folders.templates)?;
    let package = DocxPackage::open(&template)?;
    let found = check_template_placeholders(&package);
    let mapped = mapped_tokens(settings);

    println!("Template: {}", template.display());
    if found.is_empty() {
        println!("No <<...>> markers found.");
        return Ok(());
    }

    println!("Markers found:");
    for token in &found {
        if mapped.contains(token) {
            println!("  {} {token}", "✓".green());
        } else {
            println!("  {} {token} {}", "✗".yellow(), "(no value mapped)".dimmed());
        }
    }

    let unused: Vec<&String> = mapped.iter().filter(|token| !found.contains(*token)).collect();
    if !unused.is_empty() {
        println!("Mapped but absent from the template:");
        for token in unused {
            println!("  - {token}");
        }
    }
    Ok(())
}

fn cmd_roster(args: &Args, settings: &Settings) -> Result<()> {
    let folders = Folders::at(&args.base_dir);
    let roster_path = find_roster_file(&folders.input)?;
    let recipients = load_roster(&roster_path, &settings.roster, &Journal::disabled())?;

    println!(
        "Roster: {} ({} rows)",
        roster_path.display(),
        recipients.len()
    );
    println!(
        "{:>4} | {:25} | {:15} | {:8} | {}",
        "Tt", "Họ và tên", "Pháp danh", "Năm sinh", "Đơn vị"
    );
    println!("{}", "-".repeat(80));
    for recipient in &recipients {
        println!(
            "{:>4} | {:25} | {:15} | {:8} | {}",
            recipient.seq,
            recipient.full_name,
            recipient.dharma_name,
            recipient.birth_year,
            recipient.unit
        );
    }
    Ok(())
}
