//! CLI binary for SNV screening - ranks every point substitution of a
//! sequence by how well it disrupts and preserves the requested motifs

use clap::Parser;
use env_logger::Env;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use sitebreak_rs::{
    effects::{classify_substitutions, retain_sites_overlapping},
    report::{write_ranked_summaries, OutputConfig},
    scan::{
        motif_names_in_collection, motifs_matching_patterns, scan_grouped,
        validate_scanner_config, ScannerConfig,
    },
    seq::SequenceWithSnv,
    utils::{get_num_cpus, Timer},
    validate_thresholds, ScanThresholds, SiteBreakError, SiteBreakResult,
};

#[derive(Parser)]
#[command(name = "snv_screen")]
#[command(about = "snv_screen - rank point substitutions against a disrupt/preserve objective")]
#[command(long_about = "
snv_screen evaluates every possible point substitution of the sequence around
an SNV against an explicit objective: a set of motifs whose sites should be
disrupted and a set of motifs whose sites should be preserved.

For each allele of the SNV, all substitutions (except at the SNV position
itself) are scored with an external motif scanner. Each substitution gets a
quality score rewarding achieved disruption and preservation and penalizing
objective motifs that have no site to act on. Substitutions are reported in
descending quality order to output_allele_<X>.txt, one file per allele.

Motifs to disrupt and to preserve are selected by regular expression patterns
matched against the names of the motif collection.
")]
struct Args {
    /// SNV sequence in bracket notation, e.g. ACGT[A/G]TGCA
    #[arg(value_name = "SEQUENCE")]
    sequence: String,

    /// Motif name pattern for motifs to be disrupted (repeatable)
    #[arg(short = 'd', long = "disrupt", value_name = "PATTERN")]
    disrupt: Vec<String>,

    /// Motif name pattern for motifs to be preserved (repeatable)
    #[arg(short = 'p', long = "preserve", value_name = "PATTERN")]
    preserve: Vec<String>,

    /// Fold change threshold to treat a P-value change as significant
    #[arg(long, default_value = "5.0")]
    fold_change_cutoff: f64,

    /// P-value to treat a word as a site
    #[arg(long, default_value = "0.0005")]
    pvalue_cutoff: f64,

    /// Directory with the motif collection (*.pwm files)
    #[arg(long, value_name = "DIR", default_value = "./motif_collection")]
    motif_collection: PathBuf,

    /// Path to the scanner jar
    #[arg(long, value_name = "FILE", default_value = "ape.jar")]
    ape_jar: PathBuf,

    /// Java executable used to run the scanner
    #[arg(long, value_name = "FILE", default_value = "java")]
    java: PathBuf,

    /// Directory with precalculated motif thresholds
    #[arg(long, value_name = "DIR")]
    thresholds: Option<PathBuf>,

    /// Only consider sites whose word overlaps the SNV position
    #[arg(long)]
    only_sites_overlapping_snv: bool,

    /// Write reports to stdout instead of output_allele_<X>.txt files
    #[arg(long)]
    stdout: bool,

    /// Show all sites in sequence (not only sites of interest)
    #[arg(long)]
    show_all_sites: bool,

    /// Show per-site detail lines
    #[arg(long)]
    show_site_details: bool,

    /// Don't show attentions about missing sites
    #[arg(long)]
    hide_attentions: bool,

    /// Don't show strong violations about sites whose behavior is opposite to desired
    #[arg(long)]
    hide_strong_violations: bool,

    /// Suppress a substitution when any objective site is missing
    #[arg(long)]
    suppress_on_sites_missing: bool,

    /// Suppress a substitution when any disruption target is missing
    #[arg(long)]
    suppress_on_disrupted_sites_missing: bool,

    /// Suppress a substitution when any preservation target is missing
    #[arg(long)]
    suppress_on_preserved_sites_missing: bool,

    /// Suppress a substitution on any strong violation
    #[arg(long)]
    suppress_on_strong_violations: bool,

    /// Suppress a substitution when a site to preserve was disrupted
    #[arg(long)]
    suppress_on_disrupted_what_should_be_preserved: bool,

    /// Suppress a substitution when a site to disrupt was preserved
    #[arg(long)]
    suppress_on_preserved_what_should_be_disrupted: bool,

    /// Suppress a substitution when a site to disrupt emerged instead
    #[arg(long)]
    suppress_on_emerged_what_should_be_disrupted: bool,

    /// Number of worker threads for scoring substitutions
    #[arg(long, default_value_t = get_num_cpus())]
    num_threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn output_config(args: &Args) -> OutputConfig {
    OutputConfig {
        show_all_sites: args.show_all_sites,
        show_attentions: !args.hide_attentions,
        show_strong_violations: !args.hide_strong_violations,
        show_site_details: args.show_site_details,
        suppress_on_disrupted_sites_missing: args.suppress_on_sites_missing
            || args.suppress_on_disrupted_sites_missing,
        suppress_on_preserved_sites_missing: args.suppress_on_sites_missing
            || args.suppress_on_preserved_sites_missing,
        suppress_on_disrupted_what_should_be_preserved: args.suppress_on_strong_violations
            || args.suppress_on_disrupted_what_should_be_preserved,
        suppress_on_preserved_what_should_be_disrupted: args.suppress_on_strong_violations
            || args.suppress_on_preserved_what_should_be_disrupted,
        suppress_on_emerged_what_should_be_disrupted: args.suppress_on_strong_violations
            || args.suppress_on_emerged_what_should_be_disrupted,
    }
}

fn run() -> SiteBreakResult<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    log::info!("Starting SNV substitution screen");
    log::info!("Motif collection: {:?}", args.motif_collection);
    log::info!("Number of threads: {}", args.num_threads);

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .build_global()
        .map_err(|e| {
            SiteBreakError::InvalidConfig(format!("failed to initialize thread pool: {}", e))
        })?;

    let snv = SequenceWithSnv::from_text(&args.sequence.to_uppercase())?;

    let thresholds = ScanThresholds {
        fold_change_cutoff: args.fold_change_cutoff,
        pvalue_cutoff: args.pvalue_cutoff,
        strong_pvalue_cutoff: None,
    };
    validate_thresholds(&thresholds)?;

    let scanner = ScannerConfig {
        java: args.java.clone(),
        ape_jar: args.ape_jar.clone(),
        motif_collection: args.motif_collection.clone(),
        thresholds_dir: args.thresholds.clone(),
        extra_args: Vec::new(),
    };
    validate_scanner_config(&scanner)?;

    let motif_names = motif_names_in_collection(&scanner.motif_collection)?;
    let to_be_disrupted: HashSet<String> = motifs_matching_patterns(&motif_names, &args.disrupt)?;
    let to_be_preserved: HashSet<String> = motifs_matching_patterns(&motif_names, &args.preserve)?;

    let mut disrupted_names: Vec<&str> = to_be_disrupted.iter().map(String::as_str).collect();
    disrupted_names.sort_unstable();
    let mut preserved_names: Vec<&str> = to_be_preserved.iter().map(String::as_str).collect();
    preserved_names.sort_unstable();
    eprintln!("Motifs to be disrupted:\n{}", disrupted_names.join(","));
    eprintln!("Motifs to be preserved:\n{}", preserved_names.join(","));

    let config = output_config(&args);

    for allele_index in 0..2 {
        let allele = snv.alleles()[allele_index];
        let sequence = snv.sequence_variant(allele_index);
        // the SNV position stays fixed within each allele
        let variants = sequence.all_substitutions(&[snv.snv_position()]);

        let mut groups = {
            let _timer = Timer::new("Scanning substitutions");
            scan_grouped(&scanner, &variants)?
        };

        if args.only_sites_overlapping_snv {
            retain_sites_overlapping(&mut groups, snv.snv_position())?;
        }

        let _timer = Timer::new("Classifying substitutions");
        let ranked =
            classify_substitutions(&groups, thresholds, &to_be_disrupted, &to_be_preserved)?;

        if args.stdout {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            writeln!(out, "### Allele variant: {}", allele)?;
            write_ranked_summaries(&config, &sequence, &ranked, &mut out)?;
        } else {
            let path = format!("output_allele_{}.txt", allele);
            log::info!("Writing report to {}", path);
            let mut out = BufWriter::new(File::create(&path)?);
            write_ranked_summaries(&config, &sequence, &ranked, &mut out)?;
        }
    }

    log::info!("Screen completed successfully");
    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: SiteBreakError) -> ! {
    match error {
        SiteBreakError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the file exists and is readable.");
        }
        SiteBreakError::InvalidSequence(msg) => {
            eprintln!("Error: Invalid sequence: {}", msg);
            eprintln!("Sequences must use bracket notation, e.g. ACGT[A/G]TGCA.");
        }
        SiteBreakError::InvalidSubstitution(msg) => {
            eprintln!("Error: Invalid substitution: {}", msg);
        }
        SiteBreakError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check your cutoffs, patterns and file paths.");
        }
        SiteBreakError::ScannerFailed(msg) => {
            eprintln!("Error: Motif scanner failed: {}", msg);
            eprintln!("Please check the java executable, the jar path and the motif collection.");
        }
        SiteBreakError::MalformedRecord(msg) => {
            eprintln!("Error: Malformed scanner record: {}", msg);
            eprintln!("The scanner output does not match the expected tab-separated layout.");
        }
        SiteBreakError::Csv(ref e) => {
            eprintln!("Error: Data processing error: {}", e);
        }
        SiteBreakError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
