//! CLI binary for selective site break analysis - finds substitutions that
//! disrupt a target TF family's site without collateral effects

use clap::Parser;
use env_logger::Env;
use std::collections::HashSet;
use std::path::PathBuf;
use sitebreak_rs::{
    assess::{screen_candidates, FamilyScopedAssessment},
    family::{
        families_for_motifs, motif_uniprot_id, EmptyResolver, FamilyResolver, TableResolver,
    },
    report::{format_snv_marking_position, write_candidate_report},
    scan::{
        motif_names_in_collection, motifs_matching_patterns, scan, scan_grouped,
        validate_scanner_config, ScannerConfig,
    },
    seq::{NamedVariant, SequenceWithSnv, SubstitutionLabel},
    site::SiteRecord,
    utils::{get_num_cpus, validate_file_readable, Timer},
    validate_thresholds, ScanThresholds, SiteBreakError, SiteBreakResult,
};

#[derive(Parser)]
#[command(name = "sitebreak")]
#[command(about = "sitebreak - selective disruption of transcription factor binding sites")]
#[command(long_about = "
sitebreak searches a sequence around a known SNV for point substitutions that
selectively disrupt the binding sites of a chosen transcription factor family.

For each allele of the SNV, every possible substitution in the sequence is
scored with an external motif scanner. A substitution is reported when it
disrupts a site of the requested family at the SNV position while leaving no
reliable motif of any other TF family disrupted, emerged or relocated.

Target motifs are selected by case-insensitive regular expression patterns
matched against the names of the motif collection. TF family annotations are
read from a tab-separated classification table (uniprot id, level, families).

Reported candidates are ranked by the number of reliably affected off-target
families, best first.
")]
struct Args {
    /// SNV sequence in bracket notation, e.g. ACGT[A/G]TGCA
    #[arg(value_name = "SEQUENCE")]
    sequence: String,

    /// Motif name patterns (case-insensitive regex) selecting the motifs to disrupt
    #[arg(value_name = "PATTERN", required = true)]
    patterns: Vec<String>,

    /// Fold change threshold to treat a P-value change as significant
    #[arg(long, default_value = "4.0")]
    fold_change_cutoff: f64,

    /// P-value to treat a word as a site
    #[arg(long, default_value = "0.0005")]
    pvalue_cutoff: f64,

    /// P-value to treat a site as a strong site in report codes
    #[arg(long)]
    strong_pvalue_cutoff: Option<f64>,

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

    /// TF classification table (uniprot id, level, families; tab-separated)
    #[arg(long, value_name = "FILE")]
    tf_classes: Option<PathBuf>,

    /// TF classification level used for family comparison
    #[arg(long, default_value = "3")]
    family_level: u8,

    /// Number of threads to use for parallel classification
    #[arg(long, default_value_t = get_num_cpus())]
    num_threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
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

    log::info!("Starting selective site break analysis");
    log::info!("Motif collection: {:?}", args.motif_collection);
    log::info!("Patterns: {:?}", args.patterns);
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
        strong_pvalue_cutoff: args.strong_pvalue_cutoff,
    };
    validate_thresholds(&thresholds)?;

    let scanner = ScannerConfig {
        java: args.java,
        ape_jar: args.ape_jar,
        motif_collection: args.motif_collection,
        thresholds_dir: args.thresholds,
        extra_args: Vec::new(),
    };
    validate_scanner_config(&scanner)?;

    let resolver: Box<dyn FamilyResolver> = match &args.tf_classes {
        Some(path) => {
            validate_file_readable(path)?;
            Box::new(TableResolver::from_path(path)?)
        }
        None => Box::new(EmptyResolver),
    };

    let motif_names = motif_names_in_collection(&scanner.motif_collection)?;
    let target_motifs = motifs_matching_patterns(&motif_names, &args.patterns)?;
    if target_motifs.is_empty() {
        return Err(SiteBreakError::InvalidConfig(format!(
            "no motifs in {:?} match the given patterns",
            scanner.motif_collection
        )));
    }

    let target_families =
        resolve_target_families(resolver.as_ref(), &target_motifs, args.family_level)?;

    let mut sorted_targets: Vec<&str> = target_motifs.iter().map(String::as_str).collect();
    sorted_targets.sort_unstable();
    println!("Motifs matching pattern: {}", sorted_targets.join("; "));
    println!("Families to disrupt: {}", target_families.join("; "));
    println!("{}", snv);
    println!("Factor: {}", args.patterns.join(", "));

    // Score the reference SNV itself; its predictions anchor the same-site
    // provenance checks.
    let reference_sites = {
        let _timer = Timer::new("Scanning reference SNV");
        let reference_variant = NamedVariant {
            label: SubstitutionLabel::primary(snv.snv_position(), snv.alleles()[1]),
            sequence: snv.clone(),
        };
        scan(&scanner, &[reference_variant])?
    };
    for line in target_site_summary_lines(
        &reference_sites,
        &target_motifs,
        &target_families,
        resolver.as_ref(),
        args.family_level,
        &thresholds,
    ) {
        println!("{}", line);
    }

    for allele_index in 0..2 {
        let allele = snv.alleles()[allele_index];
        println!("======================");
        println!("Allele variant: {}", allele);
        println!("======================");

        let sequence = snv.sequence_variant(allele_index);
        let variants = sequence.all_substitutions(&[]);

        let groups = {
            let _timer = Timer::new("Scanning substitutions");
            scan_grouped(&scanner, &variants)?
        };

        let _timer = Timer::new("Screening substitutions");
        let calls = screen_candidates(
            &groups,
            &reference_sites,
            thresholds,
            &target_motifs,
            snv.snv_position(),
            resolver.as_ref(),
            args.family_level,
        )?;

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for call in calls.iter().filter(|call| call.reportable) {
            let sites = &groups[&call.label.to_string()];
            let assessment = FamilyScopedAssessment::new(
                sites,
                &reference_sites,
                thresholds,
                &target_motifs,
                snv.snv_position() as i64 - call.label.pos as i64,
                resolver.as_ref(),
                args.family_level,
            );
            let candidate_snv = sequence.snv_from_label(&call.label)?;
            let snv_text = format_snv_marking_position(&candidate_snv, snv.snv_position());
            write_candidate_report(&mut out, &assessment, &call.label, &snv_text)?;
        }
    }

    log::info!("Analysis completed successfully");
    Ok(())
}

/// Family labels of the requested motifs. Without any family annotation the
/// objective check can never succeed, so an empty resolution is a
/// configuration error surfaced before any scanner call.
fn resolve_target_families(
    resolver: &dyn FamilyResolver,
    target_motifs: &HashSet<String>,
    family_level: u8,
) -> SiteBreakResult<Vec<String>> {
    let families = families_for_motifs(
        resolver,
        target_motifs.iter().map(String::as_str),
        family_level,
    );
    if families.is_empty() {
        return Err(SiteBreakError::InvalidConfig(
            "target motifs resolve to no TF families; supply --tf-classes with annotations \
             for the requested motifs"
                .to_string(),
        ));
    }
    Ok(families)
}

/// Reference predictions of the target families, strongest first. Requested
/// motifs are marked `*`, family cousins `-`.
fn target_site_summary_lines(
    reference_sites: &[SiteRecord],
    target_motifs: &HashSet<String>,
    target_families: &[String],
    resolver: &dyn FamilyResolver,
    family_level: u8,
    thresholds: &ScanThresholds,
) -> Vec<String> {
    let mut targets: Vec<&SiteRecord> = reference_sites
        .iter()
        .filter(|site| {
            resolver
                .families(motif_uniprot_id(&site.motif), family_level)
                .iter()
                .any(|family| target_families.contains(family))
        })
        .collect();
    targets.sort_by(|a, b| {
        let a_best = a.pvalue_1.min(a.pvalue_2);
        let b_best = b.pvalue_1.min(b.pvalue_2);
        a_best.partial_cmp(&b_best).unwrap_or(std::cmp::Ordering::Equal)
    });

    targets
        .iter()
        .map(|site| {
            let requested = if target_motifs.contains(&site.motif) {
                '*'
            } else {
                '-'
            };
            let present = if site.has_site_on_any_allele(thresholds.pvalue_cutoff) {
                '+'
            } else {
                '-'
            };
            format!(
                "{}\t{}\t{}\tlog2-Fold change {:7.2}: from P-value of {:7.2e} to P-value of {:7.2e}\t{} --> {}",
                requested,
                present,
                site.motif,
                site.log2_fold_change(),
                site.pvalue_1,
                site.pvalue_2,
                site.seq_1,
                site.seq_2
            )
        })
        .collect()
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
