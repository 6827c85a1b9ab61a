//! Job runner for rune-decrypt
//!
//! Loads a job's tables relative to a data directory, runs every selected
//! document concurrently on the blocking pool and formats the outcome of
//! each. The `rune-decrypt` binary is a thin argument layer over these
//! functions.

use rune_decrypt::gematria::COMMENT_DELIMITER;
use rune_decrypt::grammar::{DedupOptions, GrammarCompiler, SampledProbe, TokenPools};
use rune_decrypt::loader;
use rune_decrypt::settings::{JOB_SETTINGS_SCHEMA, SettingKind, display_name};
use rune_decrypt::{
    DecryptError, DecryptResult, Decryptor, Formula, JobSettings, ProgressSink, TranslationOutcome,
    eliminate_equivalent,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tracing::{info, warn};

/// Resolve a job path against the data directory, accepting either
/// separator style
pub fn resolve(data_dir: &Path, relative: &str) -> PathBuf {
    let mut path = data_dir.to_path_buf();
    for component in relative.split(['/', '\\']).filter(|c| !c.is_empty()) {
        path.push(component);
    }
    path
}

/// Find a job file: the path as given, otherwise `<data_dir>/jobs/<name>`
/// with a `.json` extension added when missing
pub fn locate_job(data_dir: &Path, job: &str) -> PathBuf {
    let given = PathBuf::from(job);
    if given.exists() {
        return given;
    }
    let mut path = resolve(&data_dir.join("jobs"), job);
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        path.set_extension("json");
    }
    path
}

/// Settings as `• Label: value` lines, with every path checked.
///
/// Returns the lines and whether all required paths exist.
pub fn describe_settings(settings: &JobSettings, data_dir: &Path) -> (Vec<String>, bool) {
    let described = settings.describe();
    let mut all_valid = true;
    let mut lines = Vec::with_capacity(described.len());

    for (entry, (label, value)) in JOB_SETTINGS_SCHEMA.iter().zip(described) {
        let suffix = match entry.kind {
            SettingKind::OptionalPath if value.is_empty() => " (built-in)",
            SettingKind::Path | SettingKind::OptionalPath => {
                if resolve(data_dir, &value).exists() {
                    " (valid path)"
                } else {
                    all_valid = false;
                    " (invalid path)"
                }
            }
            _ => "",
        };
        lines.push(format!(" \u{2022} {}: {}{}", label, value, suffix));
    }

    (lines, all_valid)
}

/// The documents selected by `FileNamesToDecrypt`, sorted by path.
/// Selected names missing from the directory are reported and skipped.
pub fn select_documents(settings: &JobSettings, data_dir: &Path) -> DecryptResult<Vec<PathBuf>> {
    let directory = resolve(data_dir, &settings.datafile_directory);
    let entries = fs::read_dir(&directory).map_err(|e| {
        DecryptError::IoError(format!(
            "Failed to read directory '{}': {}",
            directory.display(),
            e
        ))
    })?;

    let mut selected = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| DecryptError::IoError(format!("Error reading directory entry: {}", e)))?;
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if path.is_file() && settings.file_names_to_decrypt.iter().any(|n| n == name) {
            selected.push(path);
        }
    }
    selected.sort();

    for name in &settings.file_names_to_decrypt {
        if !selected.iter().any(|p| p.ends_with(name)) {
            warn!(file = %name, directory = %directory.display(), "selected file not found");
        }
    }

    Ok(selected)
}

/// Load the gematria, n-gram and π tables a job needs
pub fn build_decryptor(settings: &JobSettings, data_dir: &Path) -> DecryptResult<Decryptor> {
    let gematria = loader::load_gematria(&resolve(data_dir, &settings.gematria_path))?;
    let maths = load_maths(settings, data_dir)?;
    let model = loader::load_language_model(
        &resolve(data_dir, &settings.ngram_statistics_path),
        settings.ngram_width,
    )?;
    Ok(Decryptor::new(
        gematria,
        maths,
        model,
        settings.is_shift_mode,
    ))
}

fn load_maths(settings: &JobSettings, data_dir: &Path) -> DecryptResult<rune_decrypt::Maths> {
    let pi_path =
        (!settings.pi_path.is_empty()).then(|| resolve(data_dir, &settings.pi_path));
    loader::load_maths(pi_path.as_deref(), settings.sieve_limit)
}

/// Options for regenerating a job's attempt list
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub rules: PathBuf,
    pub replacements: PathBuf,
    /// Enabled tokens; empty enables every supported token
    pub tokens: Vec<String>,
    /// Present when equivalent attempts should be eliminated
    pub dedup: Option<DedupOptions>,
}

/// Compile the grammar into a job's attempt list.
///
/// With `dedup` set, attempts that agree on a random sample are dropped.
/// That test is probabilistic: distinct attempts can be discarded and
/// equivalent ones kept, and an unseeded run is not reproducible.
pub fn generate_attempts(
    settings: &JobSettings,
    data_dir: &Path,
    options: &GenerateOptions,
) -> DecryptResult<Vec<String>> {
    let pools = if options.tokens.is_empty() {
        TokenPools::all()
    } else {
        TokenPools::from_selection(options.tokens.as_slice())?
    };
    let compiler = GrammarCompiler::new(
        pools,
        loader::load_rules(&options.rules)?,
        loader::load_replacements(&options.replacements)?,
    );
    let attempts = compiler.compile()?;

    let Some(dedup) = &options.dedup else {
        return Ok(attempts.iter().collect());
    };

    let gematria = loader::load_gematria(&resolve(data_dir, &settings.gematria_path))?;
    let maths = load_maths(settings, data_dir)?;
    let probe = SampledProbe::random(&gematria, dedup);
    let distinct: Vec<String> = eliminate_equivalent(attempts.iter(), &probe, &maths)
        .map(|formula| formula.text().to_string())
        .collect();

    info!(
        generated = attempts.len(),
        kept = distinct.len(),
        "eliminated equivalent attempts"
    );
    Ok(distinct)
}

/// Logs document progress at every tenth of the attempt list
#[derive(Debug)]
pub struct ProgressLogger {
    document: String,
    next_decile: u32,
}

impl ProgressLogger {
    pub fn new(document: impl Into<String>) -> Self {
        ProgressLogger {
            document: document.into(),
            next_decile: 1,
        }
    }
}

impl ProgressSink for ProgressLogger {
    fn report(&mut self, fraction: f64) {
        let decile = (fraction * 10.0).floor() as u32;
        if decile >= self.next_decile {
            info!(document = %self.document, percent = decile * 10, "decryption progress");
            self.next_decile = decile + 1;
        }
    }
}

/// Lines that carry cipher text: anything left once ASCII letters, digits,
/// whitespace and comment markers are removed
pub fn runic_line_count(source: &str) -> usize {
    source
        .lines()
        .filter(|line| {
            line.replace(COMMENT_DELIMITER, "")
                .chars()
                .any(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
        })
        .count()
}

/// Whole-job progress, weighted by each document's runic line count
#[derive(Debug, Clone)]
pub struct JobProgress {
    total: usize,
    done: usize,
}

impl JobProgress {
    pub fn new(total: usize) -> Self {
        JobProgress { total, done: 0 }
    }

    /// Mark a document of `weight` lines finished and return the job percentage
    pub fn record(&mut self, weight: usize) -> f64 {
        self.done = (self.done + weight).min(self.total);
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 * 100.0 / self.total as f64
        }
    }

    /// Time still needed at the current rate, or `None` before any weight is done
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        if self.done == 0 {
            return None;
        }
        let projected = elapsed.mul_f64(self.total as f64 / self.done as f64);
        Some(projected.saturating_sub(elapsed))
    }
}

/// Outcome of one document of a job
#[derive(Debug)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub outcome: DecryptResult<TranslationOutcome>,
    pub elapsed: Duration,
}

/// Run every document on its own blocking task. Reports come back in the
/// order of `paths`, and job progress is logged as each one is collected.
pub async fn run_documents(
    decryptor: Arc<Decryptor>,
    formulas: Arc<[Formula]>,
    paths: Vec<PathBuf>,
) -> Result<Vec<DocumentReport>, JoinError> {
    let to_weigh = paths.clone();
    let weights: Vec<usize> = tokio::task::spawn_blocking(move || {
        to_weigh
            .iter()
            .map(|path| {
                fs::read_to_string(path)
                    .map(|source| runic_line_count(&source))
                    .unwrap_or(0)
            })
            .collect()
    })
    .await?;
    let mut job = JobProgress::new(weights.iter().sum());
    let job_started = Instant::now();

    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let decryptor = Arc::clone(&decryptor);
            let formulas = Arc::clone(&formulas);
            tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                let mut progress = ProgressLogger::new(path.display().to_string());
                let outcome = loader::load_document(&path)
                    .map(|document| decryptor.attempt(&formulas, &document, &mut progress));
                DocumentReport {
                    path,
                    outcome,
                    elapsed: started.elapsed(),
                }
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (handle, weight) in handles.into_iter().zip(weights) {
        let report = handle.await?;
        let percent = job.record(weight);
        let remaining = job.remaining(job_started.elapsed()).unwrap_or_default();
        info!(
            document = %report.path.display(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            job_percent = percent.round() as u64,
            remaining_ms = remaining.as_millis() as u64,
            "document finished"
        );
        reports.push(report);
    }
    Ok(reports)
}

/// Human readable summary of a translation outcome
pub fn format_outcome(outcome: &TranslationOutcome) -> String {
    let candidate = match outcome {
        TranslationOutcome::Found(candidate) => candidate,
        TranslationOutcome::NoAcceptableResult => {
            return "Unable to find an acceptable result.".to_string();
        }
    };

    let mut summary = format!("The optimum result is using attempt \"{}\"", candidate.formula);
    if !candidate.skips.is_empty() {
        let skips: Vec<String> = candidate.skips.iter().map(usize::to_string).collect();
        summary.push_str(&format!(
            " (and skipping rune {} {})",
            if skips.len() > 1 { "indices" } else { "index" },
            skips.join(", ")
        ));
    }
    summary.push_str(", with ");
    if candidate.shift != 0 {
        summary.push_str(&format!("a shift of {} and ", candidate.shift));
    }
    summary.push_str(&format!(
        "score {:.3}:\n{}",
        candidate.score,
        candidate.text.trim_end_matches(['\r', '\n'])
    ));
    summary
}

/// Print the settings schema: names, kinds and defaults
pub fn schema_table() -> Vec<String> {
    JOB_SETTINGS_SCHEMA
        .iter()
        .map(|entry| {
            format!(
                "{:<20} {:<13} {:<22} {}",
                entry.name,
                format!("{:?}", entry.kind),
                if entry.default.is_empty() {
                    "(empty)"
                } else {
                    entry.default
                },
                display_name(entry.name)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rune_decrypt::Candidate;
    use tempfile::TempDir;

    const GEMATRIA: &str = "A 0 2 A\nB 1 3 B\nC 2 5 C\nD 3 7 D\nE 4 11 E\n\
                            F 5 13 F\nG 6 17 G\nH 7 19 H\nI 8 23 I\nJ 9 29 J\n";
    const BIGRAMS: &str = "AB 40\nBC 30\nCD 20\nDE 10\nEF 5\n";

    /// A data directory with tables, two sections and a job
    fn data_dir() -> (TempDir, JobSettings) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("ngrams")).unwrap();
        fs::create_dir_all(root.join("sections")).unwrap();
        fs::create_dir_all(root.join("grammar")).unwrap();
        fs::write(root.join("Gematria.txt"), GEMATRIA).unwrap();
        fs::write(root.join("ngrams/Bigrams.txt"), BIGRAMS).unwrap();
        fs::write(root.join("sections/1.txt"), "ABCDEF\n").unwrap();
        fs::write(root.join("sections/0.txt"), "skips 0\nJABCDE\n").unwrap();
        fs::write(root.join("sections/notes.md"), "ignored").unwrap();
        fs::write(
            root.join("grammar/Rules.txt"),
            "<decryption>::=<single>|<single><single><op>\n",
        )
        .unwrap();
        fs::write(root.join("grammar/Replacements.txt"), "p p -;0\n").unwrap();

        let mut settings = JobSettings::default();
        for assignment in [
            "GematriaPath=Gematria.txt",
            "NgramWidth=2",
            "NgramStatisticsPath=ngrams/Bigrams.txt",
            "FileNamesToDecrypt=1.txt,0.txt,missing.txt",
            "Attempts=1 p /,p 1 +,p",
            "PiPath=",
            "SieveLimit=1000",
        ] {
            settings.apply_override(assignment).unwrap();
        }
        (dir, settings)
    }

    #[test]
    fn test_resolve_accepts_both_separators() {
        let base = Path::new("data");
        assert_eq!(
            resolve(base, "ngrams/Trigrams.txt"),
            base.join("ngrams").join("Trigrams.txt")
        );
        assert_eq!(resolve(base, "sections\\"), base.join("sections"));
    }

    #[test]
    fn test_locate_job() {
        let (dir, settings) = data_dir();
        let jobs = dir.path().join("jobs");
        fs::create_dir_all(&jobs).unwrap();
        loader::save_job_settings(&jobs.join("first.json"), &settings).unwrap();

        assert_eq!(locate_job(dir.path(), "first"), jobs.join("first.json"));
        assert_eq!(
            locate_job(dir.path(), "first.json"),
            jobs.join("first.json")
        );

        let direct = jobs.join("first.json");
        let direct = direct.to_str().unwrap();
        assert_eq!(
            locate_job(Path::new("elsewhere"), direct),
            PathBuf::from(direct)
        );
    }

    #[test]
    fn test_describe_settings_checks_paths() {
        let (dir, mut settings) = data_dir();
        let (lines, valid) = describe_settings(&settings, dir.path());
        assert!(valid);
        assert_eq!(lines.len(), JOB_SETTINGS_SCHEMA.len());
        assert_eq!(
            lines[0],
            " \u{2022} Gematria Path: Gematria.txt (valid path)"
        );
        assert!(lines.iter().any(|l| l.ends_with("Pi Path:  (built-in)")));

        settings.set("GematriaPath", "Other.txt").unwrap();
        let (_, valid) = describe_settings(&settings, dir.path());
        assert!(!valid);
    }

    #[test]
    fn test_select_documents_sorted_and_filtered() {
        let (dir, settings) = data_dir();
        let selected = select_documents(&settings, dir.path()).unwrap();
        let names: Vec<_> = selected
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["0.txt", "1.txt"]);
    }

    #[test]
    fn test_select_documents_missing_directory() {
        let (dir, mut settings) = data_dir();
        settings.set("DatafileDirectory", "nowhere/").unwrap();
        assert!(matches!(
            select_documents(&settings, dir.path()),
            Err(DecryptError::IoError(_))
        ));
    }

    #[test]
    fn test_generate_attempts() {
        let (dir, settings) = data_dir();
        let options = GenerateOptions {
            rules: dir.path().join("grammar/Rules.txt"),
            replacements: dir.path().join("grammar/Replacements.txt"),
            tokens: vec!["+".to_string(), "-".to_string(), "p".to_string()],
            dedup: None,
        };
        let attempts = generate_attempts(&settings, dir.path(), &options).unwrap();
        assert_eq!(attempts, vec!["p", "p p +", "0"]);

        let deduplicated = generate_attempts(
            &settings,
            dir.path(),
            &GenerateOptions {
                tokens: vec!["+".to_string(), "p".to_string(), "i".to_string()],
                dedup: Some(DedupOptions {
                    seed: Some(3),
                    ..DedupOptions::default()
                }),
                ..options
            },
        )
        .unwrap();
        // "i p +" repeats "p i +"
        assert_eq!(deduplicated, vec!["p", "i", "p p +", "p i +", "i i +"]);
    }

    #[test]
    fn test_generate_rejects_unknown_token() {
        let (dir, settings) = data_dir();
        let options = GenerateOptions {
            rules: dir.path().join("grammar/Rules.txt"),
            replacements: dir.path().join("grammar/Replacements.txt"),
            tokens: vec!["sqrt".to_string()],
            dedup: None,
        };
        assert!(matches!(
            generate_attempts(&settings, dir.path(), &options),
            Err(DecryptError::GrammarError(_))
        ));
    }

    #[test]
    fn test_progress_logger_deciles() {
        let mut logger = ProgressLogger::new("doc");
        logger.report(0.05);
        assert_eq!(logger.next_decile, 1);
        logger.report(0.25);
        assert_eq!(logger.next_decile, 3);
        logger.report(1.0);
        assert_eq!(logger.next_decile, 11);
    }

    #[test]
    fn test_format_outcome() {
        assert_eq!(
            format_outcome(&TranslationOutcome::NoAcceptableResult),
            "Unable to find an acceptable result."
        );

        let outcome = TranslationOutcome::Found(Candidate {
            formula: "p i +".to_string(),
            shift: 2,
            score: -3.14159,
            text: "HELLO\n".to_string(),
            skips: vec![4, 9],
        });
        assert_eq!(
            format_outcome(&outcome),
            "The optimum result is using attempt \"p i +\" (and skipping rune indices 4, 9), \
             with a shift of 2 and score -3.142:\nHELLO"
        );
    }

    #[test]
    fn test_schema_table_lists_every_setting() {
        let table = schema_table();
        assert_eq!(table.len(), JOB_SETTINGS_SCHEMA.len());
        assert!(table[0].starts_with("GematriaPath"));
    }

    // ========== Job Runner ==========

    #[test]
    fn test_runic_line_count() {
        let source = "skips 0\n\u{16A0}\u{16A2}-\u{16A6}\n// notes\n\n  12 abc\nend.\n";
        // the rune line and the line ending in '.'
        assert_eq!(runic_line_count(source), 2);
        assert_eq!(runic_line_count(""), 0);
    }

    #[test]
    fn test_job_progress_is_weighted() {
        let mut job = JobProgress::new(4);
        assert_eq!(job.remaining(Duration::from_secs(5)), None);

        assert_eq!(job.record(1), 25.0);
        assert_eq!(
            job.remaining(Duration::from_secs(10)),
            Some(Duration::from_secs(30))
        );

        assert_eq!(job.record(3), 100.0);
        assert_eq!(
            job.remaining(Duration::from_secs(40)),
            Some(Duration::ZERO)
        );

        assert_eq!(JobProgress::new(0).record(0), 100.0);
    }

    #[tokio::test]
    async fn test_run_documents_in_input_order() {
        let (dir, settings) = data_dir();
        let decryptor = Arc::new(build_decryptor(&settings, dir.path()).unwrap());
        let formulas: Arc<[Formula]> = settings
            .attempts
            .iter()
            .map(|a| Formula::new(a.as_str()))
            .collect();

        let mut paths = select_documents(&settings, dir.path()).unwrap();
        paths.push(dir.path().join("sections/absent.txt"));

        let reports = run_documents(decryptor, formulas, paths).await.unwrap();
        assert_eq!(reports.len(), 3);

        // 0.txt: J passes through, the rest decrypt with "p"
        match &reports[0].outcome {
            Ok(TranslationOutcome::Found(candidate)) => {
                assert!(reports[0].path.ends_with("0.txt"));
                assert_eq!(candidate.formula, "p");
                assert_eq!(candidate.text, "JABCDE\n");
                assert_eq!(candidate.skips, vec![0]);
            }
            other => panic!("Expected Found, got {:?}", other),
        }

        match &reports[1].outcome {
            Ok(TranslationOutcome::Found(candidate)) => {
                assert!(reports[1].path.ends_with("1.txt"));
                assert_eq!(candidate.text, "ABCDEF\n");
            }
            other => panic!("Expected Found, got {:?}", other),
        }

        assert!(matches!(reports[2].outcome, Err(DecryptError::IoError(_))));
    }

    #[tokio::test]
    async fn test_job_file_round_trip_through_runner() {
        let (dir, settings) = data_dir();
        let job = dir.path().join("job.json");
        loader::save_job_settings(&job, &settings).unwrap();

        let loaded = loader::load_job_settings(&job).unwrap();
        assert_eq!(loaded, settings);

        let decryptor = Arc::new(build_decryptor(&loaded, dir.path()).unwrap());
        let formulas: Arc<[Formula]> = vec![Formula::new("p")].into();
        let reports = run_documents(
            decryptor,
            formulas,
            vec![dir.path().join("sections/1.txt")],
        )
        .await
        .unwrap();
        assert!(matches!(
            reports[0].outcome,
            Ok(TranslationOutcome::Found(_))
        ));
    }
}
