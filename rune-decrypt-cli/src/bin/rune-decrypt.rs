use clap::{Arg, ArgAction, ArgMatches, Command};
use rune_decrypt::grammar::DedupOptions;
use rune_decrypt::{Formula, JobSettings, loader, supported_tokens};
use rune_decrypt_cli::{
    GenerateOptions, build_decryptor, describe_settings, format_outcome, generate_attempts,
    locate_job, resolve, run_documents, schema_table, select_documents,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn set_arg() -> Arg {
    Arg::new("set")
        .long("set")
        .value_name("NAME=VALUE")
        .help("Override a job setting, e.g. --set IsShiftMode=true (repeatable)")
        .action(ArgAction::Append)
}

fn cli() -> Command {
    Command::new("rune-decrypt")
        .version("0.1.0")
        .about("Search postfix decryption formulas for rune cipher texts")
        .subcommand_required(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .short('d')
                .global(true)
                .help("Directory every job path is relative to")
                .default_value("data"),
        )
        .subcommand(Command::new("tokens").about("List the supported grammar tokens"))
        .subcommand(Command::new("schema").about("List the job settings and their defaults"))
        .subcommand(
            Command::new("generate")
                .about("Compile production rules into a job file's attempt list")
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .required(true)
                        .help("Job file to write"),
                )
                .arg(
                    Arg::new("rules")
                        .long("rules")
                        .help("Production rules, relative to the data directory")
                        .default_value("grammar/ProductionRules.txt"),
                )
                .arg(
                    Arg::new("replacements")
                        .long("replacements")
                        .help("Logical replacements, relative to the data directory")
                        .default_value("grammar/LogicalReplacements.txt"),
                )
                .arg(
                    Arg::new("tokens")
                        .long("tokens")
                        .short('t')
                        .value_delimiter(',')
                        .num_args(1..)
                        .help("Comma separated tokens to enable, e.g. +,-,p,i (default: all)"),
                )
                .arg(
                    Arg::new("eliminate-equivalent")
                        .long("eliminate-equivalent")
                        .short('e')
                        .help(
                            "Drop attempts that agree on a random sample of runes and \
                             positions. Probabilistic: distinct attempts may be dropped and \
                             equivalent ones kept; results vary between runs unless --seed is set",
                        )
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(clap::value_parser!(u64))
                        .help("Seed for the equivalence sample"),
                )
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("decrypt")
                .about("Run a decryption job")
                .arg(
                    Arg::new("job")
                        .help("Job file, or a name under <data-dir>/jobs/")
                        .required(true)
                        .index(1),
                )
                .arg(set_arg()),
        )
}

fn apply_overrides(
    settings: &mut JobSettings,
    matches: &ArgMatches,
) -> rune_decrypt::DecryptResult<()> {
    if let Some(assignments) = matches.get_many::<String>("set") {
        for assignment in assignments {
            settings.apply_override(assignment)?;
        }
    }
    Ok(())
}

fn print_settings(
    settings: &JobSettings,
    data_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let (lines, all_valid) = describe_settings(settings, data_dir);
    println!("Running a decryption job with the following options:");
    for line in lines {
        println!("{}", line);
    }
    if !all_valid {
        return Err(format!(
            "job refers to missing files; all paths are relative to '{}'",
            data_dir.display()
        )
        .into());
    }
    Ok(())
}

fn generate(matches: &ArgMatches, data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = JobSettings::default();
    apply_overrides(&mut settings, matches)?;

    let options = GenerateOptions {
        rules: resolve(data_dir, matches.get_one::<String>("rules").unwrap()),
        replacements: resolve(data_dir, matches.get_one::<String>("replacements").unwrap()),
        tokens: matches
            .get_many::<String>("tokens")
            .map(|tokens| tokens.cloned().collect())
            .unwrap_or_default(),
        dedup: matches.get_flag("eliminate-equivalent").then(|| DedupOptions {
            seed: matches.get_one::<u64>("seed").copied(),
            ..DedupOptions::default()
        }),
    };

    settings.attempts = generate_attempts(&settings, data_dir, &options)?;
    let output = PathBuf::from(matches.get_one::<String>("output").unwrap());
    loader::save_job_settings(&output, &settings)?;
    println!(
        "Generated {} attempts into {}",
        settings.attempts.len(),
        output.display()
    );
    Ok(())
}

async fn decrypt(matches: &ArgMatches, data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let job = locate_job(data_dir, matches.get_one::<String>("job").unwrap());
    info!(job = %job.display(), "reading job settings");
    let mut settings = loader::load_job_settings(&job)?;
    apply_overrides(&mut settings, matches)?;
    settings.validate()?;
    print_settings(&settings, data_dir)?;

    let decryptor = Arc::new(build_decryptor(&settings, data_dir)?);
    let formulas: Arc<[Formula]> = settings
        .attempts
        .iter()
        .map(|attempt| Formula::new(attempt.as_str()))
        .collect();
    info!(attempts = formulas.len(), "loaded attempts");

    let documents = select_documents(&settings, data_dir)?;
    println!(
        "Attempting to decrypt {} rune file{}.",
        documents.len(),
        if documents.len() == 1 { "" } else { "s" }
    );

    for report in run_documents(decryptor, formulas, documents).await? {
        println!();
        println!("{}:", report.path.display());
        match report.outcome {
            Ok(outcome) => println!("{}", format_outcome(&outcome)),
            Err(e) => eprintln!("❌ {}", e),
        }
        println!("Finished in {:.3}s", report.elapsed.as_secs_f64());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = cli().get_matches();
    let data_dir = PathBuf::from(matches.get_one::<String>("data-dir").unwrap());

    match matches.subcommand() {
        Some(("tokens", _)) => {
            for (token, category) in supported_tokens() {
                println!("{:<8} {}", token, category.label());
            }
        }
        Some(("schema", _)) => {
            for line in schema_table() {
                println!("{}", line);
            }
        }
        Some(("generate", sub)) => generate(sub, &data_dir)?,
        Some(("decrypt", sub)) => decrypt(sub, &data_dir).await?,
        _ => unreachable!("subcommand_required is set"),
    }

    Ok(())
}
