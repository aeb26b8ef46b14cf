use chimera_cli::input::Input;
use chimera_cli::runner::Runner;
use clap::{value_parser, Arg, Command, ValueHint};
use rayon::ThreadPoolBuilder;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("CHIMERA_LOG", "error,chimera=info"))
        .init();

    let matches = Command::new("chimera")
        .version(clap::crate_version!())
        .about("Breakdown of chimeric spectra across search engine results")
        .arg(
            Arg::new("parameters")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to configuration parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("output_directory")
                .short('o')
                .long("output_directory")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path where breakdown and bucket tables will be written. \
                     Overrides the directory specified in the configuration file.",
                )
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("isolation_directory")
                .long("isolation_directory")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Directory holding one `<file>.isolation.tsv` table per spectra file. \
                     Overrides the directory specified in the configuration file.",
                )
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("split-by")
                .long("split-by")
                .value_parser(["none", "condition", "dataset", "dataset_condition"])
                .help("Provenance labels that split bucket tables into separate series"),
        )
        .arg(
            Arg::new("reuse-cache")
                .long("reuse-cache")
                .action(clap::ArgAction::SetTrue)
                .help("Reload breakdown records from a previous run, if present"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_parser(value_parser!(u16).range(1..))
                .help("Number of worker threads (default = # of CPUs)")
                .value_hint(ValueHint::Other),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let threads = matches
        .get_one::<u16>("threads")
        .copied()
        .map(usize::from)
        .unwrap_or_else(num_cpus::get);

    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;

    let input = Input::from_arguments(matches)?;
    let settings = input.build()?;

    Runner::new(settings).run()?;
    Ok(())
}
