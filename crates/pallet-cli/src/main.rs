use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use pallet_classify::{AlgorithmId, AlgorithmParams};
use pallet_cli::commands::{run_classify, run_inspect, run_train, run_update, TrainArgs};
use pallet_cli::util::{load_params, write_output};

fn model_arg() -> Arg {
    Arg::new("model")
        .help("Path to the N-Triples document holding the model")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn data_arg() -> Arg {
    Arg::new("data")
        .help("Path to labeled text data (*.tsv or *.csv with 'label' and 'text' columns)")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn output_arg() -> Arg {
    Arg::new("output_file")
        .short('o')
        .long("output")
        .help("Path to write the N-Triples document to. Defaults to stdout.")
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("PALLET_LOG", "error,pallet=info"))
        .init();

    let matches = Command::new("pallet")
        .version(clap::crate_version!())
        .about("Train text classifiers and keep them inside graph documents")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train a new model and store it as an N-Triples document")
                .arg(data_arg())
                .arg(
                    Arg::new("algorithm")
                        .short('a')
                        .long("algorithm")
                        .help("Training algorithm, e.g. NaiveBayes, MaxEnt, C45, BalancedWinnow")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("subject")
                        .short('s')
                        .long("subject")
                        .help("IRI of the resource the model is attached to")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::Url),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("JSON file with algorithm hyper-parameters")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("update")
                .about("Incrementally train a stored NaiveBayes model with more data")
                .arg(model_arg())
                .arg(data_arg())
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("inspect")
                .about("Describe a stored model")
                .arg(model_arg()),
        )
        .subcommand(
            Command::new("classify")
                .about("Label every row of a data file with a stored model")
                .arg(model_arg())
                .arg(data_arg()),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("update", sub_m)) => handle_update(sub_m),
        Some(("inspect", sub_m)) => handle_inspect(sub_m),
        Some(("classify", sub_m)) => handle_classify(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1)
        }
    }
}

fn required_path<'a>(matches: &'a ArgMatches, id: &str) -> &'a PathBuf {
    matches
        .get_one::<PathBuf>(id)
        .unwrap_or_else(|| unreachable!("{} is a required argument", id))
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let algorithm: AlgorithmId = matches
        .get_one::<String>("algorithm")
        .map(String::as_str)
        .unwrap_or_default()
        .parse()?;
    let params = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            log::info!("[pallet::train] Using config: {:?}", path);
            load_params(path)?
        }
        None => AlgorithmParams::default(),
    };
    let args = TrainArgs {
        data: required_path(matches, "data").clone(),
        algorithm,
        subject: matches
            .get_one::<String>("subject")
            .cloned()
            .unwrap_or_default(),
        params,
    };
    log::info!("[pallet::train] Training {} from {:?}", algorithm, args.data);

    let rendered = run_train(&args)?;
    write_output(matches.get_one::<PathBuf>("output_file"), &rendered)
}

fn handle_update(matches: &ArgMatches) -> Result<()> {
    let model = required_path(matches, "model");
    let data = required_path(matches, "data");
    log::info!("[pallet::update] Updating {:?} with {:?}", model, data);

    let rendered = run_update(model, data)?;
    write_output(matches.get_one::<PathBuf>("output_file"), &rendered)
}

fn handle_inspect(matches: &ArgMatches) -> Result<()> {
    let summary = run_inspect(required_path(matches, "model"))?;
    write_output(None, &summary)
}

fn handle_classify(matches: &ArgMatches) -> Result<()> {
    let labels = run_classify(
        required_path(matches, "model"),
        required_path(matches, "data"),
    )?;
    write_output(None, &labels)
}
