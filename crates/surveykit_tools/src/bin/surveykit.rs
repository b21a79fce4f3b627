#![forbid(unsafe_code)]

use std::env;
use std::io;

use surveykit_storage::FileKv;
use surveykit_tools::config::SurveyKitConfig;
use surveykit_tools::survey_cli::{execute_command, SurveyCli};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = SurveyKitConfig::from_env()?;
    debug!(data_dir = %config.data_dir.display(), user = %config.acting_user, "starting");

    let mut cli = SurveyCli::new(&config, FileKv::new(config.data_dir.clone()))?;
    let output = execute_command(&mut cli, &args)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
