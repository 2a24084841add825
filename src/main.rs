use msmd::cli::{Cli, Commands, ConfigAction};
use msmd::config::Config;
use msmd::error::{MsmdError, Result};
use msmd::pipeline::{Pipeline, RunSummary, Scenario};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            scenario,
            seed,
            json,
        } => {
            let scenario = Scenario::load(&scenario)?;
            cmd_run(cli.config, scenario, seed, json)?;
        }
        Commands::Demo { seed, json } => {
            cmd_run(cli.config, Scenario::demo(), seed, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "msmd=debug" } else { "msmd=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_run(
    config_path: Option<std::path::PathBuf>,
    scenario: Scenario,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    scenario.validate()?;

    let app_contents = scenario.app_contents();
    let app_pages = scenario.app_pages(config.memory.page_size);
    let vm_pages = scenario.vm_pages(&app_pages)?;

    let mut pipeline = Pipeline::new(config, seed)?;
    let summary = pipeline.run(&app_contents, &app_pages, &vm_pages)?;

    if json {
        let rendered = serde_json::to_string_pretty(&summary).map_err(|e| MsmdError::Json {
            source: e,
            context: "Failed to serialize run summary".to_string(),
        })?;
        println!("{}", rendered);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Run Summary");
    println!("===========");
    println!("Applications:        {}", summary.total_applications);
    println!("Clusters:            {}", summary.application_clusters);
    println!("Similar page pairs:  {}", summary.similar_page_pairs);
    println!("Index entries:       {}", summary.index_entries);
    println!("Pages merged:        {}", summary.pages_merged);
    println!(
        "Memory saved:        {} bytes ({:.2} MB)",
        summary.bytes_saved, summary.mb_saved
    );
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| MsmdError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            Config::load(&path)?;
            println!("✓ Configuration is valid");
        }
    }

    Ok(())
}

fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!("Config file not found, using defaults. Run 'msmd config init' to create one.");
        return Ok(Config::default());
    }

    Config::load(&path)
}
