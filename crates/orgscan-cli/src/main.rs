use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use orgscan_cache::CacheStore;
use orgscan_client::{GuardPolicy, HttpTransport, QueryExecutor, RateGuard};
use orgscan_core::{OrgConfig, Parameters};
use orgscan_engine::{
    DatasetContext, RecipeEngine, RecipeResult, RuleRegistry, ScoreEngine, ScoredRecord,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "orgscan")]
#[command(about = "OrgScan CLI - org metadata audit and scoring", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Instance URL of the audited org
    #[arg(long, global = true, env = "ORGSCAN_INSTANCE_URL")]
    instance_url: Option<String>,

    /// Access token for the audited org
    #[arg(long, global = true, env = "ORGSCAN_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available recipes
    Recipes,

    /// Run one recipe against the org
    Run {
        /// Recipe alias, e.g. object-inventory
        recipe: String,

        /// Recipe parameters as key=value pairs
        #[arg(short, long, value_name = "KEY=VALUE")]
        param: Vec<String>,

        /// Skip the dataset cache for this run
        #[arg(long)]
        no_cache: bool,

        /// Print the cache contents after the run
        #[arg(long)]
        show_cache: bool,
    },
}

fn parse_params(pairs: &[String]) -> Result<Parameters> {
    let mut params = Parameters::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("parameter '{pair}' is not of the form key=value"))?;
        params.insert(key.to_string(), value.to_string());
    }
    Ok(params)
}

fn build_engine(cli: &Cli, use_cache: bool) -> Result<RecipeEngine> {
    let mut config = OrgConfig::default();
    if let Some(url) = &cli.instance_url {
        config.instance_url = url.clone();
    }
    if let Some(token) = &cli.access_token {
        config.access_token = token.clone();
    }
    let policy = if config.is_production {
        GuardPolicy::Enforce
    } else {
        GuardPolicy::WarnOnly
    };
    let transport = HttpTransport::new(config.clone()).context("building HTTP transport")?;
    let executor = QueryExecutor::new(Arc::new(transport), Arc::new(RateGuard::new(policy)));
    let scorer = ScoreEngine::new(Arc::new(RuleRegistry::builtin()));

    let mut engine = RecipeEngine::with_builtin(DatasetContext {
        executor: Arc::new(executor),
        scorer: Arc::new(scorer),
    });
    if use_cache {
        engine = engine.with_cache(Arc::new(CacheStore::new(config.cache_prefix, "datasets")));
    }
    Ok(engine)
}

fn print_records(records: &[ScoredRecord]) {
    for record in records {
        let marker = if record.score == 0 {
            "ok".green()
        } else {
            format!("{} finding(s)", record.score).red()
        };
        println!("  {} [{}] {}", record.name.bold(), record.kind, marker);
        for (field, rule_id) in record.bad_fields.iter().zip(&record.bad_reason_ids) {
            println!("    - rule {rule_id} on {field}");
        }
    }
}

fn print_result(alias: &str, result: &RecipeResult) {
    match result {
        RecipeResult::Records(records) => {
            println!("{} ({} records)", alias.bold(), records.len());
            print_records(records);
        }
        RecipeResult::Matrix(matrix) => {
            println!(
                "{} ({} rows x {} columns)",
                alias.bold(),
                matrix.rows.len(),
                matrix.headers.len()
            );
            for header in &matrix.headers {
                println!("  column: {}", header.label);
            }
        }
        RecipeResult::Composite(members) => {
            for (member, result) in members {
                print_result(member, result);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Recipes => {
            // Listing needs no connection.
            let engine = build_engine(&cli, false)?;
            for alias in engine.recipe_aliases() {
                println!("{alias}");
            }
        }
        Commands::Run {
            recipe,
            param,
            no_cache,
            show_cache,
        } => {
            let params = parse_params(param)?;
            anyhow::ensure!(
                cli.instance_url.is_some() || !OrgConfig::default().instance_url.is_empty(),
                "no instance URL configured; pass --instance-url or set ORGSCAN_INSTANCE_URL"
            );
            let engine = build_engine(&cli, !no_cache)?;
            let result = engine
                .run(recipe, &params)
                .await
                .with_context(|| format!("running recipe {recipe}"))?;

            match &cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Pretty => print_result(recipe, &result),
            }

            if *show_cache {
                if let Some(cache) = engine.cache() {
                    println!("{}", "cached datasets:".bold());
                    for info in cache.describe() {
                        println!(
                            "  {} [{:?}] {} entries, created {}",
                            info.name, info.shape, info.element_count, info.created_at
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
