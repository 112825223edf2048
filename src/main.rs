mod cli;

use hugin::{
    config,
    session::{self, Session},
};
use hugin_common::{Query, Strategy, SubjectType};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, QueryArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hugin=debug,hugin_common=debug".to_string()
        } else {
            "hugin=warn".to_string()
        }
    });

    // Results go to stdout as JSON, so logs stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Movie {
            title,
            imdb,
            year,
            query,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let mut builder = Query::builder(SubjectType::Movie);
            if let Some(title) = title {
                builder = builder.title(title);
            }
            if let Some(imdb) = imdb {
                builder = builder.imdb_id(imdb);
            }
            if let Some(year) = year {
                builder = builder.year(year);
            }
            let query = apply_query_args(builder, &query, &config)?;
            lookup(&config, query)
        }
        Commands::Person { name, query } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let builder = Query::builder(SubjectType::Person).name(name);
            let query = apply_query_args(builder, &query, &config)?;
            lookup(&config, query)
        }
        Commands::Providers => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            list_providers(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hugin {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Layer CLI flags over the config's query defaults and build the query.
fn apply_query_args(
    builder: hugin_common::QueryBuilder,
    args: &QueryArgs,
    config: &config::Config,
) -> Result<Query> {
    let defaults = &config.query;
    let strategy = match &args.strategy {
        Some(s) => s.parse::<Strategy>()?,
        None => defaults.strategy,
    };

    let mut builder = builder
        .language(args.language.clone().unwrap_or_else(|| defaults.language.clone()))
        .retries(args.retries.unwrap_or(defaults.retries))
        .amount(args.amount.unwrap_or(defaults.amount))
        .strategy(strategy)
        .cache(!args.no_cache);
    if let Some(providers) = &args.providers {
        builder = builder.providers(providers.iter().cloned());
    }

    Ok(builder.build()?)
}

fn lookup(config: &config::Config, query: Query) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let session = Session::from_config(config).context("Failed to start session")?;

        if session.registry().eligible(&query).is_empty() {
            tracing::warn!(
                "No available provider can serve this query; configure an API key with `hugin validate`"
            );
        }

        let results = session.submit(query).await;
        session.clean_up().await?;
        let results = results?;

        println!("{}", serde_json::to_string_pretty(&results)?);
        Ok::<(), anyhow::Error>(())
    })
}

fn list_providers(config: &config::Config) -> Result<()> {
    let registry = session::bundled_providers(config);
    if registry.is_empty() {
        println!("No providers enabled.");
        return Ok(());
    }

    for provider in registry.all() {
        let status = if provider.is_available() {
            "available"
        } else {
            "unavailable (no API key)"
        };
        println!(
            "{:<12} {:<7} priority {:>3}  [{}]  {}",
            provider.name(),
            provider.subject().to_string(),
            provider.priority(),
            provider.supported_fields().join(", "),
            status
        );
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Workers: {}", config.session.workers);
    println!("  Timeout: {}s", config.session.timeout_secs);
    println!("  Retry backoff: {}ms", config.session.retry_backoff_ms);
    if config.cache.enabled {
        println!("  Cache: {}", config.cache.path);
    } else {
        println!("  Cache: disabled");
    }
    println!(
        "  Query defaults: language={} retries={} amount={} strategy={}",
        config.query.language, config.query.retries, config.query.amount, config.query.strategy
    );

    let registry = session::bundled_providers(&config);
    println!(
        "  Providers: {} registered, {} available",
        registry.len(),
        registry.available().len()
    );

    Ok(())
}
