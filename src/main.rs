use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leadscope::config::Config;
use leadscope::pipeline::{export_csv, LeadPipeline, PipelineSettings};

/// Local business lead capture and qualification.
#[derive(Parser)]
#[command(name = "leadscope", version, about)]
struct Cli {
    /// Single category to search
    #[arg(short, long)]
    category: Option<String>,

    /// Space-separated list of categories to search
    #[arg(long, num_args = 1..)]
    categories: Option<Vec<String>>,

    /// Maximum leads per category
    #[arg(short, long, default_value_t = 20)]
    limit: usize,

    /// Test mode: 5 leads, no Airtable sync
    #[arg(short, long)]
    test: bool,

    /// Use direct scraping instead of SerpAPI
    #[arg(long)]
    no_serpapi: bool,

    /// Enable Hunter.io enrichment
    #[arg(long)]
    hunter: bool,

    /// Do not sync results to Airtable
    #[arg(long)]
    no_airtable: bool,

    /// Export scored leads to a CSV file
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Write the run report JSON to a file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Resume an interrupted run from its checkpoint
    #[arg(long)]
    resume: bool,

    /// List the configured categories and exit
    #[arg(long)]
    list_categories: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leadscope=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    if cli.list_categories {
        println!("\nConfigured categories:");
        for (i, category) in config.business_types.iter().enumerate() {
            println!("  {}. {}", i + 1, category);
        }
        return Ok(());
    }

    let categories: Vec<String> = if let Some(category) = cli.category {
        vec![category]
    } else if let Some(categories) = cli.categories {
        categories
    } else {
        config.business_types.clone()
    };

    let limit = if cli.test { 5 } else { cli.limit };
    let sync_to_airtable = !(cli.test || cli.no_airtable);

    tracing::info!("Categories: {}", categories.len());
    tracing::info!("Limit per category: {}", limit);
    tracing::info!("SerpAPI: {}", !cli.no_serpapi);
    tracing::info!("Hunter.io: {}", cli.hunter);
    tracing::info!("Airtable: {}", sync_to_airtable);

    let settings = PipelineSettings {
        use_serpapi: !cli.no_serpapi,
        use_hunter: cli.hunter,
        sync_to_airtable,
        use_cache: true,
    };

    let mut pipeline = LeadPipeline::new(&config, &settings)
        .map_err(|e| anyhow::anyhow!("Failed to build pipeline: {}", e))?;

    let outcome = pipeline
        .run(&categories, limit, cli.resume)
        .await
        .map_err(|e| anyhow::anyhow!("Pipeline failed: {}", e))?;

    let report = &outcome.report;

    println!("\n{}", "=".repeat(60));
    println!("RUN SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Total leads: {}", report.total_leads);
    println!("Duration: {:.1}s", report.duration_seconds);

    if let Some(scoring) = &report.stages.scoring {
        println!("\nLead distribution:");
        println!("  Hot:  {}", scoring.hot);
        println!("  Warm: {}", scoring.warm);
        println!("  Cold: {}", scoring.cold);
        println!("  Low:  {}", scoring.low);
        println!("  Mean score: {:.1}", scoring.mean_score);
    }

    println!("\nSocial profiles found:");
    println!("  Instagram: {}", report.stages.instagram_found);
    println!("  LinkedIn:  {}", report.stages.linkedin_found);

    if let Some(sync) = &report.stages.sync {
        println!("\nAirtable sync:");
        println!("  Created: {}", sync.created);
        println!("  Updated: {}", sync.updated);
        println!("  Failed:  {}", sync.failed);
    }

    if let Some(error) = &report.error {
        println!("\nRun aborted: {}", error);
    }

    if let Some(path) = cli.export {
        export_csv(&outcome.leads, &path)
            .map_err(|e| anyhow::anyhow!("CSV export failed: {}", e))?;
        println!("\nLeads exported to: {}", path.display());
    }

    if let Some(path) = cli.output {
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        println!("\nReport written to: {}", path.display());
    }

    println!("{}", "=".repeat(60));

    Ok(())
}
