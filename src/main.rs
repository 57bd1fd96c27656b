use clap::{Parser, Subcommand};
use course_ta::Result;
use course_ta::commands::{
    build_kb, make_embeds, scrape_content, scrape_forum, serve, show_logs, show_status,
};
use course_ta::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "course-ta")]
#[command(about = "Retrieval-augmented teaching assistant for the TDS course")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector store
    #[arg(long, value_name = "DIR", global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP answer server
    Serve,
    /// Scrape the course's Discourse category (resumable)
    ScrapeForum {
        /// Optional limit on the number of topic-listing pages to fetch
        #[arg(long)]
        limit_title_pages: Option<u32>,
    },
    /// Crawl the course-content site into Markdown files
    ScrapeContent,
    /// Merge the scraped dumps into the formatted knowledge base
    BuildKb,
    /// Embed every formatted document and write the embeddings file
    MakeEmbeds,
    /// Edit the configuration interactively
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show the health of the store, files, and credentials
    Status,
    /// Print one day's API-call log
    Logs {
        /// Date in YYYY-MM-DD format (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| course_ta::TaError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Serve => {
            serve(&config_dir).await?;
        }
        Commands::ScrapeForum { limit_title_pages } => {
            scrape_forum(&config_dir, limit_title_pages)?;
        }
        Commands::ScrapeContent => {
            scrape_content(&config_dir)?;
        }
        Commands::BuildKb => {
            build_kb(&config_dir)?;
        }
        Commands::MakeEmbeds => {
            make_embeds(&config_dir)?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
        Commands::Logs { date } => {
            show_logs(&config_dir, date)?;
        }
    }

    Ok(())
}
