/*!
Fragkit CLI - scaffold fragment projects and synchronize them with a server.
*/

use clap::{Parser, Subcommand};
use fragkit_core::api::ImportResult;
use fragkit_core::config::CONFIG_FILE;
use fragkit_core::observability::init_logging;
use fragkit_core::project::FragmentType;
use fragkit_core::scaffold::{
    add_collection, add_composition, add_fragment, create_project, run_pipeline, slugify,
    HandlebarsTemplates, ScaffoldContext, Step,
};
use fragkit_core::watch::{target_banner, watch_loop};
use fragkit_core::{
    build_project, read_project, write_archive, BuildConfig, CompressOptions, ExportEngine,
    HttpApiClient, ImportEngine, ImportReport, ServerConfig,
};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fragkit")]
#[command(about = "Scaffold page fragment projects and sync them with a server")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Project directory
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Server configuration file (defaults to `.fragkit.json` in the project)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project in a subdirectory named after it
    New {
        name: String,
        /// Also create a first collection
        #[arg(long)]
        collection: Option<String>,
        /// Also create a first fragment in that collection
        #[arg(long, requires = "collection")]
        fragment: Option<String>,
    },
    /// Add a collection to the project
    AddCollection {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Add a fragment to a collection
    AddFragment {
        name: String,
        /// Collection slug
        #[arg(long)]
        collection: String,
        #[arg(short = 't', long = "type", default_value = "component")]
        fragment_type: FragmentType,
    },
    /// Add a composition to a collection
    AddComposition {
        name: String,
        /// Collection slug
        #[arg(long)]
        collection: String,
    },
    /// Build and package the project into build/liferay-fragments.zip
    Compress {
        /// Include a deployment descriptor
        #[arg(long)]
        deploy_descriptor: bool,
        /// Target company for the descriptor (`*` for all companies)
        #[arg(long)]
        company_web_id: Option<String>,
        /// Target site key for the descriptor
        #[arg(long)]
        group_key: Option<String>,
    },
    /// Import the project into the configured site
    Import,
    /// Export the configured site into the project
    Export,
    /// Re-import the project on every change under src/
    Watch,
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl ResultRow {
    fn new(kind: &str, result: &ImportResult) -> Self {
        Self {
            kind: kind.to_string(),
            name: result.name.clone(),
            status: result.status.to_string(),
            message: result.error_message.clone().unwrap_or_default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs)?;

    match &cli.command {
        Commands::New {
            name,
            collection,
            fragment,
        } => new_project(&cli.project, name, collection.as_deref(), fragment.as_deref()).await?,
        Commands::AddCollection { name, description } => {
            let context = ScaffoldContext::from_project(read_project(&cli.project).await?)
                .with_answer("collectionName", name.as_str())
                .with_answer("collectionDescription", description.as_str());
            scaffold(context, &[add_collection]).await?
        }
        Commands::AddFragment {
            name,
            collection,
            fragment_type,
        } => {
            let context = ScaffoldContext::from_project(read_project(&cli.project).await?)
                .with_answer("collectionSlug", collection.as_str())
                .with_answer("fragmentName", name.as_str())
                .with_answer("fragmentType", fragment_type.as_str());
            scaffold(context, &[add_fragment]).await?
        }
        Commands::AddComposition { name, collection } => {
            let context = ScaffoldContext::from_project(read_project(&cli.project).await?)
                .with_answer("collectionSlug", collection.as_str())
                .with_answer("compositionName", name.as_str());
            scaffold(context, &[add_composition]).await?
        }
        Commands::Compress {
            deploy_descriptor,
            company_web_id,
            group_key,
        } => {
            let options = if *deploy_descriptor {
                CompressOptions::with_descriptor(company_web_id.clone(), group_key.clone())
            } else {
                CompressOptions::default()
            };
            compress_project(&cli.project, &options).await?
        }
        Commands::Import => import_once(&cli).await?,
        Commands::Export => export_project(&cli).await?,
        Commands::Watch => watch_project(&cli).await?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ServerConfig, anyhow::Error> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.project.join(CONFIG_FILE));
    let config = if path.exists() {
        ServerConfig::from_file(&path)?
    } else {
        info!(path = %path.display(), "No configuration file, using environment only");
        ServerConfig::default()
    };
    let config = config.merge_env();
    config.validate()?;
    Ok(config)
}

async fn new_project(
    parent: &Path,
    name: &str,
    collection: Option<&str>,
    fragment: Option<&str>,
) -> Result<(), anyhow::Error> {
    let base_path = parent.join(slugify(name));
    if base_path.exists() {
        anyhow::bail!("{} already exists", base_path.display());
    }

    let mut context = ScaffoldContext::new(&base_path).with_answer("projectName", name);
    let mut steps: Vec<Step> = vec![create_project];
    if let Some(collection) = collection {
        context = context.with_answer("collectionName", collection);
        steps.push(add_collection);
    }
    if let Some(fragment) = fragment {
        context = context.with_answer("fragmentName", fragment);
        steps.push(add_fragment);
    }

    scaffold(context, &steps).await?;
    println!("✓ Created project at {}", base_path.display());
    Ok(())
}

async fn scaffold(context: ScaffoldContext, steps: &[Step]) -> Result<(), anyhow::Error> {
    let templates = HandlebarsTemplates::new()?;
    let context = run_pipeline(context, steps, &templates)?;
    context.write().await?;
    Ok(())
}

async fn compress_project(base: &Path, options: &CompressOptions) -> Result<(), anyhow::Error> {
    let project = read_project(base).await?;
    let project = build_project(&project, &BuildConfig::default()).await?;
    let path = write_archive(&project, options).await?;
    println!("✓ Wrote {}", path.display());
    Ok(())
}

fn print_report(report: Option<ImportReport>) {
    let Some(report) = report else {
        println!("Nothing to import");
        return;
    };

    let failed = report.failures().count();
    let (fragments, page_templates) = report.into_parts();
    let rows: Vec<ResultRow> = fragments
        .iter()
        .map(|r| ResultRow::new("fragment", r))
        .chain(page_templates.iter().map(|r| ResultRow::new("page template", r)))
        .collect();

    if rows.is_empty() {
        println!("Nothing to import");
    } else {
        println!("{}", Table::new(rows));
    }
    if failed > 0 {
        warn!(failed, "Some entities could not be imported");
    }
}

async fn run_import(
    engine: &ImportEngine<HttpApiClient>,
    base: &Path,
    group_id: &str,
) -> fragkit_core::Result<()> {
    let project = read_project(base).await?;
    let project = build_project(&project, &BuildConfig::default()).await?;
    let report = engine.import_project(&project, group_id).await?;
    print_report(report);
    Ok(())
}

async fn import_once(cli: &Cli) -> Result<(), anyhow::Error> {
    let config = load_config(cli)?;
    let group_id = config.require_group_id()?;
    let engine = ImportEngine::new(Arc::new(HttpApiClient::new()?), config.to_session()?);
    run_import(&engine, &cli.project, group_id).await?;
    Ok(())
}

async fn export_project(cli: &Cli) -> Result<(), anyhow::Error> {
    let config = load_config(cli)?;
    let group_id = config.require_group_id()?;
    let engine = ExportEngine::new(Arc::new(HttpApiClient::new()?), config.to_session()?);

    let summary = engine.export_project(group_id, &cli.project).await?;
    println!(
        "✓ Exported {} collections, {} fragments and {} page templates ({} export)",
        summary.collections, summary.fragments, summary.page_templates, summary.strategy
    );
    Ok(())
}

async fn watch_project(cli: &Cli) -> Result<(), anyhow::Error> {
    let config = load_config(cli)?;
    let group_id = config.require_group_id()?.to_string();
    let engine = ImportEngine::new(Arc::new(HttpApiClient::new()?), config.to_session()?);
    let src = cli.project.join(fragkit_core::project::SOURCE_DIR);

    let (tx, rx) = mpsc::channel(16);
    // Initial import before any change
    tx.try_send(())?;
    let mut watcher = RecommendedWatcher::new(
        move |event: notify::Result<notify::Event>| {
            if let Ok(event) = event {
                if matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    // A full channel already guarantees a follow-up run
                    let _ = tx.try_send(());
                }
            }
        },
        Config::default(),
    )?;
    watcher.watch(&src, RecursiveMode::Recursive)?;
    info!(path = %src.display(), "Watching for changes");

    let engine = &engine;
    let base = cli.project.as_path();
    let group_id = group_id.as_str();
    watch_loop(rx, move || async move {
        println!("{}", target_banner(&engine.session().await, group_id));
        run_import(engine, base, group_id).await
    })
    .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragkit_core::ImportStatus;
    use tempfile::TempDir;

    #[test]
    fn test_parse_add_fragment() {
        let cli = Cli::parse_from([
            "fragkit", "-p", "site", "add-fragment", "Hero Banner", "--collection", "marketing", "-t", "react",
        ]);
        assert_eq!(cli.project, PathBuf::from("site"));
        match cli.command {
            Commands::AddFragment {
                name,
                collection,
                fragment_type,
            } => {
                assert_eq!(name, "Hero Banner");
                assert_eq!(collection, "marketing");
                assert_eq!(fragment_type, FragmentType::React);
            }
            _ => panic!("expected add-fragment"),
        }
    }

    #[test]
    fn test_unknown_fragment_type_is_rejected() {
        let parsed = Cli::try_parse_from(["fragkit", "add-fragment", "x", "--collection", "c", "-t", "widget"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_result_row() {
        let row = ResultRow::new("fragment", &ImportResult::invalid("Banner", "Fragment content is not valid"));
        assert_eq!(row.name, "Banner");
        assert_eq!(row.status, ImportStatus::Invalid.to_string());
        assert_eq!(row.message, "Fragment content is not valid");
    }

    #[tokio::test]
    async fn test_new_project_refuses_existing_directory() {
        let dir = TempDir::new().unwrap();
        new_project(dir.path(), "Demo", Some("Basics"), Some("Card"))
            .await
            .unwrap();
        assert!(dir.path().join("demo/src/basics/card/fragment.json").exists());

        assert!(new_project(dir.path(), "Demo", None, None).await.is_err());
    }
}
