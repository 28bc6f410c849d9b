use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use craftbook::catalog::{self, RecipeSearch};
use craftbook::remote::file::{JsonKeyValueStore, JsonRecordDatabase};
use craftbook::remote::KeyValueStore;
use craftbook::{
    CacheStore, CatalogFetcher, Config, Favorites, Preferences, RecentSearches, Recipe, Snapshot,
    SyncOptions, SyncPhase, SyncService, Synchronizer,
};

/// Craftbook - offline-first crafting recipe catalog
#[derive(Parser, Debug)]
#[command(name = "craftbook")]
#[command(about = "Sync, search and favorite crafting recipes")]
struct Args {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overriding the config file
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the full catalog and reconcile favorites
    Sync,
    /// Search the cached catalog
    Search {
        query: String,
        /// Do not remember this query
        #[arg(long)]
        no_record: bool,
    },
    /// List categories, or the recipes in one
    Categories { category: Option<String> },
    /// Show one recipe
    Show { id: i64 },
    /// Toggle a recipe in the favorites
    Favorite { id: i64 },
    /// List favorite recipes
    Favorites,
    /// Manage recent searches
    Recent {
        #[command(subcommand)]
        action: Option<RecentAction>,
    },
    /// Delete the local catalog snapshot
    ClearCache,
    /// Delete the snapshot, favorites and recent searches
    ClearAll,
    /// Keep syncing and print every published snapshot
    Watch,
    /// Print the default configuration
    ExampleConfig,
}

#[derive(Subcommand, Debug)]
enum RecentAction {
    Add { query: String },
    Remove { query: String },
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("craftbook=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if matches!(args.command, Command::ExampleConfig) {
        print!("{}", Config::example_config());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = &args.data_dir {
        config.cache.data_dir = Some(dir.to_string_lossy().into_owned());
    }

    let data_dir = config.data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    tracing::debug!("Using data dir {:?}", data_dir);

    let kv_store = JsonKeyValueStore::new(config.kv_path()?);
    tracing::debug!("Favorites stored in {:?}", kv_store.path());
    let kv: Arc<dyn KeyValueStore> = Arc::new(kv_store);
    let mut sync = build_synchronizer(&config, &data_dir, kv.clone())?;

    match args.command {
        Command::Sync => {
            sync.load_favorites().await;
            match sync.sync_now().await {
                Ok(_) => {
                    let snapshot = sync.snapshot();
                    println!(
                        "Synced {} recipes, {} favorite(s)",
                        snapshot.catalog.len(),
                        snapshot.favorites.len()
                    );
                }
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    return Err(e.into());
                }
            }
        }
        Command::Search { query, no_record } => {
            let snapshot = sync.snapshot();
            let mut search = RecipeSearch::new();
            let results = search.search(&snapshot.catalog, &query);
            if results.is_empty() {
                println!("No recipes match {:?}", query);
            }
            for recipe in results {
                print_summary(recipe, snapshot.is_favorite(recipe.id));
            }
            if !no_record {
                sync.record_search(&query)?;
            }
        }
        Command::Categories { category } => {
            let snapshot = sync.snapshot();
            match category {
                Some(category) => {
                    for recipe in catalog::in_category(&snapshot.catalog, &category) {
                        print_summary(recipe, snapshot.is_favorite(recipe.id));
                    }
                }
                None => {
                    for category in catalog::categories(&snapshot.catalog) {
                        println!("{category}");
                    }
                }
            }
        }
        Command::Show { id } => {
            let snapshot = sync.snapshot();
            let recipe = catalog::find_by_id(&snapshot.catalog, id)
                .with_context(|| format!("No cached recipe with id {id}"))?;
            print_details(recipe);
        }
        Command::Favorite { id } => {
            sync.load_favorites().await;
            let now_favorite = sync.toggle_favorite(id).await?;
            println!(
                "{} {}",
                id,
                if now_favorite { "added to favorites" } else { "removed from favorites" }
            );
        }
        Command::Favorites => {
            sync.load_favorites().await;
            let snapshot = sync.snapshot();
            for recipe in snapshot.favorite_recipes() {
                print_summary(recipe, true);
            }
        }
        Command::Recent { action } => {
            match action {
                Some(RecentAction::Add { query }) => sync.record_search(&query)?,
                Some(RecentAction::Remove { query }) => sync.remove_search(&query)?,
                Some(RecentAction::Clear) => sync.clear_searches()?,
                None => {}
            }
            for query in sync.recent_searches() {
                println!("{query}");
            }
        }
        Command::ClearCache => {
            sync.clear_cache()?;
            println!("Recipe cache cleared");
        }
        Command::ClearAll => {
            sync.clear_all_data().await?;
            println!("All data cleared");
        }
        Command::Watch => watch(sync, kv, &config).await?,
        Command::ExampleConfig => {}
    }

    Ok(())
}

fn build_synchronizer(
    config: &Config,
    data_dir: &std::path::Path,
    kv: Arc<dyn KeyValueStore>,
) -> Result<Synchronizer> {
    let database = Arc::new(JsonRecordDatabase::new(
        config.records_path()?,
        config.remote.page_size,
    ));
    let fetcher = CatalogFetcher::new(database, config.remote.record_type.clone());
    let recent = RecentSearches::with_max_size(
        Preferences::in_dir(data_dir),
        config.status.max_recent_searches,
    );

    Ok(Synchronizer::new(
        fetcher,
        CacheStore::in_dir(data_dir, &config.cache.file_name),
        Favorites::new(kv),
        recent,
        SyncOptions::from_config(config),
    ))
}

async fn watch(sync: Synchronizer, kv: Arc<dyn KeyValueStore>, config: &Config) -> Result<()> {
    let (service, handle) = SyncService::new(sync, kv);
    let service = service.sync_on_start(config.sync.sync_on_start);
    let task = tokio::spawn(service.run());

    let mut snapshots = handle.subscribe();
    print_snapshot(&snapshots.borrow_and_update());

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                print_snapshot(&snapshots.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => {
                handle.shutdown().await?;
                break;
            }
        }
    }

    task.await.context("Sync service panicked")?;
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    let phase = match snapshot.sync.phase {
        SyncPhase::Idle => "idle",
        SyncPhase::Syncing => "syncing",
        SyncPhase::Synced => "synced",
        SyncPhase::Failed => "failed",
    };
    let last = snapshot
        .sync
        .last_synced
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "[{}] {} recipes, {} favorite(s), last synced {}",
        phase,
        snapshot.catalog.len(),
        snapshot.favorites.len(),
        last
    );
    if let Some(status) = &snapshot.status {
        println!("  {}{}", if status.is_error { "error: " } else { "" }, status.message);
    }
}

fn print_summary(recipe: &Recipe, favorite: bool) {
    println!(
        "{:>6} {} {} ({})",
        recipe.id,
        if favorite { "*" } else { " " },
        recipe.name,
        recipe.category
    );
}

fn print_details(recipe: &Recipe) {
    println!("{} (#{})", recipe.name, recipe.id);
    println!("Category: {}", recipe.category);
    println!("Image:    {}", recipe.image);
    print_grid(recipe.ingredients.slots(), recipe.output);
    for (n, grid) in recipe.alternate_ingredients.iter().enumerate() {
        let output = recipe.alternate_outputs.get(n).copied().unwrap_or(recipe.output);
        println!("Alternate {}:", n + 1);
        print_grid(grid.slots(), output);
    }
    if let Some(remarks) = &recipe.remarks {
        println!("Remarks:  {remarks}");
    }
    if let Some(remark) = &recipe.image_remark {
        println!("Image remark: {remark}");
    }
}

fn print_grid(slots: &[String], output: u32) {
    for row in slots.chunks(3) {
        let cells: Vec<&str> = row
            .iter()
            .map(|s| if s.is_empty() { "-" } else { s.as_str() })
            .collect();
        println!("  {}", cells.join(" | "));
    }
    println!("  -> x{output}");
}
