use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dapi::entity::FieldValue;
use dapi::{CacheEntry, Config, Depth, Lookup, Resolver};
use env_logger::Env;
use serde_json::Value as JsonValue;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dapi")]
#[command(about = "Resolve JSON:API resources and their relationship graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve one resource (or a bundle collection) and print it
    Get(GetArgs),
}

#[derive(Args, Debug)]
struct GetArgs {
    /// Human path of a node, e.g. /about
    #[arg(long, conflicts_with_all = ["entity", "uuid", "collection"])]
    slug: Option<String>,

    /// Entity type, e.g. node or taxonomy_term
    #[arg(long, requires = "bundle")]
    entity: Option<String>,

    #[arg(long)]
    bundle: Option<String>,

    #[arg(long, conflicts_with = "collection")]
    uuid: Option<String>,

    /// Fetch every resource of the bundle
    #[arg(long)]
    collection: bool,

    /// Relationship hops to expand (unbounded when omitted)
    #[arg(long)]
    depth: Option<usize>,

    /// Full field name to print, e.g. field_tags or title. Repeatable.
    #[arg(long = "field")]
    fields: Vec<String>,

    /// Preload the cache from a snapshot before resolving
    #[arg(long)]
    restore: Option<PathBuf>,

    /// Write the cache to this file afterwards
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl GetArgs {
    fn lookup(&self) -> Result<Lookup> {
        if let Some(slug) = &self.slug {
            return Ok(Lookup::slug(slug));
        }
        match (&self.entity, &self.bundle, &self.uuid) {
            (Some(entity), Some(bundle), _) if self.collection => {
                Ok(Lookup::collection(entity, bundle))
            }
            (Some(entity), Some(bundle), Some(uuid)) => Ok(Lookup::new(entity, bundle, uuid)),
            (Some(_), Some(_), None) => {
                anyhow::bail!("--uuid or --collection is required with --entity and --bundle")
            }
            _ => anyhow::bail!("Pass --slug, or --entity and --bundle"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(Env::default().filter_or("RUST_LOG", config.log_level())).init();

    match cli.command {
        Command::Get(args) => run_get(&config, args).await,
    }
}

async fn run_get(config: &Config, args: GetArgs) -> Result<()> {
    let lookup = args.lookup()?;
    let resolver = Resolver::from_config(config)?;
    log::info!(
        "Resolving {} (strict: {})",
        lookup.describe(),
        resolver.is_strict()
    );

    // Restored entries are served without touching the transport
    if let Some(path) = &args.restore {
        resolver.load_snapshot(path).await?;
    }

    let depth = args.depth.map_or(Depth::Unbounded, Depth::from);
    let entry = resolver.get_entity(lookup, depth).await?;
    print_entry(&entry, &args.fields)?;
    log::info!("{} resources cached", resolver.cache().len());

    if let Some(path) = &args.snapshot {
        resolver.save_snapshot(path).await?;
    }
    Ok(())
}

fn print_entry(entry: &CacheEntry, fields: &[String]) -> Result<()> {
    let entity = match entry {
        CacheEntry::Raw(raw) => {
            println!("{}", serde_json::to_string_pretty(raw.as_ref())?);
            return Ok(());
        }
        CacheEntry::Entity(entity) => entity,
    };

    // Error resources print as {status_code, message}
    if let Some(page_error) = entity.page_error() {
        println!("{}", serde_json::to_string_pretty(&page_error)?);
        return Ok(());
    }

    println!("{}", entity);
    for member in entity.members() {
        println!("  {} {}", member.resource_type(), member.uuid());
    }
    for field in fields {
        let values: Vec<JsonValue> = entity
            .all_values(field, "")
            .iter()
            .map(FieldValue::to_json)
            .collect();
        println!("{} = {}", field, serde_json::to_string_pretty(&values)?);
    }
    Ok(())
}
