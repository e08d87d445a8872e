use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use heapdb::common::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE};
use heapdb::concurrency::TransactionId;
use heapdb::config::StorageConfig;
use heapdb::storage::DbFileIterator;
use heapdb::Database;
use log::info;

#[derive(Parser)]
struct Config {
    #[arg(long, help = "Schema file, one `name (field type [pk], ...)` per line")]
    schema: PathBuf,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, help = "Size of a page in bytes")]
    page_size: usize,

    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, help = "Size of buffer pool")]
    pool_size: usize,

    #[arg(long, help = "Print every tuple of this table")]
    scan: Option<String>,
}

fn scan_table(db: &Database, name: &str) -> Result<()> {
    let table_id = db
        .catalog()
        .get_table_id(name)
        .with_context(|| format!("Cannot scan {name}"))?;
    let file = db.catalog().get_database_file(table_id)?;
    let tid = TransactionId::new();

    let mut iter = file.iterator(tid, db.buffer_pool());
    iter.open()?;
    let mut count = 0;
    while iter.has_next()? {
        println!("{}", iter.next()?);
        count += 1;
    }
    iter.close();
    db.buffer_pool().transaction_complete(tid, true)?;
    info!("scanned {count} tuples from {name}");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::parse();

    let storage_config = StorageConfig::new(config.page_size, config.pool_size)
        .context("Invalid storage configuration")?;
    let db = Database::new(storage_config)?;
    db.catalog()
        .load_schema(&config.schema)
        .with_context(|| format!("Failed to load schema from {}", config.schema.display()))?;

    for table_id in db.catalog().table_id_iterator() {
        let name = db.catalog().get_table_name(table_id)?;
        let tuple_desc = db.catalog().get_tuple_desc(table_id)?;
        let primary_key = db.catalog().get_primary_key(table_id)?;
        if primary_key.is_empty() {
            println!("{name} ({tuple_desc})");
        } else {
            println!("{name} ({tuple_desc}) pk {primary_key}");
        }
    }

    if let Some(name) = &config.scan {
        scan_table(&db, name)?;
    }
    Ok(())
}
