//! CLI `status` command: print what the index holds and where it lives.

use anyhow::{Context, Result};

use notewatch::config::NotewatchConfig;
use notewatch::db;

pub fn status(config: &NotewatchConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    println!("Notewatch Status");
    println!("================");
    println!();
    match config.resolved_notes_dir() {
        Ok(dir) => println!("Notes directory:   {}", dir.display()),
        Err(e) => println!("Notes directory:   {e}"),
    }
    println!("Extension:         .{}", config.notes.extension);
    println!(
        "Periodic sync:     {}",
        match config.sync.interval_secs {
            0 => "disabled".to_string(),
            secs => format!("every {secs}s"),
        }
    );
    println!();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `notewatch sync` or `notewatch serve` to build the index.");
        return Ok(());
    }

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let status = db::index_status(&conn).context("failed to read index status")?;

    println!("Database:          {}", db_path.display());
    println!("Schema version:    {}", status.schema_version);
    println!("sqlite-vec:        {}", status.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!("  Stored:          {}", status.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.embedding.model);
    if let Some(ref stored) = status.embedding_model {
        if stored != &config.embedding.model {
            println!("  WARNING: model mismatch! Vectors from the two models are not comparable.");
        }
    }
    println!();
    println!("Row counts:");
    println!("  Notes:           {}", status.note_count);
    println!("  Vectors:         {}", status.vector_count);
    println!("  Change log:      {}", status.log_count);
    if status.note_count != status.vector_count {
        println!("  WARNING: notes and vectors are out of step.");
    }
    if let Some(ref last) = status.last_write {
        println!();
        println!("Last write:        {last}");
    }

    Ok(())
}
