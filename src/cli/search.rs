use anyhow::Result;

use notewatch::config::NotewatchConfig;

/// Run a semantic search from the terminal.
pub async fn search(config: &NotewatchConfig, query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let store = super::open_store(config)?;
    let limit = limit.unwrap_or(config.search.default_limit);

    let query_text = query.to_string();
    let hits = tokio::task::spawn_blocking(move || store.search(&query_text, limit)).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!("  {}. {} (distance: {:.4})", i + 1, hit.title, hit.distance);
        println!("     {}", hit.file_path);
        if !hit.tags.is_empty() {
            println!("     tags: {}", hit.tags.join(", "));
        }
        if !hit.preview.is_empty() {
            println!("     {}", hit.preview.replace('\n', " "));
        }
        println!();
    }

    Ok(())
}
