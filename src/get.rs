//! Document inspection by id.
//!
//! Fetches a document row, its fragments, and its summary (if generated)
//! for the `medsum get` CLI command.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::store;

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(&config.db).await?;

    let document = store::load_document(&pool, id).await?;
    let fragments = store::list_fragments(&pool, id).await?;
    let summary = store::get_summary(&pool, id).await?;

    pool.close().await;

    println!("--- Document ---");
    println!("id:           {}", document.id);
    println!("filename:     {}", document.filename);
    println!("category:     {}", document.category);
    println!(
        "subject:      {}",
        document.subject.as_deref().unwrap_or("(unspecified)")
    );
    println!("status:       {}", document.status);
    if let Some(ref error) = document.error {
        println!("error:        {}", error);
    }
    println!("created_at:   {}", format_ts_iso(document.created_at));
    if let Some(completed_at) = document.completed_at {
        println!("completed_at: {}", format_ts_iso(completed_at));
    }
    println!("storage:      {}", document.storage_path);
    println!();

    println!("--- Fragments ({}) ---", fragments.len());
    for fragment in &fragments {
        println!("[fragment {}]", fragment.frag_index);
        println!("{}", fragment.content);
        println!();
    }

    match summary {
        Some(summary) => {
            println!("--- Summary ---");
            println!("key findings:");
            for finding in &summary.key_findings {
                println!("  - {}", finding);
            }
            println!("reasoning:");
            for (label, text) in &summary.reasoning_steps {
                println!("  {}: {}", label, text);
            }
            println!("recommendations:");
            for rec in &summary.recommendations {
                println!("  - {}", rec);
            }
            println!();
            println!("{}", summary.full_summary);
        }
        None => println!("--- Summary ---\n(none generated)"),
    }

    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
