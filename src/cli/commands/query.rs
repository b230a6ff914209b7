//! Query, shell and status commands.

use std::io::Write;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use gini_census::config::Settings;
use gini_census::store::{GiniStore, QueryExpr};

use super::helpers::{open_store, print_counts, print_gini_rows, print_query_rows};

const PROMPT: &str = "gini> ";

/// Evaluate one expression against the store and print the result.
fn evaluate(store: &GiniStore, input: &str, json: bool) -> anyhow::Result<()> {
    match QueryExpr::parse(input)? {
        QueryExpr::Lookup(lookup) => {
            let rows = store.gini_lookup(&lookup)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_gini_rows(&rows);
            }
        }
        QueryExpr::Raw(sql) => {
            let result = store.raw_query(&sql)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_query_rows(&result);
            }
        }
    }
    Ok(())
}

/// Run a single expression.
pub async fn cmd_query(settings: &Settings, expr: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    evaluate(&store, expr, json)
}

/// Interactive loop over stdin.
pub async fn cmd_shell(settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(settings)?;

    println!(
        "{} Connected to {}",
        style("→").cyan(),
        settings.database_path.display()
    );
    println!("  Enter scope=name[,type=single|all] or SQL, 'exit' to leave");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", PROMPT);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if let Err(e) = evaluate(&store, line, false) {
            println!("{} {}", style("✗").red(), e);
        }
    }

    Ok(())
}

/// Show row counts of the stored tables.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let counts = store.counts()?;

    println!(
        "{} {}",
        style("Database:").bold(),
        settings.database_path.display()
    );
    print_counts(&counts);

    Ok(())
}
