//! Directory listing scraping.

use scraper::{Html, Selector};

/// Suffix a table cell must end with to count as an archive name.
const ARCHIVE_SUFFIX: &str = ".zip";

/// Extract archive names from a directory listing page.
///
/// Reads the first `<table>`, skips its header row and keeps every cell
/// whose text (trailing whitespace trimmed) ends in `.zip`. Names repeated
/// on the page are kept once, in first-seen order.
pub fn parse_archive_listing(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table").unwrap();
    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("td").unwrap();

    let Some(table) = document.select(&table_selector).next() else {
        return Vec::new();
    };

    let mut names: Vec<String> = Vec::new();
    for row in table.select(&row_selector).skip(1) {
        for cell in row.select(&cell_selector) {
            let text: String = cell.text().collect();
            let text = text.trim();
            if text.ends_with(ARCHIVE_SUFFIX) && !names.iter().any(|n| n == text) {
                names.push(text.to_string());
            }
        }
    }

    names
}
