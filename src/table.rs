//! `deeds table` and `deeds export`.
//!
//! The table command prints one page of the flattened buyer/seller grid.
//! Document-level cells are printed only on the row that heads a group, so a
//! multi-party deed reads as one block the way the rowspan grid does.

use anyhow::{Context, Result};
use deed_desk_core::export::{format_number, DateRange};
use deed_desk_core::models::Person;
use deed_desk_core::search::TableQuery;
use deed_desk_core::view::{compute_display_model, DisplayModel, DisplayRow};
use std::path::Path;
use tracing::info;

use crate::client::{fetch_all_documents, HttpJobClient, JobClient};
use crate::config::Config;
use crate::workbook::build_export_workbook;

pub async fn run_table(config: &Config, search: &str, page: usize, json: bool) -> Result<()> {
    let client = HttpJobClient::new(&config.api)?;
    let documents = fetch_all_documents(&client, config.api.document_batch)
        .await
        .context("Failed to fetch documents")?;

    let query = TableQuery::new(search, page);
    let model = compute_display_model(&documents, &query, &config.table.options());
    if json {
        println!("{}", serde_json::to_string_pretty(&model)?);
    } else {
        print!("{}", render_table(&model, search));
    }
    Ok(())
}

/// Write an xlsx export to `output`.
///
/// With `server` the pipeline's own spreadsheet is downloaded and the date
/// range is not applied; otherwise the workbook is built locally.
pub async fn run_export(
    config: &Config,
    range: &DateRange,
    output: &Path,
    server: bool,
) -> Result<()> {
    let client = HttpJobClient::new(&config.api)?;
    let bytes = if server {
        client.export_excel().await.context("Server export failed")?
    } else {
        let documents = fetch_all_documents(&client, config.api.document_batch)
            .await
            .context("Failed to fetch documents")?;
        info!(documents = documents.len(), "building export workbook");
        build_export_workbook(&documents, range)?
    };

    std::fs::write(output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

const WIDTHS: [usize; 6] = [14, 4, 22, 22, 30, 14];

pub fn render_table(model: &DisplayModel, search: &str) -> String {
    if model.is_empty() {
        return if search.is_empty() {
            "No documents.\n".to_string()
        } else {
            format!("No documents match \"{}\".\n", search)
        };
    }

    let mut out = String::new();
    out.push_str(&line(&[
        "DOCUMENT", "SLOT", "BUYER", "SELLER", "PROPERTY ADDRESS", "CONSIDERATION",
    ]));
    out.push_str(&format!(
        "{}\n",
        "-".repeat(WIDTHS.iter().sum::<usize>() + 2 * (WIDTHS.len() - 1))
    ));

    for row in &model.rows {
        out.push_str(&row_line(row));
    }

    if model.rows.is_empty() {
        out.push_str("(page is past the last page)\n");
    }
    out.push_str(&format!(
        "\npage {} of {}  ({} rows)\n",
        model.page, model.total_pages, model.total_rows
    ));
    out
}

fn row_line(row: &DisplayRow) -> String {
    let name = |p: &Option<Person>| {
        p.as_ref()
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| "-".to_string())
    };
    let slot = (row.slot + 1).to_string();
    let buyer = name(&row.buyer);
    let seller = name(&row.seller);

    if row.span.is_group_head {
        let address = row.property_address.clone().unwrap_or_default();
        let consideration = row.sale_consideration.map(format_number).unwrap_or_default();
        line(&[&row.document_id, &slot, &buyer, &seller, &address, &consideration])
    } else {
        line(&["", &slot, &buyer, &seller, "", ""])
    }
}

fn line(cells: &[&str]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(WIDTHS)
        .map(|(cell, width)| format!("{:<width$}", clip(cell, width), width = width))
        .collect();
    format!("{}\n", padded.join("  ").trim_end())
}

fn clip(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut clipped: String = s.chars().take(width.saturating_sub(1)).collect();
        clipped.push('~');
        clipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deed_desk_core::models::Document;
    use deed_desk_core::view::TableOptions;

    fn deed(id: &str, buyers: usize, sellers: usize) -> Document {
        let mut d = Document::new(id);
        d.buyers = (0..buyers).map(|i| Person::named(format!("B{}", i))).collect();
        d.sellers = (0..sellers).map(|i| Person::named(format!("S{}", i))).collect();
        d
    }

    #[test]
    fn group_members_leave_document_cells_blank() {
        let docs = vec![deed("DOC001", 2, 3)];
        let model = compute_display_model(&docs, &TableQuery::default(), &TableOptions::default());
        let text = render_table(&model, "");
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[2].starts_with("DOC001"));
        assert!(lines[3].starts_with("  "));
        assert!(lines[4].contains("S2"));
        assert!(lines[4].contains(" - "), "third slot has no buyer");
        assert!(text.contains("page 1 of 1  (3 rows)"));
    }

    #[test]
    fn empty_results_are_explained() {
        let docs = vec![deed("DOC001", 1, 1)];
        let model = compute_display_model(&docs, &TableQuery::new("zzz", 1), &TableOptions::default());
        assert_eq!(render_table(&model, "zzz"), "No documents match \"zzz\".\n");
        let none = compute_display_model(&[], &TableQuery::default(), &TableOptions::default());
        assert_eq!(render_table(&none, ""), "No documents.\n");
    }

    #[test]
    fn long_cells_are_clipped() {
        assert_eq!(clip("abcdef", 4), "abc~");
        assert_eq!(clip("abc", 4), "abc");
    }
}
