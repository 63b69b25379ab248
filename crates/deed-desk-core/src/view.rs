//! Display model for the grouped, paginated on-screen table.
//!
//! [`compute_display_model`] is the single entry point the UI shell uses:
//! flatten → filter → paginate → plan spans.

use serde::Serialize;

use crate::flatten::{flatten_documents, FlatRow};
use crate::grouping::{plan_row_spans, slice_global_spans, GroupingMode, RowSpan};
use crate::models::{Document, Person};
use crate::search::{filter_rows, page_range, total_pages, TableQuery};

/// Table layout options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    pub page_size: usize,
    pub grouping: GroupingMode,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            grouping: GroupingMode::PerPage,
        }
    }
}

/// One rendered grid row with its rowspan directive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub document_id: String,
    pub slot: usize,
    pub transaction_date: Option<String>,
    pub registration_office: Option<String>,
    pub property_address: Option<String>,
    pub sale_consideration: Option<f64>,
    pub registration_fee: Option<f64>,
    pub buyer: Option<Person>,
    pub seller: Option<Person>,
    #[serde(flatten)]
    pub span: RowSpan,
}

impl DisplayRow {
    fn from_flat(row: &FlatRow<'_>, span: RowSpan) -> Self {
        let doc = row.document;
        let prop = doc.property_details.as_ref();
        Self {
            document_id: doc.document_id.clone(),
            slot: row.slot,
            transaction_date: doc.transaction_date.clone(),
            registration_office: doc.registration_office.clone(),
            property_address: doc.property_address().map(str::to_string),
            sale_consideration: prop.and_then(|p| p.sale_consideration),
            registration_fee: prop.and_then(|p| p.registration_fee),
            buyer: row.buyer.cloned(),
            seller: row.seller.cloned(),
            span,
        }
    }
}

/// The visible page of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayModel {
    pub rows: Vec<DisplayRow>,
    pub page: usize,
    pub total_pages: usize,
    /// Flat rows after filtering, across all pages.
    pub total_rows: usize,
}

impl DisplayModel {
    /// True when nothing matched. This is a valid state, not a failure.
    pub fn is_empty(&self) -> bool {
        self.total_rows == 0
    }
}

/// Build the visible page of `documents` for `query`.
pub fn compute_display_model(
    documents: &[Document],
    query: &TableQuery,
    options: &TableOptions,
) -> DisplayModel {
    let page = query.page();
    let rows = filter_rows(flatten_documents(documents), query.search_term());
    let range = page_range(rows.len(), page, options.page_size);

    let spans = match options.grouping {
        GroupingMode::PerPage => plan_row_spans(&rows[range.clone()]),
        GroupingMode::Global => slice_global_spans(&plan_row_spans(&rows), range.clone()),
    };

    let visible = rows[range]
        .iter()
        .zip(spans)
        .map(|(row, span)| DisplayRow::from_flat(row, span))
        .collect();

    DisplayModel {
        rows: visible,
        page: page.max(1),
        total_pages: total_pages(rows.len(), options.page_size),
        total_rows: rows.len(),
    }
}
