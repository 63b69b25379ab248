//! Free-text filtering and pagination over flattened rows.
//!
//! The predicate is evaluated per flat row but only reads document-level
//! fields (document id, every buyer and seller name, the property address),
//! so a document's rows either all match or all drop out. Pagination then
//! slices the filtered rows into fixed-size, 1-based pages, and
//! [`TableQuery`] carries the term and page between requests.

use serde::Serialize;

use crate::flatten::FlatRow;
use crate::models::Document;

/// Case-insensitive substring match of `term` against a document's searchable fields.
///
/// The term is matched as typed, spaces included. An empty term matches
/// every document.
pub fn matches_term(document: &Document, term: &str) -> bool {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return true;
    }
    matches_needle(document, &needle)
}

fn matches_needle(document: &Document, needle: &str) -> bool {
    let contains = |value: Option<&str>| {
        value
            .map(|v| v.to_lowercase().contains(needle))
            .unwrap_or(false)
    };

    contains(Some(&document.document_id))
        || document
            .buyers
            .iter()
            .chain(document.sellers.iter())
            .any(|p| contains(p.name.as_deref()))
        || contains(document.property_address())
}

/// Keep the flat rows whose document matches `term`.
pub fn filter_rows<'a>(rows: Vec<FlatRow<'a>>, term: &str) -> Vec<FlatRow<'a>> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|row| matches_needle(row.document, &needle))
        .collect()
}

/// Number of pages needed for `len` rows; zero rows means zero pages.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

/// Index range of a 1-based `page`. Page 0 is read as page 1; a page past
/// the end yields an empty range.
pub fn page_range(len: usize, page: usize, page_size: usize) -> std::ops::Range<usize> {
    let page = page.max(1);
    let start = (page - 1).saturating_mul(page_size).min(len);
    let end = start.saturating_add(page_size).min(len);
    start..end
}

/// Search term and current page of the on-screen table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableQuery {
    search_term: String,
    page: usize,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            page: 1,
        }
    }
}

impl TableQuery {
    pub fn new(search_term: impl Into<String>, page: usize) -> Self {
        Self {
            search_term: search_term.into(),
            page: page.max(1),
        }
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Change the filter. Any change resets pagination to the first page.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        let term = term.into();
        if term != self.search_term {
            self.search_term = term;
            self.page = 1;
        }
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten_documents;
    use crate::models::{Person, PropertyDetails};

    fn sample() -> Vec<Document> {
        let mut a = Document::new("DOC001");
        a.buyers = vec![Person::named("Ravi Kumar"), Person::named("Lakshmi")];
        a.sellers = vec![
            Person::named("Anand"),
            Person::named("Meena"),
            Person::named("Suresh"),
        ];
        a.property_details = Some(PropertyDetails {
            schedule_c_property_address: Some("12 MG Road, Bengaluru".to_string()),
            ..PropertyDetails::default()
        });

        let mut b = Document::new("DOC002");
        b.buyers = vec![Person::named("Farah")];
        b.sellers = vec![Person::named("Gopal")];
        vec![a, b]
    }

    #[test]
    fn match_is_case_insensitive_over_all_fields() {
        let docs = sample();
        assert!(matches_term(&docs[0], "doc001"));
        assert!(matches_term(&docs[0], "SURESH"));
        assert!(matches_term(&docs[0], "mg road"));
        assert!(!matches_term(&docs[1], "mg road"));
        assert!(matches_term(&docs[1], ""));
    }

    #[test]
    fn term_is_matched_as_typed() {
        let mut doc = Document::new("DOC009");
        doc.buyers = vec![Person::named("Kumar Swamy")];
        assert!(matches_term(&doc, "kumar"));
        assert!(!matches_term(&doc, " kumar"), "leading space is part of the term");
        doc.sellers = vec![Person::named("Ravi Kumar")];
        assert!(matches_term(&doc, " kumar"));
        assert!(!matches_term(&doc, "  "));
    }

    #[test]
    fn filter_is_document_atomic() {
        let docs = sample();
        // "suresh" is only the third seller, present on one flat row.
        let rows = filter_rows(flatten_documents(&docs), "suresh");
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.document_id() == "DOC001"));
    }

    #[test]
    fn filter_matching_nothing_gives_zero_pages() {
        let docs = sample();
        let rows = filter_rows(flatten_documents(&docs), "nobody");
        assert!(rows.is_empty());
        assert_eq!(total_pages(rows.len(), 10), 0);
    }

    #[test]
    fn page_ranges_are_one_based() {
        assert_eq!(page_range(25, 1, 10), 0..10);
        assert_eq!(page_range(25, 3, 10), 20..25);
        assert_eq!(page_range(25, 0, 10), 0..10);
        assert!(page_range(25, 4, 10).is_empty());
        assert_eq!(total_pages(25, 10), 3);
    }

    #[test]
    fn changing_filter_resets_page() {
        let mut query = TableQuery::default();
        assert_eq!(query.page(), 1);
        query.set_page(4);
        assert_eq!(query.page(), 4);
        query.set_search_term("ravi");
        assert_eq!(query.page(), 1);
        query.set_page(2);
        query.set_search_term("ravi");
        assert_eq!(query.page(), 2, "same term keeps the page");
        assert_eq!(TableQuery::new("x", 0).page(), 1);
    }
}
