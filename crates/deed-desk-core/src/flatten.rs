//! Row flattening: one document, many buyers, many sellers → flat grid rows.
//!
//! Each document expands into `max(buyers, sellers, 1)` rows. Row `i`
//! pairs the `i`-th buyer with the `i`-th seller; a slot past the end of
//! either list leaves that side empty. Documents keep their input order and
//! slots ascend within a document.

use crate::models::{Document, Person};

/// One (document, slot) pairing of the on-screen grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatRow<'a> {
    pub document: &'a Document,
    pub slot: usize,
    pub buyer: Option<&'a Person>,
    pub seller: Option<&'a Person>,
}

impl<'a> FlatRow<'a> {
    pub fn document_id(&self) -> &'a str {
        &self.document.document_id
    }
}

/// Flatten documents into grid rows, preserving input order.
///
/// A document with no buyers and no sellers still yields one row with
/// both person slots empty.
pub fn flatten_documents(documents: &[Document]) -> Vec<FlatRow<'_>> {
    let capacity = documents.iter().map(Document::slot_count).sum();
    let mut rows = Vec::with_capacity(capacity);
    for document in documents {
        for slot in 0..document.slot_count() {
            rows.push(FlatRow {
                document,
                slot,
                buyer: document.buyers.get(slot),
                seller: document.sellers.get(slot),
            });
        }
    }
    rows
}
