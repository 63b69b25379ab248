//! Rowspan planning over flat rows.
//!
//! A group is a contiguous run of rows sharing a document id. The first row
//! of a run is the group head and carries the run length as its span; every
//! other row carries no span. Groups never straddle a document boundary and
//! the head spans of a sequence sum to its length.
//!
//! # Pagination
//!
//! With [`GroupingMode::PerPage`] spans are planned on the visible page only,
//! so a document split across a page boundary gets a fresh head (with a
//! smaller span) on the next page. [`GroupingMode::Global`] plans over the
//! whole filtered sequence first and then slices: the continuation rows of a
//! split document stay non-heads and the head's span is clipped to its page.

use serde::{Deserialize, Serialize};

use crate::flatten::FlatRow;

/// Render directive for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowSpan {
    pub is_group_head: bool,
    /// Rows covered by this head (inclusive); `None` on non-head rows.
    pub span_count: Option<usize>,
}

impl RowSpan {
    fn head(span: usize) -> Self {
        Self {
            is_group_head: true,
            span_count: Some(span),
        }
    }

    fn member() -> Self {
        Self {
            is_group_head: false,
            span_count: None,
        }
    }
}

/// How spans interact with pagination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// Plan spans on the visible page slice.
    #[default]
    PerPage,
    /// Plan spans on the full sequence, then slice and clip to the page.
    Global,
}

/// Plan rowspans for a flat-row sequence.
pub fn plan_row_spans(rows: &[FlatRow<'_>]) -> Vec<RowSpan> {
    plan_spans_by(rows, |row| row.document_id())
}

/// Plan rowspans for any sequence, grouping contiguous items by `key`.
///
/// Single left-to-right scan. The span of each head is counted forward when
/// its group starts.
pub fn plan_spans_by<T, F>(items: &[T], key: F) -> Vec<RowSpan>
where
    F: Fn(&T) -> &str,
{
    let mut spans = Vec::with_capacity(items.len());
    let mut start = 0;
    while start < items.len() {
        let id = key(&items[start]);
        let len = items[start..]
            .iter()
            .take_while(|item| key(*item) == id)
            .count();
        spans.push(RowSpan::head(len));
        spans.extend(std::iter::repeat(RowSpan::member()).take(len - 1));
        start += len;
    }
    spans
}

/// Slice globally planned spans to `range`, clipping head spans at the page end.
pub fn slice_global_spans(spans: &[RowSpan], range: std::ops::Range<usize>) -> Vec<RowSpan> {
    let end = range.end.min(spans.len());
    let start = range.start.min(end);
    spans[start..end]
        .iter()
        .enumerate()
        .map(|(offset, span)| match span.span_count {
            Some(count) => RowSpan::head(count.min(end - start - offset)),
            None => *span,
        })
        .collect()
}
