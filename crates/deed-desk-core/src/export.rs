//! Fully-repeated export rows for spreadsheet consumers.
//!
//! Unlike the on-screen grid there are no spans: every person of a document
//! gets its own row (sellers first, then buyers, each in source order) and
//! every document/property field is repeated on each of them. `SL_NO`
//! increments once per document so rows can be regrouped without the id
//! column.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::models::{Document, Person, PersonRole, PropertyDetails};

/// Column headers, in output order.
pub const EXPORT_COLUMNS: [&str; 26] = [
    "SL_NO",
    "USER_TYPE",
    "Document_ID",
    "Schedule_B_Area_sqft",
    "Schedule_C_Area_sqft",
    "Schedule_C_Address_Name",
    "Property_Pincode",
    "Property_State",
    "Sale_Consideration",
    "Stamp_Duty_Fee",
    "Registration_Fee",
    "Guidance_Value",
    "Cash_Payment",
    "Transaction_Date",
    "Registration_Office",
    "Name",
    "Gender",
    "Aadhaar",
    "PAN",
    "Address",
    "Pincode",
    "State",
    "Phone",
    "Secondary_Phone",
    "Email",
    "Property_Share",
];

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn text(value: Option<&str>) -> Self {
        match value {
            Some(v) => Cell::Text(v.to_string()),
            None => Cell::Empty,
        }
    }

    fn amount(value: Option<f64>) -> Self {
        match value {
            Some(v) => Cell::Number(v),
            None => Cell::Empty,
        }
    }

    /// Text as it appears in the sheet.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
        }
    }
}

/// Render a number without a decimal point when it is whole, otherwise at full precision.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// One person row of the export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    /// Cells aligned with [`EXPORT_COLUMNS`].
    pub cells: Vec<Cell>,
}

impl ExportRow {
    /// Cell under the named column, if the column exists.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        EXPORT_COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.cells.get(i))
    }
}

/// Inclusive creation-date window.
///
/// The start bound covers its whole day from the first instant; the end
/// bound covers its whole day up to the last instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                bail!("date range start {} is after end {}", s, e);
            }
        }
        Ok(Self { start, end })
    }

    /// Parse optional `YYYY-MM-DD` bounds.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", s))
        };
        let start = start.filter(|s| !s.trim().is_empty()).map(parse).transpose()?;
        let end = end.filter(|s| !s.trim().is_empty()).map(parse).transpose()?;
        Self::new(start, end)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn lower(&self) -> Option<NaiveDateTime> {
        self.start.and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    fn upper(&self) -> Option<NaiveDateTime> {
        self.end.and_then(|d| d.and_hms_nano_opt(23, 59, 59, 999_999_999))
    }

    /// Whether a creation timestamp falls inside the window.
    ///
    /// An unbounded range admits everything, including documents without a
    /// timestamp; any bound excludes them.
    pub fn contains(&self, created_at: Option<NaiveDateTime>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(ts) = created_at else {
            return false;
        };
        self.lower().map_or(true, |lo| ts >= lo) && self.upper().map_or(true, |hi| ts <= hi)
    }
}

/// Build export rows for every document whose creation date is in `range`.
pub fn build_export_rows(documents: &[Document], range: &DateRange) -> Vec<ExportRow> {
    let mut rows = Vec::new();
    let selected = documents.iter().filter(|d| range.contains(d.created_at));
    for (index, document) in selected.enumerate() {
        let serial = (index + 1) as f64;
        let people = document
            .sellers
            .iter()
            .map(|p| (PersonRole::Seller, p))
            .chain(document.buyers.iter().map(|p| (PersonRole::Buyer, p)));
        for (role, person) in people {
            let mut cells = document_cells(serial, role, document);
            cells.extend(person_cells(role, person));
            rows.push(ExportRow { cells });
        }
    }
    rows
}

fn document_cells(serial: f64, role: PersonRole, document: &Document) -> Vec<Cell> {
    let prop = document.property_details.as_ref();
    let field = |f: fn(&PropertyDetails) -> Option<f64>| Cell::amount(prop.and_then(f));
    let text = |f: fn(&PropertyDetails) -> Option<&str>| Cell::text(prop.and_then(f));

    vec![
        Cell::Number(serial),
        Cell::Text(role.code().to_string()),
        Cell::Text(document.document_id.clone()),
        field(|p| p.schedule_b_area),
        field(|p| p.schedule_c_property_area),
        schedule_c_address(prop),
        text(|p| p.pincode.as_deref()),
        text(|p| p.state.as_deref()),
        field(|p| p.sale_consideration),
        field(|p| p.stamp_duty_fee),
        field(|p| p.registration_fee),
        field(|p| p.guidance_value),
        text(|p| p.paid_in_cash_mode.as_deref()),
        Cell::text(document.transaction_date.as_deref()),
        Cell::text(document.registration_office.as_deref()),
    ]
}

fn person_cells(role: PersonRole, person: &Person) -> Vec<Cell> {
    let share = match role {
        PersonRole::Seller => Cell::text(person.property_share.as_deref()),
        PersonRole::Buyer => Cell::Empty,
    };
    vec![
        Cell::text(person.name.as_deref()),
        Cell::text(person.gender.as_deref()),
        Cell::text(person.aadhaar_number.as_deref()),
        Cell::text(person.pan_card_number.as_deref()),
        Cell::text(person.address.as_deref()),
        Cell::text(person.pincode.as_deref()),
        Cell::text(person.state.as_deref()),
        Cell::text(person.phone_number.as_deref()),
        Cell::text(person.secondary_phone_number.as_deref()),
        Cell::text(person.email.as_deref()),
        share,
    ]
}

/// "address, property name", skipping whichever part is missing.
fn schedule_c_address(prop: Option<&PropertyDetails>) -> Cell {
    let Some(prop) = prop else {
        return Cell::Empty;
    };
    let parts: Vec<&str> = [
        prop.schedule_c_property_address.as_deref(),
        prop.schedule_c_property_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.is_empty())
    .collect();
    if parts.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(parts.join(", "))
    }
}
