//! Client-side xlsx export of the fully-repeated deed rows.
//!
//! Writes the smallest Office Open XML package a spreadsheet application
//! will open: one worksheet named `Sale_Deeds`, a header row, and one row
//! per exported person. Text goes into inline strings so no shared-string
//! table is needed; amounts are written as numeric cells.

use deed_desk_core::export::{build_export_rows, Cell, DateRange, ExportRow, EXPORT_COLUMNS};
use deed_desk_core::models::Document;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::borrow::Cow;
use std::io::{Cursor, Read, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;

pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const SHEET_NAME: &str = "Sale_Deeds";

const SHEET_PATH: &str = "xl/worksheets/sheet1.xml";
/// Maximum decompressed bytes read back from a worksheet entry.
const MAX_SHEET_BYTES: u64 = 64 * 1024 * 1024;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("xlsx archive error: {0}")]
    Zip(String),
    #[error("xlsx XML error: {0}")]
    Xml(String),
    #[error("worksheet {0} exceeds size limit")]
    TooLarge(String),
}

impl From<zip::result::ZipError> for WorkbookError {
    fn from(err: zip::result::ZipError) -> Self {
        WorkbookError::Zip(err.to_string())
    }
}

impl From<std::io::Error> for WorkbookError {
    fn from(err: std::io::Error) -> Self {
        WorkbookError::Zip(err.to_string())
    }
}

/// Build the export workbook for every document whose creation date is in `range`.
pub fn build_export_workbook(
    documents: &[Document],
    range: &DateRange,
) -> Result<Vec<u8>, WorkbookError> {
    let rows = build_export_rows(documents, range);
    let sheet = sheet_xml(&rows)?;
    let workbook = workbook_xml()?;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let parts: [(&str, &[u8]); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", &workbook),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        (SHEET_PATH, &sheet),
    ];
    for (name, bytes) in parts {
        zip.start_file(name, options)?;
        zip.write_all(bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

type XmlWriter = quick_xml::Writer<Cursor<Vec<u8>>>;

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), WorkbookError> {
    writer
        .write_event(event)
        .map_err(|e| WorkbookError::Xml(e.to_string()))
}

fn declaration(writer: &mut XmlWriter) -> Result<(), WorkbookError> {
    emit(
        writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))),
    )
}

fn workbook_xml() -> Result<Vec<u8>, WorkbookError> {
    let mut writer = quick_xml::Writer::new(Cursor::new(Vec::new()));
    declaration(&mut writer)?;

    let mut root = BytesStart::new("workbook");
    root.push_attribute(("xmlns", NS_MAIN));
    root.push_attribute(("xmlns:r", NS_REL));
    emit(&mut writer, Event::Start(root))?;
    emit(&mut writer, Event::Start(BytesStart::new("sheets")))?;

    let mut sheet = BytesStart::new("sheet");
    sheet.push_attribute(("name", SHEET_NAME));
    sheet.push_attribute(("sheetId", "1"));
    sheet.push_attribute(("r:id", "rId1"));
    emit(&mut writer, Event::Empty(sheet))?;

    emit(&mut writer, Event::End(BytesEnd::new("sheets")))?;
    emit(&mut writer, Event::End(BytesEnd::new("workbook")))?;
    Ok(writer.into_inner().into_inner())
}

fn sheet_xml(rows: &[ExportRow]) -> Result<Vec<u8>, WorkbookError> {
    let mut writer = quick_xml::Writer::new(Cursor::new(Vec::new()));
    declaration(&mut writer)?;

    let mut root = BytesStart::new("worksheet");
    root.push_attribute(("xmlns", NS_MAIN));
    emit(&mut writer, Event::Start(root))?;
    emit(&mut writer, Event::Start(BytesStart::new("sheetData")))?;

    let header: Vec<Cell> = EXPORT_COLUMNS
        .iter()
        .map(|c| Cell::Text(c.to_string()))
        .collect();
    write_row(&mut writer, 1, &header)?;
    for (i, row) in rows.iter().enumerate() {
        write_row(&mut writer, i + 2, &row.cells)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("sheetData")))?;
    emit(&mut writer, Event::End(BytesEnd::new("worksheet")))?;
    Ok(writer.into_inner().into_inner())
}

fn write_row(writer: &mut XmlWriter, number: usize, cells: &[Cell]) -> Result<(), WorkbookError> {
    let row_ref = number.to_string();
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", row_ref.as_str()));
    emit(writer, Event::Start(row))?;

    for (col, cell) in cells.iter().enumerate() {
        let cell_ref = format!("{}{}", column_name(col), number);
        match cell {
            Cell::Empty => {}
            Cell::Number(_) => {
                let mut c = BytesStart::new("c");
                c.push_attribute(("r", cell_ref.as_str()));
                emit(writer, Event::Start(c))?;
                emit(writer, Event::Start(BytesStart::new("v")))?;
                emit(writer, Event::Text(BytesText::new(&cell.display())))?;
                emit(writer, Event::End(BytesEnd::new("v")))?;
                emit(writer, Event::End(BytesEnd::new("c")))?;
            }
            Cell::Text(text) => {
                let mut c = BytesStart::new("c");
                c.push_attribute(("r", cell_ref.as_str()));
                c.push_attribute(("t", "inlineStr"));
                emit(writer, Event::Start(c))?;
                emit(writer, Event::Start(BytesStart::new("is")))?;
                let mut t = BytesStart::new("t");
                t.push_attribute(("xml:space", "preserve"));
                emit(writer, Event::Start(t))?;
                emit(writer, Event::Text(BytesText::new(&xml_safe(text))))?;
                emit(writer, Event::End(BytesEnd::new("t")))?;
                emit(writer, Event::End(BytesEnd::new("is")))?;
                emit(writer, Event::End(BytesEnd::new("c")))?;
            }
        }
    }

    emit(writer, Event::End(BytesEnd::new("row")))
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= '\u{20}' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

/// Replace characters XML 1.0 cannot carry (OCR page breaks and other C0
/// controls) with spaces. quick-xml escapes markup but passes these through.
fn xml_safe(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(
            text.chars()
                .map(|c| if is_xml_char(c) { c } else { ' ' })
                .collect(),
        )
    }
}

/// Zero-based column index to spreadsheet letters (`0` → `A`, `26` → `AA`).
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Letters of a cell reference (`"AB12"` → `27`).
fn column_index(cell_ref: &str) -> Option<usize> {
    let letters: Vec<u8> = cell_ref
        .bytes()
        .take_while(|b| b.is_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters
        .iter()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
    Some(n - 1)
}

/// Read the first worksheet of an xlsx produced by [`build_export_workbook`]
/// back as rows of display strings. Missing cells read as empty strings.
pub fn read_sheet_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, WorkbookError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let entry = archive.by_name(SHEET_PATH)?;
    let mut xml = Vec::new();
    entry.take(MAX_SHEET_BYTES).read_to_end(&mut xml)?;
    if xml.len() as u64 >= MAX_SHEET_BYTES {
        return Err(WorkbookError::TooLarge(SHEET_PATH.to_string()));
    }

    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current: Option<Vec<String>> = None;
    let mut column = 0usize;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => current = Some(Vec::new()),
                b"c" => {
                    let reference = e
                        .try_get_attribute("r")
                        .map_err(|e| WorkbookError::Xml(e.to_string()))?
                        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
                    let next = current.as_ref().map_or(0, |r| r.len());
                    column = reference.as_deref().and_then(column_index).unwrap_or(next);
                    if let Some(row) = current.as_mut() {
                        if row.len() <= column {
                            row.resize(column + 1, String::new());
                        }
                    }
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let text = te.unescape().map_err(|e| WorkbookError::Xml(e.to_string()))?;
                if let Some(cell) = current.as_mut().and_then(|r| r.get_mut(column)) {
                    cell.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"row" => {
                    if let Some(row) = current.take() {
                        rows.push(row);
                    }
                }
                b"v" | b"t" => in_value = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(WorkbookError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    for row in &mut rows {
        row.resize(EXPORT_COLUMNS.len().max(row.len()), String::new());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deed_desk_core::models::{Person, PropertyDetails};

    fn deed() -> Document {
        let mut d = Document::new("DOC001");
        d.transaction_date = Some("2024-02-10".to_string());
        d.property_details = Some(PropertyDetails {
            schedule_c_property_address: Some("12 Temple Rd & Annex".to_string()),
            sale_consideration: Some(2267565.0),
            stamp_duty_fee: Some(1250.75),
            ..PropertyDetails::default()
        });
        d.sellers = vec![Person {
            property_share: Some("1/2".to_string()),
            ..Person::named("Asha <Senior>")
        }];
        d.buyers = vec![Person::named("Ravi"), Person::named("Meena")];
        d
    }

    #[test]
    fn column_names_roll_over() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_index("AB12"), Some(27));
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn workbook_reads_back_header_and_rows() {
        let bytes = build_export_workbook(&[deed()], &DateRange::default()).unwrap();
        let rows = read_sheet_rows(&bytes).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], EXPORT_COLUMNS.map(str::to_string).to_vec());

        let col = |name: &str| EXPORT_COLUMNS.iter().position(|c| *c == name).unwrap();
        assert_eq!(rows[1][col("USER_TYPE")], "S");
        assert_eq!(rows[1][col("Name")], "Asha <Senior>");
        assert_eq!(rows[1][col("Property_Share")], "1/2");
        assert_eq!(rows[2][col("USER_TYPE")], "B");
        assert_eq!(rows[3][col("Name")], "Meena");
        for row in &rows[1..] {
            assert_eq!(row[col("SL_NO")], "1");
            assert_eq!(row[col("Sale_Consideration")], "2267565");
            assert_eq!(row[col("Stamp_Duty_Fee")], "1250.75");
            assert_eq!(row[col("Schedule_C_Address_Name")], "12 Temple Rd & Annex");
            assert_eq!(row[col("Guidance_Value")], "");
        }
    }

    #[test]
    fn workbook_contains_every_part() {
        let bytes = build_export_workbook(&[], &DateRange::default()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            SHEET_PATH,
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {}", name);
        }
        let mut workbook = String::new();
        archive
            .by_name("xl/workbook.xml")
            .unwrap()
            .read_to_string(&mut workbook)
            .unwrap();
        assert!(workbook.contains(r#"name="Sale_Deeds""#));
    }

    #[test]
    fn empty_export_is_header_only() {
        let bytes = build_export_workbook(&[], &DateRange::default()).unwrap();
        let rows = read_sheet_rows(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
    }

    fn sheet_text(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name(SHEET_PATH)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn control_characters_never_reach_the_sheet() {
        let mut d = deed();
        d.sellers = vec![Person::named("RAVI\u{0c}KUMAR")];
        d.buyers = vec![Person {
            address: Some("No. 4\u{0}\u{1b}, 2nd Cross\tHebbal\u{FFFE}".to_string()),
            ..Person::named("Line\nBreak")
        }];
        let bytes = build_export_workbook(&[d], &DateRange::default()).unwrap();

        let xml = sheet_text(&bytes);
        let bad: Vec<char> = xml.chars().filter(|c| !is_xml_char(*c)).collect();
        assert!(bad.is_empty(), "non-XML characters in sheet: {:?}", bad);

        let rows = read_sheet_rows(&bytes).unwrap();
        let col = |name: &str| EXPORT_COLUMNS.iter().position(|c| *c == name).unwrap();
        assert_eq!(rows[1][col("Name")], "RAVI KUMAR");
        assert_eq!(rows[2][col("Name")], "Line\nBreak");
        assert_eq!(rows[2][col("Address")], "No. 4  , 2nd Cross\tHebbal ");
    }

    #[test]
    fn xml_safe_borrows_clean_text() {
        assert!(matches!(xml_safe("Asha & Co"), Cow::Borrowed(_)));
        assert_eq!(xml_safe("a\u{7}b"), "a b");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(read_sheet_rows(b"not a zip").is_err());
    }
}
