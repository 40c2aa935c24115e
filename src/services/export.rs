//! Excel export of scan lines and posted documents.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};

use crate::db::{ProductRow, Store};
use crate::entities::products;

const HEADERS: [&str; 6] = ["Barcode", "PIC", "Product", "Location", "UoM", "Quantity"];

/// Build the scan-line workbook: one row per line, newest first.
pub fn products_workbook(rows: &[ProductRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Products")?;

    let bold = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_with_format(0, col as u16, *header, &bold)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write(r, 0, row.barcode.as_str())?;
        sheet.write(r, 1, row.scanned_by.as_deref().unwrap_or(""))?;
        sheet.write(r, 2, row.name.as_deref().unwrap_or(""))?;
        sheet.write(r, 3, row.location_name.as_deref().unwrap_or(""))?;
        sheet.write(r, 4, row.uom_name.as_deref().unwrap_or(""))?;
        sheet.write(r, 5, row.quantity)?;
    }

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

/// Build the workbook for one posted document's lines.
pub fn document_workbook(document_name: &str, rows: &[products::Model]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    // Sheet names are capped at 31 chars and reject a few separators.
    let sheet_name: String = document_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .take(31)
        .collect();
    sheet.set_name(&sheet_name)?;

    let bold = Format::new().set_bold();
    for (col, header) in ["Barcode", "Product", "UoM", "Quantity"].iter().enumerate() {
        sheet.write_with_format(0, col as u16, *header, &bold)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write(r, 0, row.barcode.as_str())?;
        sheet.write(r, 1, row.name.as_deref().unwrap_or(""))?;
        sheet.write(r, 2, row.uom_name.as_deref().unwrap_or(""))?;
        sheet.write(r, 3, row.quantity)?;
    }

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

pub struct ExportService {
    store: Store,
}

impl ExportService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn all_products(&self) -> Result<Vec<u8>> {
        let rows = self.store.product_export_rows().await?;
        products_workbook(&rows)
    }

    /// Workbook for one document, or `None` if the document does not exist.
    pub async fn document(&self, document_id: i32) -> Result<Option<(String, Vec<u8>)>> {
        let Some(document) = self.store.get_document(document_id).await? else {
            return Ok(None);
        };

        let rows = self.store.products_for_document(document_id).await?;
        let buffer = document_workbook(&document.name, &rows)
            .with_context(|| format!("Failed to build workbook for document {document_id}"))?;

        Ok(Some((document.name, buffer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(barcode: &str, qty: f64) -> ProductRow {
        ProductRow {
            id: 1,
            product_id: Some(100),
            barcode: barcode.to_string(),
            name: Some("Tile 50x50".to_string()),
            quantity: qty,
            uom_name: Some("Dus".to_string()),
            location_name: Some("FLOOR/A1".to_string()),
            state: "draft".to_string(),
            session_name: Some("Session 1".to_string()),
            scanned_by: Some("Cindy".to_string()),
            created_at: "2026-08-06T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn products_workbook_is_a_zip_container() {
        let buffer = products_workbook(&[row("111", 2.0), row("222", 4.5)]).unwrap();
        // xlsx is a zip archive; PK is the local file header magic.
        assert_eq!(&buffer[..2], b"PK");
    }

    #[test]
    fn empty_export_still_produces_a_workbook() {
        let buffer = products_workbook(&[]).unwrap();
        assert!(!buffer.is_empty());
    }

    #[test]
    fn document_sheet_name_survives_slashes() {
        let buffer = document_workbook("TKJS/060826-1430", &[]).unwrap();
        assert_eq!(&buffer[..2], b"PK");
    }
}
