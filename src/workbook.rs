//! DataFrame to XLSX sheet writing. One workbook per report artifact, one
//! sheet per partition label, header row present, no index column.

use std::path::Path;

use polars::prelude::*;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::ReportError;

/// Write one workbook with the given (sheet name, table) pairs, in order.
///
/// `null_sentinel` replaces null cells with a literal string; `None` leaves
/// them empty. A workbook with no sheets is not written at all, since the
/// XLSX format requires at least one worksheet.
pub fn write_workbook(
    path: &Path,
    sheets: &[(String, DataFrame)],
    null_sentinel: Option<&str>,
) -> Result<(), ReportError> {
    if sheets.is_empty() {
        return Ok(());
    }

    let mut workbook = Workbook::new();
    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;
        write_sheet(worksheet, table, null_sentinel)?;
    }
    workbook.save(path)?;
    Ok(())
}

fn write_sheet(
    worksheet: &mut Worksheet,
    table: &DataFrame,
    null_sentinel: Option<&str>,
) -> Result<(), ReportError> {
    for (c, name) in table.get_column_names_str().iter().enumerate() {
        worksheet.write_string(0, c as u16, *name)?;
    }

    for (c, column) in table.get_columns().iter().enumerate() {
        let series = column.as_materialized_series();
        for r in 0..table.height() {
            write_cell(worksheet, (r + 1) as u32, c as u16, series.get(r)?, null_sentinel)?;
        }
    }
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: AnyValue,
    null_sentinel: Option<&str>,
) -> Result<(), ReportError> {
    match value {
        AnyValue::Null => {
            if let Some(sentinel) = null_sentinel {
                worksheet.write_string(row, col, sentinel)?;
            }
        }
        AnyValue::String(s) => {
            worksheet.write_string(row, col, s)?;
        }
        AnyValue::StringOwned(s) => {
            worksheet.write_string(row, col, s.as_str())?;
        }
        AnyValue::Boolean(b) => {
            worksheet.write_boolean(row, col, b)?;
        }
        other => match other.try_extract::<f64>() {
            Ok(v) => {
                worksheet.write_number(row, col, v)?;
            }
            Err(_) => {
                worksheet.write_string(row, col, format!("{other}"))?;
            }
        },
    }
    Ok(())
}
