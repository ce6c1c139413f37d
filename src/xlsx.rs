use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Format, Workbook};

use crate::error::Error;
use crate::require_extension;

/// Width padding added on top of the longest rendered cell value.
const WIDTH_PADDING: f64 = 2.5;

/// Apply a number format to every column in `columns` (letters, e.g. "B").
#[derive(Debug, Clone)]
pub struct ColumnFormatRule {
    pub columns: Vec<String>,
    pub number_format: String,
}

/// Group the columns from `start` to `end` (inclusive) into one outline
/// level, hidden when `hidden` is set.
#[derive(Debug, Clone)]
pub struct ColumnGroupRule {
    pub start: String,
    pub end: String,
    pub hidden: bool,
}

/// Adjust the column formatting of one worksheet, in place.
///
/// For every column, in column order: apply the number format of each rule
/// whose column set contains the column's letter (later rules override
/// earlier ones), and set the display width to the longest rendered cell
/// value plus 2.5. Group rules are then applied as outline groupings. Both
/// rule slices may be empty, which makes the corresponding step a no-op.
///
/// The workbook is rewritten at `xlsx_path`; a missing worksheet propagates
/// as the reader's error.
pub fn adjust_xlsx_columns(
    xlsx_path: &Path,
    worksheet_name: &str,
    format_rules: &[ColumnFormatRule],
    group_rules: &[ColumnGroupRule],
) -> Result<(), Error> {
    require_extension(xlsx_path, "xlsx")?;

    let mut source: Xlsx<_> =
        open_workbook(xlsx_path).map_err(|e: calamine::XlsxError| Error::Xlsx(e.to_string()))?;
    let range = source
        .worksheet_range(worksheet_name)
        .map_err(|e| Error::Xlsx(e.to_string()))?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(worksheet_name)
        .map_err(|e| Error::Xlsx(e.to_string()))?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let (_, width) = range.get_size();
    let mut max_lengths = vec![0usize; width];

    for (r, row) in range.rows().enumerate() {
        let out_row = start_row + r as u32;
        for (c, value) in row.iter().enumerate() {
            let out_col = start_col as u16 + c as u16;
            write_cell(worksheet, out_row, out_col, value)
                .map_err(|e| Error::Xlsx(e.to_string()))?;
            max_lengths[c] = max_lengths[c].max(rendered_length(value));
        }
    }

    for (c, max_length) in max_lengths.iter().enumerate() {
        let col = start_col as u16 + c as u16;
        let letter = column_letter(col);

        for rule in format_rules {
            if rule.columns.iter().any(|l| *l == letter) {
                let format = Format::new().set_num_format(&rule.number_format);
                worksheet
                    .set_column_format(col, &format)
                    .map_err(|e| Error::Xlsx(e.to_string()))?;
            }
        }

        worksheet
            .set_column_width(col, adjusted_width(*max_length))
            .map_err(|e| Error::Xlsx(e.to_string()))?;
    }

    for rule in group_rules {
        let start = column_index(&rule.start)?;
        let end = column_index(&rule.end)?;
        let result = if rule.hidden {
            worksheet.group_columns_collapsed(start, end)
        } else {
            worksheet.group_columns(start, end)
        };
        result.map_err(|e| Error::Xlsx(e.to_string()))?;
    }

    workbook
        .save(xlsx_path)
        .map_err(|e| Error::Xlsx(e.to_string()))?;
    log::info!("XLSX adjusted: {}", xlsx_path.display());
    Ok(())
}

fn write_cell(
    worksheet: &mut rust_xlsxwriter::Worksheet,
    row: u32,
    col: u16,
    value: &Data,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    match value {
        Data::Empty | Data::Error(_) => {}
        Data::String(s) => {
            worksheet.write_string(row, col, s)?;
        }
        Data::Float(v) => {
            worksheet.write_number(row, col, *v)?;
        }
        Data::Int(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        Data::Bool(v) => {
            worksheet.write_boolean(row, col, *v)?;
        }
        Data::DateTime(dt) => {
            worksheet.write_number(row, col, dt.as_f64())?;
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => {
            worksheet.write_string(row, col, s)?;
        }
    }
    Ok(())
}

/// Length of the value as it renders in a cell. Empty and error cells
/// contribute nothing.
fn rendered_length(value: &Data) -> usize {
    match value {
        Data::Empty | Data::Error(_) => 0,
        other => other.to_string().chars().count(),
    }
}

fn adjusted_width(max_length: usize) -> f64 {
    max_length as f64 + WIDTH_PADDING
}

/// Zero-based column index to spreadsheet letter ("A", "B", ..., "AA").
fn column_letter(mut index: u16) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).expect("ASCII letters")
}

/// The last column a worksheet can address, "XFD".
const MAX_COLUMN_INDEX: u32 = 16_383;

/// Spreadsheet letter to zero-based column index. Anything past "XFD" is
/// rejected, not wrapped into the addressable range.
fn column_index(letter: &str) -> Result<u16, Error> {
    if letter.is_empty() || letter.len() > 3 || !letter.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(Error::InvalidColumn(letter.to_string()));
    }
    let mut index = 0u32;
    for b in letter.bytes() {
        index = index * 26 + (b - b'A' + 1) as u32;
    }
    if index - 1 > MAX_COLUMN_INDEX {
        return Err(Error::InvalidColumn(letter.to_string()));
    }
    Ok((index - 1) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_round_trip() {
        for (index, letter) in [(0, "A"), (1, "B"), (25, "Z"), (26, "AA"), (27, "AB"), (51, "AZ"), (52, "BA")] {
            assert_eq!(column_letter(index), letter);
            assert_eq!(column_index(letter).unwrap(), index);
        }
    }

    #[test]
    fn bad_column_letters_are_rejected()  {
        for bad in ["", "a", "1", "A1"] {
            assert!(matches!(column_index(bad), Err(Error::InvalidColumn(_))));
        }
    }

    #[test]
    fn letters_past_the_last_column_are_rejected() {
        assert_eq!(column_index("XFD").unwrap(), MAX_COLUMN_INDEX as u16);
        for bad in ["XFE", "ZZZ", "AAAA", "AAAAAAA"] {
            assert!(matches!(
                column_index(bad),
                Err(Error::InvalidColumn(l)) if l == bad
            ));
        }
    }

    #[test]
    fn width_is_longest_value_plus_padding() {
        // A 10 character value yields a width of 12.5.
        assert_eq!(adjusted_width(10), 12.5);
        assert_eq!(adjusted_width(0), 2.5);
    }

    #[test]
    fn rendered_length_ignores_empty_and_error_cells() {
        assert_eq!(rendered_length(&Data::Empty), 0);
        assert_eq!(
            rendered_length(&Data::Error(calamine::CellErrorType::Div0)),
            0
        );
        assert_eq!(rendered_length(&Data::String("abcde".into())), 5);
        assert_eq!(rendered_length(&Data::Bool(true)), 4);
    }

    #[test]
    fn rendered_length_covers_numbers_as_displayed() {
        let column = [Data::Float(1234.5), Data::String("eleven chars".into())];
        let max = column.iter().map(rendered_length).max().unwrap();
        assert_eq!(max, 12);
    }
}
