use crate::options::TableFormat;
use anyhow::Result;
use deforest::YearlyLossTable;
use std::io::Write;

/// Formats hectares with two decimals.
///
/// With `decimal_comma` the output uses Spanish conventions, i.e.
/// `1.234,56` rather than `1,234.56`.
pub fn hectares(value: f64, decimal_comma: bool) -> String {
    if !decimal_comma {
        return format!("{value:.2}");
    }
    let fixed = format!("{:.2}", value.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, digit) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    let sign = if value.is_sign_negative() && fixed != "0.00" {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped},{frac}")
}

pub fn write_table<W: Write>(
    out: &mut W,
    table: &YearlyLossTable,
    format: TableFormat,
    decimal_comma: bool,
) -> Result<()> {
    match format {
        TableFormat::Display => write_display(out, table, decimal_comma),
        TableFormat::Csv => write_csv(out, table, decimal_comma),
        TableFormat::Json => {
            serde_json::to_writer(&mut *out, table)?;
            writeln!(out)?;
            Ok(())
        }
    }
}

fn write_display<W: Write>(out: &mut W, table: &YearlyLossTable, decimal_comma: bool) -> Result<()> {
    if table.is_empty() {
        writeln!(out, "no forest loss in the period")?;
        return Ok(());
    }
    let rows: Vec<(String, String)> = table
        .iter()
        .map(|row| {
            (
                row.year.to_string(),
                hectares(row.deforestation_hectares, decimal_comma),
            )
        })
        .collect();
    let total = hectares(table.total_hectares(), decimal_comma);
    let width = rows
        .iter()
        .map(|(_, ha)| ha.len())
        .chain([total.len(), "hectares".len()])
        .max()
        .unwrap_or_default();
    writeln!(out, "{:<5}  {:>width$}", "year", "hectares")?;
    for (year, ha) in &rows {
        writeln!(out, "{year:<5}  {ha:>width$}")?;
    }
    writeln!(out, "{:<5}  {total:>width$}", "total")?;
    Ok(())
}

/// CSV with a header row. Decimal commas switch the separator to `;`.
fn write_csv<W: Write>(out: &mut W, table: &YearlyLossTable, decimal_comma: bool) -> Result<()> {
    let sep = if decimal_comma { ';' } else { ',' };
    writeln!(out, "year{sep}deforestation_hectares")?;
    for row in table.iter() {
        let ha = if decimal_comma {
            format!("{:.4}", row.deforestation_hectares).replace('.', ",")
        } else {
            row.deforestation_hectares.to_string()
        };
        writeln!(out, "{}{sep}{ha}", row.year)?;
    }
    Ok(())
}
