use std::sync::LazyLock;

use anyhow::Result;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use scraper::{ElementRef, Selector};

static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// A markup table in structural form: rows of cells, source order preserved.
/// Ragged rows (missing cells) are accepted input variance, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub rowspan: Option<u32>,
    pub colspan: Option<u32>,
}

impl Table {
    /// Convert a `<table>` element: every `tr` descendant becomes a row,
    /// every `td` under it a cell with trimmed text and spans copied verbatim.
    pub fn from_element(table: ElementRef) -> Table {
        let rows = table
            .select(&TR)
            .map(|row| row.select(&TD).map(Cell::from_element).collect())
            .collect();
        Table { rows }
    }

    pub fn write_xml<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("table")))?;
        for row in &self.rows {
            writer.write_event(Event::Start(BytesStart::new("tr")))?;
            for cell in row {
                let mut td = BytesStart::new("td");
                if let Some(rowspan) = cell.rowspan {
                    td.push_attribute(("rowspan", rowspan.to_string().as_str()));
                }
                if let Some(colspan) = cell.colspan {
                    td.push_attribute(("colspan", colspan.to_string().as_str()));
                }
                writer.write_event(Event::Start(td))?;
                if !cell.text.is_empty() {
                    writer.write_event(Event::Text(BytesText::new(&cell.text)))?;
                }
                writer.write_event(Event::End(BytesEnd::new("td")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("tr")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("table")))?;
        Ok(())
    }
}

impl Cell {
    fn from_element(cell: ElementRef) -> Cell {
        let text: String = cell.text().collect();
        Cell {
            text: text.trim().to_string(),
            rowspan: span_attr(cell, "rowspan"),
            colspan: span_attr(cell, "colspan"),
        }
    }
}

fn span_attr(cell: ElementRef, name: &str) -> Option<u32> {
    cell.value().attr(name).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn parse_table(markup: &str) -> Table {
        let html = Html::parse_fragment(markup);
        let table = html
            .root_element()
            .select(&Selector::parse("table").unwrap())
            .next()
            .unwrap();
        Table::from_element(table)
    }

    #[test]
    fn spans_and_trimming() {
        let t = parse_table("<table><tr><td rowspan=\"2\"> 5 mg </td><td colspan=\"3\">x</td></tr></table>");
        assert_eq!(t.rows.len(), 1);
        let cell = &t.rows[0][0];
        assert_eq!(cell.text, "5 mg");
        assert_eq!(cell.rowspan, Some(2));
        assert_eq!(cell.colspan, None);
        assert_eq!(t.rows[0][1].colspan, Some(3));
    }

    #[test]
    fn ragged_rows_accepted() {
        let t = parse_table("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>");
        assert_eq!(t.rows[0].len(), 2);
        assert_eq!(t.rows[1].len(), 1);
    }

    #[test]
    fn non_numeric_span_ignored() {
        let t = parse_table("<table><tr><td rowspan=\"two\">a</td></tr></table>");
        assert_eq!(t.rows[0][0].rowspan, None);
    }

    #[test]
    fn writes_spans_verbatim() {
        let t = parse_table("<table><tr><td rowspan=\"2\">5 mg</td></tr></table>");
        let mut writer = Writer::new(Vec::new());
        t.write_xml(&mut writer).unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            xml,
            "<table><tr><td rowspan=\"2\">5 mg</td></tr></table>"
        );
    }
}
