use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use quick_xml::Writer;
use tracing::{debug, info};

use crate::record::Medication;

#[derive(Debug)]
pub struct ConvertCounts {
    pub records: usize,
    pub sections: usize,
    pub values: usize,
}

impl ConvertCounts {
    pub fn print(&self) {
        println!(
            "Wrote {} medications, {} sections, {} values.",
            self.records, self.sections, self.values
        );
    }
}

/// Convert an AIPS export to cleaned per-medication XML.
///
/// The input document is parsed as one tree, but each record is rendered to a
/// complete string in memory and written to the output in a single call
/// before the next one is touched. A failure mid-batch therefore leaves the
/// file ending on the last fully written record, never inside one.
pub fn convert_file(input: &Path, output: &Path) -> Result<ConvertCounts> {
    let xml = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let doc = roxmltree::Document::parse(&xml)
        .with_context(|| format!("malformed XML in {}", input.display()))?;
    let root = doc.root_element();
    ensure!(
        root.has_tag_name("medicalInformations"),
        "expected <medicalInformations> root, got <{}>",
        root.tag_name().name()
    );

    let nodes: Vec<_> = root
        .descendants()
        .filter(|n| n.has_tag_name("medicalInformation"))
        .collect();
    info!("input tree parsed: {} medication records", nodes.len());

    let mut file = fs::File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    file.write_all(b"<medications>")?;

    let pb = progress_bar(nodes.len());
    let mut counts = ConvertCounts {
        records: 0,
        sections: 0,
        values: 0,
    };

    for (i, node) in nodes.iter().enumerate() {
        let medi = Medication::parse(*node)
            .with_context(|| format!("record #{} failed to convert", i))?;
        debug!(
            "record #{}: {}",
            i,
            medi.get("title").unwrap_or("<untitled>")
        );
        let rendered = render_record(&medi)
            .with_context(|| format!("record #{} failed to serialize", i))?;
        file.write_all(rendered.as_bytes())
            .with_context(|| format!("record #{} failed to write", i))?;

        counts.records += 1;
        counts.sections += medi.data.len();
        counts.values += medi.data.iter().map(|s| s.values.len()).sum::<usize>();
        pb.inc(1);
    }

    file.write_all(b"\n</medications>\n")?;
    pb.finish_and_clear();
    Ok(counts)
}

/// Pretty-print one record, indented one level for its place inside the
/// `<medications>` envelope.
fn render_record(medi: &Medication) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    medi.write_xml(&mut writer)?;
    let rendered = String::from_utf8(writer.into_inner())?;
    Ok(format!("\n\t{}", rendered.replace('\n', "\n\t")))
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

pub struct InputStats {
    pub records: usize,
    pub with_content: usize,
    /// (section id, occurrence count), most frequent first.
    pub section_ids: Vec<(String, usize)>,
}

/// Count records, content blobs and section-id frequencies in an export.
pub fn gather_stats(input: &Path) -> Result<InputStats> {
    let xml = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let doc = roxmltree::Document::parse(&xml)
        .with_context(|| format!("malformed XML in {}", input.display()))?;

    let mut records = 0;
    let mut with_content = 0;
    let mut ids: HashMap<String, usize> = HashMap::new();

    for node in doc
        .root_element()
        .descendants()
        .filter(|n| n.has_tag_name("medicalInformation"))
    {
        records += 1;
        if node
            .children()
            .any(|c| c.has_tag_name("content") && c.text().is_some_and(|t| !t.is_empty()))
        {
            with_content += 1;
        }
        for section in node
            .descendants()
            .filter(|n| n.has_tag_name("section"))
        {
            if let Some(id) = section.attribute("id") {
                *ids.entry(id.to_string()).or_default() += 1;
            }
        }
    }

    let mut section_ids: Vec<_> = ids.into_iter().collect();
    section_ids.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(InputStats {
        records,
        with_content,
        section_ids,
    })
}
