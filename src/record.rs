use anyhow::{ensure, Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::markup::{self, Fragment};

/// Child names of <medicalInformation> that carry structure, not attributes.
const RESERVED_CHILDREN: [&str; 3] = ["style", "content", "sections"];

/// One medication record: flat key/value attributes plus the section tree.
/// Lives for a single conversion pass, parse → merge → serialize → drop.
#[derive(Debug, Default)]
pub struct Medication {
    pub attributes: Vec<Attribute>,
    pub data: Vec<Section>,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
}

/// A drug-information section. `values` starts empty and is filled by the
/// content merge; `subdata` is carried through serialization but nothing
/// currently populates it from markup.
#[derive(Debug, Default)]
pub struct Section {
    pub id: Option<String>,
    pub title: Option<String>,
    pub values: Vec<Fragment>,
    pub subdata: Option<Vec<Section>>,
}

impl Medication {
    /// Build a record from one `<medicalInformation>` node: attributes from
    /// non-reserved children then from XML attributes, section skeletons from
    /// `<sections>`, and, when a `<content>` blob is present, the mapped
    /// markup content merged into each section.
    pub fn parse(node: roxmltree::Node) -> Result<Medication> {
        ensure!(
            node.has_tag_name("medicalInformation"),
            "expected <medicalInformation>, got <{}>",
            node.tag_name().name()
        );

        let mut attributes = Vec::new();
        for child in node.children().filter(|c| c.is_element()) {
            let tag = child.tag_name().name();
            if !RESERVED_CHILDREN.contains(&tag) {
                attributes.push(Attribute {
                    key: tag.to_string(),
                    value: child.text().map(str::to_string),
                });
            }
        }
        for attr in node.attributes() {
            attributes.push(Attribute {
                key: attr.name().to_string(),
                value: Some(attr.value().to_string()),
            });
        }

        let mut data = Vec::new();
        if let Some(sections) = node.children().find(|c| c.has_tag_name("sections")) {
            for child in sections.children().filter(|c| c.has_tag_name("section")) {
                data.push(Section::parse(child)?);
            }
        }

        let content = node
            .children()
            .find(|c| c.has_tag_name("content"))
            .and_then(|c| c.text())
            .filter(|t| !t.is_empty());
        if let Some(raw) = content {
            let mapped = markup::map_content(raw);
            for section in &mut data {
                if let Some(id) = &section.id {
                    if let Some(fragments) = mapped.get(id) {
                        section.take_values(fragments.iter().cloned());
                    }
                }
            }
        }

        Ok(Medication { attributes, data })
    }

    /// First-match lookup over the ordered attribute sequence.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .and_then(|a| a.value.as_deref())
    }

    pub fn write_xml<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("medication")))?;
        for attr in &self.attributes {
            attr.write_xml(writer)?;
        }
        for section in &self.data {
            section.write_xml(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new("medication")))?;
        Ok(())
    }
}

impl Attribute {
    fn write_xml<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new(self.key.as_str())))?;
        if let Some(value) = &self.value {
            writer.write_event(Event::Text(BytesText::new(value)))?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.key.as_str())))?;
        Ok(())
    }
}

impl Section {
    /// Read a section skeleton: its anchor id and required `<title>` child.
    fn parse(node: roxmltree::Node) -> Result<Section> {
        let title = node
            .children()
            .find(|c| c.has_tag_name("title"))
            .with_context(|| {
                format!(
                    "section {:?} is missing its required <title>",
                    node.attribute("id").unwrap_or("<no id>")
                )
            })?;
        Ok(Section {
            id: node.attribute("id").map(str::to_string),
            title: title.text().map(str::to_string),
            values: Vec::new(),
            subdata: None,
        })
    }

    /// Merge mapped fragments into this section's value list.
    pub fn take_values(&mut self, fragments: impl IntoIterator<Item = Fragment>) {
        for fragment in fragments {
            self.add_value(fragment);
        }
    }

    /// Tables pass through; text is trimmed and dropped when empty.
    pub fn add_value(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::Table(table) => self.values.push(Fragment::Table(table)),
            Fragment::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    self.values.push(Fragment::Text(trimmed.to_string()));
                }
            }
        }
    }

    /// No markup mapping populates subdata today; the model and serializer
    /// keep the capability.
    #[allow(dead_code)]
    pub fn add_subdata(&mut self, section: Section) {
        self.subdata.get_or_insert_with(Vec::new).push(section);
    }

    fn write_xml<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new("data");
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            start.push_attribute(("id", id));
        }
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            start.push_attribute(("title", title));
        }
        writer.write_event(Event::Start(start))?;

        for value in &self.values {
            writer.write_event(Event::Start(BytesStart::new("value")))?;
            match value {
                Fragment::Text(text) => {
                    writer.write_event(Event::Text(BytesText::new(text)))?;
                }
                Fragment::Table(table) => table.write_xml(writer)?,
            }
            writer.write_event(Event::End(BytesEnd::new("value")))?;
        }

        if let Some(subdata) = &self.subdata {
            for sub in subdata {
                sub.write_xml(writer)?;
            }
        }

        writer.write_event(Event::End(BytesEnd::new("data")))?;
        Ok(())
    }
}
