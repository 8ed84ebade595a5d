//! CAOM-2.3 observation documents.
//!
//! Fields kept as dotted paths (`telescope.geoLocationX`) become nested
//! elements (`<caom2:telescope><caom2:geoLocationX>`) and are flattened back
//! the same way when a document is read.

use crate::observation::{Artifact, Chunk, Observation, Plane};
use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::path::Path;

pub const CAOM2_NAMESPACE: &str = "http://www.opencadc.org/caom2/xml/v2.3";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const PREFIX: &str = "caom2";

/// Every chunk lives in a single part named "0"
const PART_NAME: &str = "0";

pub fn write_observation(obs: &Observation) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let root = qualified("Observation");
    let mut start = BytesStart::new(root.as_str());
    start.push_attribute(("xmlns:caom2", CAOM2_NAMESPACE));
    start.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
    start.push_attribute(("xsi:type", "caom2:SimpleObservation"));
    writer.write_event(Event::Start(start))?;

    write_text(&mut writer, "collection", &obs.collection)?;
    write_text(&mut writer, "observationID", &obs.observation_id)?;
    open(&mut writer, "algorithm")?;
    write_text(&mut writer, "name", &obs.algorithm)?;
    close(&mut writer, "algorithm")?;
    write_fields(&mut writer, &obs.fields)?;

    if !obs.planes.is_empty() {
        open(&mut writer, "planes")?;
        for plane in &obs.planes {
            write_plane(&mut writer, plane)?;
        }
        close(&mut writer, "planes")?;
    }

    writer.write_event(Event::End(BytesEnd::new(root.as_str())))?;

    let mut xml = String::from_utf8(writer.into_inner()).context("Generated XML is not UTF-8")?;
    xml.push('\n');
    Ok(xml)
}

pub fn write_to_path(obs: &Observation, path: &Path) -> Result<()> {
    let xml = write_observation(obs)?;
    std::fs::write(path, xml)
        .with_context(|| format!("Failed to write observation: {}", path.display()))
}

fn write_plane<W: std::io::Write>(writer: &mut Writer<W>, plane: &Plane) -> Result<()> {
    open(writer, "plane")?;
    write_text(writer, "productID", &plane.product_id)?;
    write_fields(writer, &plane.fields)?;
    if !plane.artifacts.is_empty() {
        open(writer, "artifacts")?;
        for artifact in &plane.artifacts {
            write_artifact(writer, artifact)?;
        }
        close(writer, "artifacts")?;
    }
    close(writer, "plane")
}

fn write_artifact<W: std::io::Write>(writer: &mut Writer<W>, artifact: &Artifact) -> Result<()> {
    open(writer, "artifact")?;
    write_text(writer, "uri", &artifact.uri)?;
    write_fields(writer, &artifact.fields)?;
    if !artifact.chunk.fields.is_empty() {
        open(writer, "parts")?;
        open(writer, "part")?;
        write_text(writer, "name", PART_NAME)?;
        open(writer, "chunks")?;
        open(writer, "chunk")?;
        write_fields(writer, &artifact.chunk.fields)?;
        close(writer, "chunk")?;
        close(writer, "chunks")?;
        close(writer, "part")?;
        close(writer, "parts")?;
    }
    close(writer, "artifact")
}

/// Dotted paths grouped by their leading segments
#[derive(Default)]
struct FieldTree<'a> {
    value: Option<&'a str>,
    children: BTreeMap<&'a str, FieldTree<'a>>,
}

impl<'a> FieldTree<'a> {
    fn build(fields: &'a BTreeMap<String, String>) -> Self {
        let mut root = FieldTree::default();
        for (path, value) in fields {
            let mut node = &mut root;
            for segment in path.split('.') {
                node = node.children.entry(segment).or_default();
            }
            node.value = Some(value.as_str());
        }
        root
    }
}

fn write_fields<W: std::io::Write>(
    writer: &mut Writer<W>,
    fields: &BTreeMap<String, String>,
) -> Result<()> {
    let tree = FieldTree::build(fields);
    for (name, node) in &tree.children {
        write_node(writer, name, node)?;
    }
    Ok(())
}

fn write_node<W: std::io::Write>(writer: &mut Writer<W>, name: &str, node: &FieldTree) -> Result<()> {
    if node.children.is_empty() {
        return write_text(writer, name, node.value.unwrap_or_default());
    }
    open(writer, name)?;
    if let Some(value) = node.value {
        writer.write_event(Event::Text(BytesText::new(value)))?;
    }
    for (child, child_node) in &node.children {
        write_node(writer, child, child_node)?;
    }
    close(writer, name)
}

fn qualified(name: &str) -> String {
    format!("{}:{}", PREFIX, name)
}

fn open<W: std::io::Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(qualified(name))))?;
    Ok(())
}

fn close<W: std::io::Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(qualified(name))))?;
    Ok(())
}

fn write_text<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    open(writer, name)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    close(writer, name)
}

/// Element with its namespace prefix dropped
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.text.as_deref())
    }

    fn required_text(&self, name: &str) -> Result<String> {
        self.child_text(name)
            .map(str::to_string)
            .with_context(|| format!("<{}> without <{}>", self.name, name))
    }
}

fn parse_elements(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().context("Malformed observation XML")? {
            Event::Start(e) => stack.push(Element {
                name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ..Default::default()
            }),
            Event::Empty(e) => {
                let element = Element {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape().context("Bad XML text")?;
                    current.text = Some(text.into_owned());
                }
            }
            Event::End(_) => {
                let element = stack.pop().context("Unbalanced observation XML")?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        anyhow::bail!("Observation XML ends inside <{}>", stack[stack.len() - 1].name);
    }
    root.context("Empty observation XML")
}

pub fn read_observation(xml: &str) -> Result<Observation> {
    let root = parse_elements(xml)?;
    if root.name != "Observation" {
        anyhow::bail!("Expected <Observation>, found <{}>", root.name);
    }

    let mut obs = Observation::simple(root.required_text("collection")?, root.required_text("observationID")?);
    for child in &root.children {
        match child.name.as_str() {
            "collection" | "observationID" => {}
            "algorithm" => {
                if let Some(name) = child.child_text("name") {
                    obs.algorithm = name.to_string();
                }
            }
            "planes" => {
                for plane in child.children.iter().filter(|c| c.name == "plane") {
                    obs.planes.push(read_plane(plane)?);
                }
            }
            _ => flatten(child, "", &mut obs.fields),
        }
    }
    Ok(obs)
}

pub fn read_from_path(path: &Path) -> Result<Observation> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read observation: {}", path.display()))?;
    read_observation(&xml).with_context(|| format!("Invalid observation: {}", path.display()))
}

fn read_plane(element: &Element) -> Result<Plane> {
    let mut plane = Plane::new(element.required_text("productID")?);
    for child in &element.children {
        match child.name.as_str() {
            "productID" => {}
            "artifacts" => {
                for artifact in child.children.iter().filter(|c| c.name == "artifact") {
                    plane.artifacts.push(read_artifact(artifact)?);
                }
            }
            _ => flatten(child, "", &mut plane.fields),
        }
    }
    Ok(plane)
}

fn read_artifact(element: &Element) -> Result<Artifact> {
    let mut artifact = Artifact::new(element.required_text("uri")?);
    for child in &element.children {
        match child.name.as_str() {
            "uri" => {}
            "parts" => {
                let chunks = child
                    .children
                    .iter()
                    .filter(|p| p.name == "part")
                    .filter_map(|p| p.child("chunks"))
                    .flat_map(|c| c.children.iter().filter(|c| c.name == "chunk"));
                for chunk in chunks {
                    artifact.chunk = read_chunk(chunk);
                }
            }
            _ => flatten(child, "", &mut artifact.fields),
        }
    }
    Ok(artifact)
}

fn read_chunk(element: &Element) -> Chunk {
    let mut chunk = Chunk::default();
    for child in &element.children {
        flatten(child, "", &mut chunk.fields);
    }
    chunk
}

fn flatten(element: &Element, prefix: &str, out: &mut BTreeMap<String, String>) {
    let path = format!("{}{}", prefix, element.name);
    if element.children.is_empty() {
        out.insert(path, element.text.clone().unwrap_or_default());
        return;
    }
    if let Some(text) = &element.text {
        out.insert(path.clone(), text.clone());
    }
    let prefix = format!("{}.", path);
    for child in &element.children {
        flatten(child, &prefix, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Observation {
        let mut obs = Observation::simple("CGPS", "MC2_DRAO-ST");
        let plan: BTreeMap<String, String> = [
            ("Observation.telescope.name", "DRAO-ST"),
            ("Observation.telescope.geoLocationX", "-2059166.5"),
            ("Observation.target.name", "MC2 & friends"),
            ("Plane.metaRelease", "2003-01-01T00:00:00.000"),
            ("Plane.provenance.inputs", "caom:CGPS/A/1 caom:CGPS/B/2"),
            ("Artifact.productType", "science"),
            ("Chunk.naxis", "4"),
            ("Chunk.position.axis.function.cd11", "-0.005"),
            ("Chunk.position.axis.function.dimension.naxis1", "1024"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        obs.augment(&plan, "ad:CGPS/cgps_mc2_1420_mhz_i_image", "1420MHz");
        obs
    }

    #[test]
    fn test_write_nests_dotted_fields() {
        let xml = write_observation(&sample()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(CAOM2_NAMESPACE));
        assert!(xml.contains("<caom2:name>DRAO-ST</caom2:name>"));
        assert!(xml.contains("<caom2:productID>1420MHz</caom2:productID>"));
        assert!(xml.contains("<caom2:name>0</caom2:name>"));
        assert!(xml.contains("MC2 &amp; friends"));
        assert!(!xml.contains("telescope.name"));
    }

    #[test]
    fn test_read_back_written_document() {
        let obs = sample();
        let parsed = read_observation(&write_observation(&obs).unwrap()).unwrap();
        assert_eq!(parsed, obs);
    }

    #[test]
    fn test_read_rejects_other_documents() {
        assert!(read_observation("<?xml version=\"1.0\"?><foo/>").is_err());
        assert!(read_observation("").is_err());
        assert!(read_observation(
            "<caom2:Observation xmlns:caom2=\"x\"><caom2:collection>CGPS</caom2:collection></caom2:Observation>"
        )
        .is_err());
    }

    #[test]
    fn test_observation_without_planes() {
        let obs = Observation::simple("VGPS", "MOS_017_VLA");
        let xml = write_observation(&obs).unwrap();
        assert!(!xml.contains("planes"));
        assert_eq!(read_observation(&xml).unwrap(), obs);
    }

    #[test]
    fn test_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.xml");
        write_to_path(&sample(), &path).unwrap();
        assert_eq!(read_from_path(&path).unwrap(), sample());
    }
}
