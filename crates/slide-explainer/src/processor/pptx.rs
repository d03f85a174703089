use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ExtractError;
use crate::processor::{collapse_whitespace, DeckExtractor, SlideRecord};

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

/// Reads slide text out of Office Open XML presentations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PptxExtractor;

impl PptxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl DeckExtractor for PptxExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<SlideRecord>, ExtractError> {
        let file = std::fs::File::open(path).map_err(|e| ExtractError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        extract_from_reader(file)
    }
}

/// Extracts slide records from any seekable PPTX byte source.
pub fn extract_from_reader<R: Read + Seek>(reader: R) -> Result<Vec<SlideRecord>, ExtractError> {
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| ExtractError::Archive(format!("Failed to open PPTX: {}", e)))?;

    let presentation = read_part(&mut archive, PRESENTATION_PART)?;
    let rels = read_part(&mut archive, PRESENTATION_RELS_PART)?;

    let slide_rel_ids = parse_slide_id_list(&presentation)?;
    let targets = parse_relationships(&rels)?;

    let mut slides = Vec::new();
    for (idx, rel_id) in slide_rel_ids.iter().enumerate() {
        let target = targets
            .get(rel_id)
            .ok_or_else(|| ExtractError::MissingPart(format!("relationship {}", rel_id)))?;
        let part_name = resolve_target(target);
        let slide_xml = read_part(&mut archive, &part_name)?;

        let text = collapse_whitespace(&parse_slide_text(&slide_xml, &part_name)?);
        if text.is_empty() {
            continue;
        }

        slides.push(SlideRecord::new(idx as u32 + 1, text));
    }

    Ok(slides)
}

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<String, ExtractError> {
    let mut part = archive
        .by_name(name)
        .map_err(|_| ExtractError::MissingPart(name.to_string()))?;

    let mut content = String::new();
    part.read_to_string(&mut content).map_err(|e| ExtractError::Xml {
        part: name.to_string(),
        reason: format!("Failed to read part: {}", e),
    })?;
    Ok(content)
}

fn xml_error(part: &str, e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Xml {
        part: part.to_string(),
        reason: e.to_string(),
    }
}

/// Returns the relationship id of every `<p:sldId>` in deck order.
fn parse_slide_id_list(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sldId" =>
            {
                // The unprefixed `id` is the numeric slide id; the namespaced
                // one (`r:id`) points into the relationships part.
                if let Some(rel_id) = prefixed_attr(e, b"id", PRESENTATION_PART)? {
                    ids.push(rel_id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(PRESENTATION_PART, e)),
            _ => {}
        }
    }

    Ok(ids)
}

/// Maps relationship ids to their targets.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut targets = HashMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let id = plain_attr(e, b"Id", PRESENTATION_RELS_PART)?;
                let target = plain_attr(e, b"Target", PRESENTATION_RELS_PART)?;
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(PRESENTATION_RELS_PART, e)),
            _ => {}
        }
    }

    Ok(targets)
}

fn plain_attr(e: &BytesStart<'_>, name: &[u8], part: &str) -> Result<Option<String>, ExtractError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(part, err))?;
        if attr.key.prefix().is_none() && attr.key.local_name().as_ref() == name {
            return decode_attr_value(&attr.value, part).map(Some);
        }
    }
    Ok(None)
}

fn prefixed_attr(
    e: &BytesStart<'_>,
    local: &[u8],
    part: &str,
) -> Result<Option<String>, ExtractError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(part, err))?;
        if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == local {
            return decode_attr_value(&attr.value, part).map(Some);
        }
    }
    Ok(None)
}

fn decode_attr_value(raw: &[u8], part: &str) -> Result<String, ExtractError> {
    let raw = std::str::from_utf8(raw).map_err(|e| xml_error(part, e))?;
    let value = quick_xml::escape::unescape(raw).map_err(|e| xml_error(part, e))?;
    Ok(value.into_owned())
}

/// Resolves a relationship target relative to the `ppt/` directory.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = vec!["ppt"];
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Concatenates the text of every top-level text-bearing shape on a slide.
///
/// Only `<p:sp>` elements that are direct children of the slide's shape tree
/// count; shapes nested in groups, tables and pictures are skipped. Each
/// paragraph and each shape is terminated by a newline.
fn parse_slide_text(xml: &str, part: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    // Stack depth at which the current top-level shape was opened.
    let mut shape_depth: Option<usize> = None;
    let mut in_text_body = false;
    let mut in_text_element = false;

    let mut text = String::new();
    let mut shape_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name().as_ref().to_vec();
                match local.as_slice() {
                    b"sp" if shape_depth.is_none()
                        && stack.last().map(|p| p.as_slice()) == Some(b"spTree".as_slice()) =>
                    {
                        shape_depth = Some(stack.len());
                        shape_text.clear();
                    }
                    b"txBody" if shape_depth.is_some() => in_text_body = true,
                    b"t" if in_text_body => in_text_element = true,
                    _ => {}
                }
                stack.push(local);
            }
            Ok(Event::Empty(ref e)) => {
                if in_text_body && e.local_name().as_ref() == b"br" {
                    shape_text.push('\n');
                }
            }
            Ok(Event::End(ref e)) => {
                stack.pop();
                match e.local_name().as_ref() {
                    b"t" => in_text_element = false,
                    b"p" if in_text_body => shape_text.push('\n'),
                    b"txBody" => in_text_body = false,
                    b"sp" if shape_depth == Some(stack.len()) => {
                        shape_depth = None;
                        text.push_str(&shape_text);
                        text.push('\n');
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) if in_text_element => {
                let raw = std::str::from_utf8(e).map_err(|err| xml_error(part, err))?;
                let decoded = quick_xml::escape::unescape(raw).map_err(|err| xml_error(part, err))?;
                shape_text.push_str(&decoded);
            }
            Ok(Event::CData(ref e)) if in_text_element => {
                let raw = std::str::from_utf8(e).map_err(|err| xml_error(part, err))?;
                shape_text.push_str(raw);
            }
            Ok(Event::GeneralRef(ref e)) if in_text_element => {
                if let Some(ch) = e.resolve_char_ref().map_err(|err| xml_error(part, err))? {
                    shape_text.push(ch);
                } else {
                    let name = std::str::from_utf8(e).map_err(|err| xml_error(part, err))?;
                    let resolved = quick_xml::escape::resolve_predefined_entity(name)
                        .ok_or_else(|| xml_error(part, format!("unknown entity &{};", name)))?;
                    shape_text.push_str(resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(xml_error(part, "unexpected end of document"));
    }

    Ok(text)
}
