use std::fs::File;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

use crate::error::Error;
use crate::require_extension;

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

#[derive(Clone, Copy)]
enum Mode {
    /// Replace a run only when its full text equals a key.
    Exact,
    /// Replace every key occurrence inside a run's text.
    Substring,
}

/// Populate the tables of a DOCX template.
///
/// Walks every run inside every cell of every top-level table and, when the
/// run's full text is exactly equal to a key in `pairs`, replaces the entire
/// run text with the mapped value. Runs whose text merely contains a key are
/// left untouched; that exact-match contract is deliberate, since table
/// placeholders occupy whole cells.
///
/// The mutated document is written to `output`. Zero matches is a valid
/// silent no-op.
pub fn populate_docx_table(
    pairs: &[(&str, &str)],
    template: &Path,
    output: &Path,
) -> Result<(), Error> {
    populate(pairs, template, output, Mode::Exact)
}

/// Populate the top-level paragraphs of a DOCX template.
///
/// For every run of every body paragraph, each key occurring anywhere in the
/// run's text is substring-replaced with the mapped value. Keys are applied
/// in `pairs` order, so a run may be rewritten by several keys in sequence.
pub fn populate_docx_paragraph(
    pairs: &[(&str, &str)],
    template: &Path,
    output: &Path,
) -> Result<(), Error> {
    populate(pairs, template, output, Mode::Substring)
}

fn populate(
    pairs: &[(&str, &str)],
    template: &Path,
    output: &Path,
    mode: Mode,
) -> Result<(), Error> {
    check_pairs(pairs)?;
    require_extension(template, "docx")?;
    require_extension(output, "docx")?;

    let file = File::open(template).map_err(|e| Error::InvalidDocx(e.to_string()))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| Error::InvalidDocx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::InvalidDocx(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::InvalidDocx(e.to_string()))?;

    let rewritten = substitute(&xml, pairs, mode)?;
    write_archive(&mut archive, output, &rewritten)?;

    log::info!("DOCX generated: {}", output.display());
    Ok(())
}

/// The pairs must form a genuine key to value mapping.
fn check_pairs(pairs: &[(&str, &str)]) -> Result<(), Error> {
    for (i, (key, _)) in pairs.iter().enumerate() {
        if pairs[..i].iter().any(|(earlier, _)| earlier == key) {
            return Err(Error::DuplicateKey((*key).to_string()));
        }
    }
    Ok(())
}

fn wml_children<'a>(
    node: roxmltree::Node<'a, 'a>,
    name: &'static str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'a>> {
    node.children()
        .filter(move |n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &'static str) -> Option<roxmltree::Node<'a, 'a>> {
    wml_children(node, name).next()
}

/// Collect the replacement edits for the whole document and splice them into
/// the raw XML. Working on byte ranges keeps every untouched run, property
/// and formatting boundary byte-identical to the template.
fn substitute(xml: &str, pairs: &[(&str, &str)], mode: Mode) -> Result<String, Error> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| Error::InvalidDocx(e.to_string()))?;
    let body = wml(doc.root_element(), "body")
        .ok_or_else(|| Error::InvalidDocx("missing w:body".into()))?;

    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    match mode {
        Mode::Exact => {
            // document -> table -> row -> cell -> paragraph -> run
            for table in wml_children(body, "tbl") {
                for row in wml_children(table, "tr") {
                    for cell in wml_children(row, "tc") {
                        for para in wml_children(cell, "p") {
                            for run in wml_children(para, "r") {
                                edit_run(run, pairs, mode, &mut edits);
                            }
                        }
                    }
                }
            }
        }
        Mode::Substring => {
            for para in wml_children(body, "p") {
                for run in wml_children(para, "r") {
                    edit_run(run, pairs, mode, &mut edits);
                }
            }
        }
    }

    Ok(splice(xml, edits))
}

fn edit_run(
    run: roxmltree::Node,
    pairs: &[(&str, &str)],
    mode: Mode,
    edits: &mut Vec<(Range<usize>, String)>,
) {
    let texts: Vec<roxmltree::Node> = wml_children(run, "t").collect();
    if texts.is_empty() {
        return;
    }
    // A run's text is the concatenation of its w:t children.
    let current: String = texts.iter().map(|n| element_text(*n)).collect();

    let replacement = match mode {
        Mode::Exact => pairs
            .iter()
            .find(|(key, _)| *key == current)
            .map(|(_, value)| (*value).to_string()),
        Mode::Substring => {
            let mut updated = current.clone();
            for (key, value) in pairs {
                updated = updated.replace(key, value);
            }
            (updated != current).then_some(updated)
        }
    };
    let Some(new_text) = replacement else {
        return;
    };

    // The first w:t carries the whole new text, the rest become empty, the
    // same collapse a run-text assignment performs in word processors.
    let prefix = texts[0].lookup_prefix(WML_NS).filter(|p| !p.is_empty());
    let tag = match prefix {
        Some(p) => format!("{p}:t"),
        None => "t".to_string(),
    };
    edits.push((
        texts[0].range(),
        format!(
            "<{tag} xml:space=\"preserve\">{}</{tag}>",
            escape_text(&new_text)
        ),
    ));
    for node in &texts[1..] {
        edits.push((node.range(), format!("<{tag}/>")));
    }
}

fn element_text(node: roxmltree::Node) -> String {
    node.children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn splice(xml: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    if edits.is_empty() {
        return xml.to_string();
    }
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for (range, text) in edits {
        out.push_str(&xml[cursor..range.start]);
        out.push_str(&text);
        cursor = range.end;
    }
    out.push_str(&xml[cursor..]);
    out
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Copy every archive entry untouched except `word/document.xml`, which is
/// replaced by the spliced XML.
fn write_archive(
    archive: &mut zip::ZipArchive<File>,
    output: &Path,
    document_xml: &str,
) -> Result<(), Error> {
    let out = File::create(output)?;
    let mut writer = zip::ZipWriter::new(out);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if entry.name() == "word/document.xml" {
            drop(entry);
            writer.start_file("word/document.xml", options)?;
            writer.write_all(document_xml.as_bytes())?;
        } else {
            writer.raw_copy_file(entry)?;
        }
    }
    writer.finish()?;
    Ok(())
}
