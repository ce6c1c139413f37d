use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::Error;
use crate::require_extension;

/// Merge input: either an explicit, ordered list of PDF paths or a folder
/// whose immediate `.pdf` entries are merged.
pub enum MergeInput {
    Files(Vec<PathBuf>),
    Folder(PathBuf),
}

/// Merge the pages of several PDF files into a single output file.
///
/// The final page order is the concatenation of each resolved input's
/// internal page order, inputs in list order. Folder inputs are resolved to
/// their `.pdf` entries sorted lexicographically; non-PDF entries are
/// counted in a warning and skipped. An empty resolved list is an error,
/// even when the folder itself was not empty.
pub fn merge_pdfs(input: &MergeInput, output: &Path) -> Result<(), Error> {
    require_extension(output, "pdf")?;

    let inputs = resolve_inputs(input)?;
    if inputs.is_empty() {
        return Err(Error::NothingToMerge);
    }
    log::info!("merging the following PDF files:");
    for path in &inputs {
        log::info!("  - {}", path.display());
    }

    let mut merged = merge_documents(&inputs)?;
    merged.save(output)?;
    log::info!("PDF merged: {}", output.display());
    Ok(())
}

fn resolve_inputs(input: &MergeInput) -> Result<Vec<PathBuf>, Error> {
    match input {
        MergeInput::Files(files) => {
            for file in files {
                require_extension(file, "pdf")?;
            }
            Ok(files.clone())
        }
        MergeInput::Folder(folder) => {
            if !folder.is_dir() {
                return Err(Error::MergeInput(folder.clone()));
            }
            let mut matching = Vec::new();
            let mut skipped = 0usize;
            for entry in std::fs::read_dir(folder)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("pdf") {
                    matching.push(path);
                } else {
                    skipped += 1;
                }
            }
            if skipped >= 1 {
                log::warn!(
                    "{skipped} non-PDF file(s) detected in the folder; they will be ignored during merging"
                );
            }
            // Directory enumeration order is platform-dependent; sort for a
            // deterministic merge order.
            matching.sort();
            Ok(matching)
        }
    }
}

/// Page attributes that may live on an ancestor page-tree node instead of
/// the page itself.
const INHERITED_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Copy inheritable attributes from the page's ancestor chain onto the page
/// dictionary, nearest ancestor first.
fn inherit_page_attributes(doc: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
    while let Some(id) = parent {
        let Ok(node) = doc.get_dictionary(id) else {
            break;
        };
        for key in INHERITED_PAGE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
    }
}

/// Concatenate the inputs into one document.
///
/// Standard lopdf rebuild: every source is renumbered into a disjoint object
/// id range, pages are collected in input order, and a single page tree and
/// catalog replace the per-document ones. Outline objects are dropped.
fn merge_documents(inputs: &[PathBuf]) -> Result<Document, Error> {
    let mut max_id = 1u32;
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for path in inputs {
        let mut doc = Document::load(path).map_err(|source| Error::InvalidPdf {
            path: path.clone(),
            source,
        })?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, page_id) in doc.get_pages() {
            let page = doc
                .get_object(page_id)
                .and_then(|o| o.as_dict())
                .map_err(|source| Error::InvalidPdf {
                    path: path.clone(),
                    source,
                })?;
            let mut page = page.clone();
            // The merged document gets a single page tree, so attributes a
            // page inherited from its own tree must move onto the page
            // itself before re-parenting.
            inherit_page_attributes(&doc, &mut page);
            pages.push((page_id, Object::Dictionary(page)));
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Dictionary)> = None;
    let mut page_tree: Option<(ObjectId, Dictionary)> = None;

    for (object_id, object) in objects {
        let type_name = object
            .as_dict()
            .ok()
            .and_then(|d| d.get(b"Type").ok())
            .and_then(|t| t.as_name().ok());
        match type_name {
            Some(name) if name == b"Catalog" => {
                if let Ok(dict) = object.as_dict() {
                    let id = catalog.as_ref().map(|(id, _)| *id).unwrap_or(object_id);
                    catalog = Some((id, dict.clone()));
                }
            }
            Some(name) if name == b"Pages" => {
                // Fold the page-tree dictionaries together so inherited
                // attributes (Resources, MediaBox) survive the rebuild.
                if let Ok(dict) = object.as_dict() {
                    let mut dict = dict.clone();
                    if let Some((_, existing)) = &page_tree {
                        dict.extend(existing);
                    }
                    let id = page_tree.as_ref().map(|(id, _)| *id).unwrap_or(object_id);
                    page_tree = Some((id, dict));
                }
            }
            // Pages are re-inserted below with the merged parent; outlines
            // are not carried over.
            Some(name) if name == b"Page" || name == b"Outlines" || name == b"Outline" => {}
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (pages_id, mut pages_dict) =
        page_tree.unwrap_or_else(|| ((max_id, 0), Dictionary::new()));
    let (catalog_id, mut catalog_dict) =
        catalog.unwrap_or_else(|| ((max_id + 1, 0), Dictionary::new()));

    for (page_id, object) in &pages {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", Object::Reference(pages_id));
            merged.objects.insert(*page_id, Object::Dictionary(dict));
        }
    }

    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", pages.len() as u32);
    pages_dict.set(
        "Kids",
        pages
            .iter()
            .map(|(id, _)| Object::Reference(*id))
            .collect::<Vec<_>>(),
    );
    merged.objects.insert(pages_id, Object::Dictionary(pages_dict));

    catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog_dict.set("Pages", Object::Reference(pages_id));
    catalog_dict.remove(b"Outlines");
    merged
        .objects
        .insert(catalog_id, Object::Dictionary(catalog_dict));

    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = merged.objects.keys().map(|(n, _)| *n).max().unwrap_or(0);
    merged.renumber_objects();
    merged.compress();
    Ok(merged)
}
