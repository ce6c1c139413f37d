use std::path::Path;
use std::sync::{Mutex, Once};

use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use officekit::{Error, MergeInput, merge_pdfs};
use tempfile::TempDir;

static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Collects warnings so tests can assert on advisories.
struct WarnCapture;

impl log::Log for WarnCapture {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if record.level() == log::Level::Warn {
            WARNINGS.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

fn capture_warnings() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&WarnCapture).unwrap();
        log::set_max_level(log::LevelFilter::Warn);
    });
}

/// Write a PDF with `pages` pages, each page tagged `<tag>-<n>` in its
/// content stream so merge order can be asserted afterwards.
fn write_pdf(path: &Path, tag: &str, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for n in 1..=pages {
        let content = format!("BT /F1 12 Tf 72 712 Td ({tag}-{n}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as u32;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// The page tags of a PDF, in page order.
fn page_tags(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    let mut tags = Vec::new();
    for (_, page_id) in doc.get_pages() {
        let content = doc.get_page_content(page_id).unwrap();
        let text = String::from_utf8_lossy(&content);
        let start = text.find('(').expect("tag in content stream");
        let end = text[start..].find(')').unwrap() + start;
        tags.push(text[start + 1..end].to_string());
    }
    tags
}

/// Like [`write_pdf`], but Resources and MediaBox live only on the page
/// tree, so every page relies on inheritance.
fn write_pdf_inheriting(path: &Path, tag: &str, media_box: [i64; 4]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = format!("BT /F1 12 Tf 72 712 Td ({tag}-1) Tj ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => media_box.iter().map(|v| (*v).into()).collect::<Vec<Object>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn media_box(doc: &Document, page_id: ObjectId) -> Vec<i64> {
    doc.get_dictionary(page_id)
        .unwrap()
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect()
}

#[test]
fn merge_concatenates_pages_in_input_list_order() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.pdf");
    let b = dir.path().join("b.pdf");
    write_pdf(&a, "A", 3);
    write_pdf(&b, "B", 2);

    let output = dir.path().join("merged.pdf");
    merge_pdfs(
        &MergeInput::Files(vec![a.clone(), b.clone()]),
        &output,
    )
    .unwrap();
    assert_eq!(page_tags(&output), vec!["A-1", "A-2", "A-3", "B-1", "B-2"]);

    // Reversed input order reverses the group order.
    let reversed = dir.path().join("reversed.pdf");
    merge_pdfs(&MergeInput::Files(vec![b, a]), &reversed).unwrap();
    assert_eq!(
        page_tags(&reversed),
        vec!["B-1", "B-2", "A-1", "A-2", "A-3"]
    );
}

#[test]
fn folder_input_merges_pdf_entries_sorted_and_skips_the_rest() {
    let dir = TempDir::new().unwrap();
    // Created out of name order on purpose; resolution sorts.
    write_pdf(&dir.path().join("second.pdf"), "S", 1);
    write_pdf(&dir.path().join("first.pdf"), "F", 1);
    std::fs::write(dir.path().join("notes.txt"), b"not a pdf").unwrap();

    let output = dir.path().join("merged.pdf");
    merge_pdfs(
        &MergeInput::Folder(dir.path().to_path_buf()),
        &output,
    )
    .unwrap();
    assert_eq!(page_tags(&output), vec!["F-1", "S-1"]);
}

#[test]
fn folder_with_only_non_pdf_entries_is_nothing_to_merge() {
    capture_warnings();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
    std::fs::write(dir.path().join("b.csv"), b"y").unwrap();

    let out = TempDir::new().unwrap();
    let err = merge_pdfs(
        &MergeInput::Folder(dir.path().to_path_buf()),
        &out.path().join("merged.pdf"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::NothingToMerge));

    // The two skipped entries produce exactly one advisory naming the count.
    let warnings = WARNINGS.lock().unwrap();
    let matching: Vec<_> = warnings
        .iter()
        .filter(|w| w.contains("2 non-PDF file(s)"))
        .collect();
    assert_eq!(matching.len(), 1, "warnings were {warnings:?}");
}

#[test]
fn pages_keep_attributes_inherited_from_their_own_tree() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.pdf");
    let b = dir.path().join("b.pdf");
    write_pdf_inheriting(&a, "A", [0, 0, 612, 792]);
    write_pdf_inheriting(&b, "B", [0, 0, 300, 300]);

    let output = dir.path().join("merged.pdf");
    merge_pdfs(&MergeInput::Files(vec![a, b]), &output).unwrap();

    assert_eq!(page_tags(&output), vec!["A-1", "B-1"]);
    // Each page must carry its source tree's attributes; the merged page
    // tree cannot answer for both documents.
    let doc = Document::load(&output).unwrap();
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    assert_eq!(media_box(&doc, page_ids[0]), vec![0, 0, 612, 792]);
    assert_eq!(media_box(&doc, page_ids[1]), vec![0, 0, 300, 300]);
    for page_id in page_ids {
        assert!(doc.get_dictionary(page_id).unwrap().has(b"Resources"));
    }
}

#[test]
fn empty_explicit_list_is_nothing_to_merge() {
    let err = merge_pdfs(&MergeInput::Files(Vec::new()), Path::new("out.pdf")).unwrap_err();
    assert!(matches!(err, Error::NothingToMerge));
}

#[test]
fn list_entry_with_wrong_extension_fails_naming_the_entry() {
    let err = merge_pdfs(
        &MergeInput::Files(vec!["a.pdf".into(), "b.docx".into()]),
        Path::new("out.pdf"),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Extension { path, expected: "pdf" } if path == Path::new("b.docx")
    ));
}

#[test]
fn unreadable_input_is_an_invalid_pdf_error() {
    let dir = TempDir::new().unwrap();
    let bogus = dir.path().join("bogus.pdf");
    std::fs::write(&bogus, b"not a pdf at all").unwrap();

    let err = merge_pdfs(
        &MergeInput::Files(vec![bogus.clone()]),
        &dir.path().join("out.pdf"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidPdf { path, .. } if path == bogus));
}

#[test]
fn output_extension_is_validated_before_any_work() {
    let err = merge_pdfs(
        &MergeInput::Files(vec!["a.pdf".into()]),
        Path::new("merged.txt"),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Extension { path, expected: "pdf" } if path == Path::new("merged.txt")
    ));
}
