// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document model — a parsed PDF with ordered pages whose content streams can be
// read and appended to, built on the `lopdf` crate.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use pdfcat_core::error::{PdfCatError, Result};
use tracing::{debug, instrument};

/// Guard against cyclic /Parent chains in damaged page trees.
const MAX_TREE_DEPTH: usize = 64;

/// One page of a document. Its size never changes once the page exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    /// 1-indexed position in the document.
    pub number: u32,
    /// Page dictionary object.
    pub id: ObjectId,
    pub width: f32,
    pub height: f32,
    /// Lower-left corner of the MediaBox.
    pub origin: (f32, f32),
    /// Clockwise display rotation from `/Rotate`: 0, 90, 180 or 270.
    pub rotation: u16,
}

/// Document information fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

impl Metadata {
    /// True when no field carries any text.
    pub fn is_empty(&self) -> bool {
        [
            &self.title,
            &self.author,
            &self.subject,
            &self.keywords,
            &self.creator,
            &self.producer,
        ]
        .iter()
        .all(|field| field.as_deref().is_none_or(str::is_empty))
    }
}

/// Info dictionary keys, paired with their `Metadata` accessors.
pub(crate) const METADATA_KEYS: [&[u8]; 6] = [
    b"Title",
    b"Author",
    b"Subject",
    b"Keywords",
    b"Creator",
    b"Producer",
];

/// A parsed PDF document.
///
/// Cloning produces an independent working copy; nothing is shared with the
/// original, so edits to one never show up in the other.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    /// The underlying lopdf document.
    document: Document,
    /// Pages in document order.
    pages: Vec<Page>,
}

impl PdfDocument {
    // -- Construction ---------------------------------------------------------

    /// Parse PDF bytes already in memory.
    ///
    /// Malformed and encrypted input fail with
    /// [`PdfCatError::UnsupportedDocument`].
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn parse(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            PdfCatError::UnsupportedDocument(format!("failed to load PDF from memory: {}", err))
        })?;

        if document.trailer.has(b"Encrypt") {
            return Err(PdfCatError::UnsupportedDocument(
                "encrypted PDFs are not supported".to_string(),
            ));
        }

        let pages = collect_pages(&document)?;
        debug!(pages = pages.len(), "PDF loaded from bytes");

        Ok(Self { document, pages })
    }

    /// A document with an empty page tree.
    pub fn empty() -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        Self {
            document,
            pages: Vec::new(),
        }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Borrow the underlying lopdf document.
    pub fn inner(&self) -> &Document {
        &self.document
    }

    /// Resolve a reference to the object it points at. Other objects are
    /// returned unchanged.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        resolve(&self.document, object)
    }

    /// Decoded drawing operations of a page, across all its content streams.
    pub fn operations(&self, page: &Page) -> Result<Vec<Operation>> {
        let bytes = self.document.get_page_content(page.id).map_err(|err| {
            PdfCatError::PdfError(format!("cannot read content of page {}: {}", page.number, err))
        })?;
        let content = Content::decode(&bytes).map_err(|err| {
            PdfCatError::PdfError(format!("cannot decode content of page {}: {}", page.number, err))
        })?;
        Ok(content.operations)
    }

    /// Resolved resource dictionary of a page, following inheritance from
    /// ancestor page-tree nodes.
    pub fn resources(&self, page: &Page) -> Dictionary {
        let mut current = Some(page.id);
        let mut depth = 0;
        while let Some(id) = current {
            let Ok(dict) = self.document.get_dictionary(id) else {
                break;
            };
            if let Ok(resources) = dict.get(b"Resources") {
                if let Ok(resolved) = self.resolve(resources).as_dict() {
                    return resolved.clone();
                }
            }
            depth += 1;
            if depth > MAX_TREE_DEPTH {
                break;
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        Dictionary::new()
    }

    /// Read the document information dictionary.
    pub fn metadata(&self) -> Metadata {
        let Some(info) = self.info_dictionary() else {
            return Metadata::default();
        };
        let field = |key: &[u8]| match info.get(key).map(|obj| self.resolve(obj)) {
            Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
            _ => None,
        };
        Metadata {
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            keywords: field(b"Keywords"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
        }
    }

    // -- Mutation -------------------------------------------------------------

    /// Add an object, returning its new id.
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.document.add_object(object)
    }

    /// Append drawing operations to a page.
    ///
    /// Existing content is wrapped in `q … Q` first so a graphics state it
    /// leaves behind cannot leak into the appended operations.
    pub fn append_operations(&mut self, page: &Page, operations: Vec<Operation>) -> Result<()> {
        let encoded = encode_operations(operations)?;
        let appended = self.document.add_object(Stream::new(Dictionary::new(), encoded));

        let existing = self.content_refs(page.id)?;
        let mut contents = Vec::with_capacity(existing.len() + 3);
        if !existing.is_empty() {
            let save = self.document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let restore = self.document.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
            contents.push(Object::Reference(save));
            contents.extend(existing);
            contents.push(Object::Reference(restore));
        }
        contents.push(Object::Reference(appended));

        self.page_dictionary_mut(page.id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    /// Register `target` under `category` (e.g. `Font`, `XObject`,
    /// `ExtGState`) in the page's resources, returning the name to use in
    /// content operations.
    ///
    /// The page gets its own copy of any inherited or shared resource
    /// dictionary so other pages are unaffected.
    pub fn add_resource(
        &mut self,
        page: &Page,
        category: &str,
        prefix: &str,
        target: ObjectId,
    ) -> Result<String> {
        let mut resources = self.resources(page);
        let mut entries = match resources.get(category.as_bytes()) {
            Ok(obj) => self
                .resolve(obj)
                .as_dict()
                .cloned()
                .unwrap_or_else(|_| Dictionary::new()),
            Err(_) => Dictionary::new(),
        };

        let name = unique_name(&entries, prefix);
        entries.set(name.clone(), Object::Reference(target));
        resources.set(category, Object::Dictionary(entries));

        self.page_dictionary_mut(page.id)?
            .set("Resources", Object::Dictionary(resources));
        Ok(name)
    }

    /// Append a new page of the given size holding `operations`.
    pub fn add_page(
        &mut self,
        width: f32,
        height: f32,
        operations: Vec<Operation>,
        resources: Dictionary,
    ) -> Result<Page> {
        let pages_id = self.pages_root()?;
        let encoded = encode_operations(operations)?;
        let content_id = self.document.add_object(Stream::new(Dictionary::new(), encoded));

        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), real(width), real(height)],
            "Contents" => content_id,
            "Resources" => resources,
        });

        // Add page reference to the /Kids array and bump /Count.
        let pages_dict = self.document.get_dictionary_mut(pages_id).map_err(|err| {
            PdfCatError::PdfError(format!("page tree root unreadable: {}", err))
        })?;
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(page_id));
        }
        if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
            *count += 1;
        }

        let page = Page {
            number: self.pages.len() as u32 + 1,
            id: page_id,
            width,
            height,
            origin: (0.0, 0.0),
            rotation: 0,
        };
        self.pages.push(page);
        Ok(page)
    }

    /// Replace the information dictionary.
    pub fn set_metadata(&mut self, metadata: &Metadata) {
        let mut info = Dictionary::new();
        let fields = [
            &metadata.title,
            &metadata.author,
            &metadata.subject,
            &metadata.keywords,
            &metadata.creator,
            &metadata.producer,
        ];
        for (key, value) in METADATA_KEYS.iter().zip(fields) {
            if let Some(text) = value {
                info.set(
                    key.to_vec(),
                    Object::String(text.as_bytes().to_vec(), StringFormat::Literal),
                );
            }
        }
        let info_id = self.document.add_object(info);
        self.document.trailer.set("Info", info_id);
    }

    pub(crate) fn inner_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    // -- Helpers --------------------------------------------------------------

    fn info_dictionary(&self) -> Option<&Dictionary> {
        let info = self.document.trailer.get(b"Info").ok()?;
        self.resolve(info).as_dict().ok()
    }

    fn page_dictionary_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary> {
        self.document.get_dictionary_mut(page_id).map_err(|err| {
            PdfCatError::PdfError(format!("cannot edit page object {:?}: {}", page_id, err))
        })
    }

    /// Content stream references of a page, flattened into one list.
    fn content_refs(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let dict = self.document.get_dictionary(page_id).map_err(|err| {
            PdfCatError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
        })?;
        let refs = match dict.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.document.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(refs)
    }

    fn pages_root(&self) -> Result<ObjectId> {
        self.document
            .catalog()
            .map_err(|err| PdfCatError::PdfError(format!("no catalog: {}", err)))
            .and_then(|catalog| {
                catalog
                    .get(b"Pages")
                    .map_err(|err| PdfCatError::PdfError(format!("no /Pages: {}", err)))
                    .and_then(|pages_ref| match pages_ref {
                        Object::Reference(id) => Ok(*id),
                        _ => Err(PdfCatError::PdfError(
                            "/Pages is not a reference".to_string(),
                        )),
                    })
            })
    }
}

/// Resolve a reference against `document`. Dangling references resolve to
/// themselves.
pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Numeric operand as `f32`, whether stored as an integer or a real.
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// A real-number object.
pub(crate) fn real(value: f32) -> Object {
    Object::Real(value.into())
}

fn encode_operations(operations: Vec<Operation>) -> Result<Vec<u8>> {
    Content { operations }
        .encode()
        .map_err(|err| PdfCatError::PdfError(format!("failed to encode content stream: {}", err)))
}

fn collect_pages(document: &Document) -> Result<Vec<Page>> {
    document
        .get_pages()
        .into_iter()
        .map(|(number, id)| {
            let [x0, y0, x1, y1] = inherited_media_box(document, id).ok_or_else(|| {
                PdfCatError::UnsupportedDocument(format!("page {} has no usable MediaBox", number))
            })?;
            Ok(Page {
                number,
                id,
                width: (x1 - x0).abs(),
                height: (y1 - y0).abs(),
                origin: (x0.min(x1), y0.min(y1)),
                rotation: inherited_rotation(document, id),
            })
        })
        .collect()
}

/// First value of `key` on the page or one of its page-tree ancestors.
fn inherited<'a>(document: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        let dict = document.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            return None;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn inherited_media_box(document: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    parse_rect(document, inherited(document, page_id, b"MediaBox")?)
}

/// `/Rotate` wrapped to a quarter turn; anything unreadable counts as 0.
fn inherited_rotation(document: &Document, page_id: ObjectId) -> u16 {
    inherited(document, page_id, b"Rotate")
        .and_then(|value| number(resolve(document, value)))
        .map(|degrees| ((degrees as i64).rem_euclid(360) / 90 * 90) as u16)
        .unwrap_or(0)
}

fn parse_rect(document: &Document, object: &Object) -> Option<[f32; 4]> {
    let values = resolve(document, object).as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let mut rect = [0.0f32; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = number(resolve(document, value))?;
    }
    Some(rect)
}

/// First name `prefix`, `prefix1`, `prefix2`, … not already in `entries`.
fn unique_name(entries: &Dictionary, prefix: &str) -> String {
    if !entries.has(prefix.as_bytes()) {
        return prefix.to_string();
    }
    (1..)
        .map(|n| format!("{prefix}{n}"))
        .find(|candidate| !entries.has(candidate.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise single-byte).
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::writer::SaveOptions;

    #[test]
    fn garbage_is_unsupported() {
        let err = PdfDocument::parse(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, PdfCatError::UnsupportedDocument(_)));
    }

    #[tokio::test]
    async fn round_trip_keeps_geometry() {
        let doc = fixtures::shaded_document(3, 1500.0, 1200.0);
        let bytes = doc.save(&SaveOptions::default()).await.unwrap();

        let parsed = PdfDocument::parse(&bytes).unwrap();
        let again = PdfDocument::parse(&parsed.save(&SaveOptions::default()).await.unwrap()).unwrap();

        assert_eq!(again.page_count(), 3);
        for (page, original) in again.pages().iter().zip(doc.pages()) {
            assert_eq!(page.number, original.number);
            assert_eq!((page.width, page.height), (1500.0, 1200.0));
        }
    }

    #[test]
    fn inherited_media_box_is_found() {
        let mut doc = PdfDocument::empty();
        doc.add_page(300.0, 400.0, Vec::new(), Dictionary::new()).unwrap();
        let page = doc.pages()[0];

        // Move the MediaBox up to the page tree root.
        let pages_id = doc.pages_root().unwrap();
        doc.inner_mut()
            .get_dictionary_mut(page.id)
            .unwrap()
            .remove(b"MediaBox");
        doc.inner_mut().get_dictionary_mut(pages_id).unwrap().set(
            "MediaBox",
            vec![Object::Integer(0), Object::Integer(0), real(300.0), real(400.0)],
        );

        let pages = collect_pages(doc.inner()).unwrap();
        assert_eq!((pages[0].width, pages[0].height), (300.0, 400.0));
    }

    #[test]
    fn rotation_is_inherited_and_wrapped() {
        let mut doc = PdfDocument::empty();
        doc.add_page(300.0, 400.0, Vec::new(), Dictionary::new()).unwrap();
        doc.add_page(300.0, 400.0, Vec::new(), Dictionary::new()).unwrap();
        assert_eq!(doc.pages()[0].rotation, 0);

        let pages_id = doc.pages_root().unwrap();
        let second = doc.pages()[1].id;
        doc.inner_mut()
            .get_dictionary_mut(pages_id)
            .unwrap()
            .set("Rotate", Object::Integer(180));
        doc.inner_mut()
            .get_dictionary_mut(second)
            .unwrap()
            .set("Rotate", Object::Integer(-90));

        let pages = collect_pages(doc.inner()).unwrap();
        assert_eq!(pages[0].rotation, 180);
        assert_eq!(pages[1].rotation, 270);
    }

    #[test]
    fn append_wraps_existing_content() {
        let mut doc = fixtures::shaded_document(1, 100.0, 100.0);
        let page = doc.pages()[0];
        doc.append_operations(&page, vec![Operation::new("n", vec![])])
            .unwrap();

        let ops = doc.operations(&page).unwrap();
        let operators: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, ["q", "rg", "re", "f", "Q", "n"]);
    }

    #[test]
    fn resource_names_do_not_collide() {
        let mut doc = fixtures::shaded_document(1, 100.0, 100.0);
        let page = doc.pages()[0];
        let target = doc.add_object(Dictionary::new());

        let first = doc.add_resource(&page, "ExtGState", "GsW", target).unwrap();
        let second = doc.add_resource(&page, "ExtGState", "GsW", target).unwrap();
        assert_eq!(first, "GsW");
        assert_eq!(second, "GsW1");

        let resources = doc.resources(&page);
        let states = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
        assert!(states.has(b"GsW") && states.has(b"GsW1"));
    }

    #[test]
    fn metadata_round_trips_through_info() {
        let mut doc = PdfDocument::empty();
        doc.set_metadata(&Metadata {
            title: Some("Quarterly".into()),
            producer: Some("Writer 2.1".into()),
            ..Default::default()
        });
        let meta = doc.metadata();
        assert_eq!(meta.title.as_deref(), Some("Quarterly"));
        assert_eq!(meta.producer.as_deref(), Some("Writer 2.1"));
        assert!(!meta.is_empty());
        assert!(Metadata::default().is_empty());
    }

    #[test]
    fn utf16_text_strings_decode() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
        assert_eq!(decode_text_string(b"plain"), "plain");
    }
}
