// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Serializer — turns a `PdfDocument` into bytes, optionally clearing metadata
// and compacting the object layout on the way out.
//
// Stream compression runs in batches with a cooperative yield between them so a
// large save never starves other tasks on the same runtime thread.

use lopdf::{Object, ObjectId};
use pdfcat_core::AppConfig;
use pdfcat_core::error::{PdfCatError, Result};
use tracing::{debug, info, instrument};

use super::document::{METADATA_KEYS, PdfDocument};

/// Serializer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Drop unreferenced objects, renumber the rest, and Flate-compress
    /// uncompressed streams.
    pub compact_object_layout: bool,
    /// Remove title, author, subject, keywords, creator, producer, and the
    /// catalog's XMP stream.
    pub clear_metadata: bool,
    /// Streams compressed between yields.
    pub batch_size: usize,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compact_object_layout: true,
            clear_metadata: false,
            batch_size: 50,
        }
    }
}

impl SaveOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            compact_object_layout: config.compact_object_layout,
            clear_metadata: false,
            batch_size: config.save_batch_size,
        }
    }

    /// Same options with metadata clearing switched on.
    pub fn clearing_metadata(self) -> Self {
        Self {
            clear_metadata: true,
            ..self
        }
    }
}

impl PdfDocument {
    /// Serialize the document to PDF bytes.
    ///
    /// `self` is left untouched; all save-time rewriting happens on a copy.
    /// The same document saved with the same options yields identical bytes.
    #[instrument(skip_all, fields(pages = self.page_count(), compact = options.compact_object_layout))]
    pub async fn save(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        let mut copy = self.clone();

        if options.clear_metadata {
            copy.clear_metadata();
        }

        if options.compact_object_layout {
            let doc = copy.inner_mut();
            let pruned = doc.prune_objects();
            doc.renumber_objects();
            debug!(pruned = pruned.len(), "object layout compacted");
            copy.compress_streams(options.batch_size.max(1)).await;
        }

        tokio::task::yield_now().await;

        let mut buffer = Vec::new();
        copy.inner_mut()
            .save_to(&mut buffer)
            .map_err(|err| PdfCatError::Compression(format!("failed to serialize PDF: {}", err)))?;

        info!(bytes = buffer.len(), "PDF serialized");
        Ok(buffer)
    }

    /// Remove the information fields and the XMP metadata stream.
    ///
    /// Leaves an already-clean document unchanged.
    pub(crate) fn clear_metadata(&mut self) {
        let doc = self.inner_mut();

        let info_id = match doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        match info_id {
            Some(id) => {
                if let Ok(info) = doc.get_dictionary_mut(id) {
                    for key in METADATA_KEYS {
                        info.remove(key);
                    }
                }
            }
            None => {
                if let Ok(Object::Dictionary(info)) = doc.trailer.get_mut(b"Info") {
                    for key in METADATA_KEYS {
                        info.remove(key);
                    }
                }
            }
        }

        let root_id = doc.trailer.get(b"Root").and_then(Object::as_reference).ok();
        if let Some(root_id) = root_id {
            if let Ok(catalog) = doc.get_dictionary_mut(root_id) {
                catalog.remove(b"Metadata");
            }
        }
        debug!("document metadata cleared");
    }

    async fn compress_streams(&mut self, batch_size: usize) {
        let doc = self.inner_mut();
        let stream_ids: Vec<ObjectId> = doc
            .objects
            .iter()
            .filter(|(_, object)| matches!(object, Object::Stream(_)))
            .map(|(id, _)| *id)
            .collect();

        for batch in stream_ids.chunks(batch_size) {
            for id in batch {
                if let Some(Object::Stream(stream)) = self.inner_mut().objects.get_mut(id) {
                    // Streams that are already filtered, or refuse compression, stay as they are.
                    let _ = stream.compress();
                }
            }
            tokio::task::yield_now().await;
        }
        debug!(streams = stream_ids.len(), "streams compressed");
    }
}
