// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preview controller — drives the Idle → Computing → Ready cycle.
//
// Each settings change starts a numbered cycle and hands back a `PreviewJob`.
// Jobs run independently against their own copy of the uploaded bytes; when a
// result comes back, only the newest cycle may install it. Older results are
// dropped along with their bytes. Installing swaps the live handle in one step,
// so exactly one handle is live once the controller is ready.

use std::sync::Arc;

use pdfcat_core::error::Result;
use pdfcat_core::{AppConfig, WatermarkSettings, WatermarkSpec};
use pdfcat_document::{PdfDocument, SaveOptions, composite};
use tracing::{debug, info, instrument, warn};

use crate::handle::{PreviewHandle, PreviewStore};

/// Where the controller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    /// No preview exists yet.
    Idle,
    /// `cycle` is the newest cycle and has not reported back.
    Computing { cycle: u64 },
    /// The live handle shows the result of `cycle`.
    Ready { cycle: u64 },
}

/// One preview computation, detached from the controller so it can run on
/// its own task.
#[derive(Debug, Clone)]
pub struct PreviewJob {
    cycle: u64,
    source: Arc<[u8]>,
    spec: Option<WatermarkSpec>,
    save_options: SaveOptions,
}

impl PreviewJob {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Watermark this job applies; `None` previews the document as uploaded.
    pub fn spec(&self) -> Option<&WatermarkSpec> {
        self.spec.as_ref()
    }

    /// Re-parse the uploaded bytes, apply the watermark, and serialize.
    #[instrument(skip_all, fields(cycle = self.cycle))]
    pub async fn run(self) -> PreviewResult {
        let outcome = self.render().await;
        PreviewResult {
            cycle: self.cycle,
            spec: self.spec,
            outcome,
        }
    }

    async fn render(&self) -> Result<Vec<u8>> {
        let document = PdfDocument::parse(&self.source)?;
        tokio::task::yield_now().await;

        let document = match &self.spec {
            Some(spec) => composite(document, spec).await?,
            None => document,
        };
        document.save(&self.save_options).await
    }
}

/// What a finished job produced.
#[derive(Debug)]
pub struct PreviewResult {
    cycle: u64,
    spec: Option<WatermarkSpec>,
    outcome: Result<Vec<u8>>,
}

impl PreviewResult {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// How a result was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// The result is now the live preview.
    Installed(PreviewHandle),
    /// A newer cycle had already started; the result was discarded.
    Stale { cycle: u64, latest: u64 },
}

/// Owns the uploaded document, the editable settings, and the single live
/// preview handle.
#[derive(Debug)]
pub struct PreviewController {
    /// Uploaded bytes. Never modified; every job parses its own copy.
    source: Option<Arc<[u8]>>,
    settings: WatermarkSettings,
    save_options: SaveOptions,
    latest_cycle: u64,
    state: PreviewState,
    store: PreviewStore,
    live: Option<PreviewHandle>,
    /// Cycle whose result the live handle shows.
    installed_cycle: Option<u64>,
    ready_spec: Option<WatermarkSpec>,
}

impl PreviewController {
    pub fn new(settings: WatermarkSettings, save_options: SaveOptions) -> Self {
        Self {
            source: None,
            settings,
            save_options,
            latest_cycle: 0,
            state: PreviewState::Idle,
            store: PreviewStore::new(),
            live: None,
            installed_cycle: None,
            ready_spec: None,
        }
    }

    /// Start from the configured defaults.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.watermark_settings(), SaveOptions::from_config(config))
    }

    // -- Inputs ---------------------------------------------------------------

    /// Take a new upload and start the first cycle for it.
    ///
    /// Bytes that do not parse are rejected and the previous upload, if any,
    /// stays in place.
    #[instrument(skip_all)]
    pub fn load(&mut self, bytes: impl Into<Arc<[u8]>>) -> Result<PreviewJob> {
        let bytes = bytes.into();
        let document = PdfDocument::parse(&bytes)?;
        info!(pages = document.page_count(), bytes = bytes.len(), "document loaded for preview");

        self.source = Some(Arc::clone(&bytes));
        Ok(self.start_cycle(bytes))
    }

    /// Change the settings. Starts a new cycle when a document is loaded.
    pub fn update(&mut self, edit: impl FnOnce(&mut WatermarkSettings)) -> Option<PreviewJob> {
        edit(&mut self.settings);
        let source = self.source.clone()?;
        Some(self.start_cycle(source))
    }

    /// Change the settings and wait for the resulting preview.
    ///
    /// Runs the job inline, so the result is always from the newest cycle.
    pub async fn apply(
        &mut self,
        edit: impl FnOnce(&mut WatermarkSettings),
    ) -> Result<Option<PreviewHandle>> {
        let Some(job) = self.update(edit) else {
            return Ok(None);
        };
        match self.finish(job.run().await)? {
            PreviewOutcome::Installed(handle) => Ok(Some(handle)),
            PreviewOutcome::Stale { .. } => Ok(None),
        }
    }

    /// Hand a job's result back.
    ///
    /// A result from an older cycle is dropped. For the newest cycle the new
    /// handle is created and the old one revoked in the same step. If the
    /// newest cycle failed, the controller keeps whatever preview it already
    /// had and the error is returned.
    pub fn finish(&mut self, result: PreviewResult) -> Result<PreviewOutcome> {
        let latest = self.latest_cycle;
        if result.cycle != latest {
            debug!(cycle = result.cycle, latest, "discarding superseded preview");
            return Ok(PreviewOutcome::Stale {
                cycle: result.cycle,
                latest,
            });
        }

        match result.outcome {
            Ok(bytes) => {
                let handle = self.store.create(Arc::from(bytes));
                if let Some(previous) = self.live.replace(handle.clone()) {
                    self.store.revoke(&previous);
                }
                self.installed_cycle = Some(latest);
                self.ready_spec = result.spec;
                self.state = PreviewState::Ready { cycle: latest };
                info!(cycle = latest, handle = %handle, "preview ready");
                Ok(PreviewOutcome::Installed(handle))
            }
            Err(err) => {
                self.state = match self.installed_cycle {
                    Some(cycle) => PreviewState::Ready { cycle },
                    None => PreviewState::Idle,
                };
                warn!(cycle = latest, %err, "preview failed");
                Err(err)
            }
        }
    }

    /// Revoke the live preview and forget the upload.
    pub fn close(&mut self) {
        if let Some(handle) = self.live.take() {
            self.store.revoke(&handle);
        }
        self.source = None;
        self.installed_cycle = None;
        self.ready_spec = None;
        self.latest_cycle += 1;
        self.state = PreviewState::Idle;
    }

    // -- Observers ------------------------------------------------------------

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn settings(&self) -> &WatermarkSettings {
        &self.settings
    }

    /// The uploaded bytes exactly as received.
    pub fn source(&self) -> Option<&[u8]> {
        self.source.as_deref()
    }

    /// The live preview handle.
    pub fn current(&self) -> Option<&PreviewHandle> {
        self.live.as_ref()
    }

    /// Bytes behind the live preview, e.g. for download.
    pub fn current_bytes(&self) -> Option<Arc<[u8]>> {
        self.live.as_ref().and_then(|handle| self.store.get(handle))
    }

    /// Bytes behind any handle this controller issued and has not revoked.
    pub fn bytes(&self, handle: &PreviewHandle) -> Option<Arc<[u8]>> {
        self.store.get(handle)
    }

    /// The watermark shown by the live preview, `None` if it shows the
    /// document unwatermarked.
    pub fn ready_spec(&self) -> Option<&WatermarkSpec> {
        self.ready_spec.as_ref()
    }

    /// Number of handles not yet revoked.
    pub fn live_handles(&self) -> usize {
        self.store.live_count()
    }

    // -- Helpers --------------------------------------------------------------

    fn start_cycle(&mut self, source: Arc<[u8]>) -> PreviewJob {
        self.latest_cycle += 1;
        let cycle = self.latest_cycle;
        self.state = PreviewState::Computing { cycle };

        let spec = self.settings.active_spec();
        if spec.is_none() {
            debug!(cycle, "watermark incomplete, previewing the plain document");
        }
        PreviewJob {
            cycle,
            source,
            spec,
            save_options: self.save_options,
        }
    }
}
