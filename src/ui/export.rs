//! Export actions: save the current diagram as SVG or PNG.
//!
//! Rendering lives in [`crate::export`]; this module picks the destination.
//! - SVG export is supported on all targets (native + wasm).
//! - PNG export is supported on native targets only (wasm skipped).

use super::state::EditorApp;
#[cfg(not(target_arch = "wasm32"))]
use super::state::FileOperationResult;
use crate::export::{self, SvgDocument};
use eframe::egui;

impl EditorApp {
    /// Renders the diagram with the current export options.
    pub(super) fn build_export(&self) -> SvgDocument {
        export::render_svg(self.core.diagram(), self.core.selected_nodes(), &self.export_options)
    }

    /// Export to SVG: open a save dialog (native) or trigger a download (wasm).
    pub fn export_svg(&mut self, ctx: &egui::Context) {
        let doc = self.build_export();
        log::debug!("Rendered SVG export {}x{}", doc.width, doc.height);

        #[cfg(target_arch = "wasm32")]
        {
            let _ = ctx;
            if let Err(e) = Self::trigger_download("diagram.svg", doc.svg.as_bytes(), "image/svg+xml") {
                log::error!("Failed to start SVG download: {e}");
                self.status = Some(e);
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            self.spawn_export_save(ctx, "SVG", "svg", doc.svg.into_bytes());
        }
    }

    /// Export to PNG (native builds only).
    pub fn export_png(&mut self, ctx: &egui::Context) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let doc = self.build_export();
            match export::render_png(&doc, &self.export_options) {
                Ok(bytes) => self.spawn_export_save(ctx, "PNG", "png", bytes),
                Err(e) => {
                    log::error!("PNG export failed: {e}");
                    self.status = Some(format!("PNG export failed: {e}"));
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let _ = ctx;
            self.status = Some("PNG export is only available in the desktop app".to_string());
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn spawn_export_save(&self, ctx: &egui::Context, filter: &'static str, ext: &'static str, bytes: Vec<u8>) {
        let ctx = ctx.clone();
        let sender = self.file.file_operation_sender.clone();
        let file_name = format!("{}.{ext}", self.export_stem());
        tokio::spawn(async move {
            if let Some(handle) = rfd::AsyncFileDialog::new()
                .add_filter(filter, &[ext])
                .set_file_name(file_name)
                .save_file()
                .await
            {
                let path = handle.path().display().to_string();
                let result = match std::fs::write(handle.path(), bytes) {
                    Ok(()) => FileOperationResult::ExportCompleted(path),
                    Err(e) => FileOperationResult::OperationFailed(format!("Failed to export {path}: {e}")),
                };
                if let Some(tx) = sender {
                    let _ = tx.send(result);
                }
            }
            ctx.request_repaint();
        });
    }

    /// File name stem for exports, taken from the open document.
    #[cfg(not(target_arch = "wasm32"))]
    fn export_stem(&self) -> String {
        self.file
            .current_path
            .as_deref()
            .and_then(|p| std::path::Path::new(p).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "diagram".to_string())
    }
}
