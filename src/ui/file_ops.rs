//! File operations for saving and loading diagrams.
//!
//! This module handles all file I/O operations including native file dialogs
//! and WASM-compatible browser-based file operations. Documents are written as
//! Mermaid text (`.mmd`); the JSON snapshot format is accepted when opening.

use super::state::{
    EditorApp, FileOperationResult, PendingConfirmAction, PendingLoadOperation, PendingSaveOperation,
};
use crate::examples::{self, ExampleKind};
use crate::types::Diagram;
use eframe::egui;

/// File name suggested by Save As when the document has no path yet.
pub(super) const DEFAULT_FILE_NAME: &str = "diagram.mmd";

fn is_json_path(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl EditorApp {
    /// Handles pending file operations for both native and WASM platforms.
    ///
    /// This method processes completed async file operations and initiates new ones.
    /// It handles the differences between native file dialogs and browser-based file operations.
    pub fn handle_pending_operations(&mut self, ctx: &egui::Context) {
        // First, process any completed file operations from the channel
        let mut results = Vec::new();
        if let Some(receiver) = &self.file.file_operation_receiver {
            while let Ok(result) = receiver.try_recv() {
                results.push(result);
            }
        }
        for result in results {
            self.apply_file_result(result);
        }

        // Handle pending save operations
        if let Some(save_op) = self.file.pending_save_operation.take() {
            let ctx = ctx.clone();
            let text = self.core.mermaid_text();
            let sender = self.file.file_operation_sender.clone();

            match save_op {
                PendingSaveOperation::SaveAs => {
                    #[cfg(target_arch = "wasm32")]
                    {
                        let result = match Self::trigger_download(DEFAULT_FILE_NAME, text.as_bytes(), "text/plain") {
                            Ok(()) => FileOperationResult::SaveCompleted(DEFAULT_FILE_NAME.to_string()),
                            Err(e) => FileOperationResult::OperationFailed(e),
                        };
                        if let Some(tx) = sender {
                            let _ = tx.send(result);
                        }
                        ctx.request_repaint();
                    }

                    #[cfg(not(target_arch = "wasm32"))]
                    {
                        let file_name = self
                            .file
                            .current_path
                            .as_deref()
                            .and_then(|p| std::path::Path::new(p).file_name())
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
                        tokio::spawn(async move {
                            if let Some(handle) = rfd::AsyncFileDialog::new()
                                .add_filter("Mermaid", &["mmd", "mermaid"])
                                .set_file_name(file_name)
                                .save_file()
                                .await
                            {
                                let path = handle.path().display().to_string();
                                let result = match std::fs::write(handle.path(), text) {
                                    Ok(()) => FileOperationResult::SaveCompleted(path),
                                    Err(e) => FileOperationResult::OperationFailed(format!(
                                        "Failed to save {path}: {e}"
                                    )),
                                };
                                if let Some(tx) = sender {
                                    let _ = tx.send(result);
                                }
                            }
                            ctx.request_repaint();
                        });
                    }
                }
                PendingSaveOperation::Save => {
                    if let Some(path) = self.file.current_path.clone() {
                        #[cfg(not(target_arch = "wasm32"))]
                        {
                            tokio::spawn(async move {
                                let result = match std::fs::write(&path, text) {
                                    Ok(()) => FileOperationResult::SaveCompleted(path),
                                    Err(e) => FileOperationResult::OperationFailed(format!(
                                        "Failed to save {path}: {e}"
                                    )),
                                };
                                if let Some(tx) = sender {
                                    let _ = tx.send(result);
                                }
                                ctx.request_repaint();
                            });
                        }

                        #[cfg(target_arch = "wasm32")]
                        {
                            // Browsers cannot write back to a previous path
                            let _ = (path, text, sender, ctx);
                            self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
                        }
                    } else {
                        self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
                    }
                }
            }
        }

        // Handle pending load operations
        if let Some(PendingLoadOperation::Load) = self.file.pending_load_operation.take() {
            let ctx = ctx.clone();
            let sender = self.file.file_operation_sender.clone();

            #[cfg(target_arch = "wasm32")]
            {
                wasm_bindgen_futures::spawn_local(async move {
                    match Self::show_open_file_picker().await {
                        Some(file) => {
                            let filename = file.name();
                            let result = match Self::read_file(file).await {
                                Ok(content) => FileOperationResult::LoadCompleted(filename, content),
                                Err(e) => FileOperationResult::OperationFailed(e),
                            };
                            if let Some(tx) = sender {
                                let _ = tx.send(result);
                            }
                        }
                        None => {
                            log::debug!("Open dialog cancelled or API not supported");
                        }
                    }
                    ctx.request_repaint();
                });
            }

            #[cfg(not(target_arch = "wasm32"))]
            {
                tokio::spawn(async move {
                    if let Some(handle) = rfd::AsyncFileDialog::new()
                        .add_filter("Mermaid", &["mmd", "mermaid", "txt"])
                        .add_filter("Diagram snapshot", &["json"])
                        .pick_file()
                        .await
                    {
                        let path = handle.path().display().to_string();
                        let result = match std::fs::read_to_string(handle.path()) {
                            Ok(content) => FileOperationResult::LoadCompleted(path, content),
                            Err(e) => {
                                FileOperationResult::OperationFailed(format!("Failed to read {path}: {e}"))
                            }
                        };
                        if let Some(tx) = sender {
                            let _ = tx.send(result);
                        }
                    }
                    ctx.request_repaint();
                });
            }
        }
    }

    /// Applies the outcome of an async file operation.
    pub(super) fn apply_file_result(&mut self, result: FileOperationResult) {
        match result {
            FileOperationResult::SaveCompleted(path) => {
                log::info!("Saved {path}");
                self.status = Some(format!("Saved {path}"));
                self.file.current_path = Some(path);
                self.core.mark_saved();
            }
            FileOperationResult::LoadCompleted(path, content) => {
                if let Err(message) = self.load_document(&path, &content) {
                    log::warn!("Failed to open {path}: {message}");
                    self.status = Some(format!("Could not open {path}: {message}"));
                }
            }
            FileOperationResult::ExportCompleted(path) => {
                log::info!("Exported {path}");
                self.status = Some(format!("Exported {path}"));
            }
            FileOperationResult::OperationFailed(error) => {
                log::error!("File operation failed: {error}");
                self.status = Some(error);
            }
        }
    }

    /// Replaces the document with file content. `.json` files hold a diagram
    /// snapshot, everything else is read as Mermaid text.
    ///
    /// On failure the current document is left untouched.
    pub(super) fn load_document(&mut self, path: &str, content: &str) -> Result<(), String> {
        if is_json_path(path) {
            let diagram = Diagram::from_json(content).map_err(|e| e.to_string())?;
            self.core.load_diagram(diagram);
        } else {
            self.core.load_mermaid(content).map_err(|e| e.to_string())?;
        }
        self.file.current_path = Some(path.to_string());
        self.after_document_replaced();
        log::info!("Opened {path}");
        self.status = Some(format!("Opened {path}"));
        Ok(())
    }

    fn after_document_replaced(&mut self) {
        self.reset_interaction();
        self.canvas.centered = false;
    }

    /// Triggers a file download in the browser (WASM only, Firefox-compatible).
    ///
    /// Creates a temporary anchor element with a blob URL and triggers a download.
    #[cfg(target_arch = "wasm32")]
    pub(super) fn trigger_download(filename: &str, content: &[u8], mime: &str) -> Result<(), String> {
        use eframe::wasm_bindgen::JsCast;

        let window = web_sys::window().ok_or("No window found")?;
        let document = window.document().ok_or("No document found")?;

        let bytes = js_sys::Uint8Array::from(content);
        let blob_parts = js_sys::Array::new();
        blob_parts.push(&bytes);

        let blob_options = web_sys::BlobPropertyBag::new();
        blob_options.set_type(mime);

        let blob = web_sys::Blob::new_with_buffer_source_sequence_and_options(&blob_parts, &blob_options)
            .map_err(|_| "Failed to create blob")?;

        let url = web_sys::Url::create_object_url_with_blob(&blob)
            .map_err(|_| "Failed to create object URL")?;

        let anchor = document
            .create_element("a")
            .map_err(|_| "Failed to create anchor element")?
            .dyn_into::<web_sys::HtmlAnchorElement>()
            .map_err(|_| "Failed to cast to anchor element")?;

        anchor.set_href(&url);
        anchor.set_download(filename);
        anchor.style().set_property("display", "none").ok();

        let body = document.body().ok_or("No body found")?;
        body.append_child(&anchor).map_err(|_| "Failed to append anchor")?;
        anchor.click();
        body.remove_child(&anchor).map_err(|_| "Failed to remove anchor")?;

        web_sys::Url::revoke_object_url(&url).map_err(|_| "Failed to revoke object URL")?;

        Ok(())
    }

    /// Opens a file picker dialog in the browser (WASM only, Firefox-compatible).
    ///
    /// Returns `None` if the user cancelled or the operation failed.
    #[cfg(target_arch = "wasm32")]
    async fn show_open_file_picker() -> Option<web_sys::File> {
        use eframe::wasm_bindgen::closure::Closure;
        use eframe::wasm_bindgen::JsCast;

        let window = web_sys::window()?;
        let document = window.document()?;

        let input = document
            .create_element("input")
            .ok()?
            .dyn_into::<web_sys::HtmlInputElement>()
            .ok()?;

        input.set_type("file");
        input.set_accept(".mmd,.mermaid,.txt,.json");
        input.style().set_property("display", "none").ok()?;

        let (sender, receiver) = futures::channel::oneshot::channel::<Option<web_sys::File>>();
        let sender = std::rc::Rc::new(std::cell::RefCell::new(Some(sender)));

        let onchange = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let input = event
                .target()
                .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok());

            if let Some(input) = input {
                let file = input.files().and_then(|files| files.get(0));
                if let Some(sender) = sender.borrow_mut().take() {
                    let _ = sender.send(file);
                }
            }
        }) as Box<dyn FnMut(_)>);

        input.set_onchange(Some(onchange.as_ref().unchecked_ref()));
        onchange.forget();

        document.body()?.append_child(&input).ok()?;
        input.click();

        let file = receiver.await.ok()??;

        document.body()?.remove_child(&input).ok()?;

        Some(file)
    }

    /// Reads a browser `File` as text (WASM only).
    #[cfg(target_arch = "wasm32")]
    async fn read_file(file: web_sys::File) -> Result<String, String> {
        use eframe::wasm_bindgen::closure::Closure;
        use eframe::wasm_bindgen::{JsCast, JsValue};

        let file_reader = web_sys::FileReader::new().map_err(|_| "Failed to create FileReader".to_string())?;

        let promise = js_sys::Promise::new(&mut |resolve, reject| {
            let reader = file_reader.clone();

            let onload = Closure::wrap(Box::new(move |_event: web_sys::ProgressEvent| {
                if let Ok(result) = reader.result() {
                    let _ = resolve.call1(&JsValue::NULL, &result);
                }
            }) as Box<dyn FnMut(_)>);
            file_reader.set_onload(Some(onload.as_ref().unchecked_ref()));
            onload.forget();

            let onerror = Closure::wrap(Box::new(move |_event: web_sys::ProgressEvent| {
                let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("Failed to read file"));
            }) as Box<dyn FnMut(_)>);
            file_reader.set_onerror(Some(onerror.as_ref().unchecked_ref()));
            onerror.forget();
        });

        file_reader
            .read_as_text(&file)
            .map_err(|_| "Failed to start reading file".to_string())?;

        let result = wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(|e| format!("Failed to read file: {e:?}"))?;

        result
            .as_string()
            .ok_or_else(|| "File content is not a string".to_string())
    }

    /// Opens a file dialog to save the diagram under a new name.
    pub fn save_as_diagram(&mut self) {
        self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
    }

    /// Saves to the current file path, or triggers "Save As" if no path is set.
    pub fn save_diagram(&mut self) {
        if self.file.current_path.is_some() {
            self.file.pending_save_operation = Some(PendingSaveOperation::Save);
        } else {
            self.save_as_diagram();
        }
    }

    /// Opens a file dialog to load a diagram.
    pub fn open_diagram(&mut self) {
        self.file.pending_load_operation = Some(PendingLoadOperation::Load);
    }

    /// Starts an empty document.
    pub fn new_diagram(&mut self) {
        self.core.new_diagram();
        self.file.current_path = None;
        self.after_document_replaced();
        self.canvas.offset = egui::Vec2::ZERO;
        self.canvas.zoom_factor = 1.0;
        self.status = None;
    }

    /// Replaces the document with a built-in sample.
    pub fn load_sample(&mut self, kind: ExampleKind) {
        match self.core.load_mermaid(examples::example_source(kind)) {
            Ok(()) => {
                self.file.current_path = None;
                self.after_document_replaced();
                self.status = None;
            }
            Err(e) => {
                log::error!("Sample {kind:?} failed to parse: {e}");
                self.status = Some(e.to_string());
            }
        }
    }

    /// Runs `action` now, or asks first when there are unsaved changes.
    pub fn request_action(&mut self, ctx: &egui::Context, action: PendingConfirmAction) {
        if self.core.is_dirty() {
            self.file.show_unsaved_dialog = true;
            self.file.pending_confirm_action = Some(action);
        } else {
            self.perform_action(ctx, action);
        }
    }

    /// Runs an action that may discard the current document.
    pub(super) fn perform_action(&mut self, ctx: &egui::Context, action: PendingConfirmAction) {
        match action {
            PendingConfirmAction::New => self.new_diagram(),
            PendingConfirmAction::Open => self.open_diagram(),
            PendingConfirmAction::Sample(kind) => self.load_sample(kind),
            PendingConfirmAction::Quit => {
                // Allow one close request to pass without interception
                self.file.allow_close_on_next_request = true;
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }
}
