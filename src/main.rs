#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    // RUST_LOG=mermaid_canvas=debug for sync and parse diagnostics
    env_logger::init();

    mermaid_canvas::run_app()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
