/// Entry point for the dockmon container status service.
///
/// Connects to the local container runtime (Docker Engine API), and serves
/// aggregated container status and recent container logs over HTTP.
///
/// If the runtime is unreachable at startup the server still starts and
/// answers with `503 Service Unavailable` until the runtime comes back.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug DOCKMON_LISTEN_ADDR=127.0.0.1:8000 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    dockmon::run().await?;
    Ok(())
}
