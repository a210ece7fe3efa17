#[tokio::main]
async fn main() -> std::io::Result<()> {
    armada_server::frameworks::server::run_with_config().await
}
