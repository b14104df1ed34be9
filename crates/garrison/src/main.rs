//! Binary entry point for the Garrison host server.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_garrison::init().await
}
