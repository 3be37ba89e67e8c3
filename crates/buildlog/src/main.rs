use buildlog::runtime::{boot, replay};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let config = boot::boot()?;
    replay::run(config).await
}
