//! This example finds a BLE device with the specified name.

use blefilter::{Error, ScanConfig, ScanFilter, Scanner};
use futures::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let name = std::env::args().nth(1).expect("Expected a device name");

    pretty_env_logger::init();

    log::info!("Scanning for device {}", name);

    let config = ScanConfig::default()
        .add_filter(ScanFilter::new().with_name(name))
        .stop_after_first_match();

    let mut scanner = Scanner::new();
    scanner.start(config).await?;

    let device = scanner.device_stream().next().await;

    println!("{:?}", device);

    Ok(())
}
