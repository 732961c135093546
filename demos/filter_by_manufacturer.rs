//! This example lists devices from a manufacturer, given its company id in hex.

use blefilter::{DiscoveredDevice, Error, ScanConfig, ScanFilter, Scanner};
use futures::StreamExt;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let company_id = std::env::args()
        .nth(1)
        .and_then(|arg| u16::from_str_radix(arg.trim_start_matches("0x"), 16).ok())
        .expect("Expected a company id such as 0x004C");

    pretty_env_logger::init();

    // Fall back to the name prefix for devices that hide their manufacturer data
    let filter = ScanFilter::new()
        .with_manufacturer_id(company_id)
        .with_custom_vendor_id_matcher(|device: &DiscoveredDevice| {
            device
                .name
                .as_deref()
                .map_or(false, |name| name.starts_with("Vendor"))
        });

    let config = ScanConfig::default()
        .add_filter(filter)
        .min_rssi(-90)
        .stop_after_timeout(Duration::from_secs(30));

    let mut scanner = Scanner::new();
    scanner.start(config).await?;

    let mut device_stream = scanner.device_stream();

    // List devices as they are discovered, until the scan times out
    let mut count = 0;
    while let Some(device) = device_stream.next().await {
        match device.advertisement().await {
            Ok(Some(advertisement)) => println!(
                "{} {}",
                advertisement.address,
                advertisement
                    .manufacturer_data
                    .map(|data| data.to_formatted_string())
                    .unwrap_or_default()
            ),
            _ => println!("{:?}", device),
        }
        count += 1;
    }

    println!("Found {} device(s)", count);

    scanner.stop().await?;

    Ok(())
}
