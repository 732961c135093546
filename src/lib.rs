//! BLE scan-result filtering and device matching.
//!
//! Scans report every advertisement the radio hears. This library decides
//! which of them the application gets to see: each advertisement becomes a
//! [`DiscoveredDevice`] and is checked against a [`ScanFilterSet`]. A device
//! passes when any filter matches, and a filter matches when all of its
//! criteria hold: exact name, any overlapping service UUID, manufacturer id
//! and exact manufacturer data.
//!
//! ## Usage
//!
//! Here is an example on how to find the first device that either has a
//! given name or advertises the battery service:
//!
//! ```rust,no_run
//! use blefilter::{Error, ScanConfig, ScanFilter, Scanner};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     pretty_env_logger::init();
//!
//!     let config = ScanConfig::default()
//!         .add_filter(ScanFilter::new().with_name("Target Device"))
//!         .add_filter(ScanFilter::new().with_service_uuid("0000180f-0000-1000-8000-00805f9b34fb"))
//!         .stop_after_first_match();
//!
//!     // Start scanning for devices
//!     let mut scanner = Scanner::new();
//!     scanner.start(config).await?;
//!
//!     // Take the first matching device
//!     let device = scanner.device_stream().next().await.unwrap();
//!     println!("{:?}", device.advertisement().await?);
//!
//!     Ok(())
//! }
//!```
//!
//! The matcher itself is synchronous and needs no adapter:
//!
//! ```rust
//! use blefilter::{DiscoveredDevice, ManufacturerData, ScanFilter, ScanFilterSet};
//!
//! let filters = ScanFilterSet::from(vec![ScanFilter::new().with_manufacturer_id(0x1234)]);
//! let device = DiscoveredDevice::new("AA:BB:CC:DD:EE:FF")
//!     .with_manufacturer_data(ManufacturerData::decode("3412AABB").unwrap());
//!
//! assert!(filters.matches(&device));
//! ```

#![warn(clippy::all, future_incompatible, nonstandard_style, rust_2018_idioms)]

pub use btleplug::api::BDAddr;

pub use device::{Device, DeviceEvent, DiscoveredDevice, RawAdvertisement};
pub use error::{DecodeError, Error, Result};
pub use filter::{matches, ScanFilter, ScanFilterSet, VendorIdMatcher};
pub use manufacturer_data::ManufacturerData;
pub use scanner::{filter_discoveries, ScanConfig, Scanner};

mod device;
mod error;
mod manufacturer_data;
mod scanner;

pub mod filter;
