use std::fmt;
use std::sync::Arc;

use btleplug::api::{BDAddr, Peripheral as _, PeripheralProperties};
use btleplug::platform::Peripheral;

use crate::scanner::Session;
use crate::{ManufacturerData, Result};

/// Snapshot of a single advertisement.
///
/// A physical device shows up as many records over a scan session, one per
/// advertisement callback. `address` identifies the radio for the session
/// only; randomized addresses are common.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub name: Option<String>,
    pub address: String,
    /// Signal strength in dBm.
    pub rssi: i16,
    /// Service UUIDs carried by this advertisement.
    pub advertised_service_uuids: Vec<String>,
    pub manufacturer_data: Option<ManufacturerData>,
}

impl DiscoveredDevice {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    pub fn with_service_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.advertised_service_uuids.push(uuid.into());
        self
    }

    pub fn with_manufacturer_data(mut self, data: ManufacturerData) -> Self {
        self.manufacturer_data = Some(data);
        self
    }

    /// Builds the record from btleplug's view of the latest advertisement.
    ///
    /// btleplug keys manufacturer data by company id. When several entries are
    /// present the lowest id wins so the record does not depend on map order.
    pub fn from_properties(props: &PeripheralProperties) -> Self {
        let manufacturer_data = props
            .manufacturer_data
            .iter()
            .min_by_key(|(company_id, _)| **company_id)
            .map(|(company_id, payload)| {
                ManufacturerData::from_company_id(*company_id, payload.clone())
            });

        Self {
            name: props.local_name.clone(),
            address: props.address.to_string(),
            rssi: props.rssi.unwrap_or_default(),
            advertised_service_uuids: props.services.iter().map(|uuid| uuid.to_string()).collect(),
            manufacturer_data,
        }
    }
}

/// Advertisement as handed over by a platform bridge, with manufacturer data
/// still in its hex wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAdvertisement {
    pub name: Option<String>,
    pub address: String,
    pub rssi: i16,
    pub advertised_service_uuids: Vec<String>,
    pub manufacturer_data: Option<String>,
}

impl From<RawAdvertisement> for DiscoveredDevice {
    /// Malformed manufacturer data never fails the conversion: the device is
    /// reported without it.
    fn from(raw: RawAdvertisement) -> Self {
        let manufacturer_data = raw.manufacturer_data.and_then(|hex| {
            match ManufacturerData::decode(&hex) {
                Ok(data) if data.is_empty() => None,
                Ok(data) => Some(data),
                Err(e) => {
                    log::warn!(
                        "Ignoring manufacturer data {:?} from {}: {}",
                        hex,
                        raw.address,
                        e
                    );
                    None
                }
            }
        });

        Self {
            name: raw.name,
            address: raw.address,
            rssi: raw.rssi,
            advertised_service_uuids: raw.advertised_service_uuids,
            manufacturer_data,
        }
    }
}

/// A peripheral that passed the scan filters.
#[derive(Clone)]
pub struct Device {
    pub(self) _session: Arc<Session>,
    pub(crate) peripheral: Peripheral,
}

impl Device {
    pub(crate) fn new(session: Arc<Session>, peripheral: Peripheral) -> Self {
        Self {
            _session: session,
            peripheral,
        }
    }

    #[inline]
    pub fn address(&self) -> BDAddr {
        self.peripheral.address()
    }

    /// Signal strength
    #[inline]
    pub async fn rssi(&self) -> Option<i16> {
        self.peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|props| props.rssi)
    }

    /// Local name of the device
    #[inline]
    pub async fn local_name(&self) -> Option<String> {
        self.peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|props| props.local_name)
    }

    /// Latest advertisement of the device
    pub async fn advertisement(&self) -> Result<Option<DiscoveredDevice>> {
        let props = self.peripheral.properties().await?;
        Ok(props.as_ref().map(DiscoveredDevice::from_properties))
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("address", &self.address())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// First advertisement of a device that passed the filters.
    Discovered(Device),
    /// Later advertisement of an already discovered device.
    Updated(Device),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(manufacturer_data: Option<&str>) -> RawAdvertisement {
        RawAdvertisement {
            name: Some("Sensor".to_string()),
            address: "00:11:22:33:44:55".to_string(),
            rssi: -60,
            advertised_service_uuids: vec!["0000180f-0000-1000-8000-00805f9b34fb".to_string()],
            manufacturer_data: manufacturer_data.map(str::to_string),
        }
    }

    #[test]
    fn raw_advertisement_decodes_manufacturer_data() {
        let device = DiscoveredDevice::from(raw(Some("3412AABB")));

        assert_eq!(
            device.manufacturer_data,
            Some(ManufacturerData::new([0x34, 0x12], vec![0xAA, 0xBB]))
        );
        assert_eq!(device.name.as_deref(), Some("Sensor"));
        assert_eq!(device.rssi, -60);
        assert_eq!(device.advertised_service_uuids.len(), 1);
    }

    #[test]
    fn malformed_manufacturer_data_is_dropped() {
        assert_eq!(DiscoveredDevice::from(raw(Some("FF"))).manufacturer_data, None);
        assert_eq!(DiscoveredDevice::from(raw(Some("XYZW"))).manufacturer_data, None);
        assert_eq!(DiscoveredDevice::from(raw(Some(""))).manufacturer_data, None);
        assert_eq!(DiscoveredDevice::from(raw(None)).manufacturer_data, None);
    }

    #[test]
    fn properties_pick_lowest_company_id() {
        let mut props = PeripheralProperties::default();
        props.address = BDAddr::from([0x12, 0x34, 0x56, 0xAA, 0xBB, 0xCC]);
        props.local_name = Some("Beacon".to_string());
        props.rssi = Some(-42);
        props.manufacturer_data.insert(0x0059, vec![0x02]);
        props.manufacturer_data.insert(0x004C, vec![0x01]);

        let device = DiscoveredDevice::from_properties(&props);

        assert_eq!(device.address, "12:34:56:AA:BB:CC");
        assert_eq!(device.rssi, -42);
        assert_eq!(
            device.manufacturer_data,
            Some(ManufacturerData::from_company_id(0x004C, vec![0x01]))
        );
    }
}
