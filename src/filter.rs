//! Scan filters and the matcher deciding which discovered devices are
//! surfaced to the application.
//!
//! A [`ScanFilterSet`] admits a device when any of its filters matches
//! (OR across filters). A [`ScanFilter`] matches when every criterion it
//! sets holds (AND within a filter). Unset criteria always hold, so an
//! empty filter admits everything, and so does an empty set.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::DiscoveredDevice;

/// Caller supplied fallback for the manufacturer id criterion.
pub trait VendorIdMatcher: Send + Sync {
    fn matches_vendor(&self, device: &DiscoveredDevice) -> bool;
}

impl<F> VendorIdMatcher for F
where
    F: Fn(&DiscoveredDevice) -> bool + Send + Sync,
{
    fn matches_vendor(&self, device: &DiscoveredDevice) -> bool {
        self(device)
    }
}

#[derive(Clone, Default)]
pub struct ScanFilter {
    /// Exact, case-sensitive device name.
    pub device_name: Option<String>,
    /// Matches if any advertised UUID equals one of these, ignoring case.
    pub service_uuids: Option<Vec<String>>,
    /// 16-bit company id, see [`ScanFilter::with_manufacturer_id`].
    pub manufacturer_id: Option<u16>,
    /// Company id to exact payload.
    pub manufacturer_data: Option<HashMap<u16, Vec<u8>>>,
    pub custom_vendor_id_matcher: Option<Arc<dyn VendorIdMatcher>>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn with_service_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.service_uuids
            .get_or_insert_with(Vec::new)
            .push(uuid.into());
        self
    }

    pub fn with_service_uuids<I, S>(mut self, uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.service_uuids
            .get_or_insert_with(Vec::new)
            .extend(uuids.into_iter().map(Into::into));
        self
    }

    /// Require the device to belong to a manufacturer.
    ///
    /// A device matches if its manufacturer data carries this company id, or
    /// if the lower 16 bits of the OUI of its address equal it, or if the
    /// custom vendor matcher accepts it. The OUI check is a heuristic: OUIs
    /// are not company ids and there is no mapping table behind it.
    pub fn with_manufacturer_id(mut self, manufacturer_id: u16) -> Self {
        self.manufacturer_id = Some(manufacturer_id);
        self
    }

    /// Require manufacturer data with exactly this company id and payload.
    pub fn with_manufacturer_data(mut self, company_id: u16, payload: Vec<u8>) -> Self {
        self.manufacturer_data
            .get_or_insert_with(HashMap::new)
            .insert(company_id, payload);
        self
    }

    pub fn with_custom_vendor_id_matcher(
        mut self,
        matcher: impl VendorIdMatcher + 'static,
    ) -> Self {
        self.custom_vendor_id_matcher = Some(Arc::new(matcher));
        self
    }

    /// Checks the device against every criterion set on this filter.
    pub fn matches(&self, device: &DiscoveredDevice) -> bool {
        self.matches_name(device)
            && self.matches_services(device)
            && self.matches_manufacturer_id(device)
            && self.matches_manufacturer_data(device)
    }

    fn matches_name(&self, device: &DiscoveredDevice) -> bool {
        match &self.device_name {
            None => true,
            Some(name) => device.name.as_deref() == Some(name.as_str()),
        }
    }

    fn matches_services(&self, device: &DiscoveredDevice) -> bool {
        let wanted = match &self.service_uuids {
            None => return true,
            Some(wanted) => wanted,
        };

        device.advertised_service_uuids.iter().any(|advertised| {
            wanted
                .iter()
                .any(|uuid| uuid.to_lowercase() == advertised.to_lowercase())
        })
    }

    fn matches_manufacturer_id(&self, device: &DiscoveredDevice) -> bool {
        let manufacturer_id = match self.manufacturer_id {
            None => return true,
            Some(manufacturer_id) => manufacturer_id,
        };

        let advertised = device
            .manufacturer_data
            .as_ref()
            .and_then(|data| data.company_id());
        if advertised == Some(manufacturer_id) {
            return true;
        }

        if oui(&device.address).map(|oui| (oui & 0xFFFF) as u16) == Some(manufacturer_id) {
            return true;
        }

        // TODO: match company ids carried in service data once a mapping exists.

        self.custom_vendor_id_matcher
            .as_ref()
            .map_or(false, |matcher| matcher.matches_vendor(device))
    }

    fn matches_manufacturer_data(&self, device: &DiscoveredDevice) -> bool {
        let expected = match &self.manufacturer_data {
            Some(expected) if !expected.is_empty() => expected,
            _ => return true,
        };

        let advertised = match device.manufacturer_data.as_ref() {
            Some(data) => data,
            None => return false,
        };

        match advertised.company_id() {
            Some(company_id) => {
                expected.len() == 1
                    && expected.get(&company_id).map(Vec::as_slice) == Some(advertised.payload())
            }
            None => false,
        }
    }

    fn is_unrestricted(&self) -> bool {
        self.device_name.is_none()
            && self.service_uuids.is_none()
            && self.manufacturer_id.is_none()
            && self.manufacturer_data.as_ref().map_or(true, HashMap::is_empty)
    }
}

impl fmt::Debug for ScanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanFilter")
            .field("device_name", &self.device_name)
            .field("service_uuids", &self.service_uuids)
            .field("manufacturer_id", &self.manufacturer_id)
            .field("manufacturer_data", &self.manufacturer_data)
            .field(
                "custom_vendor_id_matcher",
                &self.custom_vendor_id_matcher.is_some(),
            )
            .finish()
    }
}

/// First three address bytes as a 24-bit integer, if the address starts
/// with six hex digits once separators are dropped.
fn oui(address: &str) -> Option<u32> {
    let hex: String = address
        .chars()
        .filter(|c| *c != ':')
        .take(6)
        .collect::<String>()
        .to_uppercase();

    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    u32::from_str_radix(&hex, 16).ok()
}

/// Ordered filters a scan session evaluates each advertisement against.
#[derive(Debug, Clone, Default)]
pub struct ScanFilterSet {
    filters: Vec<ScanFilter>,
}

impl ScanFilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: ScanFilter) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanFilter> {
        self.filters.iter()
    }

    /// True if the set is empty or any filter matches, checked in order.
    pub fn matches(&self, device: &DiscoveredDevice) -> bool {
        matches(device, Some(self.filters.as_slice()))
    }

    /// Service UUIDs safe to hand to the platform scanner as a pre-filter.
    ///
    /// The platform drops everything that advertises none of these, so the
    /// list is only non-empty when every filter requires at least one service
    /// and all of them parse as UUIDs.
    pub fn native_service_uuids(&self) -> Vec<Uuid> {
        let mut uuids = Vec::new();

        for filter in &self.filters {
            let wanted = match &filter.service_uuids {
                Some(wanted) if !wanted.is_empty() => wanted,
                _ => return Vec::new(),
            };

            for uuid in wanted {
                match Uuid::parse_str(uuid) {
                    Ok(uuid) if !uuids.contains(&uuid) => uuids.push(uuid),
                    Ok(_) => {}
                    Err(_) => return Vec::new(),
                }
            }
        }

        uuids
    }

    /// Whether some filter admits every device.
    pub(crate) fn is_unrestricted(&self) -> bool {
        self.filters.is_empty() || self.filters.iter().any(ScanFilter::is_unrestricted)
    }
}

impl From<Vec<ScanFilter>> for ScanFilterSet {
    fn from(filters: Vec<ScanFilter>) -> Self {
        Self { filters }
    }
}

impl FromIterator<ScanFilter> for ScanFilterSet {
    fn from_iter<I: IntoIterator<Item = ScanFilter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ScanFilterSet {
    type Item = &'a ScanFilter;
    type IntoIter = std::slice::Iter<'a, ScanFilter>;

    fn into_iter(self) -> Self::IntoIter {
        self.filters.iter()
    }
}

/// Decides whether a device passes a list of filters.
///
/// No list, or an empty one, admits every device. Otherwise the first
/// matching filter admits it.
pub fn matches(device: &DiscoveredDevice, filters: Option<&[ScanFilter]>) -> bool {
    match filters {
        None => true,
        Some([]) => true,
        Some(filters) => filters.iter().any(|filter| filter.matches(device)),
    }
}
