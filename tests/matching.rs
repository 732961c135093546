use blefilter::{
    filter_discoveries, matches, DiscoveredDevice, ManufacturerData, RawAdvertisement, ScanFilter,
    ScanFilterSet,
};
use futures::StreamExt;

const SERVICE: &str = "abcd1234-5678-90ab-cdef-1234567890ab";

fn advertisement(name: &str, manufacturer_data: Option<&str>) -> DiscoveredDevice {
    RawAdvertisement {
        name: Some(name.to_string()),
        address: "00:11:22:33:44:55".to_string(),
        rssi: -67,
        advertised_service_uuids: vec![SERVICE.to_string()],
        manufacturer_data: manufacturer_data.map(str::to_string),
    }
    .into()
}

#[test]
fn target_device_by_name() {
    let filters = [ScanFilter::new().with_name("Target Device")];

    assert!(matches(&advertisement("Target Device", None), Some(&filters[..])));
    assert!(!matches(&advertisement("Other Device", None), Some(&filters[..])));
}

#[test]
fn service_filter_in_upper_case() {
    let filters = ScanFilterSet::from(vec![ScanFilter::new().with_service_uuid(SERVICE.to_uppercase())]);

    assert!(filters.matches(&advertisement("Anything", None)));
}

#[test]
fn manufacturer_id_from_hex_wire_form() {
    let filters = ScanFilterSet::from(vec![ScanFilter::new().with_manufacturer_id(0x1234)]);

    assert!(filters.matches(&advertisement("Sensor", Some("3412CAFE"))));
    assert!(!filters.matches(&advertisement("Sensor", Some("1234CAFE"))));
    // Unusable manufacturer data leaves only the OUI heuristic, 0x1122 here.
    assert!(!filters.matches(&advertisement("Sensor", Some("34"))));
}

#[test]
fn manufacturer_id_from_oui_heuristic() {
    let filters = ScanFilterSet::from(vec![ScanFilter::new().with_manufacturer_id(0x1122)]);

    assert!(filters.matches(&advertisement("Sensor", None)));
}

#[test]
fn exact_manufacturer_data() {
    let filters = ScanFilterSet::from(vec![
        ScanFilter::new().with_manufacturer_data(0x1234, vec![0xAA, 0xBB])
    ]);

    assert!(filters.matches(&advertisement("Sensor", Some("3412AABB"))));
    assert!(!filters.matches(&advertisement("Sensor", Some("3412AABBCC"))));
    assert!(!filters.matches(&advertisement("Sensor", Some("3412AA"))));
    assert!(!filters.matches(&advertisement("Sensor", None)));
}

#[test]
fn one_profile_out_of_several() {
    let filters = ScanFilterSet::from(vec![
        ScanFilter::new().with_name("A"),
        ScanFilter::new().with_service_uuid("X"),
    ]);
    let named_a = DiscoveredDevice::new("01:00:00:00:00:00")
        .with_name("A")
        .with_service_uuid("Y");
    let advertises_x = DiscoveredDevice::new("02:00:00:00:00:00")
        .with_name("B")
        .with_service_uuid("X");

    assert!(filters.matches(&named_a));
    assert!(filters.matches(&advertises_x));
}

#[test]
fn formatted_manufacturer_data() {
    let data = ManufacturerData::decode("FFFF00010203").unwrap();

    assert_eq!(data.to_formatted_string(), "<FFFF> 0001 0203");
}

#[tokio::test]
async fn filtered_discovery_stream() {
    let filters = ScanFilterSet::from(vec![ScanFilter::new().with_name("Target Device")]);
    let discoveries = futures::stream::iter(vec![
        advertisement("Other Device", None),
        advertisement("Target Device", Some("3412")),
        advertisement("Target Device", Some("3412")),
    ]);

    let found: Vec<_> = filter_discoveries(discoveries, filters).collect().await;

    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].manufacturer_data.as_ref().and_then(ManufacturerData::company_id),
        Some(0x1234)
    );
}
