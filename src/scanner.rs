use std::collections::HashSet;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter as PlatformScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{future, Stream, StreamExt};

use crate::{Device, DeviceEvent, DiscoveredDevice, Error, Result, ScanFilter, ScanFilterSet};
use stream_cancel::{Trigger, Valved};
use tokio::sync::broadcast;
use tokio::sync::broadcast::Sender;
use tokio::time::{timeout_at, Instant};
use tokio_stream::wrappers::BroadcastStream;

#[derive(Debug, Default)]
pub struct ScanConfig {
    /// Index of the Bluetooth adapter to use. The first found adapter is used by default.
    adapter_index: usize,
    /// Devices must pass at least one of these. Empty means no filtering.
    filters: ScanFilterSet,
    /// Forward every advertisement of a matched device, not just the first.
    allow_duplicates: bool,
    /// Weakest signal to consider, in dBm.
    min_rssi: Option<i16>,
    /// Maximum results before the scan is stopped.
    max_results: Option<usize>,
    /// The scan is stopped when timeout duration is reached.
    timeout: Option<Duration>,
}

impl ScanConfig {
    /// Index of bluetooth adapter to use
    pub fn adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Replace the filters of the scan
    pub fn filters(mut self, filters: impl Into<ScanFilterSet>) -> Self {
        self.filters = filters.into();
        self
    }

    /// Accept devices that match this filter, in addition to previously added ones
    pub fn add_filter(mut self, filter: ScanFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Report every advertisement of a matched device as [`DeviceEvent::Updated`]
    pub fn allow_duplicates(mut self) -> Self {
        self.allow_duplicates = true;
        self
    }

    /// Ignore advertisements weaker than the given RSSI
    pub fn min_rssi(mut self, rssi: i16) -> Self {
        self.min_rssi = Some(rssi);
        self
    }

    /// Stop the scan after given number of matches
    pub fn stop_after_matches(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Stop the scan after the first match
    pub fn stop_after_first_match(self) -> Self {
        self.stop_after_matches(1)
    }

    /// Stop the scan after given duration
    pub fn stop_after_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub(crate) struct Session {
    pub(crate) _manager: Manager,
    pub(crate) adapter: Adapter,
}

pub struct Scanner {
    session: Option<Arc<Session>>,
    event_sender: Sender<DeviceEvent>,
    scan_stopper: Option<Trigger>,
    device_stream_stoppers: Arc<RwLock<Vec<Trigger>>>,
}

impl Default for Scanner {
    fn default() -> Self {
        Scanner::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        let (event_sender, _) = broadcast::channel(16);

        Self {
            session: None,
            event_sender,
            scan_stopper: None,
            device_stream_stoppers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Start scanning for ble devices.
    pub async fn start(&mut self, config: ScanConfig) -> Result<()> {
        if self.session.is_some() {
            log::info!("Scanner is already started.");
            return Ok(());
        }

        let manager = Manager::new().await?;
        let mut adapters = manager.adapters().await?;

        if config.adapter_index >= adapters.len() {
            return Err(Error::AdapterNotFound {
                index: config.adapter_index,
            });
        }

        let adapter = adapters.swap_remove(config.adapter_index);

        log::trace!("Using adapter: {:?}", adapter);

        let session = Arc::new(Session {
            _manager: manager,
            adapter,
        });
        let stopper = ScanContext::start(
            config,
            session.clone(),
            self.event_sender.clone(),
            self.device_stream_stoppers.clone(),
        )
        .await?;

        self.scan_stopper = Some(stopper);
        self.session = Some(session);

        Ok(())
    }

    /// Stop scanning for ble devices.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.adapter.stop_scan().await?;
            self.scan_stopper.take();
            self.device_stream_stoppers.write().unwrap().clear();
        } else {
            log::info!("Scanner is already stopped");
        }

        Ok(())
    }

    /// Create a new stream that receives ble device events.
    pub fn device_event_stream(
        &mut self,
    ) -> Valved<Pin<Box<dyn Stream<Item = DeviceEvent> + Send>>> {
        let receiver = self.event_sender.subscribe();

        let stream: Pin<Box<dyn Stream<Item = DeviceEvent> + Send>> =
            Box::pin(BroadcastStream::new(receiver).filter_map(|x| async move { x.ok() }));

        let (trigger, stream) = Valved::new(stream);
        self.device_stream_stoppers.write().unwrap().push(trigger);

        stream
    }

    /// Create a new stream that receives discovered ble devices.
    pub fn device_stream(&mut self) -> Valved<Pin<Box<dyn Stream<Item = Device> + Send>>> {
        let receiver = self.event_sender.subscribe();

        let stream: Pin<Box<dyn Stream<Item = Device> + Send>> =
            Box::pin(BroadcastStream::new(receiver).filter_map(|x| async move {
                match x {
                    Ok(DeviceEvent::Discovered(device)) => Some(device),
                    _ => None,
                }
            }));

        let (trigger, stream) = Valved::new(stream);
        self.device_stream_stoppers.write().unwrap().push(trigger);

        stream
    }
}

/// Passes on the advertisements that match `filters`, each address once.
///
/// A device that was rejected is evaluated again on its next advertisement,
/// which may carry data the earlier one lacked. Admitted addresses are kept
/// for as long as the stream lives, one entry per admitted device.
pub fn filter_discoveries<S>(
    discoveries: S,
    filters: ScanFilterSet,
) -> impl Stream<Item = DiscoveredDevice>
where
    S: Stream<Item = DiscoveredDevice>,
{
    let mut admission = Admission::new(filters, None, false);

    discoveries.filter(move |device| {
        let verdict = admission.evaluate(device.address.clone(), device, None);
        future::ready(verdict == Verdict::Discovered)
    })
}

/// Outcome of evaluating one advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// First advertisement of a device that passes the filters.
    Discovered,
    /// Repeated advertisement of an admitted device, to be reported.
    Updated,
    /// Repeated advertisement of an admitted device, to be dropped.
    Duplicate,
    /// Failed the RSSI floor or the filters. May pass on a later advertisement.
    Rejected,
}

/// Admission policy of a scan session, keyed by whatever identifies a
/// device: the peripheral id for the scanner, the address for
/// [`filter_discoveries`].
struct Admission<K> {
    filters: ScanFilterSet,
    min_rssi: Option<i16>,
    allow_duplicates: bool,
    /// Devices that matched the filters
    matched: HashSet<K>,
}

impl<K: Hash + Eq> Admission<K> {
    fn new(filters: ScanFilterSet, min_rssi: Option<i16>, allow_duplicates: bool) -> Self {
        Self {
            filters,
            min_rssi,
            allow_duplicates,
            matched: HashSet::new(),
        }
    }

    fn evaluate(&mut self, id: K, device: &DiscoveredDevice, rssi: Option<i16>) -> Verdict {
        if self.matched.contains(&id) {
            return if self.allow_duplicates {
                Verdict::Updated
            } else {
                Verdict::Duplicate
            };
        }

        if let Some(min_rssi) = self.min_rssi {
            if rssi.map_or(true, |rssi| rssi < min_rssi) {
                return Verdict::Rejected;
            }
        }

        if !self.filters.matches(device) {
            return Verdict::Rejected;
        }

        self.matched.insert(id);
        Verdict::Discovered
    }
}

/// Waits for the next item, giving up once `deadline` has passed.
async fn next_before<S>(stream: &mut S, deadline: Option<Instant>) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    match deadline {
        Some(deadline) => timeout_at(deadline, stream.next()).await.ok().flatten(),
        None => stream.next().await,
    }
}

/// Sends an event to the clients. Returns whether anyone received it.
fn deliver<T>(sender: &Sender<T>, event: T) -> bool {
    match sender.send(event) {
        Ok(_) => true,
        Err(_) => {
            log::error!("Failed to send device event: no active receivers");
            false
        }
    }
}

struct ScanContext {
    /// Number of matching devices found so far
    result_count: usize,
    /// Reference to the bluetooth session instance
    session: Arc<Session>,
    /// Configurations for the scan, such as stop conditions
    config: ScanConfig,
    /// Filters and the set of devices that matched them
    admission: Admission<PeripheralId>,
    /// Channel for sending events to the client
    event_sender: Sender<DeviceEvent>,
}

impl ScanContext {
    async fn start(
        mut config: ScanConfig,
        session: Arc<Session>,
        sender: Sender<DeviceEvent>,
        device_stream_stoppers: Arc<RwLock<Vec<Trigger>>>,
    ) -> Result<Trigger> {
        let filters = std::mem::take(&mut config.filters);
        let services = filters.native_service_uuids();

        if filters.is_unrestricted() {
            log::info!("Starting the scan without filters");
        } else {
            log::info!(
                "Starting the scan with {} filter(s), {} service(s) filtered by the platform",
                filters.len(),
                services.len()
            );
        }

        let (stopper, events) = stream_cancel::Valved::new(session.adapter.events().await?);

        session
            .adapter
            .start_scan(PlatformScanFilter { services })
            .await?;

        let ctx = ScanContext {
            result_count: 0,
            session,
            admission: Admission::new(filters, config.min_rssi, config.allow_duplicates),
            config,
            event_sender: sender,
        };

        tokio::spawn(async move {
            ctx.listen(events, device_stream_stoppers).await;
        });

        Ok(stopper)
    }

    async fn listen(
        mut self,
        mut event_stream: Valved<Pin<Box<dyn Stream<Item = CentralEvent> + Send>>>,
        device_stream_stoppers: Arc<RwLock<Vec<Trigger>>>,
    ) {
        let deadline = self.config.timeout.map(|timeout| Instant::now() + timeout);

        while let Some(event) = next_before(&mut event_stream, deadline).await {
            match event {
                CentralEvent::DeviceDiscovered(peripheral_id)
                | CentralEvent::DeviceUpdated(peripheral_id) => {
                    self.on_advertisement(peripheral_id).await;
                }
                _ => {}
            }

            let max_result_reached = self
                .config
                .max_results
                .filter(|max_results| self.result_count >= *max_results)
                .is_some();

            if max_result_reached {
                log::info!("Scanner stop condition reached.");
                break;
            }
        }

        if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            log::info!("Scanner timed out.");
        }

        device_stream_stoppers.write().unwrap().clear();

        log::info!("Scanner was stopped.");
    }

    async fn on_advertisement(&mut self, peripheral_id: PeripheralId) {
        let peripheral = match self.session.adapter.peripheral(&peripheral_id).await {
            Ok(peripheral) => peripheral,
            Err(e) => {
                log::debug!("Unknown peripheral {:?}: {}", peripheral_id, e);
                return;
            }
        };

        let props = match peripheral.properties().await {
            Ok(Some(props)) => props,
            _ => return,
        };

        log::trace!("Advertisement: {:?}", props);

        let device = DiscoveredDevice::from_properties(&props);

        match self.admission.evaluate(peripheral_id, &device, props.rssi) {
            Verdict::Discovered => {
                log::info!(
                    "Found device {} ({})",
                    device.address,
                    device.name.as_deref().unwrap_or("unnamed")
                );

                let event = DeviceEvent::Discovered(Device::new(self.session.clone(), peripheral));
                if deliver(&self.event_sender, event) {
                    self.result_count += 1;
                }
            }
            Verdict::Updated => {
                let event = DeviceEvent::Updated(Device::new(self.session.clone(), peripheral));
                deliver(&self.event_sender, event);
            }
            Verdict::Duplicate => {}
            Verdict::Rejected => {
                log::debug!("Device {} did not match the filters", device.address);
            }
        }
    }
}
