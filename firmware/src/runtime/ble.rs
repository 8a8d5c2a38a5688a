//! HID-over-GATT peripheral: advertising, connection tracking and report
//! notification.

use bt_hci::uuid::BluetoothUuid16;
use defmt::{info, warn};
use embassy_futures::select::{Either, select};
use embassy_time::Timer;
use esp_radio::ble::controller::BleConnector;
use heapless::String;
use shutter_core::hid::{self, HID_INFORMATION, REPORT_ID, REPORT_LEN, REPORT_MAP};
use trouble_host::prelude::*;

use crate::link::{self, DISCOVERY_RESTART, ReportReceiver};

pub const CONNECTIONS_MAX: usize = 1;
pub const L2CAP_CHANNELS_MAX: usize = 2;

pub type BleController = ExternalController<BleConnector<'static>, 20>;

/// Input report, report ID 1.
const INPUT_REPORT_REFERENCE: [u8; 2] = [REPORT_ID, 0x01];
const REPORT_MAP_LEN: usize = REPORT_MAP.len();
const PNP_ID: [u8; 7] = hid::PNP_ID.to_bytes();

static APPEARANCE: BluetoothUuid16 = BluetoothUuid16::new(hid::APPEARANCE);

#[gatt_server]
struct Server {
    hid_service: HidService,
    device_information: DeviceInformationService,
    battery: BatteryService,
}

#[gatt_service(uuid = service::HUMAN_INTERFACE_DEVICE)]
struct HidService {
    #[characteristic(uuid = characteristic::HID_INFORMATION, read, value = HID_INFORMATION)]
    information: [u8; 4],

    #[characteristic(uuid = characteristic::REPORT_MAP, read, value = REPORT_MAP)]
    report_map: [u8; REPORT_MAP_LEN],

    #[characteristic(uuid = characteristic::HID_CONTROL_POINT, write_without_response, value = 0)]
    control_point: u8,

    #[characteristic(uuid = characteristic::PROTOCOL_MODE, read, write_without_response, value = 1)]
    protocol_mode: u8,

    #[descriptor(uuid = descriptors::REPORT_REFERENCE, read, value = INPUT_REPORT_REFERENCE)]
    #[characteristic(uuid = characteristic::REPORT, read, notify, value = [0; REPORT_LEN])]
    input_report: [u8; REPORT_LEN],
}

#[gatt_service(uuid = service::DEVICE_INFORMATION)]
struct DeviceInformationService {
    #[characteristic(uuid = characteristic::PNP_ID, read, value = PNP_ID)]
    pnp_id: [u8; 7],

    #[characteristic(uuid = characteristic::MANUFACTURER_NAME_STRING, read)]
    manufacturer: String<32>,
}

#[gatt_service(uuid = service::BATTERY)]
struct BatteryService {
    #[characteristic(uuid = characteristic::BATTERY_LEVEL, read, notify, value = 100)]
    level: u8,
}

#[embassy_executor::task]
pub async fn ble_runner_task(mut runner: Runner<'static, BleController, DefaultPacketPool>) {
    loop {
        if let Err(err) = runner.run().await {
            panic!("[ble] runner error: {:?}", err);
        }
    }
}

#[embassy_executor::task]
pub async fn ble_events_task(
    mut peripheral: Peripheral<'static, BleController, DefaultPacketPool>,
    reports: ReportReceiver,
) {
    let server = Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: hid::DEVICE_NAME,
        appearance: &APPEARANCE,
    }))
    .expect("GATT table fits");

    let mut manufacturer = String::new();
    if manufacturer.push_str(hid::MANUFACTURER_NAME).is_err()
        || server
            .set(&server.device_information.manufacturer, &manufacturer)
            .is_err()
    {
        warn!("[gatt] manufacturer name not published");
    }

    loop {
        let connection = match advertise(hid::DEVICE_NAME, &mut peripheral).await {
            Ok(connection) => connection,
            Err(err) => {
                warn!("[adv] error: {:?}", err);
                Timer::after_millis(500).await;
                continue;
            }
        };

        let gatt = match connection.with_attribute_server(&server) {
            Ok(gatt) => gatt,
            Err(err) => {
                warn!("[gatt] attach failed: {:?}", err);
                continue;
            }
        };

        DISCOVERY_RESTART.reset();
        // Reports queued while nobody was listening are stale.
        while reports.try_receive().is_ok() {}
        let peers = link::peer_connected();
        info!("[gatt] connected, peers={}", peers);

        match select(gatt_events(&server, &gatt), forward_reports(&server, &gatt, &reports)).await {
            Either::First(Err(err)) | Either::Second(Err(err)) => {
                warn!("[gatt] connection error: {:?}", err);
            }
            Either::First(Ok(())) | Either::Second(Ok(())) => {}
        }

        let peers = link::peer_disconnected();
        info!("[gatt] disconnected, peers={}", peers);

        // The controller sees every counted drop and asks for discovery.
        DISCOVERY_RESTART.wait().await;
    }
}

async fn gatt_events<P: PacketPool>(
    server: &Server<'_>,
    connection: &GattConnection<'_, '_, P>,
) -> Result<(), Error> {
    let reason = loop {
        match connection.next().await {
            GattConnectionEvent::Disconnected { reason } => break reason,
            GattConnectionEvent::Gatt { event } => {
                if let GattEvent::Write(write) = &event {
                    if write.handle() == server.hid_service.control_point.handle {
                        info!("[gatt] control point {=[u8]:x}", write.data());
                    } else if write.handle() == server.hid_service.protocol_mode.handle {
                        info!("[gatt] protocol mode {=[u8]:x}", write.data());
                    }
                }
                match event.accept() {
                    Ok(reply) => reply.send().await,
                    Err(err) => warn!("[gatt] error sending response: {:?}", err),
                }
            }
            _ => {}
        }
    };
    info!("[gatt] link closed: {:?}", reason);
    Ok(())
}

async fn forward_reports<P: PacketPool>(
    server: &Server<'_>,
    connection: &GattConnection<'_, '_, P>,
    reports: &ReportReceiver,
) -> Result<(), Error> {
    loop {
        let report = reports.receive().await;
        server
            .hid_service
            .input_report
            .notify(connection, &report.to_bytes())
            .await?;
    }
}

/// Advertise as a HID keyboard-class device and wait for a central.
async fn advertise<'values, C: Controller>(
    name: &'values str,
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
) -> Result<Connection<'values, DefaultPacketPool>, BleHostError<C::Error>> {
    let hid_uuid = 0x1812_u16.to_le_bytes();
    let appearance = hid::APPEARANCE.to_le_bytes();

    let mut advertiser_data = [0; 31];
    let len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::ServiceUuids16(&[hid_uuid]),
            AdStructure::Unknown {
                ty: 0x19,
                data: &appearance,
            },
            AdStructure::CompleteLocalName(name.as_bytes()),
        ],
        &mut advertiser_data[..],
    )?;
    let advertiser = peripheral
        .advertise(
            &Default::default(),
            Advertisement::ConnectableScannableUndirected {
                adv_data: &advertiser_data[..len],
                scan_data: &[],
            },
        )
        .await?;
    info!("[adv] advertising as {=str}", name);
    let connection = advertiser.accept().await?;
    info!("[adv] connection established");
    Ok(connection)
}
