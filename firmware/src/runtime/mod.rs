mod ble;
mod console_task;
mod controller;

use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, Pull};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::system::Stack;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal::usb_serial_jtag::UsbSerialJtag;
use esp_radio::Controller;
use esp_radio::ble::controller::BleConnector;
use shutter_core::debounce::PinInput;
use shutter_core::orchestrator::ShutterOrchestrator;
use static_cell::StaticCell;
use trouble_host::prelude::{DefaultPacketPool, ExternalController};
use trouble_host::{Host, HostResources};

use crate::board;
use crate::console::{CONSOLE_LINES, CONSOLE_REPLIES, ConsoleTransport};
use crate::indicator::GpioRgbIndicator;
use crate::link::{BleLink, DISCOVERY_RESTART, REPORTS};

use self::ble::{BleController, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX};

use {esp_backtrace as _, esp_println as _};

esp_bootloader_esp_idf::esp_app_desc!();

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 72 * 1024);

    defmt::info!("shutter-remote {=str}", env!("CARGO_PKG_VERSION"));

    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    let systimer = SystemTimer::new(peripherals.SYSTIMER);
    esp_rtos::start(systimer.alarm0);

    static APP_CORE_STACK: StaticCell<Stack<16384>> = StaticCell::new();
    let app_core_stack = APP_CORE_STACK.init(Stack::new());

    // LED on GPIO4/5/6, button on the BOOT strap (GPIO0).
    let red_pin = peripherals.GPIO4;
    let green_pin = peripherals.GPIO5;
    let blue_pin = peripherals.GPIO6;
    let button_pin = peripherals.GPIO0;

    let controller_core = move || {
        let shutter_config = board::shutter_config();
        let indicator = GpioRgbIndicator::new(
            Output::new(red_pin, Level::Low, Default::default()),
            Output::new(green_pin, Level::Low, Default::default()),
            Output::new(blue_pin, Level::Low, Default::default()),
            shutter_config.brightness,
        );
        let button = PinInput::new(
            Input::new(button_pin, InputConfig::default().with_pull(Pull::Up)),
            board::BUTTON_ACTIVE,
        );
        let link = BleLink::new(REPORTS.sender(), &DISCOVERY_RESTART);
        let transport = ConsoleTransport::new(CONSOLE_LINES.receiver(), CONSOLE_REPLIES.sender());
        let shutter = ShutterOrchestrator::new(shutter_config, link, indicator, Delay, button);

        controller::run(shutter, transport);
    };

    esp_rtos::start_second_core(
        peripherals.CPU_CTRL,
        sw_int.software_interrupt0,
        sw_int.software_interrupt1,
        app_core_stack,
        controller_core,
    );

    let radio = &*mk_static!(
        Controller<'static>,
        esp_radio::init().expect("Failed to initialize BLE controller")
    );

    let connector = BleConnector::new(radio, peripherals.BT, Default::default());
    let bt_controller: BleController = ExternalController::new(connector);

    let resources = mk_static!(
        HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX>,
        HostResources::new()
    );
    let stack = mk_static!(
        trouble_host::Stack<'static, BleController, DefaultPacketPool>,
        trouble_host::new(bt_controller, resources)
    );

    let Host {
        peripheral, runner, ..
    } = stack.build();

    spawner.must_spawn(ble::ble_runner_task(runner));
    spawner.must_spawn(ble::ble_events_task(peripheral, REPORTS.receiver()));

    let usb = UsbSerialJtag::new(peripherals.USB_DEVICE).into_async();
    spawner.must_spawn(console_task::console_task(usb));

    loop {
        Timer::after(Duration::from_secs(5)).await;
    }
}
