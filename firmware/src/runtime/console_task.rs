//! USB serial/JTAG console: bytes in, reply lines out.

use core::fmt::Write as _;

use defmt::{debug, warn};
use embassy_futures::select::{Either, select};
use embedded_io_async::{Read, Write};
use esp_hal::Async;
use esp_hal::usb_serial_jtag::{UsbSerialJtag, UsbSerialJtagTx};
use heapless::String;
use shutter_core::control::{MAX_LINE_LEN, REPLY_CAPACITY};

use crate::console::{CONSOLE_LINES, CONSOLE_REPLIES, ConsoleError, LineAssembler};

const OUTPUT_CAPACITY: usize = REPLY_CAPACITY + 8;

#[embassy_executor::task]
pub async fn console_task(usb: UsbSerialJtag<'static, Async>) {
    let (mut rx, mut tx) = usb.split();
    let lines = CONSOLE_LINES.sender();
    let replies = CONSOLE_REPLIES.receiver();
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; 32];

    loop {
        match select(rx.read(&mut buf), replies.receive()).await {
            Either::First(Ok(count)) => {
                for &byte in &buf[..count] {
                    match assembler.ingest(byte) {
                        Ok(Some(line)) => {
                            debug!("[console] line {=str}", line.as_str());
                            lines.send(line).await;
                        }
                        Ok(None) => {}
                        Err(ConsoleError::LineOverflow) => {
                            let mut out = String::<OUTPUT_CAPACITY>::new();
                            let _ = write!(out, "ERR line exceeds {MAX_LINE_LEN} bytes\r\n");
                            write_out(&mut tx, &out).await;
                        }
                        Err(ConsoleError::InvalidUtf8) => {
                            write_out(&mut tx, "ERR line is not valid UTF-8\r\n").await;
                        }
                    }
                }
            }
            Either::First(Err(err)) => {
                warn!("[console] read failed: {:?}", err);
                assembler.reset();
            }
            Either::Second(reply) => {
                let mut out = String::<OUTPUT_CAPACITY>::new();
                if write!(out, "{reply}\r\n").is_err() {
                    warn!("[console] reply truncated");
                }
                write_out(&mut tx, &out).await;
            }
        }
    }
}

async fn write_out(tx: &mut UsbSerialJtagTx<'static, Async>, text: &str) {
    if let Err(err) = tx.write_all(text.as_bytes()).await {
        warn!("[console] write failed: {:?}", err);
        return;
    }
    let _ = tx.flush().await;
}
