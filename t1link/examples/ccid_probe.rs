//! Probe a USB-CCID reader and run one SELECT against the inserted card.
//!
//! Usage:
//!   cargo run -p t1link --example ccid_probe --features usb -- <vid> <pid>
//!
//! VID/PID are hex, e.g. `076b 3031`. Set RUST_LOG=trace to see the wire.

use anyhow::{bail, Context, Result};
use t1link::transport::ccid::usb::UsbBulkPipe;
use t1link::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(vid), Some(pid)) = (args.next(), args.next()) else {
        bail!("usage: ccid_probe <vid-hex> <pid-hex>");
    };
    let vid = u16::from_str_radix(&vid, 16).context("bad VID")?;
    let pid = u16::from_str_radix(&pid, 16).context("bad PID")?;

    let pipe = UsbBulkPipe::open(vid, pid).context("no matching CCID reader")?;
    let mut transport = CcidTransport::new(pipe);
    if let Ok(params) = transport.get_parameters() {
        println!(
            "reader parameters: FiDi {:#04x}, IFSC {}",
            params.fi_di, params.ifsc
        );
    }
    let mut reader = Reader::new(Box::new(transport));

    if !reader.card_present() {
        bail!("reader found, but no card in the slot");
    }

    let mut conn = reader.connect()?;
    conn.establish()?;
    if let Some(atr) = conn.atr() {
        println!("ATR: {}", bytes_to_hex_spaced(atr.raw()));
    }

    // SELECT with no AID: most cards answer something, even if only an SW
    let resp = conn.transmit(&[0x00, 0xA4, 0x04, 0x00])?;
    println!("response: {}", bytes_to_hex_spaced(&resp));

    conn.disconnect()?;
    Ok(())
}
