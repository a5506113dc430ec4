// Decode an ATR given as a hex string on the command line.
//
// Usage:
//   cargo run -p t1link --example atr_decode -- 3b8f8001804f0ca000000306030001000000006a

use anyhow::{bail, Context, Result};
use t1link::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    let arg = match std::env::args().nth(1) {
        Some(a) => a,
        None => bail!("usage: atr_decode <hex-atr>"),
    };
    let raw = hex::decode(arg.trim()).context("ATR is not valid hex")?;

    let atr = Atr::parse(&raw).context("ATR does not decode")?;

    println!("ATR: {}", bytes_to_hex_spaced(atr.raw()));
    println!("  convention:  {:?}", atr.convention());
    println!("  T=0 support: {}", atr.supports_t0());
    println!("  T=1 support: {}", atr.supports_t1());
    println!("  mode:        {}", if atr.specific_mode() { "specific" } else { "negotiable" });
    if let Some(ifsc) = atr.ifsc_hint() {
        println!("  IFSC hint:   {}", ifsc);
    }
    if atr.crc_requested() {
        println!("  EDC:         CRC-16 requested");
    }
    if !atr.historical().is_empty() {
        println!("  historical:  {}", bytes_to_hex_spaced(atr.historical()));
    }
    Ok(())
}
