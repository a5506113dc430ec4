#[path = "../common/mod.rs"]
mod common;

use t1link::prelude::*;
use t1link::protocol::atr::Atr;

use common::fixtures;

#[test]
fn desfire_atr_decodes() {
    // NXP DESFire: T=0 and T=1 declared, 15 historical bytes, TCK 0x6A
    let raw = hex::decode("3b8f8001804f0ca000000306030001000000006a").unwrap();
    let atr = Atr::parse(&raw).unwrap();

    assert_eq!(atr.convention(), Convention::Direct);
    assert!(atr.supports_t0());
    assert!(atr.supports_t1());
    assert_eq!(atr.historical().len(), 15);
    assert!(!atr.specific_mode());
}

#[test]
fn fixture_atr_carries_t1_group() {
    let atr = Atr::parse(&fixtures::atr_t1_with_group(0x10, 0x01)).unwrap();
    assert!(atr.supports_t1());
    assert_eq!(atr.ifsc_hint(), Some(0x10));
    assert!(atr.crc_requested());
}

#[test]
fn corrupted_tck_detected() {
    let mut raw = hex::decode("3b8f8001804f0ca000000306030001000000006a").unwrap();
    *raw.last_mut().unwrap() ^= 0x01;
    assert!(matches!(
        Atr::parse(&raw),
        Err(Error::AtrChecksum { .. })
    ));
}

#[test]
fn inverse_convention_card() {
    let atr = Atr::parse(&[0x3F, 0x00]).unwrap();
    assert_eq!(atr.convention(), Convention::Inverse);
    assert!(!atr.supports_t1());
}

#[test]
fn raw_bytes_preserved() {
    let raw = fixtures::atr_t1();
    let atr = Atr::parse(&raw).unwrap();
    assert_eq!(atr.raw(), &raw[..]);
}
