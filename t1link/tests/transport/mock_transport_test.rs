use t1link::prelude::*;
use t1link::transport::MockTransport;

#[test]
fn mock_preserves_chunk_order() {
    let mut m = MockTransport::new();
    m.push_inbound(vec![0x3B]);
    m.push_inbound(vec![0x80, 0x01]);
    assert_eq!(m.poll().unwrap(), vec![0x3B]);
    assert_eq!(m.poll().unwrap(), vec![0x80, 0x01]);
    assert!(m.poll().unwrap().is_empty());
}

#[test]
fn mock_send_failures_then_recovery() {
    let mut m = MockTransport::new();
    m.set_send_failures(2);
    assert!(m.send(&[0x00]).is_err());
    assert!(m.send(&[0x00]).is_err());
    assert!(m.send(&[0x00]).is_ok());
    assert_eq!(m.sent.len(), 1);
}

#[test]
fn mock_as_trait_object() {
    let mut boxed: Box<dyn CardTransport> = Box::new(MockTransport::new());
    boxed.activate().unwrap();
    boxed.send(&[0x01, 0x02]).unwrap();
    assert!(boxed.card_present());
    assert!(!boxed.auto_pps());
    boxed.deactivate().unwrap();
}
