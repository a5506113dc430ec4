// t1link/src/transport/ccid.rs
//! USB-CCID reader adapter.
//!
//! CCID readers speak a block-oriented bulk protocol: every command is a
//! 10-byte header plus payload, every response echoes a per-command
//! sequence number. The adapter unframes responses and replays their
//! payloads through the byte-stream `poll` contract, so the engine never
//! knows it is not talking to a UART.

use log::{debug, trace};

use crate::constants::{
    CCID_FEATURE_AUTO_PPS, CCID_HEADER_LEN, CCID_PC_TO_RDR_GET_PARAMETERS,
    CCID_PC_TO_RDR_GET_SLOT_STATUS, CCID_PC_TO_RDR_ICC_POWER_OFF, CCID_PC_TO_RDR_ICC_POWER_ON,
    CCID_PC_TO_RDR_SET_PARAMETERS, CCID_PC_TO_RDR_XFR_BLOCK, CCID_RDR_TO_PC_DATA_BLOCK,
    CCID_RDR_TO_PC_PARAMETERS, CCID_RDR_TO_PC_SLOT_STATUS,
};
use crate::transport::traits::CardTransport;
use crate::utils::bytes_to_hex_spaced;
use crate::{Error, Result};

/// Bulk response window, ms. Card-side wait handling happens inside the
/// T=1 engine; this only bounds the reader firmware itself.
const BULK_TIMEOUT_MS: u32 = 5_000;

/// bmICCStatus value for "no ICC present"
const ICC_STATUS_ABSENT: u8 = 2;

/// Bulk endpoint pair of a CCID reader, plus its descriptor features.
pub trait BulkPipe {
    /// Write one complete command to the bulk-out endpoint
    fn bulk_out(&mut self, bytes: &[u8]) -> Result<()>;
    /// Read one complete response from the bulk-in endpoint
    fn bulk_in(&mut self, timeout_ms: u32) -> Result<Vec<u8>>;
    /// dwFeatures from the CCID class descriptor
    fn features(&self) -> u32;
}

/// T=1 protocol data structure carried by SetParameters (CCID rev 1.1,
/// abProtocolDataStructure for protocol 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T1Parameters {
    /// bmFindexDindex: clock rate and baud rate adjustment indices
    pub fi_di: u8,
    /// True when the link uses CRC-16 instead of LRC
    pub crc: bool,
    /// bGuardTimeT1: extra guard time in ETUs
    pub guard_time: u8,
    /// bmWaitingIntegersT1: BWI in the high nibble, CWI in the low
    pub bwi_cwi: u8,
    /// bIFSC as last negotiated
    pub ifsc: u8,
}

impl Default for T1Parameters {
    fn default() -> Self {
        Self {
            fi_di: 0x11,
            crc: false,
            guard_time: 0,
            bwi_cwi: 0x45,
            ifsc: 32,
        }
    }
}

impl T1Parameters {
    fn to_wire(&self) -> [u8; 7] {
        // bmTCCKST1 bit 4 is fixed to one by the spec, bit 0 selects CRC
        let tcckst1 = 0x10 | u8::from(self.crc);
        // clock stop disallowed, NAD fixed at zero
        [
            self.fi_di,
            tcckst1,
            self.guard_time,
            self.bwi_cwi,
            0,
            self.ifsc,
            0,
        ]
    }

    fn from_wire(raw: &[u8]) -> Result<Self> {
        if raw.len() < 7 {
            return Err(Error::CcidFrame("short T=1 parameter structure"));
        }
        Ok(Self {
            fi_di: raw[0],
            crc: raw[1] & 0x01 != 0,
            guard_time: raw[2],
            bwi_cwi: raw[3],
            ifsc: raw[5],
        })
    }
}

/// One unframed CCID response
struct CcidResponse {
    msg_type: u8,
    status: u8,
    /// bChainParameter: 0x01 begins a chain, 0x03 continues one
    chain: u8,
    payload: Vec<u8>,
}

impl CcidResponse {
    fn chain_continues(&self) -> bool {
        self.chain == 0x01 || self.chain == 0x03
    }
}

fn build_command(msg_type: u8, seq: u8, params: [u8; 3], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CCID_HEADER_LEN + payload.len());
    out.push(msg_type);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.push(0); // slot
    out.push(seq);
    out.extend_from_slice(&params);
    out.extend_from_slice(payload);
    out
}

fn parse_response(raw: &[u8], expected_seq: u8) -> Result<CcidResponse> {
    if raw.len() < CCID_HEADER_LEN {
        return Err(Error::CcidFrame("response shorter than the header"));
    }
    let len = u32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]) as usize;
    if raw.len() < CCID_HEADER_LEN + len {
        return Err(Error::CcidFrame("payload shorter than announced"));
    }
    if raw[6] != expected_seq {
        return Err(Error::CcidFrame("sequence number mismatch"));
    }
    Ok(CcidResponse {
        msg_type: raw[0],
        status: raw[7],
        chain: raw[9],
        payload: raw[CCID_HEADER_LEN..CCID_HEADER_LEN + len].to_vec(),
    })
}

/// CCID transport over any [`BulkPipe`].
pub struct CcidTransport<P: BulkPipe> {
    pipe: P,
    seq: u8,
    rx: Vec<u8>,
}

impl<P: BulkPipe> CcidTransport<P> {
    /// Wrap a bulk pipe. No USB traffic happens until the first command.
    pub fn new(pipe: P) -> Self {
        Self {
            pipe,
            seq: 0,
            rx: Vec::new(),
        }
    }

    /// Access the underlying pipe (test instrumentation)
    pub fn pipe_mut(&mut self) -> &mut P {
        &mut self.pipe
    }

    fn command(&mut self, msg_type: u8, params: [u8; 3], payload: &[u8]) -> Result<CcidResponse> {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);

        let frame = build_command(msg_type, seq, params, payload);
        trace!("ccid out {}", bytes_to_hex_spaced(&frame));
        self.pipe.bulk_out(&frame)?;

        let mut resp = self.receive(seq)?;
        // readers split large responses across chained DataBlocks
        while resp.chain_continues() {
            trace!("ccid chained block, {} byte(s) so far", resp.payload.len());
            let next = self.receive(seq)?;
            resp.payload.extend_from_slice(&next.payload);
            resp.chain = next.chain;
        }
        Ok(resp)
    }

    fn receive(&mut self, seq: u8) -> Result<CcidResponse> {
        loop {
            let raw = self.pipe.bulk_in(BULK_TIMEOUT_MS)?;
            trace!("ccid in  {}", bytes_to_hex_spaced(&raw));
            let resp = parse_response(&raw, seq)?;
            match (resp.status >> 6) & 0x03 {
                // time extension: the reader asks us to keep waiting
                2 => continue,
                1 => return Err(Error::CcidFrame("command failed")),
                _ => return Ok(resp),
            }
        }
    }

    /// Read the reader's current T=1 protocol parameters.
    pub fn get_parameters(&mut self) -> Result<T1Parameters> {
        let resp = self.command(CCID_PC_TO_RDR_GET_PARAMETERS, [0, 0, 0], &[])?;
        if resp.msg_type != CCID_RDR_TO_PC_PARAMETERS {
            return Err(Error::CcidFrame("get-parameters answered with a wrong block"));
        }
        T1Parameters::from_wire(&resp.payload)
    }

    /// Push T=1 protocol parameters to the reader. Readers without
    /// automatic parameter negotiation need this after power-on.
    pub fn set_parameters(&mut self, params: &T1Parameters) -> Result<()> {
        debug!("ccid set-parameters ifsc={}", params.ifsc);
        // bProtocolNum 1 selects the T=1 structure
        let resp = self.command(CCID_PC_TO_RDR_SET_PARAMETERS, [1, 0, 0], &params.to_wire())?;
        if resp.msg_type != CCID_RDR_TO_PC_PARAMETERS {
            return Err(Error::CcidFrame("set-parameters answered with a wrong block"));
        }
        Ok(())
    }
}

impl<P: BulkPipe> CardTransport for CcidTransport<P> {
    fn activate(&mut self) -> Result<()> {
        // automatic voltage selection
        let resp = self.command(CCID_PC_TO_RDR_ICC_POWER_ON, [0, 0, 0], &[])?;
        if resp.msg_type != CCID_RDR_TO_PC_DATA_BLOCK {
            return Err(Error::CcidFrame("power-on answered with a non-data block"));
        }
        debug!("ccid power-on, {} ATR byte(s)", resp.payload.len());
        // the ATR surfaces through poll like any other received bytes
        self.rx.extend_from_slice(&resp.payload);
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        let resp = self.command(CCID_PC_TO_RDR_ICC_POWER_OFF, [0, 0, 0], &[])?;
        if resp.msg_type != CCID_RDR_TO_PC_SLOT_STATUS {
            return Err(Error::CcidFrame("power-off answered with a non-status block"));
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let resp = self.command(CCID_PC_TO_RDR_XFR_BLOCK, [0, 0, 0], bytes)?;
        if resp.msg_type != CCID_RDR_TO_PC_DATA_BLOCK {
            return Err(Error::CcidFrame("transfer answered with a non-data block"));
        }
        self.rx.extend_from_slice(&resp.payload);
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.rx))
    }

    fn card_present(&mut self) -> bool {
        match self.command(CCID_PC_TO_RDR_GET_SLOT_STATUS, [0, 0, 0], &[]) {
            Ok(resp) => resp.status & 0x03 != ICC_STATUS_ABSENT,
            Err(_) => false,
        }
    }

    fn auto_pps(&self) -> bool {
        self.pipe.features() & CCID_FEATURE_AUTO_PPS != 0
    }
}

/// rusb-backed pipe for real hardware.
#[cfg(feature = "usb")]
pub mod usb {
    use std::time::Duration;

    use rusb::{Direction, GlobalContext, TransferType};

    use super::BulkPipe;
    use crate::{Error, Result};

    /// CCID class descriptor type
    const CCID_CLASS_DESCRIPTOR: u8 = 0x21;
    /// USB interface class for smart-card readers
    const SMART_CARD_CLASS: u8 = 0x0B;
    /// dwFeatures offset inside the class descriptor
    const FEATURES_OFFSET: usize = 40;

    /// Bulk pipe over a claimed rusb device handle.
    pub struct UsbBulkPipe {
        handle: rusb::DeviceHandle<GlobalContext>,
        ep_in: u8,
        ep_out: u8,
        features: u32,
    }

    impl UsbBulkPipe {
        /// Open the first matching reader and claim its smart-card
        /// interface.
        pub fn open(vid: u16, pid: u16) -> Result<Self> {
            for device in rusb::devices()?.iter() {
                let desc = device.device_descriptor()?;
                if desc.vendor_id() != vid || desc.product_id() != pid {
                    continue;
                }

                let config = device.active_config_descriptor()?;
                for interface in config.interfaces() {
                    for idesc in interface.descriptors() {
                        if idesc.class_code() != SMART_CARD_CLASS {
                            continue;
                        }

                        let mut ep_in = None;
                        let mut ep_out = None;
                        for ep in idesc.endpoint_descriptors() {
                            if ep.transfer_type() != TransferType::Bulk {
                                continue;
                            }
                            match ep.direction() {
                                Direction::In => ep_in = Some(ep.address()),
                                Direction::Out => ep_out = Some(ep.address()),
                            }
                        }
                        let (Some(ep_in), Some(ep_out)) = (ep_in, ep_out) else {
                            continue;
                        };

                        let features = parse_features(idesc.extra())
                            .ok_or(Error::CcidFrame("missing class descriptor"))?;

                        let mut handle = device.open()?;
                        if handle.kernel_driver_active(idesc.interface_number())? {
                            handle.detach_kernel_driver(idesc.interface_number())?;
                        }
                        handle.claim_interface(idesc.interface_number())?;

                        return Ok(Self {
                            handle,
                            ep_in,
                            ep_out,
                            features,
                        });
                    }
                }
            }
            Err(Error::NoCard)
        }
    }

    fn parse_features(extra: &[u8]) -> Option<u32> {
        let mut i = 0;
        while i + 1 < extra.len() {
            let len = usize::from(extra[i]);
            if len < 2 {
                return None;
            }
            if extra[i + 1] == CCID_CLASS_DESCRIPTOR && len >= FEATURES_OFFSET + 4 {
                let at = i + FEATURES_OFFSET;
                return Some(u32::from_le_bytes([
                    extra[at],
                    extra[at + 1],
                    extra[at + 2],
                    extra[at + 3],
                ]));
            }
            i += len;
        }
        None
    }

    impl BulkPipe for UsbBulkPipe {
        fn bulk_out(&mut self, bytes: &[u8]) -> Result<()> {
            let timeout = Duration::from_millis(u64::from(super::BULK_TIMEOUT_MS));
            let n = self.handle.write_bulk(self.ep_out, bytes, timeout)?;
            if n != bytes.len() {
                return Err(Error::CcidFrame("short bulk write"));
            }
            Ok(())
        }

        fn bulk_in(&mut self, timeout_ms: u32) -> Result<Vec<u8>> {
            let mut buf = vec![0u8; 65_546];
            let timeout = Duration::from_millis(u64::from(timeout_ms));
            let n = self.handle.read_bulk(self.ep_in, &mut buf, timeout)?;
            buf.truncate(n);
            Ok(buf)
        }

        fn features(&self) -> u32 {
            self.features
        }
    }
}
