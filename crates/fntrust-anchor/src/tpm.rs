//! # TPM 2.0 Register Bank
//!
//! Drives the platform configuration registers of a TPM 2.0 device directly
//! through its command wire format. Only three commands are needed:
//!
//! | Command | Code | Sessions | Purpose |
//! |---------|------|----------|---------|
//! | `TPM2_PCR_Reset` | `0x13D` | password | register → zero |
//! | `TPM2_PCR_Extend` | `0x182` | password | register → H(register ‖ digest) |
//! | `TPM2_PCR_Read` | `0x17E` | none | current value of the SHA-256 bank |
//!
//! All integers are big-endian. Authorized commands carry a single password
//! session (`TPM_RS_PW`) with an empty auth value, which is what the
//! resettable debug register (16) accepts at locality 0.
//!
//! ## Transport
//!
//! [`DeviceTransport`] writes one command to a character device (normally
//! the kernel resource manager at `/dev/tpmrm0`) and reads one response.
//! Any I/O error is reported as [`AnchorError::Unavailable`] straight away.
//!
//! ## References
//!
//! - TCG, "Trusted Platform Module Library, Part 3: Commands", rev 1.59,
//!   sections 22.4 (PCR_Read), 22.8 (PCR_Reset), 22.2 (PCR_Extend).
//! - TCG, "PC Client Platform TPM Profile", PCR allocation and reset rules.

use crate::bank::{RegisterBank, RegisterValue, REGISTER_COUNT, REGISTER_SIZE};
use crate::error::{AnchorError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default TPM character device (kernel resource manager).
pub const DEFAULT_TPM_DEVICE: &str = "/dev/tpmrm0";

pub(crate) const TPM_ST_NO_SESSIONS: u16 = 0x8001;
pub(crate) const TPM_ST_SESSIONS: u16 = 0x8002;
pub(crate) const TPM_CC_PCR_RESET: u32 = 0x0000_013D;
pub(crate) const TPM_CC_PCR_EXTEND: u32 = 0x0000_0182;
pub(crate) const TPM_CC_PCR_READ: u32 = 0x0000_017E;
pub(crate) const TPM_ALG_SHA256: u16 = 0x000B;
pub(crate) const TPM_RS_PW: u32 = 0x4000_0009;
pub(crate) const HEADER_SIZE: usize = 10;

const TPM_RC_SUCCESS: u32 = 0;
const PCR_SELECT_SIZE: u8 = 3;
const MAX_RESPONSE_SIZE: usize = 4096;

/// Size of a password session with empty nonce and empty auth.
const PASSWORD_SESSION_SIZE: u32 = 9;

/// Moves one command to the TPM and returns its response.
pub trait TpmTransport: Send {
    /// Sends a complete command buffer and returns the complete response.
    fn transmit(&mut self, command: &[u8]) -> std::io::Result<Vec<u8>>;
}

/// Character-device transport (`/dev/tpmrm0`, `/dev/tpm0`).
pub struct DeviceTransport {
    path: PathBuf,
    file: File,
}

impl DeviceTransport {
    /// Opens the device for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns `AnchorError::Unavailable` if the device cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| AnchorError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Ok(DeviceTransport { path, file })
    }

    /// Path of the opened device.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TpmTransport for DeviceTransport {
    fn transmit(&mut self, command: &[u8]) -> std::io::Result<Vec<u8>> {
        self.file.write_all(command)?;
        let mut response = vec![0u8; MAX_RESPONSE_SIZE];
        let read = self.file.read(&mut response)?;
        response.truncate(read);
        Ok(response)
    }
}

impl std::fmt::Debug for DeviceTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTransport")
            .field("path", &self.path)
            .finish()
    }
}

/// Register bank backed by a TPM 2.0 device.
///
/// Commands are serialized through one transport; each primitive is a
/// single command/response exchange.
///
/// # Example
///
/// ```rust,no_run
/// use fntrust_anchor::{RegisterBank, TpmBank};
///
/// let bank = TpmBank::open_device("/dev/tpmrm0").unwrap();
/// let value = bank.read(16).unwrap();
/// println!("PCR16 = {:02x?}", value);
/// ```
pub struct TpmBank<T: TpmTransport = DeviceTransport> {
    transport: Mutex<T>,
}

impl TpmBank<DeviceTransport> {
    /// Opens a TPM character device.
    pub fn open_device<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(TpmBank::new(DeviceTransport::open(path)?))
    }
}

impl<T: TpmTransport> TpmBank<T> {
    /// Wraps an already-open transport.
    pub fn new(transport: T) -> Self {
        TpmBank {
            transport: Mutex::new(transport),
        }
    }

    fn execute(&self, command_code: u32, command: &[u8]) -> Result<Vec<u8>> {
        let response = self.transport.lock().transmit(command).map_err(|e| {
            warn!(command = command_code, error = %e, "TPM transport failure");
            AnchorError::Unavailable(e.to_string())
        })?;
        check_response(command_code, &response)?;
        Ok(response)
    }
}

impl<T: TpmTransport> RegisterBank for TpmBank<T> {
    fn reset(&self, index: u32) -> Result<()> {
        check_index(index)?;
        self.execute(TPM_CC_PCR_RESET, &encode_pcr_reset(index))?;
        debug!(index, "TPM PCR reset");
        Ok(())
    }

    fn extend(&self, index: u32, data: &RegisterValue) -> Result<()> {
        check_index(index)?;
        self.execute(TPM_CC_PCR_EXTEND, &encode_pcr_extend(index, data))?;
        debug!(index, "TPM PCR extended");
        Ok(())
    }

    fn read(&self, index: u32) -> Result<RegisterValue> {
        check_index(index)?;
        let response = self.execute(TPM_CC_PCR_READ, &encode_pcr_read(index))?;
        decode_pcr_read(&response, index)
    }
}

impl<T: TpmTransport> std::fmt::Debug for TpmBank<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TpmBank").finish_non_exhaustive()
    }
}

fn check_index(index: u32) -> Result<()> {
    if index >= REGISTER_COUNT {
        return Err(AnchorError::InvalidIndex(index));
    }
    Ok(())
}

/// Builds a command buffer: header followed by `body`.
fn command(tag: u16, code: u32, body: &[u8]) -> Vec<u8> {
    let size = (HEADER_SIZE + body.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&tag.to_be_bytes());
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(&code.to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Authorization area holding one empty password session.
fn password_session(out: &mut Vec<u8>) {
    out.extend_from_slice(&PASSWORD_SESSION_SIZE.to_be_bytes());
    out.extend_from_slice(&TPM_RS_PW.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // nonceCaller
    out.push(0x01); // continueSession
    out.extend_from_slice(&0u16.to_be_bytes()); // hmac (empty auth value)
}

fn pcr_select(index: u32) -> [u8; PCR_SELECT_SIZE as usize] {
    let mut select = [0u8; PCR_SELECT_SIZE as usize];
    select[(index / 8) as usize] |= 1 << (index % 8);
    select
}

/// Encodes `TPM2_PCR_Reset` for register `index`.
pub fn encode_pcr_reset(index: u32) -> Vec<u8> {
    let mut body = Vec::with_capacity(17);
    body.extend_from_slice(&index.to_be_bytes());
    password_session(&mut body);
    command(TPM_ST_SESSIONS, TPM_CC_PCR_RESET, &body)
}

/// Encodes `TPM2_PCR_Extend` of a SHA-256 digest into register `index`.
pub fn encode_pcr_extend(index: u32, digest: &RegisterValue) -> Vec<u8> {
    let mut body = Vec::with_capacity(55);
    body.extend_from_slice(&index.to_be_bytes());
    password_session(&mut body);
    body.extend_from_slice(&1u32.to_be_bytes()); // TPML_DIGEST_VALUES.count
    body.extend_from_slice(&TPM_ALG_SHA256.to_be_bytes());
    body.extend_from_slice(digest);
    command(TPM_ST_SESSIONS, TPM_CC_PCR_EXTEND, &body)
}

/// Encodes `TPM2_PCR_Read` selecting register `index` in the SHA-256 bank.
pub fn encode_pcr_read(index: u32) -> Vec<u8> {
    let mut body = Vec::with_capacity(10);
    body.extend_from_slice(&1u32.to_be_bytes()); // TPML_PCR_SELECTION.count
    body.extend_from_slice(&TPM_ALG_SHA256.to_be_bytes());
    body.push(PCR_SELECT_SIZE);
    body.extend_from_slice(&pcr_select(index));
    command(TPM_ST_NO_SESSIONS, TPM_CC_PCR_READ, &body)
}

/// Validates a response header and its response code.
fn check_response(command_code: u32, response: &[u8]) -> Result<()> {
    let mut reader = Reader::new(response);
    let _tag = reader.u16()?;
    let size = reader.u32()? as usize;
    let code = reader.u32()?;

    if size != response.len() {
        return Err(AnchorError::Malformed(format!(
            "response declares {} bytes, received {}",
            size,
            response.len()
        )));
    }
    if code != TPM_RC_SUCCESS {
        warn!(command = command_code, code, "TPM command rejected");
        return Err(AnchorError::Device {
            command: command_code,
            code,
        });
    }
    Ok(())
}

/// Extracts the register value from a `TPM2_PCR_Read` response.
pub fn decode_pcr_read(response: &[u8], index: u32) -> Result<RegisterValue> {
    check_response(TPM_CC_PCR_READ, response)?;

    let mut reader = Reader::new(&response[HEADER_SIZE..]);
    let _update_counter = reader.u32()?;
    let selections = reader.u32()?;
    for _ in 0..selections {
        let _alg = reader.u16()?;
        let size = reader.u8()?;
        reader.take(size as usize)?;
    }

    // An unallocated register comes back as an empty digest list
    if reader.u32()? == 0 {
        return Err(AnchorError::InvalidIndex(index));
    }

    let size = reader.u16()? as usize;
    if size != REGISTER_SIZE {
        return Err(AnchorError::Malformed(format!(
            "digest is {} bytes, expected {}",
            size, REGISTER_SIZE
        )));
    }

    let mut value = [0u8; REGISTER_SIZE];
    value.copy_from_slice(reader.take(size)?);
    Ok(value)
}

/// Bounds-checked big-endian reader.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let buf: &'a [u8] = self.buf;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= buf.len())
            .ok_or_else(|| {
                AnchorError::Malformed(format!(
                    "truncated at byte {} (wanted {} more)",
                    self.pos, len
                ))
            })?;
        let slice = &buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// A software TPM speaking just enough of the wire protocol for tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::bank::{extend_value, RESET_VALUE};
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Debug, Default)]
    pub(crate) struct FakeState {
        pub registers: Vec<RegisterValue>,
        pub commands: Vec<Vec<u8>>,
        pub reject_with: Option<u32>,
        pub offline: bool,
        pub truncate_responses: bool,
    }

    /// Cloneable handle so tests can inspect state after handing the transport over.
    #[derive(Debug, Clone)]
    pub(crate) struct FakeTpm {
        pub state: Arc<StdMutex<FakeState>>,
    }

    impl FakeTpm {
        pub(crate) fn new() -> Self {
            let state = FakeState {
                registers: vec![RESET_VALUE; REGISTER_COUNT as usize],
                ..FakeState::default()
            };
            FakeTpm {
                state: Arc::new(StdMutex::new(state)),
            }
        }
    }

    fn session_ok() -> Vec<u8> {
        // parameterSize, then nonceTPM, sessionAttributes, hmac
        let mut body = 0u32.to_be_bytes().to_vec();
        body.extend_from_slice(&[0, 0, 0x01, 0, 0]);
        command(TPM_ST_SESSIONS, TPM_RC_SUCCESS, &body)
    }

    fn error(code: u32) -> Vec<u8> {
        command(TPM_ST_NO_SESSIONS, code, &[])
    }

    impl TpmTransport for FakeTpm {
        fn transmit(&mut self, cmd: &[u8]) -> std::io::Result<Vec<u8>> {
            let mut state = self.state.lock().unwrap();
            state.commands.push(cmd.to_vec());

            if state.offline {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "fake TPM offline",
                ));
            }
            if let Some(code) = state.reject_with {
                return Ok(error(code));
            }

            let mut reader = Reader::new(cmd);
            let _tag = reader.u16().unwrap();
            let _size = reader.u32().unwrap();
            let code = reader.u32().unwrap();

            let mut response = match code {
                TPM_CC_PCR_RESET => {
                    let index = reader.u32().unwrap() as usize;
                    state.registers[index] = RESET_VALUE;
                    session_ok()
                }
                TPM_CC_PCR_EXTEND => {
                    let index = reader.u32().unwrap() as usize;
                    let auth_size = reader.u32().unwrap() as usize;
                    reader.take(auth_size).unwrap();
                    let _count = reader.u32().unwrap();
                    let _alg = reader.u16().unwrap();
                    let mut digest = [0u8; REGISTER_SIZE];
                    digest.copy_from_slice(reader.take(REGISTER_SIZE).unwrap());
                    let next = extend_value(&state.registers[index], &digest);
                    state.registers[index] = next;
                    session_ok()
                }
                TPM_CC_PCR_READ => {
                    let _count = reader.u32().unwrap();
                    let _alg = reader.u16().unwrap();
                    let size = reader.u8().unwrap();
                    let select = reader.take(size as usize).unwrap().to_vec();
                    let index = select
                        .iter()
                        .enumerate()
                        .find_map(|(byte, bits)| {
                            (0..8).find(|bit| bits & (1 << bit) != 0).map(|bit| byte * 8 + bit)
                        })
                        .unwrap();

                    let mut body = 7u32.to_be_bytes().to_vec(); // update counter
                    body.extend_from_slice(&1u32.to_be_bytes());
                    body.extend_from_slice(&TPM_ALG_SHA256.to_be_bytes());
                    body.push(size);
                    body.extend_from_slice(&select);
                    body.extend_from_slice(&1u32.to_be_bytes());
                    body.extend_from_slice(&(REGISTER_SIZE as u16).to_be_bytes());
                    body.extend_from_slice(&state.registers[index]);
                    command(TPM_ST_NO_SESSIONS, TPM_RC_SUCCESS, &body)
                }
                other => error(0x100 | (other & 0xff)),
            };

            if state.truncate_responses {
                response.truncate(response.len() - 3);
            }
            Ok(response)
        }
    }
}
