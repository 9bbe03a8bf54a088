//! Byte-order-mark detection on the first bytes of a stream.
//!
//! Only the three marks the schema recognizes are handled: a UTF-8 BOM is
//! consumed silently, the two UTF-16 BOMs are rejected outright, and
//! anything else is left for the scanner to replay.

use std::io::Read;

use crate::error::Error;
use crate::position::ByteSource;

/// Bytes that must be fed back into the scanner's main loop because they
/// turned out not to be part of a BOM.
pub type Replay = Vec<u8>;

/// Consumes a leading byte-order mark from `source`, if present.
///
/// Returns the bytes (0-3 of them) that were read but are not part of a BOM
/// and must be replayed into the scanner.
pub fn consume<R: Read>(source: &mut ByteSource<R>) -> Result<Replay, Error> {
    let Some(b0) = source.next_byte()? else {
        return Ok(Vec::new());
    };
    match b0 {
        0xEF => {
            let b1 = source.next_byte()?;
            if b1 != Some(0xBB) {
                return Ok(chain(b0, b1, None));
            }
            let b2 = source.next_byte()?;
            if b2 == Some(0xBF) {
                Ok(Vec::new())
            } else {
                Ok(chain(b0, b1, b2))
            }
        }
        0xFF => {
            let b1 = source.next_byte()?;
            if b1 == Some(0xFE) {
                Err(Error::UnsupportedEncoding(
                    source.position(),
                    "UTF-16 little-endian byte order mark".into(),
                ))
            } else {
                Ok(chain(b0, b1, None))
            }
        }
        0xFE => {
            let b1 = source.next_byte()?;
            if b1 == Some(0xFF) {
                Err(Error::UnsupportedEncoding(
                    source.position(),
                    "UTF-16 big-endian byte order mark".into(),
                ))
            } else {
                Ok(chain(b0, b1, None))
            }
        }
        _ => Ok(chain(b0, None, None)),
    }
}

fn chain(b0: u8, b1: Option<u8>, b2: Option<u8>) -> Vec<u8> {
    let mut out = vec![b0];
    out.extend(b1);
    out.extend(b2);
    out
}
