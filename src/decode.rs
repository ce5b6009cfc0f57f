//! Parameter extraction from matched logs.
//!
//! Given a matched [`EventDefinition`] and a raw log, the decoder
//! reconstructs the event's typed arguments from the log's topics and data
//! using Alloy's dynamic ABI decoder, then extracts the configured parameter
//! as an arbitrary-precision integer.
//!
//! Decode failures are non-fatal by contract: a malformed payload for an
//! otherwise matched event is reported and the scan continues. The decoder
//! therefore returns a recoverable [`ScanError::DecodeError`] and the caller
//! decides how to absorb it.
//!
//! The configured parameter's type was validated as an integer at setup
//! (see [`crate::registry`]), so a non-integer decoded value here indicates
//! a payload inconsistent with its own signature.

use crate::error::{ScanError, ScanResult};
use crate::feed::LogRecord;
use crate::registry::EventDefinition;
use alloy::dyn_abi::{DynSolValue, EventExt};
use num_bigint::{BigInt, BigUint, Sign};

/// Decodes the tracked parameter of matched logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterDecoder;

impl ParameterDecoder {
    /// Create a decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode the tracked parameter from a matched log.
    ///
    /// Arguments are reassembled in declaration order — indexed parameters
    /// come from the topics, the rest from the data payload — and the
    /// parameter resolved at setup is converted to a [`BigInt`].
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError::DecodeError`] for malformed payloads,
    /// topic/data count mismatches, or a value that is not an integer.
    pub fn decode(&self, definition: &EventDefinition, log: &LogRecord) -> ScanResult<BigInt> {
        let event = definition.event();

        let decoded = event
            .decode_log_parts(log.topics.iter().copied(), &log.data, true)
            .map_err(|e| {
                ScanError::decode(
                    format!("malformed {} log payload", definition.name()),
                    Some(Box::new(e)),
                )
            })?;

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();

        for (position, input) in event.inputs.iter().enumerate() {
            let arg = if input.indexed {
                indexed.next()
            } else {
                body.next()
            };
            let Some(arg) = arg else {
                return Err(ScanError::decode(
                    format!(
                        "argument count mismatch decoding {} log",
                        definition.name()
                    ),
                    None,
                ));
            };
            if position == definition.param_index() {
                return to_bigint(&arg).ok_or_else(|| {
                    ScanError::decode(
                        format!(
                            "parameter {} of {} decoded to a non-integer value",
                            definition.param_label(),
                            definition.name()
                        ),
                        None,
                    )
                });
            }
        }

        Err(ScanError::decode(
            format!(
                "parameter {} missing from decoded {} log",
                definition.param_label(),
                definition.name()
            ),
            None,
        ))
    }
}

/// Convert an integer `DynSolValue` to a signed big integer.
fn to_bigint(value: &DynSolValue) -> Option<BigInt> {
    match value {
        DynSolValue::Uint(v, _) => Some(BigInt::from_bytes_be(
            Sign::Plus,
            &v.to_be_bytes::<32>(),
        )),
        DynSolValue::Int(v, _) => {
            let magnitude = BigUint::from_bytes_be(&v.unsigned_abs().to_be_bytes::<32>());
            let magnitude = BigInt::from(magnitude);
            Some(if v.is_negative() {
                -magnitude
            } else {
                magnitude
            })
        }
        _ => None,
    }
}
