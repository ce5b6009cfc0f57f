//! Event definitions and topic-hash matching.
//!
//! A scan is configured with one or more human-readable event signatures
//! (`"Transfer(address indexed from, address indexed to, uint256 value)"`).
//! At setup each signature is parsed with Alloy's ABI parser into an
//! [`EventDefinition`]: the keccak topic hash, the event name, the parameter
//! layout, and the resolved index of the tracked parameter.
//!
//! Everything that can be rejected is rejected here, once, before streaming:
//! unparseable signatures, parameter names or indices that do not exist, and
//! parameters whose Solidity type is not an integer. During the stream the
//! matcher is a plain hash lookup on the primary topic.

use crate::error::{ScanError, ScanResult};
use crate::feed::LogRecord;
use alloy::json_abi::Event;
use alloy::primitives::B256;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Identifies which event parameter is tracked, by position or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSpec {
    /// Zero-based position in the event's declared parameter list
    Index(usize),
    /// Declared parameter name (requires a signature with named parameters)
    Name(String),
}

impl FromStr for ParamSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<usize>()
            .map_or_else(|_| Self::Name(s.to_owned()), Self::Index))
    }
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Whether a Solidity type string names a plain (non-array) integer.
fn is_integer_type(ty: &str) -> bool {
    let rest = ty
        .strip_prefix("uint")
        .or_else(|| ty.strip_prefix("int"));
    rest.is_some_and(|r| r.is_empty() || r.chars().all(|c| c.is_ascii_digit()))
}

/// A registered event: topic hash, name, and tracked-parameter layout.
///
/// Immutable once the scan starts.
#[derive(Debug, Clone)]
pub struct EventDefinition {
    /// Keccak hash of the canonical signature (the log's primary topic)
    topic_hash: B256,

    /// Event name (`Transfer` for `Transfer(address,address,uint256)`)
    name: String,

    /// Parsed parameter layout
    event: Event,

    /// Declaration-order index of the tracked parameter
    param_index: usize,

    /// Display label for the tracked parameter
    param_label: String,
}

impl EventDefinition {
    /// Parse a human-readable signature and resolve the tracked parameter.
    ///
    /// Accepts signatures with or without the leading `event` keyword, with
    /// or without parameter names, and with `indexed` markers.
    ///
    /// # Errors
    ///
    /// Returns a setup error if the signature does not parse, the parameter
    /// does not exist, or the parameter's type is not an integer type.
    /// Streaming never re-validates any of this.
    pub fn from_signature(signature: &str, param: &ParamSpec) -> ScanResult<Self> {
        let trimmed = signature.trim();
        let body = trimmed.strip_prefix("event ").unwrap_or(trimmed);

        let event = Event::parse(body).map_err(|e| {
            ScanError::setup(
                format!("invalid event signature \"{trimmed}\""),
                Some(Box::new(e)),
            )
        })?;

        let param_index = match param {
            ParamSpec::Index(i) => {
                if *i >= event.inputs.len() {
                    return Err(ScanError::setup(
                        format!(
                            "parameter index {} out of range: \"{}\" has {} parameter(s)",
                            i,
                            body,
                            event.inputs.len()
                        ),
                        None,
                    ));
                }
                *i
            }
            ParamSpec::Name(name) => event
                .inputs
                .iter()
                .position(|input| input.name == *name)
                .ok_or_else(|| {
                    let available: Vec<&str> = event
                        .inputs
                        .iter()
                        .map(|input| input.name.as_str())
                        .collect();
                    ScanError::setup(
                        format!(
                            "parameter \"{}\" not found in \"{}\" (available: {})",
                            name,
                            body,
                            available.join(", ")
                        ),
                        None,
                    )
                })?,
        };

        let input = &event.inputs[param_index];
        if !is_integer_type(&input.ty) {
            return Err(ScanError::setup(
                format!(
                    "parameter {param} of \"{body}\" has type {}, expected an integer type",
                    input.ty
                ),
                None,
            ));
        }

        let param_label = if input.name.is_empty() {
            format!("#{param_index}")
        } else {
            input.name.clone()
        };

        let topic_hash = event.selector();
        info!(
            event = %event.name,
            topic = %topic_hash,
            param = %param_label,
            ty = %input.ty,
            "Registered event definition"
        );

        Ok(Self {
            topic_hash,
            name: event.name.clone(),
            event,
            param_index,
            param_label,
        })
    }

    /// The log primary topic this definition matches.
    #[must_use]
    pub const fn topic_hash(&self) -> B256 {
        self.topic_hash
    }

    /// Event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed ABI event (parameter layout).
    #[must_use]
    pub const fn event(&self) -> &Event {
        &self.event
    }

    /// Declaration-order index of the tracked parameter.
    #[must_use]
    pub const fn param_index(&self) -> usize {
        self.param_index
    }

    /// Display label for the tracked parameter.
    #[must_use]
    pub fn param_label(&self) -> &str {
        &self.param_label
    }
}

/// Maps a log's primary topic hash to its registered event definition.
///
/// Built once at setup; O(1) expected lookup per log during the stream.
#[derive(Debug, Clone)]
pub struct EventRegistry {
    table: HashMap<B256, EventDefinition>,
}

impl EventRegistry {
    /// Build a registry from the configured definitions.
    #[must_use]
    pub fn new(definitions: Vec<EventDefinition>) -> Self {
        let mut table = HashMap::with_capacity(definitions.len());
        for def in definitions {
            debug!(event = %def.name, topic = %def.topic_hash, "Adding event to registry");
            table.insert(def.topic_hash, def);
        }
        Self { table }
    }

    /// Classify a log by its primary topic.
    ///
    /// Returns the matching definition, or `None` when the log has no topics
    /// or its primary topic is not registered — the Unknown classification.
    #[must_use]
    pub fn match_log(&self, log: &LogRecord) -> Option<&EventDefinition> {
        log.topics.first().and_then(|topic| self.table.get(topic))
    }

    /// Registered topic hashes, for building feed-side filters.
    pub fn topic_hashes(&self) -> impl Iterator<Item = B256> + '_ {
        self.table.keys().copied()
    }

    /// Number of registered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
