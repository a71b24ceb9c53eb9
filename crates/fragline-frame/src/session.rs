//! Out-of-band session setup.
//!
//! Before any packet flows, both ends agree on the version-0 descriptor and
//! the packet size. The description travels as an attribute string
//! (`caps=<base64>;capsversion=0;mtu=1400;clock-rate=90000`) or as JSON.

use base64::{engine::general_purpose::STANDARD, Engine};
use fragline_transport::DEFAULT_CLOCK_RATE;
use serde::{Deserialize, Serialize};

use crate::cache::{FormatDescriptor, FormatVersion};
use crate::depayloader::DepayloaderConfig;
use crate::error::{FrameError, Result};
use crate::payloader::{PayloaderConfig, DEFAULT_MTU};

/// Parameters negotiated at session setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Descriptor for format version 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
    /// Maximum packet size, fragment header included.
    #[serde(default = "default_mtu")]
    pub mtu: usize,
    /// Clock rate of the carrier timestamps.
    #[serde(default = "default_clock_rate")]
    pub clock_rate: u32,
}

fn default_mtu() -> usize {
    DEFAULT_MTU
}

fn default_clock_rate() -> u32 {
    DEFAULT_CLOCK_RATE
}

impl Default for SessionDescription {
    fn default() -> Self {
        Self {
            descriptor: None,
            mtu: DEFAULT_MTU,
            clock_rate: DEFAULT_CLOCK_RATE,
        }
    }
}

impl SessionDescription {
    pub fn new(descriptor: Option<&str>, mtu: usize) -> Self {
        Self {
            descriptor: descriptor.map(str::to_owned),
            mtu,
            ..Self::default()
        }
    }

    /// The version-0 descriptor.
    pub fn initial_descriptor(&self) -> Option<FormatDescriptor> {
        self.descriptor.as_deref().map(FormatDescriptor::from)
    }

    /// Render as a `;`-separated attribute string.
    pub fn to_attributes(&self) -> String {
        let mut attrs = Vec::with_capacity(4);
        if let Some(descriptor) = &self.descriptor {
            attrs.push(format!("caps={}", STANDARD.encode(descriptor.as_bytes())));
            attrs.push(format!("capsversion={}", FormatVersion::OUT_OF_BAND));
        }
        attrs.push(format!("mtu={}", self.mtu));
        attrs.push(format!("clock-rate={}", self.clock_rate));
        attrs.join(";")
    }

    /// Parse an attribute string. Unknown keys are ignored.
    pub fn from_attributes(input: &str) -> Result<Self> {
        let mut session = Self::default();

        for attr in input.split(';').map(str::trim).filter(|a| !a.is_empty()) {
            let (key, value) = attr
                .split_once('=')
                .ok_or_else(|| invalid(format!("attribute {attr:?} has no value")))?;
            let value = value.trim();

            match key.trim() {
                "caps" => {
                    let raw = STANDARD
                        .decode(value)
                        .map_err(|err| invalid(format!("caps is not base64: {err}")))?;
                    let text = String::from_utf8(raw)
                        .map_err(|err| invalid(format!("caps is not utf-8: {err}")))?;
                    session.descriptor = Some(text.trim_end_matches('\0').to_owned());
                }
                "capsversion" => {
                    let version: u8 = value
                        .parse()
                        .map_err(|_| invalid(format!("invalid capsversion {value:?}")))?;
                    if version != FormatVersion::OUT_OF_BAND.get() {
                        return Err(invalid(format!(
                            "capsversion must be {} for session setup, got {version}",
                            FormatVersion::OUT_OF_BAND
                        )));
                    }
                }
                "mtu" => {
                    session.mtu = value
                        .parse()
                        .map_err(|_| invalid(format!("invalid mtu {value:?}")))?;
                }
                "clock-rate" => {
                    session.clock_rate = value
                        .parse()
                        .map_err(|_| invalid(format!("invalid clock-rate {value:?}")))?;
                }
                _ => {}
            }
        }

        Ok(session)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| invalid(err.to_string()))
    }

    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|err| invalid(err.to_string()))
    }

    /// Sender configuration for this session.
    pub fn payloader_config(&self) -> PayloaderConfig {
        PayloaderConfig {
            mtu: self.mtu,
            initial_descriptor: self.initial_descriptor(),
        }
    }

    /// Receiver configuration for this session.
    pub fn depayloader_config(&self) -> DepayloaderConfig {
        DepayloaderConfig {
            initial_descriptor: self.initial_descriptor(),
            ..DepayloaderConfig::default()
        }
    }
}

fn invalid(message: String) -> FrameError {
    FrameError::InvalidSession(message)
}
