/*!
 * OSC message handling on top of `rosc`
 *
 * Only single messages are accepted (no bundles). Arguments are narrowed to
 * the tags the command set uses: `i`, `f`, `s` and the `T`/`F` booleans.
 */

use rosc::{OscPacket, OscType};
use std::fmt;
use thiserror::Error;

/// Codec failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OscError {
    #[error("Malformed OSC packet: {0}")]
    Decode(String),

    #[error("Failed to encode OSC message: {0}")]
    Encode(String),

    #[error("Unsupported argument {0}")]
    UnsupportedArgument(String),

    #[error("OSC bundles are not supported")]
    Bundle,
}

/// A single OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
    Bool(bool),
}

impl OscArg {
    /// Integer view; whole floats and booleans coerce
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OscArg::Int(v) => Some(i64::from(*v)),
            OscArg::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            OscArg::Bool(v) => Some(i64::from(*v)),
            OscArg::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float view; integers coerce
    pub fn as_float(&self) -> Option<f64> {
        match self {
            OscArg::Int(v) => Some(f64::from(*v)),
            OscArg::Float(v) => Some(f64::from(*v)),
            OscArg::Str(s) => s.trim().parse().ok(),
            OscArg::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscArg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<OscArg> for OscType {
    fn from(arg: OscArg) -> Self {
        match arg {
            OscArg::Int(v) => OscType::Int(v),
            OscArg::Float(v) => OscType::Float(v),
            OscArg::Str(s) => OscType::String(s),
            OscArg::Bool(v) => OscType::Bool(v),
        }
    }
}

impl TryFrom<OscType> for OscArg {
    type Error = OscError;

    fn try_from(value: OscType) -> Result<Self, Self::Error> {
        match value {
            OscType::Int(v) => Ok(OscArg::Int(v)),
            OscType::Float(v) => Ok(OscArg::Float(v)),
            OscType::String(s) => Ok(OscArg::Str(s)),
            OscType::Bool(v) => Ok(OscArg::Bool(v)),
            other => Err(OscError::UnsupportedArgument(format!("{:?}", other))),
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Int(v) => write!(f, "{}", v),
            OscArg::Float(v) => write!(f, "{}", v),
            OscArg::Str(s) => write!(f, "{:?}", s),
            OscArg::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// An OSC message: address pattern plus arguments
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, OscError> {
        let packet = OscPacket::Message(rosc::OscMessage {
            addr: self.address.clone(),
            args: self.args.iter().cloned().map(OscType::from).collect(),
        });
        rosc::encoder::encode(&packet).map_err(|e| OscError::Encode(format!("{:?}", e)))
    }

    /// Decode a single message
    pub fn decode(packet: &[u8]) -> Result<Self, OscError> {
        let (_, packet) = rosc::decoder::decode_udp(packet).map_err(|e| OscError::Decode(format!("{:?}", e)))?;

        match packet {
            OscPacket::Message(message) => {
                let args = message
                    .args
                    .into_iter()
                    .map(OscArg::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::new(message.addr, args))
            }
            OscPacket::Bundle(_) => Err(OscError::Bundle),
        }
    }
}

impl fmt::Display for OscMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscBundle, OscTime};

    #[test]
    fn test_encode_layout() {
        let msg = OscMessage::new("/LEDPlay/player/backgroundMode", vec![OscArg::Int(2)]);
        let bytes = msg.encode().unwrap();

        // 30-char address pads to 32, ",i" pads to 4, int is 4
        assert_eq!(bytes.len(), 32 + 4 + 4);
        assert_eq!(&bytes[32..36], b",i\0\0");
        assert_eq!(&bytes[36..], &[0, 0, 0, 2]);
    }

    #[test]
    fn test_exact_multiple_gets_full_pad() {
        let bytes = OscMessage::new("/abc", vec![]).encode().unwrap();
        assert_eq!(&bytes[..8], b"/abc\0\0\0\0");
    }

    #[test]
    fn test_decode_mixed_arguments() {
        let msg = OscMessage::new(
            "/override_temperature",
            vec![OscArg::Str("cpu".to_string()), OscArg::Float(91.5), OscArg::Bool(true)],
        );
        let decoded = OscMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.to_string(), "/override_temperature \"cpu\" 91.5 true");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            OscMessage::decode(b"/test\0\0\0,i\0\0\0\0").unwrap_err(),
            OscError::Decode(_)
        ));
        assert!(matches!(
            OscMessage::decode(b"test\0\0\0\0,\0\0\0").unwrap_err(),
            OscError::Decode(_)
        ));
        assert!(matches!(OscMessage::decode(b"").unwrap_err(), OscError::Decode(_)));
    }

    #[test]
    fn test_bundles_rejected() {
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![],
        });
        let bytes = rosc::encoder::encode(&bundle).unwrap();
        assert_eq!(OscMessage::decode(&bytes).unwrap_err(), OscError::Bundle);
    }

    #[test]
    fn test_unsupported_argument_rejected() {
        let packet = OscPacket::Message(rosc::OscMessage {
            addr: "/test".to_string(),
            args: vec![OscType::Double(4.0)],
        });
        let bytes = rosc::encoder::encode(&packet).unwrap();
        assert!(matches!(
            OscMessage::decode(&bytes).unwrap_err(),
            OscError::UnsupportedArgument(_)
        ));
    }

    #[test]
    fn test_argument_coercion() {
        assert_eq!(OscArg::Float(3.0).as_int(), Some(3));
        assert_eq!(OscArg::Float(3.5).as_int(), None);
        assert_eq!(OscArg::Str(" 4 ".to_string()).as_int(), Some(4));
        assert_eq!(OscArg::Int(70).as_float(), Some(70.0));
        assert_eq!(OscArg::Bool(true).as_float(), None);
        assert_eq!(OscArg::Str("led_a".to_string()).as_str(), Some("led_a"));
    }
}
