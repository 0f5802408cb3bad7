use std::{borrow::Cow, io};

use crate::{Deserialize, Serialize, specs::model::ModelSpec};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

type StepsType = u64;
const STEPS_SIZE: usize = size_of::<StepsType>();

const ERR: Header = 0;
const CONTROL: Header = 1;
const OPTIMIZE: Header = 2;
const OPTIMIZE_ACK: Header = 3;

/// The payload data for the `Data` variant of the `Msg` enum.
///
/// Parameter slices are ordered as the `variable_ids` sent in `set:model`.
#[derive(Debug)]
pub enum Payload<'a> {
    /// `run:optimize`, the current global parameters and the amount of local steps to run.
    Optimize { steps: usize, params: &'a [f32] },
    /// `run:optimize-ack`, the parameters after the local steps.
    OptimizeAck(&'a [f32]),
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub enum Command {
    #[serde(rename = "set:model")]
    SetModel(Box<ModelSpec>),
    #[serde(rename = "set:model-ack")]
    SetModelAck,
    #[serde(rename = "set:release")]
    SetRelease,
    #[serde(rename = "set:release-ack")]
    SetReleaseAck,
}

/// The application layer message exchanged between master and workers.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// Returns the wire name of this message kind, used for logging and protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::SetModel(_)) => "set:model",
            Msg::Control(Command::SetModelAck) => "set:model-ack",
            Msg::Control(Command::SetRelease) => "set:release",
            Msg::Control(Command::SetReleaseAck) => "set:release-ack",
            Msg::Data(Payload::Optimize { .. }) => "run:optimize",
            Msg::Data(Payload::OptimizeAck(_)) => "run:optimize-ack",
            Msg::Err(_) => "err",
        }
    }

    fn buf_is_too_small<T>(size: usize, expected: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {expected} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid message kind {kind}"),
        ))
    }

    fn cast_params(bytes: &[u8]) -> io::Result<&[f32]> {
        bytemuck::try_cast_slice(bytes).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Received a malformed parameter slice: {e:?}"),
            )
        })
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR.to_be_bytes());
                Ok(Some(e.as_bytes()))
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL.to_be_bytes());
                serde_json::to_writer(buf, cmd)?;
                Ok(None)
            }
            Msg::Data(Payload::Optimize { steps, params }) => {
                buf.extend_from_slice(&OPTIMIZE.to_be_bytes());
                buf.extend_from_slice(&(*steps as StepsType).to_be_bytes());
                Ok(Some(bytemuck::cast_slice(params)))
            }
            Msg::Data(Payload::OptimizeAck(params)) => {
                buf.extend_from_slice(&OPTIMIZE_ACK.to_be_bytes());
                Ok(Some(bytemuck::cast_slice(params)))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        let Some((kind, rest)) = buf.split_first_chunk::<HEADER_SIZE>() else {
            return Self::buf_is_too_small(buf.len(), HEADER_SIZE);
        };

        match Header::from_be_bytes(*kind) {
            ERR => {
                let text = std::str::from_utf8(rest)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

                Ok(Self::Err(Cow::Borrowed(text)))
            }
            CONTROL => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            OPTIMIZE => {
                let Some((steps, params)) = rest.split_first_chunk::<STEPS_SIZE>() else {
                    return Self::buf_is_too_small(buf.len(), HEADER_SIZE + STEPS_SIZE);
                };

                let steps = StepsType::from_be_bytes(*steps) as usize;
                let params = Self::cast_params(params)?;
                Ok(Self::Data(Payload::Optimize { steps, params }))
            }
            OPTIMIZE_ACK => {
                let params = Self::cast_params(rest)?;
                Ok(Self::Data(Payload::OptimizeAck(params)))
            }
            kind => Self::invalid_kind(kind),
        }
    }
}
