use std::io;

use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use crate::{
    ConfigMap, Deserialize, Parameters, Serialize,
    protocol::{self, WireReader, invalid_data, write_header},
};

/// The body of a reconnect instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, SerdeSerialize, SerdeDeserialize)]
pub struct Reconnect {
    pub seconds: Option<u64>,
}

/// An instruction sent by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMsg<'a> {
    GetParameters,
    Fit {
        parameters: Parameters<'a>,
        config: ConfigMap,
    },
    Evaluate {
        parameters: Parameters<'a>,
        config: ConfigMap,
    },
    Reconnect(Reconnect),
    /// A well framed message whose kind this client doesn't know about.
    Unknown(u32),
}

impl ServerMsg<'_> {
    /// A short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMsg::GetParameters => "get_parameters",
            ServerMsg::Fit { .. } => "fit",
            ServerMsg::Evaluate { .. } => "evaluate",
            ServerMsg::Reconnect(_) => "reconnect",
            ServerMsg::Unknown(_) => "unknown",
        }
    }
}

/// A reply sent by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMsg<'a> {
    GetParametersRes {
        parameters: Parameters<'a>,
    },
    FitRes {
        parameters: Parameters<'a>,
        num_examples: i64,
    },
    EvaluateRes {
        loss: f32,
        num_examples: i64,
    },
}

impl ClientMsg<'_> {
    /// A short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMsg::GetParametersRes { .. } => "get_parameters_res",
            ClientMsg::FitRes { .. } => "fit_res",
            ClientMsg::EvaluateRes { .. } => "evaluate_res",
        }
    }
}

fn write_json<T: SerdeSerialize>(buf: &mut Vec<u8>, value: &T) -> io::Result<()> {
    serde_json::to_writer(buf, value).map_err(io::Error::from)
}

fn read_json<'a, T: SerdeDeserialize<'a>>(reader: &mut WireReader<'a>) -> io::Result<T> {
    serde_json::from_slice(reader.rest()).map_err(io::Error::from)
}

impl Serialize for ServerMsg<'_> {
    fn serialize(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match self {
            ServerMsg::GetParameters => write_header(buf, protocol::GET_PARAMETERS_INS),
            ServerMsg::Fit { parameters, config } => {
                write_header(buf, protocol::FIT_INS);
                parameters.write(buf)?;
                write_json(buf, config)?;
            }
            ServerMsg::Evaluate { parameters, config } => {
                write_header(buf, protocol::EVALUATE_INS);
                parameters.write(buf)?;
                write_json(buf, config)?;
            }
            ServerMsg::Reconnect(reconnect) => {
                write_header(buf, protocol::RECONNECT_INS);
                write_json(buf, reconnect)?;
            }
            ServerMsg::Unknown(kind) => write_header(buf, *kind),
        }

        Ok(())
    }
}

impl<'a> Deserialize<'a> for ServerMsg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        let mut reader = WireReader::new(buf);

        let msg = match reader.header()? {
            protocol::GET_PARAMETERS_INS => ServerMsg::GetParameters,
            protocol::FIT_INS => {
                let parameters = Parameters::read(&mut reader)?;
                let config = read_json(&mut reader)?;
                ServerMsg::Fit { parameters, config }
            }
            protocol::EVALUATE_INS => {
                let parameters = Parameters::read(&mut reader)?;
                let config = read_json(&mut reader)?;
                ServerMsg::Evaluate { parameters, config }
            }
            protocol::RECONNECT_INS => ServerMsg::Reconnect(read_json(&mut reader)?),
            kind => ServerMsg::Unknown(kind),
        };

        Ok(msg)
    }
}

impl Serialize for ClientMsg<'_> {
    fn serialize(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match self {
            ClientMsg::GetParametersRes { parameters } => {
                write_header(buf, protocol::GET_PARAMETERS_RES);
                parameters.write(buf)?;
            }
            ClientMsg::FitRes {
                parameters,
                num_examples,
            } => {
                write_header(buf, protocol::FIT_RES);
                buf.extend_from_slice(&num_examples.to_be_bytes());
                parameters.write(buf)?;
            }
            ClientMsg::EvaluateRes { loss, num_examples } => {
                write_header(buf, protocol::EVALUATE_RES);
                buf.extend_from_slice(&loss.to_be_bytes());
                buf.extend_from_slice(&num_examples.to_be_bytes());
            }
        }

        Ok(())
    }
}

impl<'a> Deserialize<'a> for ClientMsg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        let mut reader = WireReader::new(buf);

        let msg = match reader.header()? {
            protocol::GET_PARAMETERS_RES => ClientMsg::GetParametersRes {
                parameters: Parameters::read(&mut reader)?,
            },
            protocol::FIT_RES => {
                let num_examples = reader.i64()?;
                let parameters = Parameters::read(&mut reader)?;
                ClientMsg::FitRes {
                    parameters,
                    num_examples,
                }
            }
            protocol::EVALUATE_RES => ClientMsg::EvaluateRes {
                loss: reader.f32()?,
                num_examples: reader.i64()?,
            },
            kind => return invalid_data(format!("received an invalid reply kind {kind}")),
        };

        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scalar;

    fn roundtrip_server(msg: &ServerMsg<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        msg.serialize(&mut buf).unwrap();
        buf
    }

    #[test]
    fn fit_keeps_parameters_and_config() {
        let layers = [vec![1u8, 2, 3, 4], vec![5, 6]];
        let mut config = ConfigMap::new();
        config.insert("local_epochs".into(), Scalar::Sint64(3));

        let msg = ServerMsg::Fit {
            parameters: Parameters::new(&layers),
            config,
        };

        let buf = roundtrip_server(&msg);
        let read = ServerMsg::deserialize(&buf).unwrap();
        assert_eq!(read, msg);
    }

    #[test]
    fn unknown_kind_is_not_an_error() {
        let buf = roundtrip_server(&ServerMsg::Unknown(42));
        let read = ServerMsg::deserialize(&buf).unwrap();
        assert_eq!(read, ServerMsg::Unknown(42));
    }

    #[test]
    fn unknown_reply_kind_is_invalid_data() {
        let buf = 99u32.to_be_bytes();
        let err = ClientMsg::deserialize(&buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn evaluate_res_keeps_nan_loss() {
        let msg = ClientMsg::EvaluateRes {
            loss: f32::NAN,
            num_examples: 0,
        };

        let mut buf = Vec::new();
        msg.serialize(&mut buf).unwrap();

        let ClientMsg::EvaluateRes { loss, num_examples } = ClientMsg::deserialize(&buf).unwrap()
        else {
            panic!("unexpected reply kind");
        };

        assert!(loss.is_nan());
        assert_eq!(num_examples, 0);
    }
}
