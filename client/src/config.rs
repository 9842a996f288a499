use std::env;

use crate::{ClientErr, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Layer sizes in bytes of the stock four layer model.
pub const DEFAULT_LAYER_SIZES: [usize; 4] = [504, 36, 144, 16];

pub const DEFAULT_MAX_MESSAGE_SIZE: usize = comms::DEFAULT_MAX_FRAME_SIZE;

const HOST: &str = "FL_HOST";
const PORT: &str = "FL_PORT";
const LAYER_SIZES: &str = "FL_LAYER_SIZES";
const MAX_MESSAGE_SIZE: &str = "FL_MAX_MESSAGE_SIZE";

/// Where the coordinator lives and what the local model looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host:port` of the coordinator.
    pub server_addr: String,
    /// The size in bytes of every model layer.
    pub layer_sizes: Vec<usize>,
    /// The largest incoming frame accepted.
    pub max_message_size: usize,
}

impl ClientConfig {
    /// Creates a new `ClientConfig` with the default model and message limit.
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            layer_sizes: DEFAULT_LAYER_SIZES.to_vec(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// `FL_PORT` is required. `FL_HOST`, `FL_LAYER_SIZES` (comma separated)
    /// and `FL_MAX_MESSAGE_SIZE` fall back to their defaults.
    ///
    /// # Errors
    /// `InvalidConfig` if the port is missing or any variable can't be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = lookup(PORT)
            .ok_or_else(|| invalid(PORT, "not set"))?
            .trim()
            .parse()
            .map_err(|e| invalid(PORT, e))?;

        let layer_sizes = match lookup(LAYER_SIZES) {
            Some(sizes) => parse_layer_sizes(&sizes)?,
            None => DEFAULT_LAYER_SIZES.to_vec(),
        };

        let max_message_size = match lookup(MAX_MESSAGE_SIZE) {
            Some(size) => size
                .trim()
                .parse()
                .map_err(|e| invalid(MAX_MESSAGE_SIZE, e))?,
            None => DEFAULT_MAX_MESSAGE_SIZE,
        };

        Ok(Self {
            server_addr: format!("{host}:{port}"),
            layer_sizes,
            max_message_size,
        })
    }
}

fn invalid(key: &'static str, detail: impl ToString) -> ClientErr {
    ClientErr::InvalidConfig {
        key,
        detail: detail.to_string(),
    }
}

fn parse_layer_sizes(sizes: &str) -> Result<Vec<usize>> {
    let sizes = sizes
        .split(',')
        .map(|size| size.trim().parse().map_err(|e| invalid(LAYER_SIZES, e)))
        .collect::<Result<Vec<usize>>>()?;

    if sizes.contains(&0) {
        return Err(invalid(LAYER_SIZES, "layers can't be empty"));
    }

    Ok(sizes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<ClientConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn only_the_port_is_required() {
        let config = from_vars(&[(PORT, "8080")]).unwrap();
        assert_eq!(config, ClientConfig::new("127.0.0.1:8080"));
    }

    #[test]
    fn every_variable_is_read() {
        let config = from_vars(&[
            (HOST, "10.0.0.2"),
            (PORT, "9000"),
            (LAYER_SIZES, "4, 8,16"),
            (MAX_MESSAGE_SIZE, "1024"),
        ])
        .unwrap();

        assert_eq!(config.server_addr, "10.0.0.2:9000");
        assert_eq!(config.layer_sizes, vec![4, 8, 16]);
        assert_eq!(config.max_message_size, 1024);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            from_vars(&[]),
            Err(ClientErr::InvalidConfig { key: PORT, .. })
        ));
        assert!(matches!(
            from_vars(&[(PORT, "http")]),
            Err(ClientErr::InvalidConfig { key: PORT, .. })
        ));
        assert!(matches!(
            from_vars(&[(PORT, "1"), (LAYER_SIZES, "4,x")]),
            Err(ClientErr::InvalidConfig {
                key: LAYER_SIZES,
                ..
            })
        ));
        assert!(matches!(
            from_vars(&[(PORT, "1"), (LAYER_SIZES, "4,0")]),
            Err(ClientErr::InvalidConfig {
                key: LAYER_SIZES,
                ..
            })
        ));
    }
}
