//! The polling loop: read some registers, sleep, repeat.

use crate::client::RegisterClient;
use crate::codec::FrameCodec;
use crate::config::MonitorConfig;
use crate::registers::{RegisterAddress, RegisterValue};
use crate::transport::Transport;
use crate::{Error, Result};
use std::ops::ControlFlow;
use std::thread;

/// Polls a fixed list of registers at a fixed interval.
///
/// Every read result, failure included, goes to the caller's sink, which decides
/// whether to keep going. A failed read never stops the loop by itself, except
/// that a closed client ends it with [`Error::Closed`].
#[derive(Debug, Clone)]
pub struct Monitor {
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run until the configured number of polls is done or the sink breaks.
    ///
    /// Returns the number of completed polls. A poll interrupted by the sink
    /// counts as completed.
    pub fn run<T, C, F>(&self, client: &mut RegisterClient<T, C>, mut sink: F) -> Result<u64>
    where
        T: Transport,
        C: FrameCodec,
        F: FnMut(RegisterAddress, Result<RegisterValue>) -> ControlFlow<()>,
    {
        let mut polls = 0;
        while self.config.iterations.map_or(true, |limit| polls < limit) {
            polls += 1;
            for &address in &self.config.registers {
                let result = client.get_reg(address);
                if let Err(Error::Closed) = result {
                    return Err(Error::Closed);
                }
                if sink(RegisterAddress::new(address), result).is_break() {
                    return Ok(polls);
                }
            }
            if self.config.iterations != Some(polls) {
                thread::sleep(self.config.interval());
            }
        }
        Ok(polls)
    }
}
