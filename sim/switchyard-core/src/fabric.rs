//! The shared simulated world.
//!
//! A [`Fabric`] owns everything the networks attached to it share: the
//! switch tables, the mapping from RPC codes to channels, the timeline and
//! the configuration. Fabrics are independent of each other, so tests can
//! each build their own.

use crate::{
    address::Channel,
    admission::AdmissionController,
    config::{Config, ConfigError},
    network::SimNetwork,
    rpc_code::CodeBook,
    switch::Switch,
    timeline::{NodeId, Timeline},
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Debug)]
pub struct Fabric {
    switch: Switch<SimNetwork>,
    codes: CodeBook,
    timeline: Timeline,
    config: Config,
    next_node: AtomicU64,
}

impl Fabric {
    /// Creates a fabric that admits every delivery.
    ///
    /// # Examples
    ///
    /// ```
    /// # use switchyard_core::{Fabric, SimulatorConfig};
    /// let fabric = Fabric::new(SimulatorConfig::default().delays(5, 10)).unwrap();
    /// assert_eq!(fabric.run_until_idle(), 0);
    /// ```
    pub fn new(config: impl Into<Config>) -> Result<Arc<Self>, ConfigError> {
        Self::build(config.into(), Timeline::new())
    }

    /// Creates a fabric whose timeline asks `admission` before queueing a
    /// delivery.
    pub fn with_admission(
        config: impl Into<Config>,
        admission: Box<dyn AdmissionController>,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::build(config.into(), Timeline::with_admission(admission))
    }

    fn build(config: Config, timeline: Timeline) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Arc::new(Self {
            switch: Switch::new(),
            codes: CodeBook::new(Channel::default()),
            timeline,
            config,
            next_node: AtomicU64::new(0),
        }))
    }

    /// The switch tables, one per channel.
    pub fn switch(&self) -> &Switch<SimNetwork> {
        &self.switch
    }

    /// Which channel each RPC code travels on.
    pub fn codes(&self) -> &CodeBook {
        &self.codes
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs deliveries until none are left. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        self.timeline.run_until_idle()
    }

    pub(crate) fn next_node_id(&self) -> NodeId {
        self.next_node.fetch_add(1, Ordering::Relaxed)
    }
}
