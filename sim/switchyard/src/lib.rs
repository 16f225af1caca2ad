//! Prebuilt simulations and applications for the switchyard simulator, and
//! the command line that runs them.

pub mod applications;
pub mod cli;
pub mod simulations;
