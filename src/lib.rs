//! Capacity expansion planning for energy systems, with a search for worst-case perturbations of
//! renewable availability.
#![warn(missing_docs)]
pub mod attack;
pub mod cli;
pub mod commodity;
pub mod dataset;
pub mod finance;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod parameter;
pub mod planning;
pub mod process;
pub mod settings;
pub mod solver;

#[cfg(test)]
mod fixture;
