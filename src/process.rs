//! Conversion processes and their subprocesses.
//!
//! A conversion process is a technology family (e.g. onshore wind). Each of its subprocesses
//! converts exactly one input commodity into one output commodity and is the unit for which
//! investment and dispatch decisions are made.
use crate::commodity::CommodityID;
use crate::id::define_id_type;
use derive_more::Display;
use serde::{Deserialize, Serialize};

define_id_type!(ProcessID, "process");

/// A technology converting one input commodity into one output commodity.
///
/// Subprocesses are unique by their (process, input, output) triple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("({process}, {input}, {output})")]
pub struct ConversionSubprocess {
    /// The process this subprocess belongs to
    pub process: ProcessID,
    /// The commodity consumed
    pub input: CommodityID,
    /// The commodity produced
    pub output: CommodityID,
}

impl ConversionSubprocess {
    /// Create a new [`ConversionSubprocess`] from string IDs
    pub fn new(process: &str, input: &str, output: &str) -> Self {
        Self {
            process: process.into(),
            input: input.into(),
            output: output.into(),
        }
    }
}
