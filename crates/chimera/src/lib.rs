//! Grouping, parent selection, classification and aggregation of chimeric
//! spectrum identifications.
//!
//! The flow for a single result level is
//! [`grouping`] -> [`parent`] -> [`classify`] -> [`breakdown`] -> [`aggregate`],
//! driven per spectra file by [`pipeline::Pipeline`].

pub mod aggregate;
pub mod breakdown;
pub mod classify;
pub mod grouping;
pub mod mass;
pub mod metadata;
pub mod parent;
pub mod pipeline;
pub mod record;
