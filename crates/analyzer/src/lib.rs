//! Membership resolution, access coverage reduction, report generation, and data sinks.

pub mod coverage;
pub mod reporter;
pub mod resolver;
pub mod sink;

pub use coverage::CoverageReducer;
pub use reporter::Report;
pub use resolver::{MemberSet, MembershipResolver};
