// Models module for the fleet controller
// Cluster records, operations and API envelopes

pub mod cluster;
pub mod operation;
pub mod response;

pub use cluster::*;
pub use operation::*;
pub use response::*;
