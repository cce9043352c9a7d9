//! Core domain types
//!
//! Plain configuration records assembled from validated user input and handed
//! by value to the provisioning collaborators. Once built they are not mutated.

pub mod cluster;
