pub mod assistant;
pub mod datastore;
pub mod identity;
pub mod scheduling;
