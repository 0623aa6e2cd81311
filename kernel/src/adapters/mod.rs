// Collaborator Adapters
//
// Source retrieval and source-format parsing. Both run before the load
// engine and abort the run on failure.

pub mod fetch;
pub mod socrata;
