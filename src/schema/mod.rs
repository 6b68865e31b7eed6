//! Field and flight-state schemas
//!
//! The firmware only transmits numeric field ids. Everything that gives those ids
//! meaning (names, units, group expansion, the timestamp field) comes from a
//! versioned YAML definition loaded here.
//!
//! - [`SchemaRegistry`] validates and indexes one `data_names` version
//! - [`SchemaCatalog`] finds versions on disk or in the bundled set
//! - [`StateTable`] names the flight computer's state machine ids

mod catalog;
mod registry;
mod states;

pub use catalog::{
    DEFAULT_SCHEMA_VERSION, DEFAULT_STATES_VERSION, SchemaCatalog, data_names_file_name,
    states_file_name,
};
pub use registry::{GROUP_WIDTH, SchemaRegistry, TIMESTAMP_FIELD};
pub use states::{StateDef, StateTable};
