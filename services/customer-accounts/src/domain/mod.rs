//! The customer aggregate: value objects, commands, events and the pure
//! functions deciding which events a command records.

pub mod commands;
pub mod customer;
pub mod events;
pub mod values;

pub use customer::{
    change_email_address, change_name, confirm_email_address, delete_customer,
    register_customer, CustomerState,
};
pub use events::{event_names, CustomerEvent};
