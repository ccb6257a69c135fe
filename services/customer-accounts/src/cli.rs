//! Command line surface of the binary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use customer_accounts::{
    command_handler::CustomerCommandHandler,
    config::Config,
    db::Database,
    domain::{
        commands::{
            ChangeEmailAddress, ChangeName, ConfirmEmailAddress, CustomerCommand, DeleteCustomer,
            RegisterCustomer,
        },
        values::CustomerId,
        CustomerState,
    },
};
use serde::Serialize;
use tracing::info;

/// Event-sourced customer accounts.
#[derive(Debug, Parser)]
#[command(name = "customer-accounts")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run pending migrations before the command.
    #[arg(long, global = true)]
    migrate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run pending database migrations.
    Migrate,

    /// Register a new customer.
    Register {
        email_address: String,
        given_name: String,
        family_name: String,
    },

    /// Confirm a customer's email address.
    ConfirmEmail {
        customer_id: String,
        email_address: String,
        confirmation_hash: String,
    },

    /// Change a customer's email address.
    ChangeEmail {
        customer_id: String,
        email_address: String,
    },

    /// Change a customer's name.
    ChangeName {
        customer_id: String,
        given_name: String,
        family_name: String,
    },

    /// Delete a customer.
    Delete { customer_id: String },

    /// Show the current state of a customer.
    Show { customer_id: String },

    /// Remove every stored event of a customer.
    Purge { customer_id: String },
}

#[derive(Debug, Serialize)]
struct CustomerView {
    customer_id: String,
    email_address: String,
    is_email_address_confirmed: bool,
    given_name: String,
    family_name: String,
    is_deleted: bool,
    stream_version: u32,
}

impl From<&CustomerState> for CustomerView {
    fn from(state: &CustomerState) -> Self {
        Self {
            customer_id: state.customer_id.to_string(),
            email_address: state.email_address.to_string(),
            is_email_address_confirmed: state.is_email_address_confirmed,
            given_name: state.person_name.given_name().to_string(),
            family_name: state.person_name.family_name().to_string(),
            is_deleted: state.is_deleted,
            stream_version: state.current_stream_version.value(),
        }
    }
}

impl Cli {
    pub async fn run(self, config: Config) -> Result<()> {
        let db = Database::connect(&config.database).await?;
        db.health_check().await?;
        if self.migrate || config.dev_mode || matches!(self.command, Commands::Migrate) {
            db.run_migrations().await?;
        }

        let store = db.event_store();
        let handler = CustomerCommandHandler::new(store.clone());

        let customer_id = match self.command {
            Commands::Migrate => {
                print_json(&serde_json::json!({ "migrated": true }))?;
                return Ok(());
            }
            Commands::Register {
                email_address,
                given_name,
                family_name,
            } => {
                let secret = config.require_confirmation_secret()?;
                let command =
                    RegisterCustomer::build(&email_address, &given_name, &family_name, secret)?;
                handler.register(&command).await?;
                command.customer_id()
            }
            Commands::ConfirmEmail {
                customer_id,
                email_address,
                confirmation_hash,
            } => {
                let command =
                    ConfirmEmailAddress::build(&customer_id, &email_address, &confirmation_hash)?;
                handler.confirm_email_address(&command).await?;
                command.customer_id()
            }
            Commands::ChangeEmail {
                customer_id,
                email_address,
            } => {
                let secret = config.require_confirmation_secret()?;
                let command = ChangeEmailAddress::build(&customer_id, &email_address, secret)?;
                handler.change_email_address(&command).await?;
                command.customer_id()
            }
            Commands::ChangeName {
                customer_id,
                given_name,
                family_name,
            } => {
                let command = ChangeName::build(&customer_id, &given_name, &family_name)?;
                handler.change_name(&command).await?;
                command.customer_id()
            }
            Commands::Delete { customer_id } => {
                let command = DeleteCustomer::build(&customer_id)?;
                handler.delete_customer(&command).await?;
                command.customer_id()
            }
            Commands::Show { customer_id } => CustomerId::parse(&customer_id)?,
            Commands::Purge { customer_id } => {
                let customer_id = CustomerId::parse(&customer_id)?;
                store.purge_event_stream(customer_id).await?;
                info!(%customer_id, "customer purged");
                print_json(&serde_json::json!({ "purged": customer_id.to_string() }))?;
                return Ok(());
            }
        };

        let state = handler.customer_view(customer_id).await?;
        print_json(&CustomerView::from(&state))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
