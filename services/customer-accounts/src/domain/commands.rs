//! Commands addressed to the customer aggregate.
//!
//! A command can only be obtained through its `build` constructor, which
//! validates every embedded value object. A built command is therefore always
//! safe to evaluate.

use accounts_events::Result;

use super::values::{
    ConfirmationHash, ConfirmationSecret, CustomerId, EmailAddress, PersonName,
};

/// Behaviour shared by all customer commands.
pub trait CustomerCommand {
    /// Stable name used in logs.
    const NAME: &'static str;

    /// The aggregate this command targets.
    fn customer_id(&self) -> CustomerId;
}

/// Registers a new customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCustomer {
    customer_id: CustomerId,
    email_address: EmailAddress,
    confirmation_hash: ConfirmationHash,
    person_name: PersonName,
}

impl RegisterCustomer {
    /// Builds a registration for a freshly generated customer id.
    pub fn build(
        email_address: &str,
        given_name: &str,
        family_name: &str,
        secret: &ConfirmationSecret,
    ) -> Result<Self> {
        Self::assemble(
            CustomerId::generate(),
            email_address,
            given_name,
            family_name,
            secret,
        )
    }

    /// Builds a registration for a caller-chosen customer id.
    pub fn build_with_id(
        customer_id: &str,
        email_address: &str,
        given_name: &str,
        family_name: &str,
        secret: &ConfirmationSecret,
    ) -> Result<Self> {
        let customer_id = CustomerId::parse(customer_id)?;
        Self::assemble(customer_id, email_address, given_name, family_name, secret)
    }

    fn assemble(
        customer_id: CustomerId,
        email_address: &str,
        given_name: &str,
        family_name: &str,
        secret: &ConfirmationSecret,
    ) -> Result<Self> {
        let email_address = EmailAddress::build(email_address)?;
        let person_name = PersonName::build(given_name, family_name)?;
        let confirmation_hash = ConfirmationHash::generate(&email_address, secret);

        Ok(Self {
            customer_id,
            email_address,
            confirmation_hash,
            person_name,
        })
    }

    pub fn email_address(&self) -> &EmailAddress {
        &self.email_address
    }

    pub fn confirmation_hash(&self) -> &ConfirmationHash {
        &self.confirmation_hash
    }

    pub fn person_name(&self) -> &PersonName {
        &self.person_name
    }
}

impl CustomerCommand for RegisterCustomer {
    const NAME: &'static str = "RegisterCustomer";

    fn customer_id(&self) -> CustomerId {
        self.customer_id
    }
}

/// Confirms an email address with the hash sent to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmEmailAddress {
    customer_id: CustomerId,
    email_address: EmailAddress,
    confirmation_hash: ConfirmationHash,
}

impl ConfirmEmailAddress {
    pub fn build(customer_id: &str, email_address: &str, confirmation_hash: &str) -> Result<Self> {
        Ok(Self {
            customer_id: CustomerId::parse(customer_id)?,
            email_address: EmailAddress::build(email_address)?,
            confirmation_hash: ConfirmationHash::build(confirmation_hash)?,
        })
    }

    pub fn email_address(&self) -> &EmailAddress {
        &self.email_address
    }

    pub fn confirmation_hash(&self) -> &ConfirmationHash {
        &self.confirmation_hash
    }
}

impl CustomerCommand for ConfirmEmailAddress {
    const NAME: &'static str = "ConfirmEmailAddress";

    fn customer_id(&self) -> CustomerId {
        self.customer_id
    }
}

/// Changes the email address; the new address starts unconfirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEmailAddress {
    customer_id: CustomerId,
    email_address: EmailAddress,
    confirmation_hash: ConfirmationHash,
}

impl ChangeEmailAddress {
    pub fn build(
        customer_id: &str,
        email_address: &str,
        secret: &ConfirmationSecret,
    ) -> Result<Self> {
        let customer_id = CustomerId::parse(customer_id)?;
        let email_address = EmailAddress::build(email_address)?;
        let confirmation_hash = ConfirmationHash::generate(&email_address, secret);

        Ok(Self {
            customer_id,
            email_address,
            confirmation_hash,
        })
    }

    pub fn email_address(&self) -> &EmailAddress {
        &self.email_address
    }

    pub fn confirmation_hash(&self) -> &ConfirmationHash {
        &self.confirmation_hash
    }
}

impl CustomerCommand for ChangeEmailAddress {
    const NAME: &'static str = "ChangeEmailAddress";

    fn customer_id(&self) -> CustomerId {
        self.customer_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeName {
    customer_id: CustomerId,
    person_name: PersonName,
}

impl ChangeName {
    pub fn build(customer_id: &str, given_name: &str, family_name: &str) -> Result<Self> {
        Ok(Self {
            customer_id: CustomerId::parse(customer_id)?,
            person_name: PersonName::build(given_name, family_name)?,
        })
    }

    pub fn person_name(&self) -> &PersonName {
        &self.person_name
    }
}

impl CustomerCommand for ChangeName {
    const NAME: &'static str = "ChangeName";

    fn customer_id(&self) -> CustomerId {
        self.customer_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCustomer {
    customer_id: CustomerId,
}

impl DeleteCustomer {
    pub fn build(customer_id: &str) -> Result<Self> {
        Ok(Self {
            customer_id: CustomerId::parse(customer_id)?,
        })
    }
}

impl CustomerCommand for DeleteCustomer {
    const NAME: &'static str = "DeleteCustomer";

    fn customer_id(&self) -> CustomerId {
        self.customer_id
    }
}
