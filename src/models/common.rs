use serde::{Deserialize, Serialize};
use std::fmt;

/// Account issuing invoices. Supplied by the external auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuerId(String);

impl IssuerId {
    pub fn new(id: impl Into<String>) -> Self {
        IssuerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssuerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub city: String,
}

impl Address {
    /// `Długa 5, 00-001 Warszawa`
    pub fn one_line(&self) -> String {
        format!(
            "{} {}, {} {}",
            self.street, self.house_number, self.postal_code, self.city
        )
    }
}

/// Seller details printed in the top-left block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerProfile {
    pub full_name: String,
    pub company_name: String,
    pub nip: String,
    pub address: Address,
    pub bank: Option<String>,
    pub account: Option<String>,
    pub phone: Option<String>,
    pub email: String,
}

/// Buyer details printed beneath the issuer block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientProfile {
    pub name: String,
    pub address: Address,
    pub pesel: Option<String>,
    pub email: Option<String>,
}
