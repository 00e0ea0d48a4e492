//! Common identifier types for the bookstore simulation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an id from its raw key.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Returns the raw key.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self::new(key)
            }
        }
    };
}

string_id! {
    /// Key of a Book in the catalog (e.g. `Book_HP1`).
    BookId
}

string_id! {
    /// Key of the Inventory record holding one book (e.g. `Inv_HP1`).
    InventoryId
}

string_id! {
    /// Key of a Customer (e.g. `Cust_3`).
    CustomerId
}

string_id! {
    /// Key of an Employee (e.g. `Emp_1`).
    EmployeeId
}

impl BookId {
    /// Inventory key conventionally paired with this book: `Book_X` -> `Inv_X`.
    pub fn inventory_key(&self) -> InventoryId {
        match self.0.strip_prefix("Book_") {
            Some(rest) => InventoryId::new(format!("Inv_{rest}")),
            None => InventoryId::new(format!("Inv_{}", self.0)),
        }
    }
}

impl CustomerId {
    /// Trailing decimal number of the key, if any (`Cust_12` -> 12).
    pub fn numeric_suffix(&self) -> Option<u64> {
        let digits_at = self
            .0
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)?;
        self.0[digits_at..].parse().ok()
    }
}

/// Identifier of an Order in the append-only ledger.
///
/// Derived from the ledger sequence number rather than drawn from an RNG,
/// so order ids never perturb the demand stream of a seeded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    /// Creates a deterministic OrderId from a ledger sequence number.
    pub fn from_sequence(sequence: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&sequence.to_le_bytes());
        bytes[8..16].copy_from_slice(&sequence.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 chars are enough to tell orders apart in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(CustomerId::new("Cust_12").numeric_suffix(), Some(12));
        assert_eq!(CustomerId::new("Cust_1").numeric_suffix(), Some(1));
        assert_eq!(CustomerId::new("Cust_Maya").numeric_suffix(), None);
        assert_eq!(CustomerId::new("7").numeric_suffix(), Some(7));
    }

    #[test]
    fn test_inventory_key_pairing() {
        assert_eq!(BookId::new("Book_HP1").inventory_key(), InventoryId::new("Inv_HP1"));
        assert_eq!(BookId::new("Dune").inventory_key(), InventoryId::new("Inv_Dune"));
    }

    #[test]
    fn test_order_id_is_deterministic() {
        assert_eq!(OrderId::from_sequence(3), OrderId::from_sequence(3));
        assert_ne!(OrderId::from_sequence(3), OrderId::from_sequence(4));
    }

    #[test]
    fn test_ids_order_lexically() {
        let mut ids = vec![InventoryId::new("Inv_b"), InventoryId::new("Inv_a")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "Inv_a");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&BookId::new("Book_1984")).unwrap();
        assert_eq!(json, "\"Book_1984\"");
    }
}
