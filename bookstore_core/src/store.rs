//! Entity Store - typed records for the bookstore and their relationships.
//!
//! The store is the only owner of entity state. Agents and handlers keep ids
//! and go through a [`SharedStore`] handle for every read and write.
//!
//! Relationships:
//! - Inventory stores exactly one Book (indexed both ways, fixed at setup)
//! - Employee manages a set of Inventories
//! - Customer purchased a multiset of Books
//! - Order references one Customer and one Book (append-only ledger)

use bookstore_env::{BookId, CustomerId, EmployeeId, InventoryId, OrderId, SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Single-threaded shared handle to the store.
///
/// Borrows must never be held across a bus `publish`.
pub type SharedStore = Rc<RefCell<EntityStore>>;

/// A catalog title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub price: f64,
}

/// Stock record for one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: InventoryId,
    pub book: BookId,
    pub available_quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Books bought, in commit order
    pub purchased: Vec<BookId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub manages: BTreeSet<InventoryId>,
}

/// Immutable ledger entry created on a committed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer: CustomerId,
    pub book: BookId,
    pub qty: u32,
}

/// Typed entity/relationship table for one simulation run.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    books: BTreeMap<BookId, Book>,
    inventories: BTreeMap<InventoryId, Inventory>,
    customers: BTreeMap<CustomerId, Customer>,
    employees: BTreeMap<EmployeeId, Employee>,
    orders: Vec<Order>,

    /// Book -> Inventory index, built as inventories are added
    stock_index: BTreeMap<BookId, InventoryId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the store in a shared handle.
    pub fn shared(self) -> SharedStore {
        Rc::new(RefCell::new(self))
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub fn add_book(&mut self, book: Book) {
        self.books.insert(book.id.clone(), book);
    }

    /// Adds the inventory holding `book`.
    ///
    /// Fails if the book is unknown, another inventory already holds it, or
    /// the inventory id is already taken by another book.
    pub fn add_inventory(
        &mut self,
        id: InventoryId,
        book: BookId,
        available_quantity: u32,
    ) -> SimResult<()> {
        if !self.books.contains_key(&book) {
            return Err(SimError::UnknownBook(book));
        }
        if let Some(existing) = self.stock_index.get(&book) {
            return Err(SimError::DuplicateStock {
                book,
                existing: existing.clone(),
            });
        }
        if let Some(taken) = self.inventories.get(&id) {
            return Err(SimError::DuplicateInventory {
                existing: taken.book.clone(),
                inventory: id,
                book,
            });
        }

        self.stock_index.insert(book.clone(), id.clone());
        self.inventories.insert(
            id.clone(),
            Inventory {
                id,
                book,
                available_quantity,
            },
        );
        Ok(())
    }

    pub fn add_customer(&mut self, id: CustomerId, name: impl Into<String>) {
        let customer = Customer {
            id: id.clone(),
            name: name.into(),
            purchased: Vec::new(),
        };
        self.customers.insert(id, customer);
    }

    pub fn add_employee(
        &mut self,
        id: EmployeeId,
        name: impl Into<String>,
        manages: BTreeSet<InventoryId>,
    ) {
        let employee = Employee {
            id: id.clone(),
            name: name.into(),
            manages,
        };
        self.employees.insert(id, employee);
    }

    /// Checks that every book is stocked. Inventory-side links are enforced by
    /// `add_inventory`.
    pub fn assert_linked(&self) -> SimResult<()> {
        match self.books.keys().find(|id| !self.stock_index.contains_key(*id)) {
            Some(unstocked) => Err(SimError::UnstockedBook(unstocked.clone())),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Adds `qty` units to an inventory. Returns the new level, or `None` for
    /// an unknown inventory.
    pub fn increment_stock(&mut self, id: &InventoryId, qty: u32) -> Option<u32> {
        let inventory = self.inventories.get_mut(id)?;
        inventory.available_quantity = inventory.available_quantity.saturating_add(qty);
        Some(inventory.available_quantity)
    }

    /// Removes `qty` units if enough are available.
    ///
    /// Returns `Some(remaining)` when committed, `None` when rejected. A
    /// rejected call leaves the level untouched.
    pub fn try_decrement_stock(&mut self, id: &InventoryId, qty: u32) -> Option<u32> {
        let inventory = self.inventories.get_mut(id)?;
        let remaining = inventory.available_quantity.checked_sub(qty)?;
        inventory.available_quantity = remaining;
        Some(remaining)
    }

    /// Appends an order to the ledger and returns its id.
    pub fn record_order(&mut self, customer: CustomerId, book: BookId, qty: u32) -> OrderId {
        let id = OrderId::from_sequence(self.orders.len() as u64);
        self.orders.push(Order {
            id,
            customer,
            book,
            qty,
        });
        id
    }

    /// Appends a book to a customer's purchased list.
    pub fn record_purchase(&mut self, customer: &CustomerId, book: BookId) -> SimResult<()> {
        let record = self
            .customers
            .get_mut(customer)
            .ok_or_else(|| SimError::UnknownCustomer(customer.clone()))?;
        record.purchased.push(book);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn book(&self, id: &BookId) -> Option<&Book> {
        self.books.get(id)
    }

    pub fn inventory(&self, id: &InventoryId) -> Option<&Inventory> {
        self.inventories.get(id)
    }

    pub fn customer(&self, id: &CustomerId) -> Option<&Customer> {
        self.customers.get(id)
    }

    pub fn employee(&self, id: &EmployeeId) -> Option<&Employee> {
        self.employees.get(id)
    }

    pub fn quantity(&self, id: &InventoryId) -> Option<u32> {
        self.inventories.get(id).map(|inv| inv.available_quantity)
    }

    /// Inventory that stores `book`.
    pub fn inventory_for_book(&self, book: &BookId) -> Option<&InventoryId> {
        self.stock_index.get(book)
    }

    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    pub fn book_ids(&self) -> Vec<BookId> {
        self.books.keys().cloned().collect()
    }

    pub fn inventories(&self) -> impl Iterator<Item = &Inventory> {
        self.inventories.values()
    }

    pub fn inventory_ids(&self) -> Vec<InventoryId> {
        self.inventories.keys().cloned().collect()
    }

    pub fn customers(&self) -> impl Iterator<Item = &Customer> {
        self.customers.values()
    }

    pub fn employees(&self) -> impl Iterator<Item = &Employee> {
        self.employees.values()
    }

    /// The order ledger, in commit order.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Current level of every inventory, keyed by id.
    pub fn stock_levels(&self) -> BTreeMap<InventoryId, u32> {
        self.inventories
            .values()
            .map(|inv| (inv.id.clone(), inv.available_quantity))
            .collect()
    }
}

/// Seed record for one catalog title and its starting stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub book: Book,
    pub initial_quantity: u32,
}

/// The set of books and starting stock a run is seeded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds a title; its inventory id is derived `Book_X` -> `Inv_X`.
    pub fn with_book(
        mut self,
        key: &str,
        title: &str,
        author: &str,
        genre: &str,
        price: f64,
        initial_quantity: u32,
    ) -> Self {
        self.entries.push(CatalogEntry {
            book: Book {
                id: BookId::new(key),
                title: title.to_string(),
                author: author.to_string(),
                genre: genre.to_string(),
                price,
            },
            initial_quantity,
        });
        self
    }

    /// The stock bookstore catalog.
    pub fn classic() -> Self {
        Self::new()
            .with_book(
                "Book_HP1",
                "Harry Potter and the Philosopher's Stone",
                "J. K. Rowling",
                "Fantasy",
                15.0,
                5,
            )
            .with_book("Book_1984", "1984", "George Orwell", "Dystopian", 12.0, 2)
            .with_book("Book_Dune", "Dune", "Frank Herbert", "Science Fiction", 18.0, 8)
            .with_book("Book_Hobbit", "The Hobbit", "J. R. R. Tolkien", "Fantasy", 14.0, 6)
            .with_book("Book_Emma", "Emma", "Jane Austen", "Romance", 9.5, 4)
            .with_book("Book_Gatsby", "The Great Gatsby", "F. Scott Fitzgerald", "Classic", 11.0, 3)
    }

    /// Builds a store holding the catalog's books and inventories.
    ///
    /// A negative or non-finite price is a setup defect.
    pub fn build_store(&self) -> SimResult<EntityStore> {
        let mut store = EntityStore::new();
        for entry in &self.entries {
            let price = entry.book.price;
            if !price.is_finite() || price < 0.0 {
                return Err(SimError::invalid_config(
                    "price",
                    format!("{} has invalid price {price}", entry.book.id),
                ));
            }
            store.add_book(entry.book.clone());
        }
        for entry in &self.entries {
            store.add_inventory(
                entry.book.id.inventory_key(),
                entry.book.id.clone(),
                entry.initial_quantity,
            )?;
        }
        store.assert_linked()?;
        Ok(store)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::classic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_book_store(qty: u32) -> EntityStore {
        Catalog::new()
            .with_book("Book_I1", "Test", "Author", "Genre", 1.0, qty)
            .build_store()
            .unwrap()
    }

    #[test]
    fn test_classic_catalog_links() {
        let store = Catalog::classic().build_store().unwrap();

        assert_eq!(store.books().count(), 6);
        assert_eq!(store.inventories().count(), 6);
        assert_eq!(
            store.inventory_for_book(&BookId::new("Book_HP1")),
            Some(&InventoryId::new("Inv_HP1"))
        );
        assert_eq!(store.quantity(&InventoryId::new("Inv_1984")), Some(2));
    }

    #[test]
    fn test_inventory_requires_known_book() {
        let mut store = EntityStore::new();
        let err = store
            .add_inventory(InventoryId::new("Inv_X"), BookId::new("Book_X"), 1)
            .unwrap_err();
        assert_eq!(err, SimError::UnknownBook(BookId::new("Book_X")));
    }

    #[test]
    fn test_book_stocked_once() {
        let mut store = one_book_store(1);
        let err = store
            .add_inventory(InventoryId::new("Inv_Other"), BookId::new("Book_I1"), 1)
            .unwrap_err();
        assert!(matches!(err, SimError::DuplicateStock { .. }));
    }

    #[test]
    fn test_colliding_inventory_keys_rejected() {
        // Book_X and X both derive Inv_X
        let err = Catalog::new()
            .with_book("Book_X", "First", "Author", "Genre", 1.0, 5)
            .with_book("X", "Second", "Author", "Genre", 1.0, 7)
            .build_store()
            .unwrap_err();
        assert_eq!(
            err,
            SimError::DuplicateInventory {
                inventory: InventoryId::new("Inv_X"),
                existing: BookId::new("Book_X"),
                book: BookId::new("X"),
            }
        );
    }

    #[test]
    fn test_inventory_id_taken_keeps_first_record() {
        let mut store = one_book_store(4);
        store.add_book(Book {
            id: BookId::new("Book_I2"),
            title: "Two".into(),
            author: "Author".into(),
            genre: "Genre".into(),
            price: 1.0,
        });

        let err = store
            .add_inventory(InventoryId::new("Inv_I1"), BookId::new("Book_I2"), 9)
            .unwrap_err();
        assert!(matches!(err, SimError::DuplicateInventory { .. }));

        let inv = store.inventory(&InventoryId::new("Inv_I1")).unwrap();
        assert_eq!(inv.book, BookId::new("Book_I1"));
        assert_eq!(inv.available_quantity, 4);
        assert_eq!(store.inventory_for_book(&BookId::new("Book_I2")), None);
    }

    #[test]
    fn test_invalid_price_rejected() {
        for price in [-1.0, f64::NAN, f64::INFINITY] {
            let err = Catalog::new()
                .with_book("Book_P", "Priced", "Author", "Genre", price, 1)
                .build_store()
                .unwrap_err();
            assert!(matches!(err, SimError::InvalidConfig { field: "price", .. }));
        }

        let store = Catalog::new()
            .with_book("Book_Free", "Free", "Author", "Genre", 0.0, 1)
            .build_store()
            .unwrap();
        assert_eq!(store.book(&BookId::new("Book_Free")).unwrap().price, 0.0);
    }

    #[test]
    fn test_unstocked_book_detected() {
        let mut store = one_book_store(1);
        store.add_book(Book {
            id: BookId::new("Book_Orphan"),
            title: "Orphan".into(),
            author: "Nobody".into(),
            genre: "None".into(),
            price: 0.0,
        });
        assert_eq!(
            store.assert_linked(),
            Err(SimError::UnstockedBook(BookId::new("Book_Orphan")))
        );
    }

    #[test]
    fn test_decrement_checked() {
        let mut store = one_book_store(3);
        let inv = InventoryId::new("Inv_I1");

        assert_eq!(store.try_decrement_stock(&inv, 2), Some(1));
        assert_eq!(store.try_decrement_stock(&inv, 2), None);
        assert_eq!(store.quantity(&inv), Some(1));
    }

    #[test]
    fn test_increment_unknown_inventory() {
        let mut store = one_book_store(3);
        assert_eq!(store.increment_stock(&InventoryId::new("Inv_Nope"), 5), None);
        assert_eq!(store.increment_stock(&InventoryId::new("Inv_I1"), 5), Some(8));
    }

    #[test]
    fn test_order_ledger_appends() {
        let mut store = one_book_store(3);
        store.add_customer(CustomerId::new("Cust_1"), "Maya");

        let first = store.record_order(CustomerId::new("Cust_1"), BookId::new("Book_I1"), 1);
        let second = store.record_order(CustomerId::new("Cust_1"), BookId::new("Book_I1"), 2);

        assert_ne!(first, second);
        assert_eq!(store.orders().len(), 2);
        assert_eq!(store.orders()[1].qty, 2);
    }

    #[test]
    fn test_record_purchase_unknown_customer() {
        let mut store = one_book_store(3);
        let err = store
            .record_purchase(&CustomerId::new("Cust_9"), BookId::new("Book_I1"))
            .unwrap_err();
        assert_eq!(err, SimError::UnknownCustomer(CustomerId::new("Cust_9")));
    }
}
