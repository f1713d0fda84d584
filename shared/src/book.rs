//! In-memory unit of work over a scoped snapshot of the store
//!
//! The backend hydrates an [`InventoryBook`] with the rows an operation may
//! touch, runs the operation inside [`InventoryBook::transaction`], and then
//! writes back whatever the [`ChangeSet`] names. Hydration (`insert_*`) is
//! not journaled; domain mutations always are.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{
    ConsumptionRecord, Material, Order, OrderItem, Product, RecipeLine, Restaurant, StockLot,
    Supplier, User, Workstation,
};
use crate::recipe::RecipeBook;

/// A single journaled mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "id", rename_all = "snake_case")]
pub enum Change {
    LotSaved(Uuid),
    LotDeleted(Uuid),
    OrderSaved(Uuid),
    ItemSaved(Uuid),
    ItemDeleted(Uuid),
    ConsumptionCreated(Uuid),
    ConsumptionDeleted(Uuid),
}

/// Ordered journal of mutations made by one unit of work
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

/// Net effect of a change set, ready to be written back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetChanges {
    pub saved_lots: BTreeSet<Uuid>,
    pub deleted_lots: BTreeSet<Uuid>,
    pub saved_orders: BTreeSet<Uuid>,
    pub saved_items: BTreeSet<Uuid>,
    pub deleted_items: BTreeSet<Uuid>,
    pub created_consumptions: BTreeSet<Uuid>,
    pub deleted_consumptions: BTreeSet<Uuid>,
}

impl ChangeSet {
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Collapse the journal: a delete wins over an earlier save, and a
    /// record created and deleted in the same unit never reaches storage.
    pub fn net(&self) -> NetChanges {
        let mut net = NetChanges::default();
        for change in &self.changes {
            match *change {
                Change::LotSaved(id) => {
                    net.deleted_lots.remove(&id);
                    net.saved_lots.insert(id);
                }
                Change::LotDeleted(id) => {
                    net.saved_lots.remove(&id);
                    net.deleted_lots.insert(id);
                }
                Change::OrderSaved(id) => {
                    net.saved_orders.insert(id);
                }
                Change::ItemSaved(id) => {
                    net.deleted_items.remove(&id);
                    net.saved_items.insert(id);
                }
                Change::ItemDeleted(id) => {
                    net.saved_items.remove(&id);
                    net.deleted_items.insert(id);
                }
                Change::ConsumptionCreated(id) => {
                    if !net.deleted_consumptions.remove(&id) {
                        net.created_consumptions.insert(id);
                    }
                }
                Change::ConsumptionDeleted(id) => {
                    if !net.created_consumptions.remove(&id) {
                        net.deleted_consumptions.insert(id);
                    }
                }
            }
        }
        net
    }
}

/// Scoped snapshot of reference data, stock, orders and consumption records
#[derive(Debug, Clone, Default)]
pub struct InventoryBook {
    pub(crate) materials: HashMap<Uuid, Material>,
    pub(crate) products: HashMap<Uuid, Product>,
    pub(crate) recipes: RecipeBook,
    pub(crate) users: HashMap<Uuid, User>,
    pub(crate) suppliers: HashMap<Uuid, Supplier>,
    pub(crate) workstations: HashMap<Uuid, Workstation>,
    pub(crate) restaurants: HashMap<Uuid, Restaurant>,
    pub(crate) lots: BTreeMap<Uuid, StockLot>,
    pub(crate) orders: BTreeMap<Uuid, Order>,
    pub(crate) items: BTreeMap<Uuid, OrderItem>,
    pub(crate) consumptions: BTreeMap<Uuid, ConsumptionRecord>,
    changes: ChangeSet,
}

impl InventoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` against a draft copy; the book only changes if `op` succeeds
    pub fn transaction<T>(
        &mut self,
        op: impl FnOnce(&mut InventoryBook) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let mut draft = self.clone();
        let value = op(&mut draft)?;
        *self = draft;
        Ok(value)
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Hand the journal to the persistence layer and start a fresh one
    pub fn take_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.changes)
    }

    // ------------------------------------------------------------------
    // Hydration
    // ------------------------------------------------------------------

    pub fn insert_material(&mut self, material: Material) {
        self.materials.insert(material.id, material);
    }

    pub fn insert_product(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn insert_recipe_line(&mut self, line: RecipeLine) -> DomainResult<()> {
        self.recipes.add_line(line)
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_supplier(&mut self, supplier: Supplier) {
        self.suppliers.insert(supplier.id, supplier);
    }

    pub fn insert_workstation(&mut self, workstation: Workstation) {
        self.workstations.insert(workstation.id, workstation);
    }

    pub fn insert_restaurant(&mut self, restaurant: Restaurant) {
        self.restaurants.insert(restaurant.id, restaurant);
    }

    pub fn insert_lot(&mut self, lot: StockLot) {
        self.lots.insert(lot.id, lot);
    }

    pub fn insert_order(&mut self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn insert_item(&mut self, item: OrderItem) {
        self.items.insert(item.id, item);
    }

    pub fn insert_consumption(&mut self, record: ConsumptionRecord) {
        self.consumptions.insert(record.id, record);
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn material(&self, id: Uuid) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn product(&self, id: Uuid) -> Option<&Product> {
        self.products.get(&id)
    }

    pub fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn supplier(&self, id: Uuid) -> Option<&Supplier> {
        self.suppliers.get(&id)
    }

    pub fn workstation(&self, id: Uuid) -> Option<&Workstation> {
        self.workstations.get(&id)
    }

    pub fn restaurant(&self, id: Uuid) -> Option<&Restaurant> {
        self.restaurants.get(&id)
    }

    pub fn lot(&self, id: Uuid) -> Option<&StockLot> {
        self.lots.get(&id)
    }

    pub fn lots(&self) -> impl Iterator<Item = &StockLot> {
        self.lots.values()
    }

    pub fn order(&self, id: Uuid) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn item(&self, id: Uuid) -> Option<&OrderItem> {
        self.items.get(&id)
    }

    /// Items of an order, oldest first
    pub fn items_of(&self, order_id: Uuid) -> Vec<&OrderItem> {
        let mut items: Vec<&OrderItem> = self
            .items
            .values()
            .filter(|item| item.order_id == order_id)
            .collect();
        items.sort_by_key(|item| (item.created_at, item.id));
        items
    }

    pub fn consumption(&self, id: Uuid) -> Option<&ConsumptionRecord> {
        self.consumptions.get(&id)
    }

    /// Records drawn by an order item, in consumption order
    pub fn consumptions_for_item(&self, order_item_id: Uuid) -> Vec<&ConsumptionRecord> {
        let mut records: Vec<&ConsumptionRecord> = self
            .consumptions
            .values()
            .filter(|record| record.is_for_item(order_item_id))
            .collect();
        records.sort_by_key(|record| (record.consumed_at, record.id));
        records
    }

    /// Records that drew from a lot
    pub fn consumptions_of_lot(&self, lot_id: Uuid) -> Vec<&ConsumptionRecord> {
        self.consumptions
            .values()
            .filter(|record| record.lot_id == lot_id)
            .collect()
    }

    /// Display name of a material, falling back to its id
    pub fn material_name(&self, id: Uuid) -> String {
        self.material(id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| format!("Material ID {}", id))
    }

    pub(crate) fn require_order(&self, id: Uuid) -> DomainResult<&Order> {
        self.order(id)
            .ok_or_else(|| DomainError::not_found(format!("Order {}", id)))
    }

    pub(crate) fn require_item(&self, id: Uuid) -> DomainResult<&OrderItem> {
        self.item(id)
            .ok_or_else(|| DomainError::not_found(format!("Order item {}", id)))
    }

    pub(crate) fn require_product(&self, id: Uuid) -> DomainResult<&Product> {
        self.product(id)
            .ok_or_else(|| DomainError::not_found(format!("Product {}", id)))
    }

    pub(crate) fn require_lot(&self, id: Uuid) -> DomainResult<&StockLot> {
        self.lot(id)
            .ok_or_else(|| DomainError::not_found(format!("Stock lot {}", id)))
    }

    pub(crate) fn require_user(&self, id: Uuid) -> DomainResult<&User> {
        self.user(id)
            .ok_or_else(|| DomainError::not_found(format!("User {}", id)))
    }

    pub(crate) fn lot_mut(&mut self, id: Uuid) -> DomainResult<&mut StockLot> {
        self.lots
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("Stock lot {}", id)))
    }

    // ------------------------------------------------------------------
    // Journaled mutations
    // ------------------------------------------------------------------

    pub(crate) fn touch_lot(&mut self, id: Uuid) {
        self.changes.push(Change::LotSaved(id));
    }

    pub(crate) fn save_lot(&mut self, lot: StockLot) {
        self.changes.push(Change::LotSaved(lot.id));
        self.lots.insert(lot.id, lot);
    }

    pub(crate) fn delete_lot(&mut self, id: Uuid) {
        if self.lots.remove(&id).is_some() {
            self.changes.push(Change::LotDeleted(id));
        }
    }

    pub(crate) fn save_order(&mut self, order: Order) {
        self.changes.push(Change::OrderSaved(order.id));
        self.orders.insert(order.id, order);
    }

    pub(crate) fn save_item(&mut self, item: OrderItem) {
        self.changes.push(Change::ItemSaved(item.id));
        self.items.insert(item.id, item);
    }

    pub(crate) fn delete_item(&mut self, id: Uuid) {
        if self.items.remove(&id).is_some() {
            self.changes.push(Change::ItemDeleted(id));
        }
    }

    pub(crate) fn record_consumption(&mut self, record: ConsumptionRecord) {
        self.changes.push(Change::ConsumptionCreated(record.id));
        self.consumptions.insert(record.id, record);
    }

    pub(crate) fn delete_consumption(&mut self, id: Uuid) {
        if self.consumptions.remove(&id).is_some() {
            self.changes.push(Change::ConsumptionDeleted(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_failed_transaction_leaves_book_untouched() {
        let mut book = InventoryBook::new();
        let order = Order::new(Uuid::new_v4(), Uuid::new_v4(), None, None, Utc::now());
        let order_id = order.id;

        let result: DomainResult<()> = book.transaction(|draft| {
            draft.save_order(order);
            Err(DomainError::invalid("boom"))
        });

        assert!(result.is_err());
        assert!(book.order(order_id).is_none());
        assert!(book.changes().is_empty());
    }

    #[test]
    fn test_successful_transaction_commits_journal() {
        let mut book = InventoryBook::new();
        let order = Order::new(Uuid::new_v4(), Uuid::new_v4(), None, None, Utc::now());
        let order_id = order.id;

        book.transaction(|draft| {
            draft.save_order(order);
            Ok(())
        })
        .unwrap();

        assert!(book.order(order_id).is_some());
        assert_eq!(book.take_changes().len(), 1);
        assert!(book.changes().is_empty());
    }

    #[test]
    fn test_net_changes_cancel_created_then_deleted_records() {
        let kept = Uuid::new_v4();
        let transient = Uuid::new_v4();
        let preexisting = Uuid::new_v4();
        let lot = Uuid::new_v4();

        let mut changes = ChangeSet::default();
        changes.push(Change::ConsumptionCreated(kept));
        changes.push(Change::ConsumptionCreated(transient));
        changes.push(Change::ConsumptionDeleted(transient));
        changes.push(Change::ConsumptionDeleted(preexisting));
        changes.push(Change::LotSaved(lot));
        changes.push(Change::LotSaved(lot));

        let net = changes.net();
        assert_eq!(net.created_consumptions, BTreeSet::from([kept]));
        assert_eq!(net.deleted_consumptions, BTreeSet::from([preexisting]));
        assert_eq!(net.saved_lots, BTreeSet::from([lot]));
    }

    #[test]
    fn test_net_changes_delete_wins_over_save() {
        let item = Uuid::new_v4();
        let mut changes = ChangeSet::default();
        changes.push(Change::ItemSaved(item));
        changes.push(Change::ItemDeleted(item));

        let net = changes.net();
        assert!(net.saved_items.is_empty());
        assert_eq!(net.deleted_items, BTreeSet::from([item]));
    }
}
