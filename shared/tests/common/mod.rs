//! Fixture builders shared by the integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use shared::{
    InventoryBook, LotSource, Material, NewStockLot, Product, RecipeLine, Restaurant, Role,
    StockLot, StockStage, Supplier, Unit, User, Workstation,
};
use std::str::FromStr;
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 15, 14, 30, 22).unwrap()
}

pub fn later(seconds: i64) -> DateTime<Utc> {
    now() + Duration::seconds(seconds)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A restaurant selling one product made of one material
pub struct Kitchen {
    pub book: InventoryBook,
    pub restaurant_id: Uuid,
    pub material_id: Uuid,
    pub product_id: Uuid,
    pub supplier_id: Uuid,
    pub workstation_id: Uuid,
    pub coordinator_id: Uuid,
    pub worker_id: Uuid,
    pub transporter_id: Uuid,
}

impl Kitchen {
    /// "Pad Thai" at 12.50 needs `per_unit` kg of "Rice Noodles"
    pub fn new(per_unit: &str) -> Self {
        let mut book = InventoryBook::new();

        let restaurant_id = Uuid::new_v4();
        book.insert_restaurant(Restaurant {
            id: restaurant_id,
            name: "Riverside".to_string(),
            location: "Bangkok".to_string(),
        });

        let material_id = Uuid::new_v4();
        book.insert_material(Material {
            id: material_id,
            name: "Rice Noodles".to_string(),
            unit: Unit::Kg,
        });

        let product_id = Uuid::new_v4();
        book.insert_product(Product {
            id: product_id,
            name: "Pad Thai".to_string(),
            selling_price: dec("12.50"),
            is_available: true,
        });
        book.insert_recipe_line(RecipeLine {
            product_id,
            material_id,
            quantity_per_unit: dec(per_unit),
            notes: None,
        })
        .unwrap();

        let supplier_id = Uuid::new_v4();
        book.insert_supplier(Supplier {
            id: supplier_id,
            name: "Golden Grain Co".to_string(),
            contact_info: None,
        });

        let workstation_id = Uuid::new_v4();
        book.insert_workstation(Workstation {
            id: workstation_id,
            name: "Noodle line".to_string(),
            location: "Hall B".to_string(),
            max_daily_capacity: Some(200),
        });

        let coordinator_id = add_user(&mut book, "coordinator", Role::InventoryCoordinator);
        let worker_id = add_user(&mut book, "worker", Role::Worker);
        let transporter_id = add_user(&mut book, "driver", Role::Transporter);

        Kitchen {
            book,
            restaurant_id,
            material_id,
            product_id,
            supplier_id,
            workstation_id,
            coordinator_id,
            worker_id,
            transporter_id,
        }
    }

    /// Restaurant stock of the kitchen's material
    pub fn stock(&mut self, quantity: &str, expires: Option<NaiveDate>, created_at: DateTime<Utc>) -> Uuid {
        self.lot(self.material_id, self.restaurant_id, quantity, expires, created_at)
    }

    /// Stock of the kitchen's material held by some other restaurant
    pub fn stock_for(&mut self, restaurant_id: Uuid, quantity: &str) -> Uuid {
        self.lot(self.material_id, restaurant_id, quantity, None, now())
    }

    /// Undated restaurant stock of another material
    pub fn stock_of(&mut self, material_id: Uuid, quantity: &str) -> Uuid {
        self.lot(material_id, self.restaurant_id, quantity, None, now())
    }

    fn lot(
        &mut self,
        material_id: Uuid,
        owner_id: Uuid,
        quantity: &str,
        expires: Option<NaiveDate>,
        created_at: DateTime<Utc>,
    ) -> Uuid {
        let lot = StockLot::create(
            Uuid::new_v4(),
            NewStockLot {
                stage: StockStage::Restaurant,
                material_id,
                owner_id,
                source: LotSource::Supplier {
                    supplier_id: self.supplier_id,
                },
                initial_quantity: dec(quantity),
                current_quantity: None,
                unit: Unit::Kg,
                production_date: None,
                expiration_date: expires,
                storage_location: None,
                quality: None,
            },
            created_at,
        )
        .unwrap();
        let id = lot.id;
        self.book.insert_lot(lot);
        id
    }

    pub fn current(&self, lot_id: Uuid) -> Decimal {
        self.book.lot(lot_id).unwrap().current_quantity
    }

    /// Pending order with one line of `quantity` Pad Thai
    pub fn order(&mut self, quantity: u32, at: DateTime<Utc>) -> (Uuid, Uuid) {
        let order_id = self
            .book
            .create_order(self.restaurant_id, None, None, at)
            .unwrap();
        let item_id = self
            .book
            .add_item(order_id, self.product_id, quantity, None, None, at)
            .unwrap();
        (order_id, item_id)
    }

    /// Register another product using the kitchen's material
    pub fn product(&mut self, name: &str, price: &str, per_unit: &str) -> Uuid {
        self.product_using(name, price, self.material_id, per_unit)
    }

    /// Register a material measured in kg
    pub fn material(&mut self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.book.insert_material(Material {
            id,
            name: name.to_string(),
            unit: Unit::Kg,
        });
        id
    }

    /// Register a product made of `per_unit` of `material_id`
    pub fn product_using(&mut self, name: &str, price: &str, material_id: Uuid, per_unit: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.book.insert_product(Product {
            id,
            name: name.to_string(),
            selling_price: dec(price),
            is_available: true,
        });
        self.book
            .insert_recipe_line(RecipeLine {
                product_id: id,
                material_id,
                quantity_per_unit: dec(per_unit),
                notes: None,
            })
            .unwrap();
        id
    }
}

pub fn add_user(book: &mut InventoryBook, username: &str, role: Role) -> Uuid {
    let id = Uuid::new_v4();
    book.insert_user(User {
        id,
        username: username.to_string(),
        email: None,
        role,
        created_at: now(),
    });
    id
}
