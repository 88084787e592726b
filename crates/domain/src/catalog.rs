//! Catalog collaborator: item pricing at order-creation time.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{ItemId, Money};
use serde::{Deserialize, Serialize};

/// A catalog product.
///
/// Flash-sale items carry a percentage discount applied to the listed
/// price; the effective unit price is what orders are charged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub flash_sale: bool,
    pub discount_percent: u32,
}

impl Product {
    /// The price a purchase is charged per unit, discount applied.
    pub fn effective_unit_price(&self) -> Money {
        if self.flash_sale {
            self.price.discounted_by(self.discount_percent)
        } else {
            self.price
        }
    }
}

/// Name and unit price resolved for an item at purchase time.
#[derive(Debug, Clone)]
pub struct Priced {
    pub name: String,
    pub unit_price: Money,
}

/// The pricing collaborator the pipeline consults when admitting an order.
///
/// The transaction core treats the catalog as external: it only ever asks
/// for the current unit price of an item.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolves an item's name and effective unit price, if it exists.
    async fn price_of(&self, item: &ItemId) -> Option<Priced>;

    /// Lists all products.
    async fn list(&self) -> Vec<Product>;
}

/// In-memory catalog standing in for the external product service.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ItemId, Product>>>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn add(&self, product: Product) {
        self.products
            .write()
            .expect("catalog lock poisoned")
            .insert(product.id.clone(), product);
    }

    /// Returns the number of products.
    pub fn len(&self) -> usize {
        self.products.read().expect("catalog lock poisoned").len()
    }

    /// Returns true if the catalog has no products.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn price_of(&self, item: &ItemId) -> Option<Priced> {
        let products = self.products.read().expect("catalog lock poisoned");
        products.get(item).map(|p| Priced {
            name: p.name.clone(),
            unit_price: p.effective_unit_price(),
        })
    }

    async fn list(&self) -> Vec<Product> {
        let products = self.products.read().expect("catalog lock poisoned");
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        all
    }
}
