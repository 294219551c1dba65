//! 进程内存储
//!
//! 实现全部仓储接口和事务接口，用于测试和命令行演示模式。
//!
//! 已提交状态放在 `parking_lot::RwLock` 中供读接口并发访问；
//! 写事务先获取单写者锁（`tokio::sync::Mutex`），期间所有写入只暂存在事务内，
//! 提交时一次性合并到已提交状态。事务被丢弃即放弃暂存的写入。

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::traits::{
    BasketRepositoryTrait, CustomerRepositoryTrait, LedgerRepositoryTrait, LoyaltyStore,
    LoyaltyTransaction, StoreRepositoryTrait,
};
use crate::error::{LoyaltyError, Result};
use crate::ledger_id::{LedgerIdGenerator, LedgerSequence};
use crate::models::{
    Basket, BasketPatch, Customer, CustomerPatch, LedgerEntry, NewLedgerEntry, Store,
};

#[derive(Debug, Default)]
struct MemoryState {
    customers: HashMap<i64, Customer>,
    baskets: HashMap<String, Basket>,
    stores: HashMap<String, Store>,
    ledger: Vec<LedgerEntry>,
    ledger_counter: i64,
}

/// 进程内存储
///
/// 克隆后共享同一份数据
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    writer: Arc<Mutex<()>>,
    id_generator: LedgerIdGenerator,
}

impl InMemoryStore {
    pub fn new(id_generator: LedgerIdGenerator) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            writer: Arc::new(Mutex::new(())),
            id_generator,
        }
    }

    // === 数据准备 ===

    pub fn insert_store(&self, store: Store) {
        self.state.write().stores.insert(store.store_id.clone(), store);
    }

    pub fn insert_customer(&self, customer: Customer) {
        self.state
            .write()
            .customers
            .insert(customer.customer_id, customer);
    }

    pub fn insert_basket(&self, basket: Basket) {
        self.state
            .write()
            .baskets
            .insert(basket.basket_id.clone(), basket);
    }

    /// 顾客不存在时才写入，返回是否实际写入
    pub fn insert_customer_if_absent(&self, customer: Customer) -> bool {
        match self.state.write().customers.entry(customer.customer_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(customer);
                true
            }
        }
    }

    /// 购物篮不存在时才写入，返回是否实际写入
    pub fn insert_basket_if_absent(&self, basket: Basket) -> bool {
        match self.state.write().baskets.entry(basket.basket_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(basket);
                true
            }
        }
    }

    /// 直接写入一条已有流水，不经过计数器
    pub fn insert_ledger_entry(&self, entry: LedgerEntry) {
        self.state.write().ledger.push(entry);
    }

    // === 快照 ===

    pub fn customer(&self, customer_id: i64) -> Option<Customer> {
        self.state.read().customers.get(&customer_id).cloned()
    }

    pub fn basket(&self, basket_id: &str) -> Option<Basket> {
        self.state.read().baskets.get(basket_id).cloned()
    }

    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.state.read().ledger.clone()
    }

    pub fn ledger_counter(&self) -> i64 {
        self.state.read().ledger_counter
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(LedgerIdGenerator::default())
    }
}

#[async_trait]
impl CustomerRepositoryTrait for InMemoryStore {
    async fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>> {
        Ok(self.customer(customer_id))
    }

    async fn get_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        Ok(self
            .state
            .read()
            .customers
            .values()
            .find(|c| c.phone == phone)
            .cloned())
    }
}

#[async_trait]
impl BasketRepositoryTrait for InMemoryStore {
    async fn get_basket(&self, basket_id: &str) -> Result<Option<Basket>> {
        Ok(self.basket(basket_id))
    }
}

#[async_trait]
impl StoreRepositoryTrait for InMemoryStore {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>> {
        Ok(self.state.read().stores.get(store_id).cloned())
    }
}

#[async_trait]
impl LedgerRepositoryTrait for InMemoryStore {
    async fn list_by_customer(&self, customer_id: i64) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .state
            .read()
            .ledger
            .iter()
            .filter(|e| e.customer_id == customer_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.seq);
        Ok(entries)
    }
}

#[async_trait]
impl LoyaltyStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn LoyaltyTransaction>> {
        let guard = self.writer.clone().lock_owned().await;
        let counter = self.state.read().ledger_counter;

        Ok(Box::new(MemoryTransaction {
            _guard: guard,
            state: self.state.clone(),
            id_generator: self.id_generator.clone(),
            customers: HashMap::new(),
            baskets: HashMap::new(),
            ledger: Vec::new(),
            counter,
        }))
    }
}

/// 进程内写事务
///
/// 持有单写者锁直到提交或被丢弃
pub struct MemoryTransaction {
    _guard: OwnedMutexGuard<()>,
    state: Arc<RwLock<MemoryState>>,
    id_generator: LedgerIdGenerator,
    customers: HashMap<i64, Customer>,
    baskets: HashMap<String, Basket>,
    ledger: Vec<LedgerEntry>,
    counter: i64,
}

impl MemoryTransaction {
    fn current_customer(&self, customer_id: i64) -> Option<Customer> {
        match self.customers.get(&customer_id) {
            Some(c) => Some(c.clone()),
            None => self.state.read().customers.get(&customer_id).cloned(),
        }
    }

    fn current_basket(&self, basket_id: &str) -> Option<Basket> {
        match self.baskets.get(basket_id) {
            Some(b) => Some(b.clone()),
            None => self.state.read().baskets.get(basket_id).cloned(),
        }
    }
}

/// 事务内的流水号计数器，计数器值随事务一起提交
struct MemorySequence<'a> {
    counter: &'a mut i64,
    staged: &'a [LedgerEntry],
    state: &'a RwLock<MemoryState>,
}

#[async_trait]
impl LedgerSequence for MemorySequence<'_> {
    async fn next_value(&mut self) -> Result<i64> {
        *self.counter += 1;
        Ok(*self.counter)
    }

    async fn id_exists(&mut self, ledger_id: &str) -> Result<bool> {
        if self.staged.iter().any(|e| e.ledger_id == ledger_id) {
            return Ok(true);
        }
        let exists = self
            .state
            .read()
            .ledger
            .iter()
            .any(|e| e.ledger_id == ledger_id);
        Ok(exists)
    }
}

#[async_trait]
impl LoyaltyTransaction for MemoryTransaction {
    async fn lock_customer(&mut self, customer_id: i64) -> Result<Option<Customer>> {
        Ok(self.current_customer(customer_id))
    }

    async fn lock_basket(&mut self, basket_id: &str) -> Result<Option<Basket>> {
        Ok(self.current_basket(basket_id))
    }

    async fn update_customer(
        &mut self,
        customer_id: i64,
        patch: &CustomerPatch,
    ) -> Result<Option<Customer>> {
        let Some(current) = self.current_customer(customer_id) else {
            return Ok(None);
        };

        let updated = patch.apply(&current);
        if let Some(customer) = &updated {
            self.customers.insert(customer_id, customer.clone());
        }
        Ok(updated)
    }

    async fn update_basket(&mut self, basket_id: &str, patch: &BasketPatch) -> Result<Basket> {
        let current = self
            .current_basket(basket_id)
            .ok_or_else(|| LoyaltyError::BasketNotFound(basket_id.to_string()))?;

        let updated = patch.apply(&current);
        self.baskets.insert(basket_id.to_string(), updated.clone());
        Ok(updated)
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let (seq, ledger_id) = {
            let mut sequence = MemorySequence {
                counter: &mut self.counter,
                staged: &self.ledger,
                state: &self.state,
            };
            self.id_generator.generate(&mut sequence).await?
        };

        let entry = entry.into_entry(ledger_id, seq);
        self.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let tx = *self;
        let mut state = tx.state.write();

        state.customers.extend(tx.customers);
        state.baskets.extend(tx.baskets);
        state.ledger.extend(tx.ledger);
        state.ledger_counter = tx.counter;

        debug!(ledger_counter = tx.counter, "内存事务已提交");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!("内存事务已回滚");
        Ok(())
    }
}
