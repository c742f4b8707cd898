//! Goods collaborator
//!
//! Inventories and balances live in the game server. Icons only reach them
//! through `Goods`, and only for players hosted by the current process.

use std::collections::HashMap;

use tracing::{debug, warn};
use tradelink_types::{Asset, ItemStack, PlayerId};

/// Largest stack a single inventory slot holds
pub const MAX_STACK: u16 = 64;

/// Access to the inventories and balances of locally hosted players.
///
/// Mutating calls must not fail: anything that could fail is checked by
/// `Icon::try_finish` first. Implementations clamp instead of erroring.
pub trait Goods {
    /// Player holds at least `item.amount` similar items
    fn has_item(&self, player: &PlayerId, item: &ItemStack) -> bool;

    /// Player has room for the whole stack
    fn can_fit(&self, player: &PlayerId, item: &ItemStack) -> bool;

    /// Remove similar items from the player
    fn take_item(&mut self, player: &PlayerId, item: &ItemStack);

    /// Add items to the player; whatever does not fit is dropped
    fn give_item(&mut self, player: &PlayerId, item: &ItemStack);

    fn balance(&self, player: &PlayerId, asset: &Asset) -> u64;

    /// Remove up to `amount`, never below zero
    fn withdraw(&mut self, player: &PlayerId, asset: &Asset, amount: u64);

    fn deposit(&mut self, player: &PlayerId, asset: &Asset, amount: u64);
}

/// Inventory and balances of one player
#[derive(Debug, Clone)]
pub struct Holdings {
    pub slots: Vec<Option<ItemStack>>,
    pub balances: HashMap<Asset, u64>,
    /// Items that did not fit on delivery
    pub dropped: Vec<ItemStack>,
}

impl Holdings {
    pub fn with_capacity(slots: usize) -> Self {
        Self {
            slots: vec![None; slots],
            balances: HashMap::new(),
            dropped: Vec::new(),
        }
    }

    pub fn count(&self, item: &ItemStack) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.is_similar(item))
            .map(|s| s.amount as u32)
            .sum()
    }

    pub fn room_for(&self, item: &ItemStack) -> u32 {
        self.slots
            .iter()
            .map(|slot| match slot {
                None => MAX_STACK as u32,
                Some(s) if s.is_similar(item) => MAX_STACK.saturating_sub(s.amount) as u32,
                Some(_) => 0,
            })
            .sum()
    }
}

/// In-memory goods store for tests and simulations
#[derive(Debug, Default)]
pub struct InMemoryGoods {
    players: HashMap<PlayerId, Holdings>,
    capacity: usize,
}

impl InMemoryGoods {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            capacity: 36,
        }
    }

    /// Inventory size for players created after this call
    pub fn with_inventory_size(mut self, slots: usize) -> Self {
        self.capacity = slots;
        self
    }

    fn holdings_mut(&mut self, player: &PlayerId) -> &mut Holdings {
        let capacity = self.capacity;
        self.players
            .entry(*player)
            .or_insert_with(|| Holdings::with_capacity(capacity))
    }

    pub fn holdings(&self, player: &PlayerId) -> Option<&Holdings> {
        self.players.get(player)
    }

    pub fn set_balance(&mut self, player: &PlayerId, asset: Asset, amount: u64) {
        self.holdings_mut(player).balances.insert(asset, amount);
    }

    /// Put items into the inventory as a player would pick them up
    pub fn add_items(&mut self, player: &PlayerId, item: ItemStack) {
        self.give_item(player, &item);
    }

    pub fn item_count(&self, player: &PlayerId, item: &ItemStack) -> u32 {
        self.players.get(player).map(|h| h.count(item)).unwrap_or(0)
    }
}

impl Goods for InMemoryGoods {
    fn has_item(&self, player: &PlayerId, item: &ItemStack) -> bool {
        self.item_count(player, item) >= item.amount as u32
    }

    fn can_fit(&self, player: &PlayerId, item: &ItemStack) -> bool {
        match self.players.get(player) {
            Some(h) => h.room_for(item) >= item.amount as u32,
            None => self.capacity > 0,
        }
    }

    fn take_item(&mut self, player: &PlayerId, item: &ItemStack) {
        let holdings = self.holdings_mut(player);
        let mut missing = item.amount;
        for slot in holdings.slots.iter_mut() {
            if missing == 0 {
                break;
            }
            if let Some(stack) = slot {
                if stack.is_similar(item) {
                    let taken = stack.amount.min(missing);
                    stack.amount -= taken;
                    missing -= taken;
                    if stack.amount == 0 {
                        *slot = None;
                    }
                }
            }
        }
        if missing > 0 {
            warn!(player = %player, item = %item, missing, "took fewer items than requested");
        }
    }

    fn give_item(&mut self, player: &PlayerId, item: &ItemStack) {
        let holdings = self.holdings_mut(player);
        let mut left = item.amount;

        for stack in holdings.slots.iter_mut().flatten() {
            if left == 0 {
                break;
            }
            if stack.is_similar(item) && stack.amount < MAX_STACK {
                let moved = (MAX_STACK - stack.amount).min(left);
                stack.amount += moved;
                left -= moved;
            }
        }
        for slot in holdings.slots.iter_mut() {
            if left == 0 {
                break;
            }
            if slot.is_none() {
                let moved = left.min(MAX_STACK);
                *slot = Some(ItemStack {
                    amount: moved,
                    ..item.clone()
                });
                left -= moved;
            }
        }
        if left > 0 {
            debug!(player = %player, item = %item, dropped = left, "inventory full, dropping items");
            holdings.dropped.push(ItemStack {
                amount: left,
                ..item.clone()
            });
        }
    }

    fn balance(&self, player: &PlayerId, asset: &Asset) -> u64 {
        self.players
            .get(player)
            .and_then(|h| h.balances.get(asset).copied())
            .unwrap_or(0)
    }

    fn withdraw(&mut self, player: &PlayerId, asset: &Asset, amount: u64) {
        let balance = self.holdings_mut(player).balances.entry(asset.clone()).or_insert(0);
        if *balance < amount {
            warn!(player = %player, asset = %asset, amount, balance = *balance, "withdrawing more than the balance");
        }
        *balance = balance.saturating_sub(amount);
    }

    fn deposit(&mut self, player: &PlayerId, asset: &Asset, amount: u64) {
        let balance = self.holdings_mut(player).balances.entry(asset.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins() -> Asset {
        Asset::Currency("coins".into())
    }

    #[test]
    fn test_give_merges_into_existing_stacks() {
        let mut goods = InMemoryGoods::new();
        let p = PlayerId::new();
        goods.add_items(&p, ItemStack::new("stone", 60));
        goods.give_item(&p, &ItemStack::new("stone", 10));

        let slots = &goods.holdings(&p).unwrap().slots;
        assert_eq!(slots[0].as_ref().unwrap().amount, 64);
        assert_eq!(slots[1].as_ref().unwrap().amount, 6);
    }

    #[test]
    fn test_overflow_is_dropped() {
        let mut goods = InMemoryGoods::new().with_inventory_size(1);
        let p = PlayerId::new();
        goods.add_items(&p, ItemStack::new("dirt", 64));
        assert!(!goods.can_fit(&p, &ItemStack::new("sand", 1)));

        goods.give_item(&p, &ItemStack::new("sand", 5));
        let dropped = &goods.holdings(&p).unwrap().dropped;
        assert_eq!(dropped, &vec![ItemStack::new("sand", 5)]);
    }

    #[test]
    fn test_take_spans_stacks() {
        let mut goods = InMemoryGoods::new();
        let p = PlayerId::new();
        goods.add_items(&p, ItemStack::new("iron", 64));
        goods.add_items(&p, ItemStack::new("iron", 10));
        assert!(goods.has_item(&p, &ItemStack::new("iron", 70)));

        goods.take_item(&p, &ItemStack::new("iron", 70));
        assert_eq!(goods.item_count(&p, &ItemStack::new("iron", 1)), 4);
    }

    #[test]
    fn test_withdraw_clamps_at_zero() {
        let mut goods = InMemoryGoods::new();
        let p = PlayerId::new();
        goods.set_balance(&p, coins(), 5);
        goods.withdraw(&p, &coins(), 8);
        assert_eq!(goods.balance(&p, &coins()), 0);
        goods.deposit(&p, &coins(), 3);
        assert_eq!(goods.balance(&p, &coins()), 3);
    }
}
