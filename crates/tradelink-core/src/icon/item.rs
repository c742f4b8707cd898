use tradelink_types::{
    AbortReason, FinishResult, ItemStack, Participant, Perspective, Result, WireReader,
    WireWriter,
};

use super::{Effects, Icon, IconKind, TradeView, Visual};
use crate::goods::Goods;

/// Slot holding an item the owner offers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSlotIcon {
    item: Option<ItemStack>,
}

impl ItemSlotIcon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding(item: ItemStack) -> Self {
        Self { item: Some(item) }
    }

    pub fn item(&self) -> Option<&ItemStack> {
        self.item.as_ref()
    }

    pub fn set_item(&mut self, item: Option<ItemStack>) {
        self.item = item;
    }
}

impl Icon for ItemSlotIcon {
    fn kind(&self) -> IconKind {
        IconKind::ItemSlot
    }

    fn render(&self, _view: &TradeView<'_>, _perspective: Perspective, _viewer: &Participant) -> Visual {
        match &self.item {
            Some(item) => Visual::Item(item.clone()),
            None => Visual::Empty,
        }
    }

    fn try_finish(
        &self,
        view: &TradeView<'_>,
        perspective: Perspective,
        viewer: &Participant,
        goods: &dyn Goods,
    ) -> FinishResult {
        let Some(item) = &self.item else {
            return FinishResult::Pass;
        };
        if viewer.is_local() && !goods.has_item(viewer.id(), item) {
            return FinishResult::Block(AbortReason::MissingItem);
        }
        let partner = view.partner(perspective);
        if partner.is_local() && !goods.can_fit(partner.id(), item) {
            return FinishResult::Warn(format!(
                "{} has no room for {}, it will be dropped",
                partner.name(),
                item
            ));
        }
        FinishResult::Pass
    }

    fn on_finish(
        &mut self,
        view: &TradeView<'_>,
        perspective: Perspective,
        viewer: &Participant,
        effects: &mut Effects<'_>,
    ) {
        let Some(item) = &self.item else {
            return;
        };
        let partner = view.partner(perspective);
        if viewer.is_local() {
            effects.goods.take_item(viewer.id(), item);
            view.log(
                effects.audit,
                &format!("{} gave {} to {}", viewer.name(), item, partner.name()),
            );
        }
        if partner.is_local() {
            effects.goods.give_item(partner.id(), item);
        }
    }

    fn is_empty(&self) -> bool {
        self.item.is_none()
    }

    fn serialize(&self, out: &mut WireWriter) -> Result<()> {
        out.write_bool(self.item.is_some());
        if let Some(item) = &self.item {
            item.write_to(out)?;
        }
        Ok(())
    }

    fn deserialize(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        self.item = if input.read_bool()? {
            Some(ItemStack::read_from(input)?)
        } else {
            None
        };
        Ok(())
    }

    fn clone_icon(&self) -> Box<dyn Icon> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAudit;
    use crate::goods::InMemoryGoods;
    use crate::icon::testing::{assert_round_trip, Fixture};

    #[test]
    fn test_round_trip_with_and_without_item() {
        assert_round_trip(&ItemSlotIcon::new(), &ItemSlotIcon::new());
        assert_round_trip(
            &ItemSlotIcon::holding(ItemStack::new("emerald", 3).with_display_name("Gem")),
            &ItemSlotIcon::new(),
        );
    }

    #[test]
    fn test_missing_item_blocks() {
        let fixture = Fixture::local();
        let view = fixture.view();
        let icon = ItemSlotIcon::holding(ItemStack::new("diamond", 2));
        let goods = InMemoryGoods::new();

        let result = icon.try_finish(&view, Perspective::Primary, view.participant(Perspective::Primary), &goods);
        assert_eq!(result, FinishResult::Block(AbortReason::MissingItem));
    }

    #[test]
    fn test_full_partner_inventory_only_warns() {
        let fixture = Fixture::local();
        let view = fixture.view();
        let owner = view.participant(Perspective::Primary);
        let partner = view.participant(Perspective::Secondary);
        let mut goods = InMemoryGoods::new().with_inventory_size(1);
        goods.add_items(owner.id(), ItemStack::new("diamond", 2));
        goods.add_items(partner.id(), ItemStack::new("dirt", 64));

        let icon = ItemSlotIcon::holding(ItemStack::new("diamond", 2));
        let result = icon.try_finish(&view, Perspective::Primary, owner, &goods);
        assert!(matches!(result, FinishResult::Warn(_)));
    }

    #[test]
    fn test_finish_moves_item_between_local_players() {
        let fixture = Fixture::local();
        let view = fixture.view();
        let owner = view.participant(Perspective::Primary);
        let partner = view.participant(Perspective::Secondary);
        let mut goods = InMemoryGoods::new();
        let mut audit = MemoryAudit::new();
        goods.add_items(owner.id(), ItemStack::new("diamond", 2));

        let mut icon = ItemSlotIcon::holding(ItemStack::new("diamond", 2));
        icon.on_finish(&view, Perspective::Primary, owner, &mut Effects::new(&mut goods, &mut audit));

        assert_eq!(goods.item_count(owner.id(), &ItemStack::new("diamond", 1)), 0);
        assert_eq!(goods.item_count(partner.id(), &ItemStack::new("diamond", 1)), 2);
        assert_eq!(audit.entries.len(), 1);
        assert_eq!(audit.entries[0].initiator, "Alex");
    }

    #[test]
    fn test_remote_partner_is_not_credited_locally() {
        let fixture = Fixture::with_remote_secondary();
        let view = fixture.view();
        let owner = view.participant(Perspective::Primary);
        let partner = view.participant(Perspective::Secondary);
        let mut goods = InMemoryGoods::new();
        let mut audit = MemoryAudit::new();
        goods.add_items(owner.id(), ItemStack::new("gold", 5));

        let mut icon = ItemSlotIcon::holding(ItemStack::new("gold", 5));
        icon.on_finish(&view, Perspective::Primary, owner, &mut Effects::new(&mut goods, &mut audit));

        assert_eq!(goods.item_count(owner.id(), &ItemStack::new("gold", 1)), 0);
        assert!(goods.holdings(partner.id()).is_none());
    }
}
