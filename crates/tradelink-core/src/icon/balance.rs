//! Icons offering a countable balance (currency, experience levels)

use tradelink_types::{
    AbortReason, Asset, FinishResult, Participant, Perspective, Result, WireReader, WireWriter,
};

use super::{Effects, Icon, IconKind, TradeView, Visual};
use crate::goods::Goods;

fn check_balance(viewer: &Participant, goods: &dyn Goods, asset: &Asset, amount: u64) -> FinishResult {
    if amount > 0 && viewer.is_local() && goods.balance(viewer.id(), asset) < amount {
        return FinishResult::Block(AbortReason::InsufficientFunds);
    }
    FinishResult::Pass
}

fn transfer(
    view: &TradeView<'_>,
    perspective: Perspective,
    viewer: &Participant,
    effects: &mut Effects<'_>,
    asset: &Asset,
    amount: u64,
) {
    if amount == 0 {
        return;
    }
    let partner = view.partner(perspective);
    if viewer.is_local() {
        effects.goods.withdraw(viewer.id(), asset, amount);
        view.log(
            effects.audit,
            &format!("{} paid {} {} to {}", viewer.name(), amount, asset, partner.name()),
        );
    }
    if partner.is_local() {
        effects.goods.deposit(partner.id(), asset, amount);
    }
}

/// Amount of a named economy currency, in minor units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyIcon {
    asset: Asset,
    amount: u64,
}

impl CurrencyIcon {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            asset: Asset::Currency(currency.into()),
            amount: 0,
        }
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }
}

impl Icon for CurrencyIcon {
    fn kind(&self) -> IconKind {
        IconKind::Currency
    }

    fn render(&self, _view: &TradeView<'_>, _perspective: Perspective, _viewer: &Participant) -> Visual {
        Visual::button(format!("{} {}", self.amount, self.asset), self.amount > 0)
    }

    fn try_finish(
        &self,
        _view: &TradeView<'_>,
        _perspective: Perspective,
        viewer: &Participant,
        goods: &dyn Goods,
    ) -> FinishResult {
        check_balance(viewer, goods, &self.asset, self.amount)
    }

    fn on_finish(
        &mut self,
        view: &TradeView<'_>,
        perspective: Perspective,
        viewer: &Participant,
        effects: &mut Effects<'_>,
    ) {
        transfer(view, perspective, viewer, effects, &self.asset, self.amount);
    }

    fn is_empty(&self) -> bool {
        self.amount == 0
    }

    // The currency name comes from the layout template on both servers.
    fn serialize(&self, out: &mut WireWriter) -> Result<()> {
        out.write_u64(self.amount);
        Ok(())
    }

    fn deserialize(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        self.amount = input.read_u64()?;
        Ok(())
    }

    fn clone_icon(&self) -> Box<dyn Icon> {
        Box::new(self.clone())
    }
}

/// Experience levels offered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperienceIcon {
    levels: u32,
}

impl ExperienceIcon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_levels(levels: u32) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }
}

impl Icon for ExperienceIcon {
    fn kind(&self) -> IconKind {
        IconKind::Experience
    }

    fn render(&self, _view: &TradeView<'_>, _perspective: Perspective, _viewer: &Participant) -> Visual {
        Visual::button(format!("{} levels", self.levels), self.levels > 0)
    }

    fn try_finish(
        &self,
        _view: &TradeView<'_>,
        _perspective: Perspective,
        viewer: &Participant,
        goods: &dyn Goods,
    ) -> FinishResult {
        check_balance(viewer, goods, &Asset::ExperienceLevels, self.levels as u64)
    }

    fn on_finish(
        &mut self,
        view: &TradeView<'_>,
        perspective: Perspective,
        viewer: &Participant,
        effects: &mut Effects<'_>,
    ) {
        transfer(
            view,
            perspective,
            viewer,
            effects,
            &Asset::ExperienceLevels,
            self.levels as u64,
        );
    }

    fn is_empty(&self) -> bool {
        self.levels == 0
    }

    fn serialize(&self, out: &mut WireWriter) -> Result<()> {
        out.write_u32(self.levels);
        Ok(())
    }

    fn deserialize(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        self.levels = input.read_u32()?;
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

    fn coins() -> Asset {
        Asset::Currency("coins".into())
    }

    #[test]
    fn test_round_trips() {
        assert_round_trip(&CurrencyIcon::new("coins").with_amount(250), &CurrencyIcon::new("coins"));
        assert_round_trip(&CurrencyIcon::new("coins"), &CurrencyIcon::new("coins"));
        assert_round_trip(&ExperienceIcon::with_levels(4), &ExperienceIcon::new());
    }

    #[test]
    fn test_insufficient_funds_blocks() {
        let fixture = Fixture::local();
        let view = fixture.view();
        let owner = view.participant(Perspective::Primary);
        let mut goods = InMemoryGoods::new();
        goods.set_balance(owner.id(), coins(), 99);

        let icon = CurrencyIcon::new("coins").with_amount(100);
        assert_eq!(
            icon.try_finish(&view, Perspective::Primary, owner, &goods),
            FinishResult::Block(AbortReason::InsufficientFunds)
        );
        assert_eq!(
            CurrencyIcon::new("coins").with_amount(99).try_finish(&view, Perspective::Primary, owner, &goods),
            FinishResult::Pass
        );
    }

    #[test]
    fn test_remote_owner_is_not_checked_locally() {
        let fixture = Fixture::with_remote_secondary();
        let view = fixture.view();
        let remote = view.participant(Perspective::Secondary);
        let goods = InMemoryGoods::new();

        let icon = ExperienceIcon::with_levels(30);
        assert_eq!(icon.try_finish(&view, Perspective::Secondary, remote, &goods), FinishResult::Pass);
    }

    #[test]
    fn test_currency_moves_and_is_audited_once() {
        let fixture = Fixture::local();
        let view = fixture.view();
        let owner = view.participant(Perspective::Secondary);
        let partner = view.participant(Perspective::Primary);
        let mut goods = InMemoryGoods::new();
        let mut audit = MemoryAudit::new();
        goods.set_balance(owner.id(), coins(), 500);

        let mut icon = CurrencyIcon::new("coins").with_amount(200);
        icon.on_finish(&view, Perspective::Secondary, owner, &mut Effects::new(&mut goods, &mut audit));

        assert_eq!(goods.balance(owner.id(), &coins()), 300);
        assert_eq!(goods.balance(partner.id(), &coins()), 200);
        assert_eq!(audit.messages(), vec!["Blake paid 200 coins to Alex"]);
        assert_eq!(audit.entries[0].initiator, "Alex");
        assert_eq!(audit.entries[0].counterpart, "Blake");
    }
}
