use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tradelink_core::{
    CurrencyIcon, Effects, Goods, Icon, IconKind, InMemoryGoods, ItemSlotIcon,
    LayoutTemplate, MemoryAudit, RequestManager, Session, SessionEvent, SessionRegistry,
    SessionState, TradeSettings, TradeView, Visual,
};
use tradelink_types::{
    Asset, FinishResult, ItemStack, Participant, PerSide, Perspective, PlayerIdentity, Result,
    TradeError, WireReader, WireWriter,
};

/// Decoration stand-in that counts how often it was finished
#[derive(Debug, Clone)]
struct CountingIcon {
    finished: Arc<AtomicUsize>,
}

impl Icon for CountingIcon {
    fn kind(&self) -> IconKind {
        IconKind::Decoration
    }

    fn render(&self, _view: &TradeView<'_>, _perspective: Perspective, _viewer: &Participant) -> Visual {
        Visual::Empty
    }

    fn try_finish(
        &self,
        _view: &TradeView<'_>,
        _perspective: Perspective,
        _viewer: &Participant,
        _goods: &dyn Goods,
    ) -> FinishResult {
        FinishResult::Pass
    }

    fn on_finish(
        &mut self,
        _view: &TradeView<'_>,
        _perspective: Perspective,
        _viewer: &Participant,
        _effects: &mut Effects<'_>,
    ) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn serialize(&self, _out: &mut WireWriter) -> Result<()> {
        Ok(())
    }

    fn deserialize(&mut self, _input: &mut WireReader<'_>) -> Result<()> {
        Ok(())
    }

    fn clone_icon(&self) -> Box<dyn Icon> {
        Box::new(self.clone())
    }
}

struct Table {
    session: Session,
    goods: InMemoryGoods,
    audit: MemoryAudit,
    finished: Arc<AtomicUsize>,
}

impl Table {
    fn new() -> Self {
        let mut session = Session::new(
            tradelink_types::SessionId::new(),
            &LayoutTemplate::standard(),
            PerSide::new(
                Participant::local(PlayerIdentity::named("Alex")),
                Participant::local(PlayerIdentity::named("Blake")),
            ),
            true,
            TradeSettings::default(),
        );
        let finished = Arc::new(AtomicUsize::new(0));
        for perspective in Perspective::ALL {
            session
                .update_icon(
                    perspective,
                    8,
                    Box::new(CountingIcon {
                        finished: finished.clone(),
                    }),
                )
                .unwrap();
        }
        Self {
            session,
            goods: InMemoryGoods::new(),
            audit: MemoryAudit::new(),
            finished,
        }
    }

    fn coins() -> Asset {
        Asset::Currency("coins".to_string())
    }

    fn fund(&mut self, perspective: Perspective, coins: u64) {
        let id = *self.session.participant(perspective).id();
        self.goods.set_balance(&id, Self::coins(), coins);
    }

    fn offer_coins(&mut self, perspective: Perspective, amount: u64) {
        self.session
            .update_icon(perspective, 4, Box::new(CurrencyIcon::new("coins").with_amount(amount)))
            .unwrap();
    }

    fn ready_both(&mut self) {
        self.session.toggle_ready(Perspective::Primary, &self.goods).unwrap();
        self.session.toggle_ready(Perspective::Secondary, &self.goods).unwrap();
        assert_eq!(self.session.state(), SessionState::BothReady);
    }

    fn tick(&mut self, elapsed: Duration) {
        self.session
            .tick(elapsed, &mut Effects::new(&mut self.goods, &mut self.audit));
    }

    fn balance(&self, perspective: Perspective) -> u64 {
        self.goods
            .balance(self.session.participant(perspective).id(), &Self::coins())
    }
}

#[test]
fn test_countdown_elapses_and_both_sides_finish_once() {
    let mut table = Table::new();
    table.fund(Perspective::Primary, 100);
    table.fund(Perspective::Secondary, 100);
    table.offer_coins(Perspective::Primary, 30);
    table.offer_coins(Perspective::Secondary, 10);
    table.ready_both();

    table.tick(Duration::from_secs(1));
    table.tick(Duration::from_secs(1));
    assert_eq!(table.session.state(), SessionState::BothReady);
    table.tick(Duration::from_secs(1));

    assert_eq!(table.session.state(), SessionState::Complete);
    assert_eq!(table.finished.load(Ordering::SeqCst), 2);
    assert_eq!(table.balance(Perspective::Primary), 80);
    assert_eq!(table.balance(Perspective::Secondary), 120);

    // terminal: further ticks do nothing
    table.tick(Duration::from_secs(5));
    assert_eq!(table.finished.load(Ordering::SeqCst), 2);
    assert!(table.session.drain_events().contains(&SessionEvent::Completed));
}

#[test]
fn test_mutation_during_countdown_resets_readiness() {
    let mut table = Table::new();
    table.fund(Perspective::Primary, 100);
    table.offer_coins(Perspective::Primary, 30);
    table.ready_both();
    table.tick(Duration::from_secs(2));

    table.offer_coins(Perspective::Primary, 50);

    assert_eq!(table.session.state(), SessionState::AwaitingReady);
    assert_eq!(table.session.ready(), PerSide::new(false, false));
    assert_eq!(table.session.remaining_countdown(), None);

    table.tick(Duration::from_secs(10));
    assert_eq!(table.finished.load(Ordering::SeqCst), 0);
    assert_eq!(table.balance(Perspective::Primary), 100);
}

#[test]
fn test_blocking_icon_prevents_every_finish() {
    let mut table = Table::new();
    table.fund(Perspective::Primary, 100);
    table.fund(Perspective::Secondary, 100);
    let blake = *table.session.participant(Perspective::Secondary).id();
    table.goods.add_items(&blake, ItemStack::new("emerald", 4));

    table.offer_coins(Perspective::Primary, 60);
    table
        .session
        .update_icon(
            Perspective::Secondary,
            0,
            Box::new(ItemSlotIcon::holding(ItemStack::new("emerald", 4))),
        )
        .unwrap();
    table.ready_both();

    // Blake gives the emeralds away during the countdown
    table.goods.take_item(&blake, &ItemStack::new("emerald", 4));
    table.tick(Duration::from_secs(3));

    assert_eq!(table.session.state(), SessionState::AwaitingReady);
    assert_eq!(table.session.ready(), PerSide::new(false, false));
    assert_eq!(table.finished.load(Ordering::SeqCst), 0);
    assert_eq!(table.balance(Perspective::Primary), 100);
    assert_eq!(table.balance(Perspective::Secondary), 100);
    assert!(table.audit.entries.is_empty());
}

#[test]
fn test_requesting_while_trading_fails() {
    let alex = Participant::local(PlayerIdentity::named("Alex"));
    let blake = Participant::local(PlayerIdentity::named("Blake"));
    let casey = Participant::local(PlayerIdentity::named("Casey"));
    let settings = TradeSettings::default();
    let template = LayoutTemplate::standard();
    let now = Utc::now();

    let mut requests = RequestManager::new(settings.request_timeout());
    let mut registry = SessionRegistry::new();

    let id = requests
        .request(alex.clone(), blake.clone(), now, |p| registry.is_trading(p))
        .unwrap();
    let session = Session::new(
        tradelink_types::SessionId::new(),
        &template,
        PerSide::new(alex.clone(), blake.clone()),
        true,
        settings.clone(),
    );
    let opened = requests
        .accept(&id, now, |_| Ok(*session.id()))
        .unwrap();
    registry.insert(session).unwrap();
    assert!(registry.is_trading(alex.id()));

    let err = requests
        .request(casey.clone(), alex.clone(), now, |p| registry.is_trading(p))
        .unwrap_err();
    assert!(matches!(err, TradeError::AlreadyTrading { ref player } if player == "Alex"));

    registry
        .get_mut(&opened)
        .unwrap()
        .cancel(tradelink_core::CancelReason::Shutdown);
    assert!(requests
        .request(casey, alex, now, |p| registry.is_trading(p))
        .is_ok());
}

#[test]
fn test_unanswered_request_expires_for_both_sides() {
    let now = Utc::now();
    let mut requests = RequestManager::new(chrono::Duration::seconds(30));

    let local = requests
        .request(
            Participant::local(PlayerIdentity::named("Alex")),
            Participant::local(PlayerIdentity::named("Blake")),
            now,
            |_| false,
        )
        .unwrap();
    let proxy = requests
        .request(
            Participant::local(PlayerIdentity::named("Casey")),
            Participant::remote(PlayerIdentity::named("Drew")),
            now,
            |_| false,
        )
        .unwrap();

    let mut expired = requests.expire(now + chrono::Duration::seconds(31));
    expired.sort_by_key(|e| e.sender.name.clone());
    assert_eq!(expired.len(), 2);
    assert!(requests.is_empty());

    assert_eq!(expired[0].request_id, local);
    assert!(!expired[0].is_proxy_trade());
    assert!(expired[0].sending_player.is_some() && expired[0].receiving_player.is_some());

    assert_eq!(expired[1].request_id, proxy);
    assert!(expired[1].is_proxy_trade());
    assert_eq!(expired[1].receiver.name, "Drew");
}
