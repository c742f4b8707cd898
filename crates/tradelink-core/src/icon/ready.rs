//! Ready toggle and partner status indicator
//!
//! Both derive everything they show from the session's ready flags, so they
//! carry no state of their own and serialize to nothing.

use tradelink_types::{FinishResult, Participant, Perspective, Result, WireReader, WireWriter};

use super::{Effects, Icon, IconKind, TradeView, Visual};
use crate::goods::Goods;

fn status_lore(view: &TradeView<'_>) -> Vec<String> {
    match view.ready.both() {
        true => vec!["Both sides are ready".to_string()],
        false => Vec::new(),
    }
}

/// Button the owning side clicks to toggle its ready flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadyIcon;

impl Icon for ReadyIcon {
    fn kind(&self) -> IconKind {
        IconKind::Ready
    }

    fn render(&self, view: &TradeView<'_>, perspective: Perspective, _viewer: &Participant) -> Visual {
        let ready = view.ready[perspective];
        Visual::Button {
            label: if ready { "Ready" } else { "Click when ready" }.to_string(),
            lore: status_lore(view),
            highlighted: ready,
        }
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
        Box::new(*self)
    }
}

/// Shows whether the partner of the owning side is ready
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartnerStatusIcon;

impl Icon for PartnerStatusIcon {
    fn kind(&self) -> IconKind {
        IconKind::PartnerStatus
    }

    fn render(&self, view: &TradeView<'_>, perspective: Perspective, _viewer: &Participant) -> Visual {
        let partner = view.partner(perspective);
        let ready = view.ready[perspective.other()];
        let label = match ready {
            true => format!("{} is ready", partner.name()),
            false => format!("Waiting for {}", partner.name()),
        };
        Visual::Button {
            label,
            lore: status_lore(view),
            highlighted: ready,
        }
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
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::testing::Fixture;
    use tradelink_types::PerSide;

    #[test]
    fn test_ready_reflects_own_flag() {
        let fixture = Fixture::local();
        let mut view = fixture.view();
        view.ready = PerSide::new(true, false);
        let viewer = view.participant(Perspective::Primary);

        assert!(matches!(
            ReadyIcon.render(&view, Perspective::Primary, viewer),
            Visual::Button { highlighted: true, .. }
        ));
        assert!(matches!(
            ReadyIcon.render(&view, Perspective::Secondary, viewer),
            Visual::Button { highlighted: false, .. }
        ));
    }

    #[test]
    fn test_partner_status_reflects_other_flag() {
        let fixture = Fixture::local();
        let mut view = fixture.view();
        view.ready = PerSide::new(false, true);
        let viewer = view.participant(Perspective::Primary);

        match PartnerStatusIcon.render(&view, Perspective::Primary, viewer) {
            Visual::Button { label, highlighted, .. } => {
                assert_eq!(label, "Blake is ready");
                assert!(highlighted);
            }
            other => panic!("unexpected visual {:?}", other),
        }
    }
}
