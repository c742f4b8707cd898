use tradelink_types::{FinishResult, Participant, Perspective, Result, WireReader, WireWriter};

use super::{Effects, Icon, IconKind, TradeView, Visual};
use crate::goods::Goods;

/// Structural filler for slots that carry no trade state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaceholderIcon;

impl Icon for PlaceholderIcon {
    fn kind(&self) -> IconKind {
        IconKind::Placeholder
    }

    fn render(&self, _view: &TradeView<'_>, _perspective: Perspective, _viewer: &Participant) -> Visual {
        Visual::Placeholder
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

/// Fixed label, e.g. a divider between the two offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationIcon {
    label: String,
}

impl DecorationIcon {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Icon for DecorationIcon {
    fn kind(&self) -> IconKind {
        IconKind::Decoration
    }

    fn render(&self, _view: &TradeView<'_>, _perspective: Perspective, _viewer: &Participant) -> Visual {
        Visual::button(self.label.clone(), false)
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

    // The label is part of the layout template, nothing travels.
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
