//! Layouts: per-side mapping of slot index to icon
//!
//! A `LayoutTemplate` is the static description loaded by the host. Every
//! session instantiates two fresh `Layout`s from the same template, one per
//! perspective, so slot `n` means the same thing on both sides.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tradelink_types::{Result, TradeError};

use crate::icon::{
    CurrencyIcon, DecorationIcon, ExperienceIcon, Icon, IconKind, ItemSlotIcon, PartnerStatusIcon,
    PlaceholderIcon, ReadyIcon,
};

/// Name of the built-in layout
pub const STANDARD_LAYOUT: &str = "standard";

/// Template entry for one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IconSpec {
    ItemSlot,
    Currency { currency: String },
    Experience,
    Ready,
    PartnerStatus,
    Decoration { label: String },
    Placeholder,
}

impl IconSpec {
    pub fn kind(&self) -> IconKind {
        match self {
            Self::ItemSlot => IconKind::ItemSlot,
            Self::Currency { .. } => IconKind::Currency,
            Self::Experience => IconKind::Experience,
            Self::Ready => IconKind::Ready,
            Self::PartnerStatus => IconKind::PartnerStatus,
            Self::Decoration { .. } => IconKind::Decoration,
            Self::Placeholder => IconKind::Placeholder,
        }
    }

    /// Fresh icon in its default state
    pub fn build(&self) -> Box<dyn Icon> {
        match self {
            Self::ItemSlot => Box::new(ItemSlotIcon::new()),
            Self::Currency { currency } => Box::new(CurrencyIcon::new(currency.clone())),
            Self::Experience => Box::new(ExperienceIcon::new()),
            Self::Ready => Box::new(ReadyIcon),
            Self::PartnerStatus => Box::new(PartnerStatusIcon),
            Self::Decoration { label } => Box::new(DecorationIcon::new(label.clone())),
            Self::Placeholder => Box::new(PlaceholderIcon),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutTemplate {
    pub name: String,
    pub slots: BTreeMap<usize, IconSpec>,
}

impl LayoutTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: BTreeMap::new(),
        }
    }

    pub fn with_slot(mut self, slot: usize, spec: IconSpec) -> Self {
        self.slots.insert(slot, spec);
        self
    }

    /// Four item slots, coins, experience, then the controls
    pub fn standard() -> Self {
        let mut template = Self::new(STANDARD_LAYOUT);
        for slot in 0..4 {
            template.slots.insert(slot, IconSpec::ItemSlot);
        }
        template
            .with_slot(4, IconSpec::Currency { currency: "coins".to_string() })
            .with_slot(5, IconSpec::Experience)
            .with_slot(6, IconSpec::Ready)
            .with_slot(7, IconSpec::PartnerStatus)
            .with_slot(8, IconSpec::Decoration { label: "Trade".to_string() })
            .with_slot(9, IconSpec::Placeholder)
    }

    pub fn instantiate(&self) -> Layout {
        Layout {
            name: self.name.clone(),
            icons: self
                .slots
                .iter()
                .map(|(slot, spec)| (*slot, spec.build()))
                .collect(),
        }
    }
}

/// Slot index to icon mapping for one perspective of one session
#[derive(Debug, Clone)]
pub struct Layout {
    name: String,
    icons: BTreeMap<usize, Box<dyn Icon>>,
}

impl Layout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    /// True when no icon carries trade data
    pub fn is_empty(&self) -> bool {
        self.icons.values().all(|icon| icon.is_empty())
    }

    /// Slot holding exactly this icon instance
    pub fn slot_of(&self, icon: &dyn Icon) -> Option<usize> {
        let target = icon as *const dyn Icon as *const ();
        self.icons
            .iter()
            .find(|(_, held)| std::ptr::eq(held.as_ref() as *const dyn Icon as *const (), target))
            .map(|(slot, _)| *slot)
    }

    pub fn icon_at(&self, slot: usize) -> Result<&dyn Icon> {
        self.icons
            .get(&slot)
            .map(|icon| icon.as_ref())
            .ok_or(TradeError::SlotOutOfRange { slot })
    }

    pub fn icon_at_mut(&mut self, slot: usize) -> Result<&mut Box<dyn Icon>> {
        self.icons
            .get_mut(&slot)
            .ok_or(TradeError::SlotOutOfRange { slot })
    }

    /// `(slot, icon)` pairs in ascending slot order; call again to restart
    pub fn slots(&self) -> impl Iterator<Item = (usize, &dyn Icon)> + '_ {
        self.icons.iter().map(|(slot, icon)| (*slot, icon.as_ref()))
    }

    pub fn slots_mut(&mut self) -> impl Iterator<Item = (usize, &mut Box<dyn Icon>)> + '_ {
        self.icons.iter_mut().map(|(slot, icon)| (*slot, icon))
    }

    pub fn for_each_slot(&self, mut f: impl FnMut(usize, &dyn Icon)) {
        for (slot, icon) in self.slots() {
            f(slot, icon);
        }
    }

    /// Swap in a new icon state; the variant must match the template
    pub fn replace(&mut self, slot: usize, icon: Box<dyn Icon>) -> Result<Box<dyn Icon>> {
        let held = self.icon_at_mut(slot)?;
        if held.kind() != icon.kind() {
            return Err(TradeError::IconKindMismatch {
                slot,
                expected: held.kind().to_string(),
                actual: icon.kind().to_string(),
            });
        }
        Ok(std::mem::replace(held, icon))
    }
}

/// Templates known to this process, by name
#[derive(Debug, Clone, Default)]
pub struct LayoutCatalog {
    templates: HashMap<String, LayoutTemplate>,
}

impl LayoutCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_standard() -> Self {
        let mut catalog = Self::new();
        catalog.register(LayoutTemplate::standard());
        catalog
    }

    pub fn register(&mut self, template: LayoutTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Result<&LayoutTemplate> {
        self.templates.get(name).ok_or_else(|| TradeError::UnknownLayout {
            name: name.to_string(),
        })
    }
}
