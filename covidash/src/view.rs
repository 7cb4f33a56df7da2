//! Selection of what the dashboard shows. The dashboard has two tabs (the highlighted region and
//! the world) and two modes (running totals and daily changes); each combination is a `View`
//! with a fixed list of chart panels.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    aggregate::Scope,
    series::{Metric, Temporality},
};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Region,
    World,
}

impl Tab {
    pub fn scope(&self, region: &str) -> Scope {
        match self {
            Tab::Region => Scope::Region(region.to_string()),
            Tab::World => Scope::World,
        }
    }
}

/// A user action on the dashboard controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Tab(Tab),
    Mode(Temporality),
}

/// The last selected tab and mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub tab: Tab,
    pub mode: Temporality,
}

impl ViewState {
    pub fn apply(self, control: Control) -> Self {
        match control {
            Control::Tab(tab) => Self { tab, ..self },
            Control::Mode(mode) => Self { mode, ..self },
        }
    }

    pub fn view(&self) -> View {
        View::select(self.tab, self.mode)
    }

    /// Whether the button for `mode` is shown as pressed
    pub fn is_active(&self, mode: Temporality) -> bool {
        self.mode == mode
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum View {
    RegionCumulative,
    RegionNew,
    WorldCumulative,
    WorldNew,
}

/// One chart of a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Panel {
    pub title: &'static str,
    pub metric: Metric,
    pub temporality: Temporality,
    /// Whether the rolling mean is drawn over the bars
    pub rolling_mean: bool,
}

const fn panel(title: &'static str, metric: Metric, temporality: Temporality) -> Panel {
    Panel {
        title,
        metric,
        temporality,
        rolling_mean: false,
    }
}

const CUMULATIVE_PANELS: [Panel; 4] = [
    panel("Confirmed Cases", Metric::Confirmed, Temporality::Cumulative),
    panel("Recovered", Metric::Recovered, Temporality::Cumulative),
    panel("Active", Metric::Active, Temporality::Cumulative),
    panel("Deaths", Metric::Deaths, Temporality::Cumulative),
];

const NEW_PANELS: [Panel; 4] = [
    Panel {
        rolling_mean: true,
        ..panel("New Cases", Metric::Confirmed, Temporality::New)
    },
    panel("New Recovered", Metric::Recovered, Temporality::New),
    panel("New Active", Metric::Active, Temporality::New),
    Panel {
        rolling_mean: true,
        ..panel("New Deaths", Metric::Deaths, Temporality::New)
    },
];

impl View {
    pub fn select(tab: Tab, mode: Temporality) -> Self {
        match (tab, mode) {
            (Tab::Region, Temporality::Cumulative) => View::RegionCumulative,
            (Tab::Region, Temporality::New) => View::RegionNew,
            (Tab::World, Temporality::Cumulative) => View::WorldCumulative,
            (Tab::World, Temporality::New) => View::WorldNew,
        }
    }

    pub fn tab(&self) -> Tab {
        match self {
            View::RegionCumulative | View::RegionNew => Tab::Region,
            View::WorldCumulative | View::WorldNew => Tab::World,
        }
    }

    pub fn mode(&self) -> Temporality {
        match self {
            View::RegionCumulative | View::WorldCumulative => Temporality::Cumulative,
            View::RegionNew | View::WorldNew => Temporality::New,
        }
    }

    pub fn panels(&self) -> &'static [Panel] {
        match self.mode() {
            Temporality::Cumulative => &CUMULATIVE_PANELS,
            Temporality::New => &NEW_PANELS,
        }
    }

    pub fn shows_map(&self) -> bool {
        *self == View::WorldCumulative
    }
}
