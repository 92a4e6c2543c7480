//! The three DKG bundle kinds as one routable value.

use std::fmt;

use serde::{Deserialize, Serialize};

use randnet_types::{DealBundle, JustificationBundle, ResponseBundle};

/// Discriminator carried on the wire so one channel can multiplex every kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleKind {
    Deal,
    Response,
    Justification,
}

impl BundleKind {
    pub const ALL: [BundleKind; 3] = [
        BundleKind::Deal,
        BundleKind::Response,
        BundleKind::Justification,
    ];
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BundleKind::Deal => "deal",
            BundleKind::Response => "response",
            BundleKind::Justification => "justification",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Bundle {
    Deal(DealBundle),
    Response(ResponseBundle),
    Justification(JustificationBundle),
}

impl Bundle {
    pub fn kind(&self) -> BundleKind {
        match self {
            Bundle::Deal(_) => BundleKind::Deal,
            Bundle::Response(_) => BundleKind::Response,
            Bundle::Justification(_) => BundleKind::Justification,
        }
    }

    /// Index of the node that authored the bundle.
    pub fn origin(&self) -> u32 {
        match self {
            Bundle::Deal(bundle) => bundle.dealer_index,
            Bundle::Response(bundle) => bundle.share_index,
            Bundle::Justification(bundle) => bundle.dealer_index,
        }
    }
}

impl From<DealBundle> for Bundle {
    fn from(bundle: DealBundle) -> Self {
        Bundle::Deal(bundle)
    }
}

impl From<ResponseBundle> for Bundle {
    fn from(bundle: ResponseBundle) -> Self {
        Bundle::Response(bundle)
    }
}

impl From<JustificationBundle> for Bundle {
    fn from(bundle: JustificationBundle) -> Self {
        Bundle::Justification(bundle)
    }
}
