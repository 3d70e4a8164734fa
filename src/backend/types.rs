use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two spec categories the preview consumes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecKind {
    Character,
    Scene,
}

impl SpecKind {
    /// Path segment used by the resource and spec endpoints.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Scene => "scene",
        }
    }

    /// Folder name under a project's asset tree.
    pub fn asset_folder(self) -> &'static str {
        match self {
            Self::Character => "characters",
            Self::Scene => "scenes",
        }
    }

    fn collection_key(self) -> &'static str {
        self.asset_folder()
    }

}

#[derive(Debug, Error, PartialEq)]
#[error("unknown resource type '{0}'")]
pub struct UnknownSpecKind(pub String);

impl FromStr for SpecKind {
    type Err = UnknownSpecKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "character" | "characters" => Ok(Self::Character),
            "scene" | "scenes" => Ok(Self::Scene),
            other => Err(UnknownSpecKind(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl SpecItem {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.id)
    }
}

/// Extracts items from a spec payload. The backend answers either
/// `{"spec": {"characters": [...]}}` or `{"characters": [...]}`; entries
/// without an id are dropped.
pub fn parse_spec_items(payload: &serde_json::Value, kind: SpecKind) -> Vec<SpecItem> {
    let key = kind.collection_key();
    let list = payload
        .get("spec")
        .and_then(|s| s.get(key))
        .or_else(|| payload.get(key))
        .and_then(|v| v.as_array());
    let Some(list) = list else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?.trim();
            if id.is_empty() {
                return None;
            }
            Some(SpecItem {
                id: id.to_string(),
                name: entry
                    .get("name")
                    .and_then(|n| n.as_str())
                    .map(str::to_string),
            })
        })
        .collect()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VariantStatus {
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub animation: Option<AnimationInfo>,
}

impl VariantStatus {
    pub fn selected(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.selected)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Variant {
    pub variant_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub seed: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Animation data reported for a character.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationInfo {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub spritesheet_url: Option<String>,
    #[serde(default)]
    pub types: AnimationTypes,
}

impl AnimationInfo {
    pub fn usable(&self) -> bool {
        self.exists && self.spritesheet_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationTypes {
    #[serde(default)]
    pub idle: Option<ActionSheet>,
    #[serde(default)]
    pub walk: Option<ActionSheet>,
    #[serde(default)]
    pub attack: Option<ActionSheet>,
}

/// A per-action spritesheet: square frames laid out in a grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionSheet {
    pub url: String,
    #[serde(default)]
    pub frames: Option<u32>,
    #[serde(default, rename = "frameSize")]
    pub frame_size: Option<u32>,
    /// `[left, top, right, bottom]` of the opaque content inside a frame.
    #[serde(default)]
    pub content_bbox: Option<[f32; 4]>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectOutcome {
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub final_path: Option<String>,
}
