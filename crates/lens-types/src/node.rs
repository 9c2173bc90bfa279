use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Stable cross-step node identifier, rendered as `@eN` on the wire.
///
/// A ref names one semantic identity for the lifetime of a session; it is
/// never reissued for a different node (see the reference manager).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeRef(pub u32);

impl NodeRef {
    /// Placeholder carried by freshly extracted nodes before the reference
    /// manager has run. Never serialized.
    pub const UNASSIGNED: NodeRef = NodeRef(0);

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@e{}", self.0)
    }
}

impl FromStr for NodeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("@e")
            .ok_or_else(|| format!("ref must start with @e: {s:?}"))?;
        let n: u32 = digits
            .parse()
            .map_err(|_| format!("ref must be @e<number>: {s:?}"))?;
        Ok(NodeRef(n))
    }
}

impl Serialize for NodeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

macro_rules! roles {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Accessibility role vocabulary.
        ///
        /// Closed set of the roles the matcher and filter care about, with an
        /// [`Role::Other`] fallback so future a11y roles pass through without
        /// breaking matching.
        #[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub enum Role {
            $($variant,)+
            Other(String),
        }

        impl Role {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Role::$variant => $name,)+
                    Role::Other(s) => s.as_str(),
                }
            }

            /// Parse a lowercase role string. Unknown roles land in `Other`.
            pub fn parse(raw: &str) -> Role {
                match raw {
                    $($name => Role::$variant,)+
                    other => Role::Other(other.to_string()),
                }
            }
        }
    };
}

roles! {
    Document => "document",
    Generic => "generic",
    Text => "text",
    Button => "button",
    Link => "link",
    Textbox => "textbox",
    Searchbox => "searchbox",
    Checkbox => "checkbox",
    Radio => "radio",
    Combobox => "combobox",
    Listbox => "listbox",
    MenuItem => "menuitem",
    Tab => "tab",
    TabList => "tablist",
    Switch => "switch",
    Slider => "slider",
    Heading => "heading",
    Dialog => "dialog",
    AlertDialog => "alertdialog",
    Alert => "alert",
    Navigation => "navigation",
    Main => "main",
    Banner => "banner",
    ContentInfo => "contentinfo",
    Complementary => "complementary",
    Region => "region",
    Article => "article",
    Form => "form",
    List => "list",
    ListItem => "listitem",
    Table => "table",
    Row => "row",
    Cell => "cell",
    Image => "image",
    Figure => "figure",
    Application => "application",
    Group => "group",
    Tree => "tree",
    TreeItem => "treeitem",
    Status => "status",
    Timer => "timer",
    Marquee => "marquee",
    Log => "log",
    Progressbar => "progressbar",
    Carousel => "carousel",
    None => "none",
    Presentation => "presentation",
}

impl Role {
    /// Roles that carry no semantics of their own and are collapsed into
    /// their parent by the extractors.
    pub fn is_presentational(&self) -> bool {
        matches!(self, Role::None | Role::Presentation)
    }

    /// Roles an agent can act on.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            Role::Button
                | Role::Link
                | Role::Textbox
                | Role::Searchbox
                | Role::Checkbox
                | Role::Radio
                | Role::Combobox
                | Role::Listbox
                | Role::MenuItem
                | Role::Tab
                | Role::Switch
                | Role::Slider
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Role::parse(&s))
    }
}

/// Per-node state flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateFlag {
    Disabled,
    Focused,
    Checked,
    Pressed,
    Selected,
    Expanded,
    Readonly,
    Required,
    Invalid,
    Hidden,
}

impl StateFlag {
    pub fn parse(raw: &str) -> Option<StateFlag> {
        Some(match raw {
            "disabled" => StateFlag::Disabled,
            "focused" => StateFlag::Focused,
            "checked" => StateFlag::Checked,
            "pressed" => StateFlag::Pressed,
            "selected" => StateFlag::Selected,
            "expanded" => StateFlag::Expanded,
            "readonly" => StateFlag::Readonly,
            "required" => StateFlag::Required,
            "invalid" => StateFlag::Invalid,
            "hidden" => StateFlag::Hidden,
            _ => return None,
        })
    }
}

/// Which extraction path produced a node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum NodeOrigin {
    #[serde(rename = "a11y")]
    A11y,
    #[serde(rename = "dom")]
    Dom,
    #[serde(rename = "vision-region")]
    VisionRegion,
}

/// Axis-aligned rectangle in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn contains_center_of(&self, other: &BoundingBox) -> bool {
        let cx = other.x + other.width / 2.0;
        let cy = other.y + other.height / 2.0;
        cx >= self.x && cx <= self.x + self.width && cy >= self.y && cy <= self.y + self.height
    }
}

/// One node of a [`crate::StateTree`].
///
/// `name` is whitespace-collapsed and length-capped by the extractor before
/// it reaches the matcher. `attrs` carries the bounded attribute subset that
/// the DOM extractor preserves (`tag`, `data-testid`, `name`, `type`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "ref")]
    pub ref_id: NodeRef,
    pub role: Role,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub state: BTreeSet<StateFlag>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub level: Option<u8>,
    pub origin: NodeOrigin,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bounds: Option<BoundingBox>,
    /// aria-live setting of the element, when it is a live region.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub live: Option<String>,
    /// Opaque visual artifact (base64) for `vision-region` nodes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vision_token: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(role: Role, name: impl Into<String>, origin: NodeOrigin) -> Node {
        Node {
            ref_id: NodeRef::UNASSIGNED,
            role,
            name: name.into(),
            value: None,
            state: BTreeSet::new(),
            level: None,
            origin,
            bounds: None,
            live: None,
            vision_token: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn has_flag(&self, flag: StateFlag) -> bool {
        self.state.contains(&flag)
    }

    /// Identity tuple of this node given its parent's role.
    pub fn identity(&self, parent_role: Role) -> Identity {
        Identity {
            role: self.role.clone(),
            name: self.name.clone(),
            parent_role,
            level: self.level,
        }
    }
}

/// The tuple used for anchor matching and for the wire-level refs map:
/// `(role, normalized_name, parent_role, level)`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub role: Role,
    pub name: String,
    pub parent_role: Role,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub level: Option<u8>,
}
