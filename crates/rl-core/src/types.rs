//! Rule type definitions
//!
//! These types map directly to fields of the RULES section of a compiled
//! rule list and are shared by the compiler and the loader.

// =============================================================================
// Rule Actions (matches RULES section action field)
// =============================================================================

/// Action to take when a rule's trigger matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RuleAction {
    /// Cancels earlier matching rules (exception)
    IgnorePreviousRules = 0,
    /// Cancels the request
    Block = 1,
    /// Strips cookies from the request and response
    BlockCookies = 2,
    /// Hides elements matching a selector
    CssDisplayNone = 3,
    /// Upgrades the request to https
    MakeHttps = 4,
}

impl RuleAction {
    /// Name used in JSON content rules.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IgnorePreviousRules => "ignore-previous-rules",
            Self::Block => "block",
            Self::BlockCookies => "block-cookies",
            Self::CssDisplayNone => "css-display-none",
            Self::MakeHttps => "make-https",
        }
    }
}

impl TryFrom<u8> for RuleAction {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::IgnorePreviousRules),
            1 => Ok(Self::Block),
            2 => Ok(Self::BlockCookies),
            3 => Ok(Self::CssDisplayNone),
            4 => Ok(Self::MakeHttps),
            _ => Err(()),
        }
    }
}

// =============================================================================
// Rule Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for rule behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct RuleFlags: u8 {
        /// url-filter is matched case-sensitively
        const CASE_SENSITIVE = 1 << 0;
        /// Rule only names a host (eligible for the block-domain set)
        const HOST_ONLY = 1 << 1;
        /// Domain constraint lists excluded domains (unless-domain)
        const UNLESS_DOMAIN = 1 << 2;
        /// Rule came from a text filter list rather than JSON
        const FROM_FILTER_LIST = 1 << 3;
    }
}

// =============================================================================
// Resource Types
// =============================================================================

bitflags::bitflags! {
    /// Resource type mask. Empty means "all types".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct ResourceType: u16 {
        const DOCUMENT = 1 << 0;
        const IMAGE = 1 << 1;
        const STYLE_SHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const FONT = 1 << 4;
        const RAW = 1 << 5;          // xhr, fetch, websocket, ping
        const SVG_DOCUMENT = 1 << 6;
        const MEDIA = 1 << 7;
        const POPUP = 1 << 8;
    }
}

impl ResourceType {
    /// Parse a JSON content-rule resource type name.
    pub fn from_rule_name(name: &str) -> Option<Self> {
        match name {
            "document" => Some(Self::DOCUMENT),
            "image" => Some(Self::IMAGE),
            "style-sheet" => Some(Self::STYLE_SHEET),
            "script" => Some(Self::SCRIPT),
            "font" => Some(Self::FONT),
            "raw" => Some(Self::RAW),
            "svg-document" => Some(Self::SVG_DOCUMENT),
            "media" => Some(Self::MEDIA),
            "popup" => Some(Self::POPUP),
            _ => None,
        }
    }
}

// =============================================================================
// Load Types
// =============================================================================

bitflags::bitflags! {
    /// First-party / third-party mask. Empty means both.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct LoadType: u8 {
        const FIRST_PARTY = 1 << 0;
        const THIRD_PARTY = 1 << 1;
    }
}

impl LoadType {
    pub fn from_rule_name(name: &str) -> Option<Self> {
        match name {
            "first-party" => Some(Self::FIRST_PARTY),
            "third-party" => Some(Self::THIRD_PARTY),
            _ => None,
        }
    }
}
