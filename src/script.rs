//! Script command vocabulary and its text encoding.
//!
//! Commands are encoded as single call expressions,
//! `<receiver>.<method>(<json>, <json>, ...)`, which is the only grammar the
//! reader host document has to understand. [`ScriptCall::parse`] inverts the
//! encoding for engines that interpret commands natively.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RendererError;
use crate::geometry::Point;
use crate::options::ReaderSettings;

/// Receiver for the reader API inside the host document.
pub const READER_RECEIVER: &str = "ReadiumSDK.reader";
/// Receiver for host helpers injected next to the reader API.
pub const HOST_RECEIVER: &str = "hostBridge";

/// Initial page request passed to `openBook`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPageRequest {
    pub idref: String,
    pub spine_item_page_index: usize,
}

/// Commands the renderer sends into the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptCommand {
    /// Open the package, optionally at a page.
    OpenBook {
        package: Value,
        settings: ReaderSettings,
        open_page: Option<OpenPageRequest>,
    },
    OpenPageLeft,
    OpenPageRight,
    OpenSpineItemPage {
        idref: String,
        page_index: usize,
    },
    OpenContentUrl {
        href: String,
    },
    UpdateSettings(ReaderSettings),
    /// Ask for the current pagination info.
    CurrentLocation,
    /// Describe the element under a content-space point.
    ElementAtPoint(Point),
    IsMediaOverlayAvailable,
    ToggleMediaOverlay,
    PauseMediaOverlay,
    /// Caller-supplied script text, sent verbatim.
    Raw(String),
}

impl ScriptCommand {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenBook { .. } => "openBook",
            Self::OpenPageLeft => "openPageLeft",
            Self::OpenPageRight => "openPageRight",
            Self::OpenSpineItemPage { .. } => "openSpineItemPage",
            Self::OpenContentUrl { .. } => "openContentUrl",
            Self::UpdateSettings(_) => "updateSettings",
            Self::CurrentLocation => "getPaginationInfo",
            Self::ElementAtPoint(_) => "elementAtPoint",
            Self::IsMediaOverlayAvailable => "isMediaOverlayAvailable",
            Self::ToggleMediaOverlay => "toggleMediaOverlay",
            Self::PauseMediaOverlay => "pauseMediaOverlay",
            Self::Raw(_) => "script",
        }
    }

    /// Structured call for this command; `None` for raw scripts.
    pub fn to_call(&self) -> Result<Option<ScriptCall>, serde_json::Error> {
        let reader =
            |method: &str, args: Vec<Value>| Some(ScriptCall::new(READER_RECEIVER, method, args));
        let call = match self {
            Self::OpenBook {
                package,
                settings,
                open_page,
            } => reader(
                "openBook",
                vec![
                    package.clone(),
                    serde_json::to_value(settings)?,
                    serde_json::to_value(open_page)?,
                ],
            ),
            Self::OpenPageLeft | Self::OpenPageRight => reader(self.name(), Vec::new()),
            Self::OpenSpineItemPage { idref, page_index } => reader(
                "openSpineItemPage",
                vec![Value::from(idref.as_str()), Value::from(*page_index)],
            ),
            Self::OpenContentUrl { href } => {
                reader("openContentUrl", vec![Value::from(href.as_str()), Value::Null])
            }
            Self::UpdateSettings(settings) => {
                reader("updateSettings", vec![serde_json::to_value(settings)?])
            }
            Self::CurrentLocation
            | Self::IsMediaOverlayAvailable
            | Self::ToggleMediaOverlay
            | Self::PauseMediaOverlay => reader(self.name(), Vec::new()),
            Self::ElementAtPoint(point) => Some(ScriptCall::new(
                HOST_RECEIVER,
                "elementAtPoint",
                vec![Value::from(point.x), Value::from(point.y)],
            )),
            Self::Raw(_) => None,
        };
        Ok(call)
    }

    /// Script text sent to the engine.
    pub fn to_script(&self) -> Result<String, RendererError> {
        match self {
            Self::Raw(script) => Ok(script.clone()),
            _ => match self.to_call()? {
                Some(call) => Ok(call.render()),
                None => Ok(String::new()),
            },
        }
    }
}

/// A single `<receiver>.<method>(args...)` call.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptCall {
    pub receiver: String,
    pub method: String,
    pub args: Vec<Value>,
}

impl ScriptCall {
    pub fn new(receiver: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            receiver: receiver.into(),
            method: method.into(),
            args,
        }
    }

    /// Encode as script text. Arguments are compact JSON, which is valid JavaScript.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.receiver.len() + self.method.len() + 16);
        out.push_str(&self.receiver);
        out.push('.');
        out.push_str(&self.method);
        out.push('(');
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                out.push_str(", ");
            }
            out.push_str(&arg.to_string());
        }
        out.push(')');
        out
    }

    /// Parse text produced by [`ScriptCall::render`].
    ///
    /// Returns `None` for anything that is not a single call with JSON arguments.
    pub fn parse(script: &str) -> Option<Self> {
        let script = script.trim().trim_end_matches(';').trim_end();
        let open = script.find('(')?;
        let inner = script.get(open + 1..)?.strip_suffix(')')?;
        let (receiver, method) = script.get(..open)?.rsplit_once('.')?;
        if receiver.is_empty() || !is_identifier(method) {
            return None;
        }
        let args: Vec<Value> = serde_json::from_str(&format!("[{}]", inner)).ok()?;
        Some(Self::new(receiver, method, args))
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
}
