//! Deep links into a JBrowse 2 web application.
//!
//! Two URL shapes are supported:
//!
//! - session specs: `<host>?config=<config>&session=spec-<json>`
//! - legacy parameters: `<host>?config=<config>&assembly=<name>&tracks=<ids>[&loc=<loc>]`
//!
//! Every parameter value is percent-encoded, keeping only RFC 3986
//! unreserved characters. Nothing is checked against the configuration file.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::error::{AgentError, Result};

/// The view a session opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewType {
    #[default]
    LinearGenomeView,
    CircularView,
    DotplotView,
    SpreadsheetView,
    SvInspectorView,
    LinearSyntenyView,
}

impl ViewType {
    pub const ALL: [ViewType; 6] = [
        ViewType::LinearGenomeView,
        ViewType::CircularView,
        ViewType::DotplotView,
        ViewType::SpreadsheetView,
        ViewType::SvInspectorView,
        ViewType::LinearSyntenyView,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ViewType::LinearGenomeView => "LinearGenomeView",
            ViewType::CircularView => "CircularView",
            ViewType::DotplotView => "DotplotView",
            ViewType::SpreadsheetView => "SpreadsheetView",
            ViewType::SvInspectorView => "SvInspectorView",
            ViewType::LinearSyntenyView => "LinearSyntenyView",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewType {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ViewType::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                AgentError::tool("session_link", format!("unknown view type '{wanted}'"))
            })
    }
}

/// One side of a synteny view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    pub assembly: String,
}

/// One view of a session spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSpec {
    #[serde(rename = "type")]
    pub view_type: ViewType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    pub tracks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<SubView>,
}

/// The `spec-` session description JBrowse loads from a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSpec {
    pub views: Vec<ViewSpec>,
}

impl SessionSpec {
    /// A single-assembly view of `view_type`.
    pub fn view(
        view_type: ViewType,
        assembly: impl Into<String>,
        loc: Option<String>,
        tracks: Vec<String>,
    ) -> Self {
        let view =
            ViewSpec { view_type, assembly: Some(assembly.into()), loc, tracks, views: Vec::new() };
        Self { views: vec![view] }
    }

    /// A linear genome view, the default.
    pub fn linear(assembly: impl Into<String>, loc: Option<String>, tracks: Vec<String>) -> Self {
        Self::view(ViewType::LinearGenomeView, assembly, loc, tracks)
    }

    /// A synteny view between two assemblies at the same location.
    pub fn synteny(assemblies: [String; 2], loc: Option<String>, tracks: Vec<String>) -> Self {
        let views =
            assemblies.into_iter().map(|assembly| SubView { loc: loc.clone(), assembly }).collect();
        Self {
            views: vec![ViewSpec {
                view_type: ViewType::LinearSyntenyView,
                assembly: None,
                loc: None,
                tracks,
                views,
            }],
        }
    }
}

/// Builders for browser URLs.
pub struct DeepLink;

impl DeepLink {
    /// `<host>?config=<config>&session=spec-<json>`.
    pub fn session(host: &str, config: &str, spec: &SessionSpec) -> Result<String> {
        let json = serde_json::to_string(spec)
            .map_err(|e| AgentError::tool("session_link", e.to_string()))?;
        Ok(format!("{host}?config={}&session=spec-{}", encode(config), encode(&json)))
    }

    /// `<host>?config=<config>&assembly=<name>&tracks=<id,id>[&loc=<loc>]`.
    pub fn legacy(
        host: &str,
        config: &str,
        assembly: &str,
        tracks: &[String],
        loc: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{host}?config={}&assembly={}&tracks={}",
            encode(config),
            encode(assembly),
            encode(&tracks.join(","))
        );
        if let Some(loc) = loc {
            url.push_str("&loc=");
            url.push_str(&encode(loc));
        }
        url
    }
}
