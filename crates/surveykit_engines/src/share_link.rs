#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use thiserror::Error;
use url::Url;

pub const PUBLIC_BASE_URL: &str = "https://www.surveysgalore.com";
pub const SLUG_LEN: usize = 6;
/// Stands in for a survey reference with no usable id; its slug is `UNKNOW`.
pub const PLACEHOLDER_SURVEY_REF: &str = "unknown";

const SURVEY_PATH_MARKER: &str = "/survey/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareLinkError {
    #[error("invalid public base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinkConfig {
    pub base_url: String,
    pub slug_len: usize,
    pub embed_height: u32,
}

impl ShareLinkConfig {
    pub fn mvp_v1() -> Self {
        Self {
            base_url: PUBLIC_BASE_URL.to_string(),
            slug_len: SLUG_LEN,
            embed_height: 600,
        }
    }
}

/// Builds public survey links and embed snippets.
///
/// Query parameters are keyed by name: a repeated name keeps its last value, and pairs are
/// emitted in name order so equal mappings always produce the same URL. Values are used as
/// given; the caller decides between tagged and decoded values beforehand.
#[derive(Debug, Clone)]
pub struct ShareLinkBuilder {
    config: ShareLinkConfig,
    base: Url,
}

impl ShareLinkBuilder {
    pub fn new(config: ShareLinkConfig) -> Result<Self, ShareLinkError> {
        let invalid = |reason: &'static str| ShareLinkError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason,
        };
        let base = Url::parse(&config.base_url).map_err(|_| invalid("not an absolute url"))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(invalid("must have a host"));
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err(invalid("must not carry a query or fragment"));
        }
        if config.slug_len == 0 {
            return Err(invalid("slug length must be > 0"));
        }
        Ok(Self { config, base })
    }

    pub fn config(&self) -> &ShareLinkConfig {
        &self.config
    }

    /// Public slug for a survey id, `/survey/<id>` path or URL.
    pub fn slug_for(&self, survey_ref: &str) -> String {
        let segment = survey_segment(survey_ref).unwrap_or(PLACEHOLDER_SURVEY_REF);
        segment
            .chars()
            .take(self.config.slug_len)
            .collect::<String>()
            .to_uppercase()
    }

    pub fn build_url<I, K, V>(&self, survey_ref: &str, parameters: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: BTreeMap<String, String> = parameters
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.slug_for(survey_ref));
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        url.into()
    }

    /// `<iframe>` snippet around [`Self::build_url`]; only the title is escaped.
    pub fn build_embed<I, K, V>(
        &self,
        survey_ref: &str,
        survey_name: &str,
        parameters: I,
    ) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let src = self.build_url(survey_ref, parameters);
        format!(
            "<iframe \n  src=\"{src}\" \n  width=\"100%\" \n  height=\"{height}\" \n  frameborder=\"0\" \n  style=\"border: none; border-radius: 8px; box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1);\"\n  title=\"{title}\">\n</iframe>",
            height = self.config.embed_height,
            title = escape_html_attr(survey_name),
        )
    }
}

fn survey_segment(survey_ref: &str) -> Option<&str> {
    if let Some(idx) = survey_ref.find(SURVEY_PATH_MARKER) {
        let rest = &survey_ref[idx + SURVEY_PATH_MARKER.len()..];
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let segment = &rest[..end];
        return (!segment.is_empty()).then_some(segment);
    }
    let bare = survey_ref.trim();
    if bare.is_empty() || bare.contains('/') {
        None
    } else {
        Some(bare)
    }
}

fn escape_html_attr(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
