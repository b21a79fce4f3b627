#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;

use surveykit_contracts::UserId;
use surveykit_engines::share_link::{ShareLinkConfig, PUBLIC_BASE_URL};
use surveykit_os::survey_manager::DEFAULT_ACTING_USER;
use surveykit_os::survey_viewer::ANONYMOUS_USER;
use surveykit_os::{SurveyManagerConfig, SurveyViewerConfig};

pub const DATA_DIR_ENV: &str = "SURVEYKIT_DATA_DIR";
pub const USER_ENV: &str = "SURVEYKIT_USER";
pub const BASE_URL_ENV: &str = "SURVEYKIT_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyKitConfig {
    pub data_dir: PathBuf,
    pub acting_user: UserId,
    pub base_url: String,
}

impl SurveyKitConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&var));
        let user = var(USER_ENV).unwrap_or_else(|| DEFAULT_ACTING_USER.to_string());
        let acting_user =
            UserId::new(user).map_err(|e| format!("invalid {USER_ENV}: {e}"))?;
        let base_url = var(BASE_URL_ENV).unwrap_or_else(|| PUBLIC_BASE_URL.to_string());

        Ok(Self {
            data_dir,
            acting_user,
            base_url,
        })
    }

    pub fn share_link_config(&self) -> ShareLinkConfig {
        ShareLinkConfig {
            base_url: self.base_url.clone(),
            ..ShareLinkConfig::mvp_v1()
        }
    }

    pub fn manager_config(&self) -> SurveyManagerConfig {
        SurveyManagerConfig {
            share_link: self.share_link_config(),
            ..SurveyManagerConfig::mvp_v1(self.acting_user.clone())
        }
    }

    pub fn viewer_config(&self) -> Result<SurveyViewerConfig, String> {
        let respondent = UserId::new(ANONYMOUS_USER).map_err(|e| e.to_string())?;
        Ok(SurveyViewerConfig {
            share_link: self.share_link_config(),
            ..SurveyViewerConfig::mvp_v1(respondent)
        })
    }
}

fn default_data_dir(var: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(xdg_config_home) = var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config_home).join("surveykit");
    }
    if let Some(home) = var("HOME") {
        return PathBuf::from(home).join(".config").join("surveykit");
    }
    PathBuf::from(".surveykit")
}
