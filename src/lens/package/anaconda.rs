//! Snowflake Anaconda channel index

use super::requirement::{normalize_name, Requirement};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const CHANNEL_DATA_URL: &str = "https://repo.anaconda.com/pkgs/snowflake/channeldata.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelPackage {
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelData {
    #[serde(default)]
    packages: HashMap<String, ChannelPackage>,
}

/// Requirements partitioned by whether the channel can provide them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitRequirements {
    pub snowflake: Vec<Requirement>,
    pub other: Vec<Requirement>,
}

/// Package name to latest published version, keyed by normalized name
#[derive(Debug, Clone, Default)]
pub struct AnacondaChannel {
    packages: HashMap<String, ChannelPackage>,
}

impl AnacondaChannel {
    /// Download the channel index
    #[cfg(feature = "http")]
    pub fn fetch() -> Result<Self> {
        debug!("fetching {}", CHANNEL_DATA_URL);
        let data = ureq::get(CHANNEL_DATA_URL)
            .call()?
            .body_mut()
            .read_json::<ChannelData>()?;
        Ok(Self::from_map(data.packages))
    }

    /// Parse a `channeldata.json` document
    pub fn from_json(text: &str) -> Result<Self> {
        let data: ChannelData = serde_json::from_str(text)?;
        Ok(Self::from_map(data.packages))
    }

    /// Build from `(name, version)` pairs
    pub fn from_packages<'s>(packages: impl IntoIterator<Item = (&'s str, &'s str)>) -> Self {
        Self::from_map(
            packages
                .into_iter()
                .map(|(name, version)| {
                    (
                        name.to_string(),
                        ChannelPackage {
                            version: Some(version.to_string()),
                        },
                    )
                })
                .collect(),
        )
    }

    fn from_map(packages: HashMap<String, ChannelPackage>) -> Self {
        let packages = packages
            .into_iter()
            .map(|(name, pkg)| (normalize_name(&name), pkg))
            .collect::<HashMap<_, _>>();
        debug!("anaconda channel lists {} packages", packages.len());
        Self { packages }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn latest_version(&self, name: &str) -> Option<&str> {
        self.packages
            .get(&normalize_name(name))
            .and_then(|p| p.version.as_deref())
    }

    /// Whether the channel provides `requirement`.
    ///
    /// URL requirements are never provided. Unless `skip_version_check` is set,
    /// the channel's latest version must satisfy every version clause.
    pub fn is_available(&self, requirement: &Requirement, skip_version_check: bool) -> bool {
        if requirement.url.is_some() {
            return false;
        }
        let Some(package) = self.packages.get(&requirement.normalized_name()) else {
            return false;
        };
        if skip_version_check || requirement.specifiers.is_empty() {
            return true;
        }
        match &package.version {
            Some(version) => requirement.is_satisfied_by(version),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL_DATA: &str = r#"{
        "channeldata_version": 1,
        "packages": {
            "matplotlib": {"version": "3.7.1", "license": "PSF"},
            "snowflake-connector-python": {"version": "3.0.4"},
            "Pandas_Profiling": {"version": "3.1.0"},
            "noversion": {}
        }
    }"#;

    #[test]
    fn test_from_json() {
        let channel = AnacondaChannel::from_json(CHANNEL_DATA).unwrap();
        assert_eq!(channel.len(), 4);
        assert_eq!(channel.latest_version("matplotlib"), Some("3.7.1"));
        assert_eq!(channel.latest_version("pandas-profiling"), Some("3.1.0"));
        assert_eq!(channel.latest_version("noversion"), None);
    }

    #[test]
    fn test_is_available() {
        let channel = AnacondaChannel::from_json(CHANNEL_DATA).unwrap();
        let available = |line: &str, skip: bool| {
            channel.is_available(&Requirement::parse(line).unwrap(), skip)
        };

        assert!(available("snowflake-connector-python", false));
        assert!(available("SNOWFLAKE_CONNECTOR_PYTHON", false));
        assert!(available("matplotlib>=3.0", false));
        assert!(!available("matplotlib>=1000", false));
        assert!(available("matplotlib>=1000", true));
        assert!(!available("noversion==1.0", false));
        assert!(!available("july", false));
        assert!(!available("git+https://github.com/matplotlib/matplotlib.git", true));
    }
}
