use serde::{Deserialize, Serialize};

/// The root configuration for `moq`. Every section is optional, a missing
/// root file section falls back to serving `routes.yml` next to the config.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ServerRootConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub responses: ResponsesConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Prefix the server is mounted under. It is removed from the request
    /// path before routes are matched.
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

/// Container of route documents
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoutesConfig {
    /// Globs of route documents, relative to the root config file. Routes
    /// are registered in the order the files are listed.
    #[serde(default = "default_route_paths")]
    pub paths: Vec<String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            paths: default_route_paths(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ResponsesConfig {
    #[serde(default)]
    pub numeric_strings: NumericStrings,
}

/// How string values that look like numbers are written to response bodies.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NumericStrings {
    /// `"42"` is written as `42`.
    #[default]
    Coerce,
    /// Strings are written untouched.
    Preserve,
}

fn default_base_path() -> String {
    "/".to_owned()
}

fn default_route_paths() -> Vec<String> {
    vec!["routes.yml".to_owned()]
}
