use serde::Deserialize;
use sharehealth_types::{ShareConfig, StressConfig};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub shares: Vec<ShareConfig>,

    #[serde(default)]
    pub stress: StressConfig,
}
