//! Maps INI keys onto [`ConfigFile`] fields.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::{ConfigFile, ConfigFileError};

pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [wms] section
    if let Some(section) = ini.section(Some("wms")) {
        config.wms.endpoint = non_empty(section.get("endpoint"));
        config.wms.layer = non_empty(section.get("layer"));
        config.wms.auth_key = non_empty(section.get("auth_key"));
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        config.download.concurrency = positive(section, "download", "concurrency")?;
        config.download.max_attempts = positive(section, "download", "max_attempts")?;
        config.download.commit_every = positive(section, "download", "commit_every")?;
        config.download.timeout =
            positive::<u64>(section, "download", "timeout")?.map(Duration::from_secs);
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        config.output.path = non_empty(section.get("path")).map(|p| expand_tilde(&p));
    }

    Ok(config)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads an integer key that must be at least 1.
fn positive<T>(section: &Properties, name: &str, key: &str) -> Result<Option<T>, ConfigFileError>
where
    T: FromStr + PartialOrd + From<u8>,
{
    let Some(raw) = non_empty(section.get(key)) else {
        return Ok(None);
    };

    let invalid = |reason: &str| ConfigFileError::InvalidValue {
        section: name.to_string(),
        key: key.to_string(),
        value: raw.clone(),
        reason: reason.to_string(),
    };

    let value: T = raw
        .parse()
        .map_err(|_| invalid("expected a whole number"))?;
    if value < T::from(1) {
        return Err(invalid("must be at least 1"));
    }
    Ok(Some(value))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_unset() {
        let config = ConfigFile::parse("[wms]\nauth_key =\nendpoint =   \n").unwrap();
        assert_eq!(config.wms.auth_key, None);
        assert_eq!(config.wms.endpoint, None);
    }

    #[test]
    fn test_layer_with_colon() {
        let config =
            ConfigFile::parse("[wms]\nlayer = NationalMap:NationalMap Emergency Management\n")
                .unwrap();
        assert_eq!(
            config.wms.layer.as_deref(),
            Some("NationalMap:NationalMap Emergency Management")
        );
    }

    #[test]
    fn test_invalid_concurrency() {
        let err = ConfigFile::parse("[download]\nconcurrency = lots\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("download.concurrency"));
        assert!(message.contains("whole number"));
    }

    #[test]
    fn test_zero_is_rejected() {
        let err = ConfigFile::parse("[download]\ncommit_every = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "commit_every"
        ));
    }

    #[test]
    fn test_negative_timeout_is_rejected() {
        assert!(ConfigFile::parse("[download]\ntimeout = -5\n").is_err());
    }

    #[test]
    fn test_tilde_expansion() {
        let config = ConfigFile::parse("[output]\npath = ~/maps/nz.mbtiles\n").unwrap();
        let path = config.output.path.unwrap();
        if dirs::home_dir().is_some() {
            assert!(!path.starts_with("~"));
        }
        assert!(path.ends_with("maps/nz.mbtiles"));
    }

    #[test]
    fn test_unknown_sections_ignored() {
        let config = ConfigFile::parse("[other]\nfoo = bar\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }
}
