//! 配置文件
//!
//! ```toml
//! cursor_speed = 5000
//! pad_button_1 = "Cz"   # Ctrl+Z
//! pad_button_2 = "CSz"  # Ctrl+Shift+Z
//! ```
//!
//! 查找顺序: `--config` 指定的路径, `$HOME/.hidtabletd.toml`, `/etc/hidtabletd/config.toml`

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::event_router::{BUTTON_SLOTS, ButtonBindingTable, KeyMacro, KeyMacroError};
use crate::tablet_driver::cursor::DEFAULT_CURSOR_SPEED;

pub const USER_CONFIG_NAME: &str = ".hidtabletd.toml";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/hidtabletd/config.toml";

const BUTTON_LABEL_PREFIX: &str = "pad_button_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config file")]
    Parse(#[from] toml::de::Error),
    #[error("invalid label `{0}`, expected `cursor_speed` or `pad_button_1` ... `pad_button_16`")]
    InvalidLabel(String),
    #[error("`{label}` uses unknown key symbol {symbol:?}")]
    UnknownKeySymbol { label: String, symbol: char },
    #[error("`{0}` is bound to an empty key macro")]
    EmptyBinding(String),
    #[error("cursor_speed must be positive, got {0}")]
    InvalidCursorSpeed(i64),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    cursor_speed: Option<i64>,
    #[serde(flatten)]
    buttons: BTreeMap<String, String>,
}

/// 校验之后的配置, 里面的每个宏都只包含已知的按键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bindings: ButtonBindingTable,
    pub cursor_speed: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bindings: ButtonBindingTable::new(),
            cursor_speed: DEFAULT_CURSOR_SPEED,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;

        let cursor_speed = match raw.cursor_speed {
            None => DEFAULT_CURSOR_SPEED,
            Some(speed) if speed > 0 && speed <= i32::MAX as i64 => speed as i32,
            Some(speed) => return Err(ConfigError::InvalidCursorSpeed(speed)),
        };

        let mut bindings = ButtonBindingTable::new();
        for (label, source) in raw.buttons {
            let Some(index) = button_index(&label) else {
                return Err(ConfigError::InvalidLabel(label));
            };
            let key_macro = match source.parse::<KeyMacro>() {
                Ok(key_macro) => key_macro,
                Err(KeyMacroError::Empty) => return Err(ConfigError::EmptyBinding(label)),
                Err(KeyMacroError::UnknownSymbol { symbol, .. }) => {
                    return Err(ConfigError::UnknownKeySymbol { label, symbol });
                }
            };
            bindings.bind(index, key_macro);
        }

        Ok(Self {
            bindings,
            cursor_speed,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "loading config");
        Self::from_toml(&text)
    }
}

/// `pad_button_N` 中 N 从 1 开始, 返回从 0 开始的下标
fn button_index(label: &str) -> Option<usize> {
    let number: usize = label.strip_prefix(BUTTON_LABEL_PREFIX)?.parse().ok()?;
    (1..=BUTTON_SLOTS).contains(&number).then(|| number - 1)
}

/// 按优先级排列的候选路径
pub fn candidates(home: Option<&Path>) -> Vec<PathBuf> {
    home.map(|home| home.join(USER_CONFIG_NAME))
        .into_iter()
        .chain([PathBuf::from(SYSTEM_CONFIG_PATH)])
        .collect()
}

/// 显式指定的路径总是被采用, 文件不存在时会在读取时报错
pub fn locate(explicit: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    candidates(home).into_iter().find(|path| path.is_file())
}

/// 找到并载入配置文件, 没有配置文件时返回 `None`
pub fn discover(explicit: Option<&Path>) -> Result<Option<(PathBuf, Config)>, ConfigError> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let Some(path) = locate(explicit, home.as_deref()) else {
        return Ok(None);
    };
    let config = Config::load(&path)?;
    Ok(Some((path, config)))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use evdev_rs::enums::EV_KEY;

    use super::*;

    #[test]
    fn parses_bindings_and_speed() {
        let config = Config::from_toml(
            r#"
            cursor_speed = 8000
            pad_button_1 = "Cz"
            pad_button_16 = "MS4"
            "#,
        )
        .unwrap();

        assert_eq!(config.cursor_speed, 8000);
        assert_eq!(
            config.bindings.get(0).unwrap().keys(),
            [EV_KEY::KEY_LEFTCTRL, EV_KEY::KEY_Z]
        );
        assert_eq!(config.bindings.get(15).unwrap().as_str(), "MS4");
        assert!(config.bindings.get(1).is_none());
    }

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn rejects_invalid_labels() {
        for label in ["pad_button_0", "pad_button_17", "pad_button_x", "button_1", "speed"] {
            let text = format!("{label} = \"a\"");
            assert!(
                matches!(Config::from_toml(&text), Err(ConfigError::InvalidLabel(l)) if l == label),
                "{label} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_unknown_key_symbols() {
        let error = Config::from_toml(r#"pad_button_3 = "C+z""#).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::UnknownKeySymbol { ref label, symbol: '+' } if label == "pad_button_3"
        ));
    }

    #[test]
    fn rejects_empty_bindings() {
        assert!(matches!(
            Config::from_toml(r#"pad_button_2 = """#),
            Err(ConfigError::EmptyBinding(_))
        ));
    }

    #[test]
    fn rejects_non_positive_speed() {
        assert!(matches!(
            Config::from_toml("cursor_speed = 0"),
            Err(ConfigError::InvalidCursorSpeed(0))
        ));
        assert!(matches!(
            Config::from_toml("cursor_speed = -5"),
            Err(ConfigError::InvalidCursorSpeed(-5))
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            Config::from_toml("pad_button_1 = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pad_button_4 = \"Ab\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.bindings.get(3).unwrap().as_str(), "Ab");
        assert_eq!(config.cursor_speed, DEFAULT_CURSOR_SPEED);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(matches!(
            discover(Some(&path)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn home_config_comes_before_system_config() {
        let home = tempfile::tempdir().unwrap();
        assert_eq!(
            candidates(Some(home.path())),
            vec![home.path().join(USER_CONFIG_NAME), PathBuf::from(SYSTEM_CONFIG_PATH)]
        );

        fs::write(home.path().join(USER_CONFIG_NAME), "").unwrap();
        assert_eq!(
            locate(None, Some(home.path())),
            Some(home.path().join(USER_CONFIG_NAME))
        );

        let explicit = home.path().join("other.toml");
        assert_eq!(locate(Some(&explicit), Some(home.path())), Some(explicit.clone()));
    }
}
