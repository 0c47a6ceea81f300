use std::{fmt, io, str::FromStr};

use evdev_rs::enums::EV_KEY;
use thiserror::Error;

use crate::event_dispatcher::sink::VirtualSink;

/// 宏字符串里每个字符对应一个按键
const KEY_SYMBOLS: &[(char, EV_KEY)] = &[
    ('a', EV_KEY::KEY_A),
    ('b', EV_KEY::KEY_B),
    ('c', EV_KEY::KEY_C),
    ('d', EV_KEY::KEY_D),
    ('e', EV_KEY::KEY_E),
    ('f', EV_KEY::KEY_F),
    ('g', EV_KEY::KEY_G),
    ('h', EV_KEY::KEY_H),
    ('i', EV_KEY::KEY_I),
    ('j', EV_KEY::KEY_J),
    ('k', EV_KEY::KEY_K),
    ('l', EV_KEY::KEY_L),
    ('m', EV_KEY::KEY_M),
    ('n', EV_KEY::KEY_N),
    ('o', EV_KEY::KEY_O),
    ('p', EV_KEY::KEY_P),
    ('q', EV_KEY::KEY_Q),
    ('r', EV_KEY::KEY_R),
    ('s', EV_KEY::KEY_S),
    ('t', EV_KEY::KEY_T),
    ('u', EV_KEY::KEY_U),
    ('v', EV_KEY::KEY_V),
    ('w', EV_KEY::KEY_W),
    ('x', EV_KEY::KEY_X),
    ('y', EV_KEY::KEY_Y),
    ('z', EV_KEY::KEY_Z),
    ('0', EV_KEY::KEY_0),
    ('1', EV_KEY::KEY_1),
    ('2', EV_KEY::KEY_2),
    ('3', EV_KEY::KEY_3),
    ('4', EV_KEY::KEY_4),
    ('5', EV_KEY::KEY_5),
    ('6', EV_KEY::KEY_6),
    ('7', EV_KEY::KEY_7),
    ('8', EV_KEY::KEY_8),
    ('9', EV_KEY::KEY_9),
    // 修饰键
    ('S', EV_KEY::KEY_LEFTSHIFT),
    ('C', EV_KEY::KEY_LEFTCTRL),
    ('A', EV_KEY::KEY_LEFTALT),
    ('M', EV_KEY::KEY_LEFTMETA),
];

pub fn key_for_symbol(symbol: char) -> Option<EV_KEY> {
    KEY_SYMBOLS
        .iter()
        .find(|(c, _)| *c == symbol)
        .map(|(_, key)| *key)
}

/// 虚拟键盘需要声明的全部按键
pub fn known_keys() -> impl Iterator<Item = EV_KEY> {
    KEY_SYMBOLS.iter().map(|(_, key)| *key)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyMacroError {
    #[error("key macro is empty")]
    Empty,
    #[error("unknown key symbol {symbol:?} at position {position}")]
    UnknownSymbol { symbol: char, position: usize },
}

/// 一组同时按下的按键, 例如 `"Cz"` 表示 Ctrl+Z
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMacro {
    source: String,
    keys: Vec<EV_KEY>,
}

impl KeyMacro {
    pub fn keys(&self) -> &[EV_KEY] {
        &self.keys
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// 按宏的顺序依次按下, 同步, 再按相同顺序依次松开, 同步
    pub fn play(&self, sink: &mut dyn VirtualSink) -> io::Result<()> {
        for key in &self.keys {
            sink.write_key(*key, true)?;
        }
        sink.sync()?;
        for key in &self.keys {
            sink.write_key(*key, false)?;
        }
        sink.sync()
    }
}

impl FromStr for KeyMacro {
    type Err = KeyMacroError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        if source.is_empty() {
            return Err(KeyMacroError::Empty);
        }
        let keys = source
            .chars()
            .enumerate()
            .map(|(position, symbol)| {
                key_for_symbol(symbol).ok_or(KeyMacroError::UnknownSymbol { symbol, position })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: source.to_owned(),
            keys,
        })
    }
}

impl fmt::Display for KeyMacro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_dispatcher::sink::testing::{RecordingSink, Write};

    #[test]
    fn parses_modifiers_and_letters() {
        let parsed: KeyMacro = "Cz".parse().unwrap();
        assert_eq!(parsed.keys(), &[EV_KEY::KEY_LEFTCTRL, EV_KEY::KEY_Z]);
        assert_eq!(parsed.to_string(), "Cz");
    }

    #[test]
    fn rejects_unknown_symbols() {
        assert_eq!(
            "a b".parse::<KeyMacro>(),
            Err(KeyMacroError::UnknownSymbol {
                symbol: ' ',
                position: 1
            })
        );
        assert_eq!("".parse::<KeyMacro>(), Err(KeyMacroError::Empty));
    }

    #[test]
    fn play_presses_then_releases_in_order() {
        let key_macro: KeyMacro = "Sa".parse().unwrap();
        let mut sink = RecordingSink::default();
        key_macro.play(&mut sink).unwrap();
        assert_eq!(
            sink.writes(),
            vec![
                Write::Key(EV_KEY::KEY_LEFTSHIFT, true),
                Write::Key(EV_KEY::KEY_A, true),
                Write::Sync,
                Write::Key(EV_KEY::KEY_LEFTSHIFT, false),
                Write::Key(EV_KEY::KEY_A, false),
                Write::Sync,
            ]
        );
    }

    #[test]
    fn every_symbol_maps_to_a_distinct_key() {
        let keys: Vec<_> = known_keys().collect();
        for (i, key) in keys.iter().enumerate() {
            assert!(!keys[i + 1..].contains(key));
        }
    }
}
