use super::keymap::KeyMacro;

pub const BUTTON_SLOTS: usize = 16;

/// 数位板按键到键盘宏的映射, 启动时从配置文件载入, 之后只读
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonBindingTable {
    slots: [Option<KeyMacro>; BUTTON_SLOTS],
}

impl ButtonBindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 越界的下标会被忽略并返回 `false`
    pub fn bind(&mut self, index: usize, key_macro: KeyMacro) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = Some(key_macro);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&KeyMacro> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &KeyMacro)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|m| (index, m)))
    }
}

/// 按位从低到高依次取出已绑定的宏
pub fn resolve(mask: u16, table: &ButtonBindingTable) -> Vec<&KeyMacro> {
    (0..BUTTON_SLOTS)
        .filter(|bit| mask & (1 << *bit) != 0)
        .filter_map(|bit| table.get(bit))
        .collect()
}
